pub mod alert;
pub mod error;
pub mod traits;
pub mod types;

pub use alert::*;
pub use error::*;
pub use traits::*;
pub use types::*;

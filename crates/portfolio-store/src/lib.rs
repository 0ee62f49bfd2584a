pub mod db;
pub mod memory;

pub use db::SqliteStore;
pub use memory::InMemoryStore;

use chrono::Duration;
use finance_core::Alert;

/// Alerts that arrive without an idempotency key get the default one-day bucket.
pub(crate) fn dedup_key_for(alert: &Alert) -> String {
    if alert.dedup_key.is_empty() {
        alert.compute_dedup_key(Duration::hours(24))
    } else {
        alert.dedup_key.clone()
    }
}

use async_trait::async_trait;
use finance_core::{FinanceResult, Holding, MarketConditions, MarketDataProvider};
use intelligence_client::TickerPrice;
use std::collections::HashMap;
use tracing::debug;

/// Apply `prices` by ticker. Returns the repriced holdings and how many changed.
///
/// Tickers without a quote, and quotes that are not a positive finite number, keep
/// the holding's previous price.
pub fn apply_prices(holdings: &[Holding], prices: &HashMap<String, f64>) -> (Vec<Holding>, usize) {
    let mut changed = 0;
    let repriced = holdings
        .iter()
        .map(|holding| {
            let mut holding = holding.clone();
            if let Some(&price) = prices.get(&holding.ticker) {
                if price.is_finite() && price > 0.0 && price != holding.current_price {
                    holding.current_price = price;
                    changed += 1;
                }
            }
            holding
        })
        .collect();
    (repriced, changed)
}

/// Index live prices reported by the intelligence service. Later duplicates win.
pub fn price_map(prices: &[TickerPrice]) -> HashMap<String, f64> {
    prices
        .iter()
        .map(|p| (p.ticker.clone(), p.current_price))
        .collect()
}

/// Fixed quote table standing in for a market-data feed
pub struct StaticMarketData {
    prices: HashMap<String, f64>,
    conditions: MarketConditions,
}

impl Default for StaticMarketData {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl StaticMarketData {
    pub fn new(prices: HashMap<String, f64>) -> Self {
        Self {
            prices,
            conditions: MarketConditions {
                general_sentiment: "neutral".to_string(),
                notable_events: vec!["RBI announces new interest rate policy.".to_string()],
            },
        }
    }
}

#[async_trait]
impl MarketDataProvider for StaticMarketData {
    async fn current_prices(&self, tickers: &[String]) -> FinanceResult<HashMap<String, f64>> {
        let quotes: HashMap<String, f64> = tickers
            .iter()
            .filter_map(|t| self.prices.get(t).map(|p| (t.clone(), *p)))
            .collect();
        debug!("Quoted {}/{} tickers", quotes.len(), tickers.len());
        Ok(quotes)
    }

    async fn market_conditions(&self) -> FinanceResult<MarketConditions> {
        Ok(self.conditions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finance_core::AssetType;

    #[test]
    fn test_missing_and_bad_quotes_keep_prior_price() {
        let holdings = vec![
            Holding::new(AssetType::Stock, "Infosys", "INFY", 10.0, 1500.0).with_current_price(1550.0),
            Holding::new(AssetType::Stock, "TCS", "TCS", 2.0, 3500.0).with_current_price(3600.0),
            Holding::new(AssetType::Stock, "Wipro", "WIPRO", 5.0, 400.0),
        ];
        let prices = HashMap::from([
            ("INFY".to_string(), 1620.0),
            ("TCS".to_string(), f64::NAN),
            ("WIPRO".to_string(), -3.0),
        ]);

        let (repriced, changed) = apply_prices(&holdings, &prices);
        assert_eq!(changed, 1);
        assert_eq!(repriced[0].current_price, 1620.0);
        assert_eq!(repriced[1].current_price, 3600.0);
        assert_eq!(repriced[2].current_price, 0.0);
    }

    #[tokio::test]
    async fn test_static_feed_returns_subset() {
        let feed = StaticMarketData::new(HashMap::from([("INFY".to_string(), 1600.0)]));
        let quotes = feed
            .current_prices(&["INFY".to_string(), "UNKNOWN".to_string()])
            .await
            .unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes["INFY"], 1600.0);
    }
}

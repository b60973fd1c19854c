use crate::models::{AccountInfo, Candle, Position, Signal};
use crate::strategy::hold;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Buys once on the first bar and never exits; the engine's forced close at
/// the end of the window realizes the result. Handy as a sanity check
/// against the buy-and-hold benchmark.
pub struct BuyHoldStrategy {
    strategy_id: String,
    entered: bool,
}

impl BuyHoldStrategy {
    pub fn new(_parameters: &HashMap<String, f64>) -> Self {
        Self {
            strategy_id: "buy_hold".to_string(),
            entered: false,
        }
    }
}

impl crate::strategy::Strategy for BuyHoldStrategy {
    fn strategy_id(&self) -> &str {
        &self.strategy_id
    }

    fn generate_signal(
        &mut self,
        candles: &[Candle],
        position: Option<&Position>,
        _account: &AccountInfo,
    ) -> (Signal, Map<String, Value>) {
        if self.entered || position.is_some() {
            return hold("already holding");
        }

        self.entered = true;
        let price = candles[candles.len() - 1].close;
        let mut details = Map::new();
        details.insert("reason".to_string(), json!("initial buy and hold entry"));
        details.insert("price".to_string(), json!(price));
        (Signal::Buy, details)
    }

    fn min_data_points(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Strategy;
    use chrono::{TimeZone, Utc};

    #[test]
    fn buys_exactly_once() {
        let mut strategy = BuyHoldStrategy::new(&HashMap::new());
        let candle = Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            open: 100.0,
            high: 100.0,
            low: 100.0,
            close: 100.0,
            volume: 1.0,
        };
        let account = AccountInfo {
            total_balance: 1_000_000.0,
            available_balance: 1_000_000.0,
            margin_level: 1.0,
        };

        let (first, _) = strategy.generate_signal(std::slice::from_ref(&candle), None, &account);
        assert_eq!(first, Signal::Buy);

        let (second, _) = strategy.generate_signal(std::slice::from_ref(&candle), None, &account);
        assert_eq!(second, Signal::Hold);
    }
}

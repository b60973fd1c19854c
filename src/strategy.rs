use crate::error::EngineError;
use crate::models::{AccountInfo, Candle, Position, Signal};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A trading strategy consulted once per bar. `candles` is the history up to
/// and including the current bar; implementations may keep internal state
/// across bars (confirmation counters, one-shot flags), which is why the
/// receiver is `&mut self`.
pub trait Strategy: Send {
    fn strategy_id(&self) -> &str;
    fn generate_signal(
        &mut self,
        candles: &[Candle],
        position: Option<&Position>,
        account: &AccountInfo,
    ) -> (Signal, Map<String, Value>);
    fn min_data_points(&self) -> usize;
}

impl std::fmt::Debug for dyn Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Strategy({})", self.strategy_id())
    }
}

pub fn hold(reason: &str) -> (Signal, Map<String, Value>) {
    let mut details = Map::new();
    details.insert("reason".to_string(), Value::String(reason.to_string()));
    (Signal::Hold, details)
}

#[path = "strategies/ma_cross.rs"]
pub mod ma_cross;

pub use ma_cross::MaCrossStrategy;

#[path = "strategies/macd_rsi.rs"]
pub mod macd_rsi;

pub use macd_rsi::MacdRsiStrategy;

#[path = "strategies/buy_hold.rs"]
pub mod buy_hold;

pub use buy_hold::BuyHoldStrategy;

pub const STRATEGY_IDS: &[&str] = &["ma_cross", "macd_rsi", "buy_hold"];

pub fn create_strategy(
    strategy_id: &str,
    parameters: &HashMap<String, f64>,
) -> Result<Box<dyn Strategy>, EngineError> {
    match strategy_id {
        "ma_cross" => Ok(Box::new(MaCrossStrategy::new(parameters))),
        "macd_rsi" => Ok(Box::new(MacdRsiStrategy::new(parameters))),
        "buy_hold" => Ok(Box::new(BuyHoldStrategy::new(parameters))),
        other => Err(EngineError::UnknownStrategy(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_builds_every_registered_strategy() {
        let params = HashMap::new();
        for id in STRATEGY_IDS {
            let strategy = create_strategy(id, &params).unwrap();
            assert_eq!(strategy.strategy_id(), *id);
        }
    }

    #[test]
    fn factory_rejects_unknown_ids() {
        let err = create_strategy("grid_bot", &HashMap::new()).unwrap_err();
        assert!(matches!(err, EngineError::UnknownStrategy(_)));
    }
}

use crate::indicators::calculate_sma;
use crate::models::{AccountInfo, Candle, Position, PositionSide, Signal};
use crate::params::get_usize_param_min;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrossDirection {
    Golden,
    Dead,
}

/// Simple moving average cross strategy: enters on a golden/dead cross of
/// the short SMA over the long SMA, sustained for `confirmation_bars`
/// consecutive bars, and exits on the opposite cross.
pub struct MaCrossStrategy {
    strategy_id: String,
    short_period: usize,
    long_period: usize,
    confirmation_bars: usize,
    cross_direction: Option<CrossDirection>,
    cross_bar_count: usize,
}

impl MaCrossStrategy {
    pub fn new(parameters: &HashMap<String, f64>) -> Self {
        Self {
            strategy_id: "ma_cross".to_string(),
            short_period: get_usize_param_min(parameters, "short_period", 7, 1),
            long_period: get_usize_param_min(parameters, "long_period", 25, 2),
            confirmation_bars: get_usize_param_min(parameters, "confirmation_bars", 1, 1),
            cross_direction: None,
            cross_bar_count: 0,
        }
    }

    fn reset_cross(&mut self) {
        self.cross_direction = None;
        self.cross_bar_count = 0;
    }

    fn track_cross(&mut self, direction: CrossDirection) -> usize {
        if self.cross_direction != Some(direction) {
            self.cross_direction = Some(direction);
            self.cross_bar_count = 1;
        } else {
            self.cross_bar_count += 1;
        }
        self.cross_bar_count
    }

    fn check_entry(
        &mut self,
        current_short: f64,
        current_long: f64,
        prev_short: f64,
        prev_long: f64,
        price: f64,
    ) -> (Signal, Map<String, Value>) {
        if prev_short <= prev_long && current_short > current_long {
            let bars = self.track_cross(CrossDirection::Golden);
            if bars >= self.confirmation_bars {
                self.reset_cross();
                let details = cross_details("golden cross", current_short, current_long, price, bars);
                return (Signal::Buy, details);
            }
        } else if prev_short >= prev_long && current_short < current_long {
            let bars = self.track_cross(CrossDirection::Dead);
            if bars >= self.confirmation_bars {
                self.reset_cross();
                let details = cross_details("dead cross", current_short, current_long, price, bars);
                return (Signal::Sell, details);
            }
        } else {
            self.reset_cross();
        }

        crate::strategy::hold("no entry conditions")
    }

    fn check_exit(
        &self,
        current_short: f64,
        current_long: f64,
        prev_short: f64,
        prev_long: f64,
        price: f64,
        position: &Position,
    ) -> (Signal, Map<String, Value>) {
        match position.side {
            PositionSide::Long => {
                if prev_short >= prev_long && current_short < current_long {
                    let mut details =
                        cross_details("dead cross exit", current_short, current_long, price, 1);
                    details.insert("entry_price".to_string(), json!(position.entry_price));
                    return (Signal::CloseLong, details);
                }
            }
            PositionSide::Short => {
                if prev_short <= prev_long && current_short > current_long {
                    let mut details =
                        cross_details("golden cross exit", current_short, current_long, price, 1);
                    details.insert("entry_price".to_string(), json!(position.entry_price));
                    return (Signal::CloseShort, details);
                }
            }
        }

        crate::strategy::hold("no exit conditions")
    }
}

fn cross_details(
    reason: &str,
    short_ma: f64,
    long_ma: f64,
    price: f64,
    confirmation_bars: usize,
) -> Map<String, Value> {
    let mut details = Map::new();
    details.insert("reason".to_string(), json!(reason));
    details.insert("short_ma".to_string(), json!(short_ma));
    details.insert("long_ma".to_string(), json!(long_ma));
    details.insert("price".to_string(), json!(price));
    details.insert("confirmation_bars".to_string(), json!(confirmation_bars));
    details
}

impl crate::strategy::Strategy for MaCrossStrategy {
    fn strategy_id(&self) -> &str {
        &self.strategy_id
    }

    fn generate_signal(
        &mut self,
        candles: &[Candle],
        position: Option<&Position>,
        _account: &AccountInfo,
    ) -> (Signal, Map<String, Value>) {
        if candles.len() < self.min_data_points() {
            return crate::strategy::hold("insufficient data");
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let short_ma = calculate_sma(&closes, self.short_period);
        let long_ma = calculate_sma(&closes, self.long_period);

        let i = candles.len() - 1;
        let current_short = short_ma[i];
        let current_long = long_ma[i];
        let prev_short = short_ma[i - 1];
        let prev_long = long_ma[i - 1];
        let price = closes[i];

        match position {
            None => self.check_entry(current_short, current_long, prev_short, prev_long, price),
            Some(position) => {
                self.check_exit(current_short, current_long, prev_short, prev_long, price, position)
            }
        }
    }

    fn min_data_points(&self) -> usize {
        self.long_period + self.confirmation_bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Strategy;
    use chrono::{Duration, TimeZone, Utc};

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: start + Duration::hours(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect()
    }

    fn account() -> AccountInfo {
        AccountInfo {
            total_balance: 1_000_000.0,
            available_balance: 1_000_000.0,
            margin_level: 1.0,
        }
    }

    fn params(short: f64, long: f64) -> HashMap<String, f64> {
        let mut params = HashMap::new();
        params.insert("short_period".to_string(), short);
        params.insert("long_period".to_string(), long);
        params
    }

    #[test]
    fn holds_while_data_is_insufficient() {
        let mut strategy = MaCrossStrategy::new(&params(3.0, 5.0));
        let candles = candles_from_closes(&[100.0, 101.0, 102.0]);
        let (signal, details) = strategy.generate_signal(&candles, None, &account());
        assert_eq!(signal, Signal::Hold);
        assert_eq!(details["reason"], "insufficient data");
    }

    #[test]
    fn golden_cross_fires_buy_after_downtrend_reverses() {
        let mut strategy = MaCrossStrategy::new(&params(2.0, 4.0));
        // long downtrend then a sharp reversal pulls the short SMA above the long
        let closes = [110.0, 108.0, 106.0, 104.0, 102.0, 100.0, 99.0, 107.0, 115.0];
        let candles = candles_from_closes(&closes);

        let mut last = Signal::Hold;
        for i in 0..candles.len() {
            let (signal, _) = strategy.generate_signal(&candles[..=i], None, &account());
            if signal != Signal::Hold {
                last = signal;
            }
        }
        assert_eq!(last, Signal::Buy);
    }

    #[test]
    fn dead_cross_closes_a_long_position() {
        let mut strategy = MaCrossStrategy::new(&params(2.0, 4.0));
        // uptrend collapsing, short SMA falls through the long
        let closes = [100.0, 102.0, 104.0, 106.0, 108.0, 110.0, 111.0, 103.0, 95.0];
        let candles = candles_from_closes(&closes);
        let position = Position {
            side: PositionSide::Long,
            entry_price: 104.0,
            size: 0.01,
            entry_time: candles[3].timestamp,
            stop_loss: None,
            take_profit: None,
        };

        let mut saw_close = false;
        for i in 0..candles.len() {
            let (signal, _) = strategy.generate_signal(&candles[..=i], Some(&position), &account());
            if signal == Signal::CloseLong {
                saw_close = true;
            }
            assert_ne!(signal, Signal::Buy);
        }
        assert!(saw_close);
    }
}

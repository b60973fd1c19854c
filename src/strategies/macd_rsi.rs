use crate::indicators::{calculate_macd, calculate_rsi};
use crate::models::{AccountInfo, Candle, Position, PositionSide, Signal};
use crate::params::{get_param, get_param_clamped};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

const RSI_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const MIN_BARS: usize = 50;

/// MACD + RSI combination: RSI gauges how stretched the market is, the MACD
/// histogram flip times the entry. Longs take profit when RSI reaches the
/// overbought zone and cut losses when the histogram deteriorates past twice
/// the threshold; shorts mirror both rules.
pub struct MacdRsiStrategy {
    strategy_id: String,
    rsi_oversold: f64,
    rsi_overbought: f64,
    macd_threshold: f64,
}

impl MacdRsiStrategy {
    pub fn new(parameters: &HashMap<String, f64>) -> Self {
        Self {
            strategy_id: "macd_rsi".to_string(),
            rsi_oversold: get_param_clamped(parameters, "rsi_oversold", 30.0, 0.0, 100.0),
            rsi_overbought: get_param_clamped(parameters, "rsi_overbought", 70.0, 0.0, 100.0),
            macd_threshold: get_param(parameters, "macd_threshold", 0.0),
        }
    }

    fn check_entry(
        &self,
        macd: f64,
        histogram: f64,
        prev_histogram: f64,
        rsi: f64,
        price: f64,
    ) -> (Signal, Map<String, Value>) {
        // buy: RSI near the oversold zone and the histogram turning positive
        if rsi < self.rsi_oversold + 10.0
            && prev_histogram <= 0.0
            && histogram > 0.0
            && macd > self.macd_threshold
        {
            let details = entry_details("oversold RSI + histogram flip up", macd, histogram, rsi, price);
            return (Signal::Buy, details);
        }

        // sell: RSI near the overbought zone and the histogram turning negative
        if rsi > self.rsi_overbought - 10.0
            && prev_histogram >= 0.0
            && histogram < 0.0
            && macd < -self.macd_threshold
        {
            let details = entry_details("overbought RSI + histogram flip down", macd, histogram, rsi, price);
            return (Signal::Sell, details);
        }

        crate::strategy::hold("no entry conditions")
    }

    fn check_exit(
        &self,
        histogram: f64,
        rsi: f64,
        price: f64,
        position: &Position,
    ) -> (Signal, Map<String, Value>) {
        let loss_cut = self.macd_threshold.abs() * 2.0;
        match position.side {
            PositionSide::Long => {
                if rsi >= self.rsi_overbought {
                    let details =
                        exit_details("overbought RSI take profit", histogram, rsi, price, position);
                    return (Signal::CloseLong, details);
                }
                if histogram < -loss_cut {
                    let details =
                        exit_details("histogram deterioration loss cut", histogram, rsi, price, position);
                    return (Signal::CloseLong, details);
                }
            }
            PositionSide::Short => {
                if rsi <= self.rsi_oversold {
                    let details =
                        exit_details("oversold RSI take profit", histogram, rsi, price, position);
                    return (Signal::CloseShort, details);
                }
                if histogram > loss_cut {
                    let details =
                        exit_details("histogram deterioration loss cut", histogram, rsi, price, position);
                    return (Signal::CloseShort, details);
                }
            }
        }

        crate::strategy::hold("no exit conditions")
    }
}

fn entry_details(
    reason: &str,
    macd: f64,
    histogram: f64,
    rsi: f64,
    price: f64,
) -> Map<String, Value> {
    let mut details = Map::new();
    details.insert("reason".to_string(), json!(reason));
    details.insert("macd".to_string(), json!(macd));
    details.insert("macd_histogram".to_string(), json!(histogram));
    details.insert("rsi".to_string(), json!(rsi));
    details.insert("price".to_string(), json!(price));
    details
}

fn exit_details(
    reason: &str,
    histogram: f64,
    rsi: f64,
    price: f64,
    position: &Position,
) -> Map<String, Value> {
    let mut details = Map::new();
    details.insert("reason".to_string(), json!(reason));
    details.insert("macd_histogram".to_string(), json!(histogram));
    details.insert("rsi".to_string(), json!(rsi));
    details.insert("price".to_string(), json!(price));
    details.insert("entry_price".to_string(), json!(position.entry_price));
    details
}

impl crate::strategy::Strategy for MacdRsiStrategy {
    fn strategy_id(&self) -> &str {
        &self.strategy_id
    }

    fn generate_signal(
        &mut self,
        candles: &[Candle],
        position: Option<&Position>,
        _account: &AccountInfo,
    ) -> (Signal, Map<String, Value>) {
        if candles.len() < MIN_BARS {
            return crate::strategy::hold("insufficient data");
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let (macd_line, _, histogram) = calculate_macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        let rsi = calculate_rsi(&closes, RSI_PERIOD);

        let i = closes.len() - 1;
        let current_macd = macd_line[i];
        let current_histogram = histogram[i];
        let prev_histogram = histogram[i - 1];
        let current_rsi = rsi[i];
        let price = closes[i];

        if !current_macd.is_finite() || !current_rsi.is_finite() {
            return crate::strategy::hold("indicator not ready");
        }

        match position {
            None => self.check_entry(current_macd, current_histogram, prev_histogram, current_rsi, price),
            Some(position) => self.check_exit(current_histogram, current_rsi, price, position),
        }
    }

    fn min_data_points(&self) -> usize {
        MIN_BARS
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

    #[test]
    fn holds_below_the_minimum_window() {
        let mut strategy = MacdRsiStrategy::new(&HashMap::new());
        let candles = candles_from_closes(&vec![100.0; 49]);
        let (signal, details) = strategy.generate_signal(&candles, None, &account());
        assert_eq!(signal, Signal::Hold);
        assert_eq!(details["reason"], "insufficient data");
    }

    #[test]
    fn long_takes_profit_when_rsi_is_overbought() {
        let mut strategy = MacdRsiStrategy::new(&HashMap::new());
        // strong monotonic rally pins RSI at 100
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 2.0).collect();
        let candles = candles_from_closes(&closes);
        let position = Position {
            side: PositionSide::Long,
            entry_price: 100.0,
            size: 0.01,
            entry_time: candles[0].timestamp,
            stop_loss: None,
            take_profit: None,
        };

        let (signal, details) = strategy.generate_signal(&candles, Some(&position), &account());
        assert_eq!(signal, Signal::CloseLong);
        assert_eq!(details["reason"], "overbought RSI take profit");
    }

    #[test]
    fn short_takes_profit_when_rsi_is_oversold() {
        let mut strategy = MacdRsiStrategy::new(&HashMap::new());
        let closes: Vec<f64> = (0..60).map(|i| 500.0 - i as f64 * 2.0).collect();
        let candles = candles_from_closes(&closes);
        let position = Position {
            side: PositionSide::Short,
            entry_price: 500.0,
            size: 0.01,
            entry_time: candles[0].timestamp,
            stop_loss: None,
            take_profit: None,
        };

        let (signal, _) = strategy.generate_signal(&candles, Some(&position), &account());
        assert_eq!(signal, Signal::CloseShort);
    }

    #[test]
    fn no_entry_in_a_flat_market() {
        let mut strategy = MacdRsiStrategy::new(&HashMap::new());
        let candles = candles_from_closes(&vec![100.0; 60]);
        let (signal, _) = strategy.generate_signal(&candles, None, &account());
        assert_eq!(signal, Signal::Hold);
    }
}

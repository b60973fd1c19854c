use anyhow::anyhow;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// One OHLCV sample for a fixed interval. Timestamps within a series are
/// strictly increasing; the indicator layer derives everything else from
/// these five columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
    CloseLong,
    CloseShort,
    CloseAll,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
            Signal::CloseLong => "CLOSE_LONG",
            Signal::CloseShort => "CLOSE_SHORT",
            Signal::CloseAll => "CLOSE_ALL",
        }
    }

    pub fn is_entry(&self) -> bool {
        matches!(self, Signal::Buy | Signal::Sell)
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Signal::CloseLong | Signal::CloseShort | Signal::CloseAll)
    }
}

impl FromStr for Signal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Signal::Buy),
            "SELL" => Ok(Signal::Sell),
            "HOLD" => Ok(Signal::Hold),
            "CLOSE_LONG" => Ok(Signal::CloseLong),
            "CLOSE_SHORT" => Ok(Signal::CloseShort),
            "CLOSE_ALL" => Ok(Signal::CloseAll),
            other => Err(anyhow!("Unknown signal '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
        }
    }
}

/// A single open position. At most one exists per run; the stop-loss and
/// take-profit prices are advisory and are never checked against intrabar
/// highs or lows — the position closes only on an explicit CLOSE_* signal
/// or when the run ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    pub entry_price: f64,
    pub size: f64,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

impl Position {
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.side {
            PositionSide::Long => (price - self.entry_price) * self.size,
            PositionSide::Short => (self.entry_price - price) * self.size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeType {
    Entry,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Immutable, append-only execution log entry. `pnl` is set on exits only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    pub side: OrderSide,
    pub price: f64,
    pub size: f64,
    pub value: f64,
    pub commission: f64,
    pub balance_before: f64,
    pub balance_after: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
}

/// One equity sample per bar, 1:1 with the candle sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub balance: f64,
    pub equity: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<Utc>,
    pub signal: Signal,
    pub price: f64,
    pub details: Map<String, Value>,
}

/// Account snapshot handed to strategies. During a backtest the available
/// balance is zero while a position is open and the margin level is pinned
/// at 1.0, mirroring the live account feed shape.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountInfo {
    pub total_balance: f64,
    pub available_balance: f64,
    pub margin_level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub strategy_id: String,
    pub symbol: String,
    pub interval: String,
    pub start_date: String,
    pub end_date: String,
    pub initial_capital: f64,
    pub final_balance: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub total_trades: i32,
    pub winning_trades: i32,
    pub losing_trades: i32,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_fees: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityCurveData {
    pub timestamps: Vec<String>,
    pub balance: Vec<f64>,
    pub equity: Vec<f64>,
}

/// Buy-and-hold reference computed from the raw close series. The drawdown
/// duration is a bar count; the field keeps the `_hours` suffix from the
/// result contract, where the default interval is one hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyHoldResult {
    pub initial_capital: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub max_drawdown_duration_hours: i64,
    pub sharpe_ratio: f64,
    pub btc_amount: f64,
    pub start_price: f64,
    pub end_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_consecutive_losses: i32,
    pub max_drawdown_period: i32,
    pub current_drawdown_period: i32,
    pub value_at_risk_95: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyComparisonSide {
    pub total_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub total_trades: i32,
    pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparisonSide {
    pub total_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub strategy_beats_buy_hold: bool,
    pub return_difference_pct: f64,
    pub sharpe_ratio_difference: f64,
    pub drawdown_difference_pct: f64,
    pub strategy: StrategyComparisonSide,
    pub buy_and_hold: BenchmarkComparisonSide,
}

/// The aggregate returned to callers. Read-only once assembled; external
/// consumers depend on exactly these keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub summary: BacktestSummary,
    pub equity_curve: EquityCurveData,
    pub trades: Vec<TradeRecord>,
    pub signals: Vec<SignalRecord>,
    pub buy_hold_comparison: BuyHoldResult,
}

/// Identifies one backtest request; the candle window itself is loaded by
/// the caller and passed alongside.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub strategy_id: String,
    pub symbol: String,
    pub interval: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub mod timestamp_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

pub fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| anyhow!("Timestamp must be '{}' or RFC 3339 (value: {})", TIMESTAMP_FORMAT, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn signal_round_trips_through_strings() {
        for signal in [
            Signal::Buy,
            Signal::Sell,
            Signal::Hold,
            Signal::CloseLong,
            Signal::CloseShort,
            Signal::CloseAll,
        ] {
            assert_eq!(signal.as_str().parse::<Signal>().unwrap(), signal);
        }
        assert!("GO_LONG".parse::<Signal>().is_err());
    }

    #[test]
    fn trade_record_serializes_with_contract_keys() {
        let record = TradeRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            trade_type: TradeType::Entry,
            side: OrderSide::Buy,
            price: 5_000_000.0,
            size: 0.01,
            value: 50_000.0,
            commission: 25.0,
            balance_before: 1_000_000.0,
            balance_after: 999_975.0,
            pnl: None,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "ENTRY");
        assert_eq!(json["side"], "BUY");
        assert_eq!(json["timestamp"], "2024-03-01 12:00:00");
        assert!(json.get("pnl").is_none());
    }

    #[test]
    fn parse_timestamp_accepts_contract_and_rfc3339_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01 12:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01T12:30:00+00:00").unwrap(), expected);
        assert!(parse_timestamp("03/01/2024").is_err());
    }

    #[test]
    fn unrealized_pnl_sign_follows_position_side() {
        let entry_time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let long = Position {
            side: PositionSide::Long,
            entry_price: 100.0,
            size: 1.0,
            entry_time,
            stop_loss: None,
            take_profit: None,
        };
        let short = Position {
            side: PositionSide::Short,
            ..long.clone()
        };

        assert_eq!(long.unrealized_pnl(110.0), 10.0);
        assert_eq!(short.unrealized_pnl(110.0), -10.0);
    }
}

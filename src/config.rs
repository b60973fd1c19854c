use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionMode {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlippageMode {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMethod {
    FixedPercentage,
    FixedAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopLossMethod {
    Percentage,
    Atr,
    FixedAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeProfitMethod {
    RiskReward,
    Percentage,
    FixedAmount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub symbol: String,
    pub interval: String,
    pub min_order_size: f64,
    pub tick_size: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC_JPY".to_string(),
            interval: "1hour".to_string(),
            min_order_size: 0.0001,
            tick_size: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommissionConfig {
    #[serde(rename = "type")]
    pub mode: CommissionMode,
    pub maker_fee: f64,
    pub taker_fee: f64,
    pub fixed_fee: f64,
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            mode: CommissionMode::Percentage,
            maker_fee: 0.0005,
            taker_fee: 0.0009,
            fixed_fee: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlippageConfig {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub mode: SlippageMode,
    pub percentage: f64,
    pub amount: f64,
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: SlippageMode::Percentage,
            percentage: 0.0001,
            amount: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub commission: CommissionConfig,
    pub slippage: SlippageConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 1_000_000.0,
            commission: CommissionConfig::default(),
            slippage: SlippageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionSizingConfig {
    pub method: SizingMethod,
    pub risk_per_trade: f64,
    pub max_position_size: f64,
}

impl Default for PositionSizingConfig {
    fn default() -> Self {
        Self {
            method: SizingMethod::FixedPercentage,
            risk_per_trade: 0.02,
            max_position_size: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopLossConfig {
    pub enabled: bool,
    pub method: StopLossMethod,
    pub percentage: f64,
    pub atr_multiplier: f64,
    pub fixed_amount: f64,
}

impl Default for StopLossConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            method: StopLossMethod::Percentage,
            percentage: 0.02,
            atr_multiplier: 2.0,
            fixed_amount: 50_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TakeProfitConfig {
    pub enabled: bool,
    pub method: TakeProfitMethod,
    pub risk_reward_ratio: f64,
    pub percentage: f64,
    pub fixed_amount: f64,
}

impl Default for TakeProfitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            method: TakeProfitMethod::RiskReward,
            risk_reward_ratio: 2.0,
            percentage: 0.04,
            fixed_amount: 100_000.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub position_sizing: PositionSizingConfig,
    pub stop_loss: StopLossConfig,
    pub take_profit: TakeProfitConfig,
}

/// Main configuration struct that groups all parameters. Mode strings are
/// decoded into enums during deserialization, so an unknown commission or
/// slippage type fails at load time rather than mid-run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub trading: TradingConfig,
    pub backtest: BacktestConfig,
    pub risk_management: RiskConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            EngineError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: AppConfig = serde_json::from_str(&raw).map_err(|e| {
            EngineError::Configuration(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        require_positive("backtest.initial_capital", self.backtest.initial_capital)?;
        require_rate("backtest.commission.maker_fee", self.backtest.commission.maker_fee)?;
        require_rate("backtest.commission.taker_fee", self.backtest.commission.taker_fee)?;
        require_non_negative("backtest.commission.fixed_fee", self.backtest.commission.fixed_fee)?;
        require_rate("backtest.slippage.percentage", self.backtest.slippage.percentage)?;
        require_non_negative("backtest.slippage.amount", self.backtest.slippage.amount)?;
        require_rate(
            "risk_management.position_sizing.risk_per_trade",
            self.risk_management.position_sizing.risk_per_trade,
        )?;
        require_positive(
            "risk_management.position_sizing.max_position_size",
            self.risk_management.position_sizing.max_position_size,
        )?;
        require_positive("trading.min_order_size", self.trading.min_order_size)?;
        require_positive("trading.tick_size", self.trading.tick_size)?;
        Ok(())
    }
}

fn require_positive(key: &str, value: f64) -> Result<(), EngineError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(EngineError::Configuration(format!(
            "{} must be a positive number (value: {})",
            key, value
        )));
    }
    Ok(())
}

fn require_non_negative(key: &str, value: f64) -> Result<(), EngineError> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::Configuration(format!(
            "{} must be >= 0 (value: {})",
            key, value
        )));
    }
    Ok(())
}

fn require_rate(key: &str, value: f64) -> Result<(), EngineError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(EngineError::Configuration(format!(
            "{} must be between 0 and 1 (value: {})",
            key, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.backtest.initial_capital, 1_000_000.0);
        assert_eq!(config.backtest.commission.maker_fee, 0.0005);
        assert_eq!(config.backtest.commission.taker_fee, 0.0009);
        assert_eq!(config.backtest.slippage.percentage, 0.0001);
        assert_eq!(config.risk_management.position_sizing.risk_per_trade, 0.02);
        assert_eq!(config.risk_management.position_sizing.max_position_size, 0.1);
        assert_eq!(config.trading.min_order_size, 0.0001);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_commission_mode_is_rejected_at_parse_time() {
        let raw = r#"{"backtest": {"commission": {"type": "tiered"}}}"#;
        let parsed: Result<AppConfig, _> = serde_json::from_str(raw);
        assert!(parsed.is_err());
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let raw = r#"{"backtest": {"initial_capital": 500000.0}}"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.backtest.initial_capital, 500_000.0);
        assert_eq!(config.backtest.commission.taker_fee, 0.0009);
        assert_eq!(config.risk_management.stop_loss.method, StopLossMethod::Percentage);
    }

    #[test]
    fn validate_rejects_out_of_range_rates() {
        let mut config = AppConfig::default();
        config.backtest.commission.taker_fee = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.backtest.initial_capital = 0.0;
        assert!(config.validate().is_err());
    }
}

use crate::config::{
    AppConfig, PositionSizingConfig, SizingMethod, StopLossConfig, StopLossMethod,
    TakeProfitConfig, TakeProfitMethod,
};
use crate::models::Signal;
use log::warn;

/// Smallest tradable BTC increment; sizes are rounded to this step.
pub const SIZE_STEP: f64 = 0.0001;

/// Pluggable position sizing and protective price placement. The engine
/// consults the sizer once per entry: stop first, then size, then target.
pub trait RiskSizer: Send {
    fn stop_loss(&self, signal: Signal, entry_price: f64, atr: Option<f64>) -> Option<f64>;
    fn position_size(
        &self,
        signal: Signal,
        account_balance: f64,
        current_price: f64,
        stop_loss_price: Option<f64>,
    ) -> f64;
    fn take_profit(
        &self,
        signal: Signal,
        entry_price: f64,
        stop_loss_price: Option<f64>,
    ) -> Option<f64>;
}

#[derive(Debug, Clone)]
pub struct RiskManager {
    sizing: PositionSizingConfig,
    stop: StopLossConfig,
    target: TakeProfitConfig,
    min_order_size: f64,
    tick_size: f64,
}

impl RiskManager {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            sizing: config.risk_management.position_sizing.clone(),
            stop: config.risk_management.stop_loss.clone(),
            target: config.risk_management.take_profit.clone(),
            min_order_size: config.trading.min_order_size,
            tick_size: config.trading.tick_size,
        }
    }

    fn round_to_tick(&self, price: f64) -> f64 {
        (price / self.tick_size).round() * self.tick_size
    }
}

impl RiskSizer for RiskManager {
    fn stop_loss(&self, signal: Signal, entry_price: f64, atr: Option<f64>) -> Option<f64> {
        if !self.stop.enabled {
            return None;
        }

        let stop_loss = match self.stop.method {
            StopLossMethod::Percentage => match signal {
                Signal::Buy => entry_price * (1.0 - self.stop.percentage),
                _ => entry_price * (1.0 + self.stop.percentage),
            },
            StopLossMethod::Atr => {
                let atr = atr?;
                match signal {
                    Signal::Buy => entry_price - atr * self.stop.atr_multiplier,
                    _ => entry_price + atr * self.stop.atr_multiplier,
                }
            }
            StopLossMethod::FixedAmount => match signal {
                Signal::Buy => entry_price - self.stop.fixed_amount,
                _ => entry_price + self.stop.fixed_amount,
            },
        };

        if !stop_loss.is_finite() {
            warn!("Computed stop loss is not finite (atr: {:?})", atr);
            return None;
        }

        Some(self.round_to_tick(stop_loss))
    }

    fn position_size(
        &self,
        signal: Signal,
        account_balance: f64,
        current_price: f64,
        stop_loss_price: Option<f64>,
    ) -> f64 {
        if !signal.is_entry() {
            return 0.0;
        }

        let mut position_size = match self.sizing.method {
            SizingMethod::FixedPercentage => match stop_loss_price {
                Some(stop) => {
                    let risk_amount = account_balance * self.sizing.risk_per_trade;
                    let price_risk = (current_price - stop).abs();
                    if price_risk > 0.0 {
                        risk_amount / price_risk
                    } else {
                        0.0
                    }
                }
                None => account_balance * self.sizing.risk_per_trade / current_price,
            },
            // risk_per_trade doubles as a fixed BTC quantity in this mode
            SizingMethod::FixedAmount => self.sizing.risk_per_trade,
        };

        position_size = position_size.min(self.sizing.max_position_size);

        if position_size < self.min_order_size {
            warn!(
                "Computed position size {} is below the minimum order size",
                position_size
            );
            return 0.0;
        }

        (position_size / SIZE_STEP).round() * SIZE_STEP
    }

    fn take_profit(
        &self,
        signal: Signal,
        entry_price: f64,
        stop_loss_price: Option<f64>,
    ) -> Option<f64> {
        if !self.target.enabled {
            return None;
        }

        let take_profit = match self.target.method {
            TakeProfitMethod::RiskReward => {
                let stop = stop_loss_price?;
                let risk = (entry_price - stop).abs();
                match signal {
                    Signal::Buy => entry_price + risk * self.target.risk_reward_ratio,
                    _ => entry_price - risk * self.target.risk_reward_ratio,
                }
            }
            TakeProfitMethod::Percentage => match signal {
                Signal::Buy => entry_price * (1.0 + self.target.percentage),
                _ => entry_price * (1.0 - self.target.percentage),
            },
            TakeProfitMethod::FixedAmount => match signal {
                Signal::Buy => entry_price + self.target.fixed_amount,
                _ => entry_price - self.target.fixed_amount,
            },
        };

        if !take_profit.is_finite() {
            return None;
        }

        Some(self.round_to_tick(take_profit))
    }
}

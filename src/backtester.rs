use crate::benchmark::BenchmarkComparator;
use crate::config::{AppConfig, CommissionConfig, CommissionMode, SlippageConfig, SlippageMode};
use crate::error::EngineError;
use crate::indicators::atr_at;
use crate::models::{
    format_timestamp, AccountInfo, BacktestResult, Candle, EquityCurveData, EquityPoint,
    OrderSide, Position, PositionSide, RunSpec, Signal, SignalRecord, TradeRecord, TradeType,
};
use crate::performance::PerformanceCalculator;
use crate::risk::{RiskManager, RiskSizer};
use crate::strategy::Strategy;
use log::{info, warn};

/// ATR lookback handed to the risk sizer on entries.
pub const DEFAULT_ATR_PERIOD: usize = 14;

/// Per-run mutable state. Allocated fresh inside `run`, so a single
/// `Backtester` can drive any number of sequential or concurrent runs
/// without leaking trades or balances between them.
struct RunState {
    balance: f64,
    position: Option<Position>,
    trades: Vec<TradeRecord>,
    equity: Vec<EquityPoint>,
    signals: Vec<SignalRecord>,
}

impl RunState {
    fn new(initial_capital: f64) -> Self {
        Self {
            balance: initial_capital,
            position: None,
            trades: Vec::new(),
            equity: Vec::new(),
            signals: Vec::new(),
        }
    }

    fn account_info(&self) -> AccountInfo {
        AccountInfo {
            total_balance: self.balance,
            available_balance: if self.position.is_some() {
                0.0
            } else {
                self.balance
            },
            margin_level: 1.0,
        }
    }
}

pub struct Backtester {
    initial_capital: f64,
    commission: CommissionConfig,
    slippage: SlippageConfig,
    risk: Box<dyn RiskSizer>,
}

impl Backtester {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_risk_sizer(config, Box::new(RiskManager::new(config)))
    }

    pub fn with_risk_sizer(config: &AppConfig, risk: Box<dyn RiskSizer>) -> Self {
        Self {
            initial_capital: config.backtest.initial_capital,
            commission: config.backtest.commission.clone(),
            slippage: config.backtest.slippage.clone(),
            risk,
        }
    }

    /// Simulate one strategy over one candle window. Each bar the strategy
    /// sees only history up to and including that bar, and any non-HOLD
    /// signal executes at the current bar's close. A position still open
    /// after the last bar is force-closed at the final close.
    pub fn run(
        &self,
        strategy: &mut dyn Strategy,
        candles: &[Candle],
        run: &RunSpec,
    ) -> Result<BacktestResult, EngineError> {
        if candles.is_empty() {
            return Err(EngineError::DataUnavailable {
                symbol: run.symbol.clone(),
                interval: run.interval.clone(),
            });
        }

        info!(
            "Backtest start: {} on {} {} ({} - {})",
            run.strategy_id, run.symbol, run.interval, run.start, run.end
        );

        let mut state = RunState::new(self.initial_capital);

        for i in 0..candles.len() {
            let history = &candles[..=i];
            let bar = &candles[i];
            let account = state.account_info();

            let (signal, details) =
                strategy.generate_signal(history, state.position.as_ref(), &account);

            if signal != Signal::Hold {
                state.signals.push(SignalRecord {
                    timestamp: bar.timestamp,
                    signal,
                    price: bar.close,
                    details,
                });
                self.execute_signal(&mut state, signal, history, bar);
            }

            let unrealized = state
                .position
                .as_ref()
                .map(|p| p.unrealized_pnl(bar.close))
                .unwrap_or(0.0);
            state.equity.push(EquityPoint {
                timestamp: bar.timestamp,
                balance: state.balance,
                equity: state.balance + unrealized,
                price: bar.close,
            });
        }

        if let Some(position) = state.position.take() {
            let final_bar = &candles[candles.len() - 1];
            self.close_position(&mut state, position, final_bar.close, final_bar);
        }

        // the contract pins final_balance to the last equity point, which is
        // sampled before the forced close
        let final_balance = state
            .equity
            .last()
            .map(|p| p.balance)
            .unwrap_or(self.initial_capital);

        let summary = PerformanceCalculator::calculate_summary(
            run,
            self.initial_capital,
            final_balance,
            &state.trades,
            &state.equity,
        );

        let buy_hold = BenchmarkComparator::buy_and_hold(
            candles,
            self.initial_capital,
            self.commission.taker_fee,
        )
        .ok_or_else(|| EngineError::DataUnavailable {
            symbol: run.symbol.clone(),
            interval: run.interval.clone(),
        })?;

        let equity_curve = EquityCurveData {
            timestamps: state
                .equity
                .iter()
                .map(|p| format_timestamp(p.timestamp))
                .collect(),
            balance: state.equity.iter().map(|p| p.balance).collect(),
            equity: state.equity.iter().map(|p| p.equity).collect(),
        };

        Ok(BacktestResult {
            summary,
            equity_curve,
            trades: state.trades,
            signals: state.signals,
            buy_hold_comparison: buy_hold,
        })
    }

    fn execute_signal(
        &self,
        state: &mut RunState,
        signal: Signal,
        history: &[Candle],
        bar: &Candle,
    ) {
        if signal.is_entry() {
            if state.position.is_some() {
                warn!(
                    "{} signal at {} with a position already open; replacing it",
                    signal.as_str(),
                    bar.timestamp
                );
                if let Some(position) = state.position.take() {
                    self.close_position(state, position, bar.close, bar);
                }
            }
            self.open_position(state, signal, history, bar);
        } else if signal.is_exit() {
            if let Some(position) = state.position.take() {
                self.close_position(state, position, bar.close, bar);
            }
        }
    }

    fn open_position(&self, state: &mut RunState, signal: Signal, history: &[Candle], bar: &Candle) {
        let price = bar.close;
        let atr = atr_at(history, history.len() - 1, DEFAULT_ATR_PERIOD);
        let stop_loss = self.risk.stop_loss(signal, price, atr);
        let size = self.risk.position_size(signal, state.balance, price, stop_loss);
        if size <= 0.0 {
            return;
        }

        let entry_price = self.apply_slippage(price, signal);
        let value = size * entry_price;
        let commission = self.calculate_commission(value, true);
        let balance_before = state.balance;
        state.balance -= commission;

        state.trades.push(TradeRecord {
            timestamp: bar.timestamp,
            trade_type: TradeType::Entry,
            side: if signal == Signal::Buy {
                OrderSide::Buy
            } else {
                OrderSide::Sell
            },
            price: entry_price,
            size,
            value,
            commission,
            balance_before,
            balance_after: state.balance,
            pnl: None,
        });

        let take_profit = self.risk.take_profit(signal, entry_price, stop_loss);
        state.position = Some(Position {
            side: if signal == Signal::Buy {
                PositionSide::Long
            } else {
                PositionSide::Short
            },
            entry_price,
            size,
            entry_time: bar.timestamp,
            stop_loss,
            take_profit,
        });
    }

    fn close_position(&self, state: &mut RunState, position: Position, price: f64, bar: &Candle) {
        let exit_signal = match position.side {
            PositionSide::Long => Signal::Sell,
            PositionSide::Short => Signal::Buy,
        };
        let exit_price = self.apply_slippage(price, exit_signal);
        let pnl = position.unrealized_pnl(exit_price);
        let value = position.size * exit_price;
        let commission = self.calculate_commission(value, false);

        let balance_before = state.balance;
        state.balance += pnl - commission;

        state.trades.push(TradeRecord {
            timestamp: bar.timestamp,
            trade_type: TradeType::Exit,
            side: match position.side {
                PositionSide::Long => OrderSide::Sell,
                PositionSide::Short => OrderSide::Buy,
            },
            price: exit_price,
            size: position.size,
            value,
            commission,
            balance_before,
            balance_after: state.balance,
            pnl: Some(pnl),
        });
    }

    /// Slippage always moves the fill against the trader: buys (including
    /// short covers) pay up, sells receive less.
    fn apply_slippage(&self, price: f64, signal: Signal) -> f64 {
        if !self.slippage.enabled {
            return price;
        }

        let pays_up = matches!(signal, Signal::Buy | Signal::CloseShort);
        match self.slippage.mode {
            SlippageMode::Percentage => {
                if pays_up {
                    price * (1.0 + self.slippage.percentage)
                } else {
                    price * (1.0 - self.slippage.percentage)
                }
            }
            SlippageMode::Fixed => {
                if pays_up {
                    price + self.slippage.amount
                } else {
                    price - self.slippage.amount
                }
            }
        }
    }

    fn calculate_commission(&self, value: f64, is_maker: bool) -> f64 {
        match self.commission.mode {
            CommissionMode::Percentage => {
                let rate = if is_maker {
                    self.commission.maker_fee
                } else {
                    self.commission.taker_fee
                };
                value * rate
            }
            CommissionMode::Fixed => self.commission.fixed_fee,
        }
    }
}

use crate::models::{
    BacktestSummary, EquityPoint, RunSpec, TradeRecord, TradeType, DATE_FORMAT,
};
use statrs::statistics::Statistics;

/// Trading periods per year used for annualization. Kept constant regardless
/// of the candle interval so results stay comparable across runs.
const ANNUALIZATION_PERIODS: f64 = 252.0;

struct DrawdownInfo {
    max_drawdown: f64,
    max_drawdown_percent: f64,
}

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    /// Reduce a finished run into its summary statistics. Only exit records
    /// carry P&L; a zero-P&L exit counts toward the trade total but is
    /// neither a win nor a loss.
    pub fn calculate_summary(
        run: &RunSpec,
        initial_capital: f64,
        final_balance: f64,
        trades: &[TradeRecord],
        equity: &[EquityPoint],
    ) -> BacktestSummary {
        let mut summary = BacktestSummary {
            strategy_id: run.strategy_id.clone(),
            symbol: run.symbol.clone(),
            interval: run.interval.clone(),
            start_date: run.start.format(DATE_FORMAT).to_string(),
            end_date: run.end.format(DATE_FORMAT).to_string(),
            initial_capital,
            final_balance: initial_capital,
            total_return: 0.0,
            total_return_pct: 0.0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            profit_factor: 0.0,
            max_drawdown: 0.0,
            max_drawdown_pct: 0.0,
            sharpe_ratio: 0.0,
            average_win: 0.0,
            average_loss: 0.0,
            largest_win: 0.0,
            largest_loss: 0.0,
            total_fees: 0.0,
        };

        if trades.is_empty() {
            return summary;
        }

        let exit_pnls: Vec<f64> = trades
            .iter()
            .filter(|t| t.trade_type == TradeType::Exit)
            .filter_map(|t| t.pnl)
            .collect();
        let winning: Vec<f64> = exit_pnls.iter().copied().filter(|&p| p > 0.0).collect();
        let losing: Vec<f64> = exit_pnls.iter().copied().filter(|&p| p < 0.0).collect();

        let total_trades = exit_pnls.len() as i32;
        let win_rate = if total_trades > 0 {
            winning.len() as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };

        let gross_profit: f64 = winning.iter().sum();
        let gross_loss: f64 = losing.iter().sum::<f64>().abs();
        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else {
            0.0
        };

        let drawdown_info = Self::calculate_max_drawdown(equity);

        summary.final_balance = final_balance;
        summary.total_return = final_balance - initial_capital;
        summary.total_return_pct = if initial_capital > 0.0 {
            (final_balance - initial_capital) / initial_capital * 100.0
        } else {
            0.0
        };
        summary.total_trades = total_trades;
        summary.winning_trades = winning.len() as i32;
        summary.losing_trades = losing.len() as i32;
        summary.win_rate = win_rate;
        summary.profit_factor = profit_factor;
        summary.max_drawdown = drawdown_info.max_drawdown;
        summary.max_drawdown_pct = drawdown_info.max_drawdown_percent;
        summary.sharpe_ratio = Self::calculate_sharpe_ratio(equity);
        summary.average_win = Self::average(&winning);
        summary.average_loss = Self::average(&losing);
        summary.largest_win = winning.iter().copied().fold(0.0, f64::max);
        summary.largest_loss = losing.iter().copied().fold(0.0, f64::min);
        summary.total_fees = trades.iter().map(|t| t.commission).sum();

        summary
    }

    fn average(values: &[f64]) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for value in values.iter().copied() {
            if value.is_finite() {
                sum += value;
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    pub fn calculate_sharpe_ratio(equity: &[EquityPoint]) -> f64 {
        if equity.len() < 2 {
            return 0.0;
        }

        let returns: Vec<f64> = equity
            .windows(2)
            .map(|window| {
                let prev = window[0].equity;
                let curr = window[1].equity;
                if prev > 0.0 {
                    (curr - prev) / prev
                } else {
                    0.0
                }
            })
            .collect();

        if returns.len() < 2 {
            return 0.0;
        }

        let mean_return = returns.clone().mean();
        let std_dev = returns.std_dev();
        if std_dev == 0.0 || !std_dev.is_finite() {
            return 0.0;
        }

        mean_return / std_dev * ANNUALIZATION_PERIODS.sqrt()
    }

    fn calculate_max_drawdown(equity: &[EquityPoint]) -> DrawdownInfo {
        if equity.is_empty() {
            return DrawdownInfo {
                max_drawdown: 0.0,
                max_drawdown_percent: 0.0,
            };
        }

        // drawdown is equity minus the running peak, so max_drawdown is the
        // most negative excursion; the percent form is reported as |min|
        let mut min_drawdown = 0.0;
        let mut min_drawdown_percent = 0.0;
        let mut peak_value = equity[0].equity;

        for point in equity {
            if point.equity > peak_value {
                peak_value = point.equity;
            }
            let drawdown = point.equity - peak_value;
            let drawdown_percent = if peak_value > 0.0 {
                drawdown / peak_value * 100.0
            } else {
                0.0
            };
            if drawdown < min_drawdown {
                min_drawdown = drawdown;
            }
            if drawdown_percent < min_drawdown_percent {
                min_drawdown_percent = drawdown_percent;
            }
        }

        DrawdownInfo {
            max_drawdown: min_drawdown,
            max_drawdown_percent: min_drawdown_percent.abs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderSide;
    use chrono::{Duration, TimeZone, Utc};

    fn run() -> RunSpec {
        RunSpec {
            strategy_id: "ma_cross".to_string(),
            symbol: "BTC_JPY".to_string(),
            interval: "1hour".to_string(),
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        }
    }

    fn equity_from_values(values: &[f64]) -> Vec<EquityPoint> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                timestamp: start + Duration::hours(i as i64),
                balance: equity,
                equity,
                price: 100.0,
            })
            .collect()
    }

    fn exit_trade(pnl: f64, commission: f64) -> TradeRecord {
        TradeRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            trade_type: TradeType::Exit,
            side: OrderSide::Sell,
            price: 100.0,
            size: 1.0,
            value: 100.0,
            commission,
            balance_before: 1_000.0,
            balance_after: 1_000.0 + pnl - commission,
            pnl: Some(pnl),
        }
    }

    #[test]
    fn zero_trade_run_yields_an_all_zero_summary() {
        let summary = PerformanceCalculator::calculate_summary(
            &run(),
            1_000_000.0,
            1_000_000.0,
            &[],
            &equity_from_values(&[1_000_000.0, 1_000_000.0]),
        );
        assert_eq!(summary.final_balance, 1_000_000.0);
        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.total_return, 0.0);
        assert_eq!(summary.sharpe_ratio, 0.0);
        assert_eq!(summary.start_date, "2024-01-01");
    }

    #[test]
    fn breakeven_exits_count_in_total_but_not_win_or_loss() {
        let trades = vec![exit_trade(10.0, 0.1), exit_trade(0.0, 0.1), exit_trade(-5.0, 0.1)];
        let summary = PerformanceCalculator::calculate_summary(
            &run(),
            1_000.0,
            1_005.0,
            &trades,
            &equity_from_values(&[1_000.0, 1_005.0]),
        );
        assert_eq!(summary.total_trades, 3);
        assert_eq!(summary.winning_trades, 1);
        assert_eq!(summary.losing_trades, 1);
        assert!((summary.win_rate - 100.0 / 3.0).abs() < 1e-9);
        assert!((summary.profit_factor - 2.0).abs() < 1e-9);
        assert!((summary.total_fees - 0.3).abs() < 1e-12);
    }

    #[test]
    fn profit_factor_is_zero_without_losses() {
        let trades = vec![exit_trade(10.0, 0.0)];
        let summary = PerformanceCalculator::calculate_summary(
            &run(),
            1_000.0,
            1_010.0,
            &trades,
            &equity_from_values(&[1_000.0, 1_010.0]),
        );
        assert_eq!(summary.profit_factor, 0.0);
        assert_eq!(summary.average_loss, 0.0);
        assert_eq!(summary.largest_loss, 0.0);
    }

    #[test]
    fn drawdown_follows_the_running_peak() {
        let trades = vec![exit_trade(10.0, 0.0)];
        let summary = PerformanceCalculator::calculate_summary(
            &run(),
            100.0,
            110.0,
            &trades,
            &equity_from_values(&[100.0, 120.0, 90.0, 110.0]),
        );
        assert!((summary.max_drawdown_pct - 25.0).abs() < 1e-9);
        assert!((summary.max_drawdown - (-30.0)).abs() < 1e-9);
    }

    #[test]
    fn sharpe_is_zero_for_a_flat_equity_curve() {
        assert_eq!(
            PerformanceCalculator::calculate_sharpe_ratio(&equity_from_values(&[100.0, 100.0, 100.0])),
            0.0
        );
        assert_eq!(
            PerformanceCalculator::calculate_sharpe_ratio(&equity_from_values(&[100.0])),
            0.0
        );
    }
}

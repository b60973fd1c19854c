use crate::models::{
    BacktestSummary, BenchmarkComparison, BenchmarkComparisonSide, BuyHoldResult, Candle,
    RiskMetrics, StrategyComparisonSide,
};
use statrs::statistics::Statistics;

const ANNUALIZATION_PERIODS: f64 = 252.0;

pub struct BenchmarkComparator;

impl BenchmarkComparator {
    /// Buy-and-hold reference over the same candle window: convert the full
    /// capital at the first close, sell at the last close, commission charged
    /// on both legs at the given (taker) rate. Depends only on prices, so it
    /// is identical no matter what the strategy under test did.
    pub fn buy_and_hold(
        candles: &[Candle],
        initial_capital: f64,
        commission_rate: f64,
    ) -> Option<BuyHoldResult> {
        if candles.is_empty() {
            return None;
        }

        let start_price = candles[0].close;
        let end_price = candles[candles.len() - 1].close;

        let btc_amount = (initial_capital * (1.0 - commission_rate)) / start_price;
        let final_value = btc_amount * end_price * (1.0 - commission_rate);

        let total_return = final_value - initial_capital;
        let total_return_pct = total_return / initial_capital * 100.0;

        // drawdown on the raw price series, tracking the longest stretch of
        // bars spent below the running peak
        let mut peak_price = candles[0].close;
        let mut max_dd = 0.0f64;
        let mut max_dd_duration = 0i64;
        let mut current_dd_duration = 0i64;
        for candle in candles {
            if candle.close > peak_price {
                peak_price = candle.close;
                current_dd_duration = 0;
            } else {
                let dd = (peak_price - candle.close) / peak_price;
                max_dd = max_dd.max(dd);
                current_dd_duration += 1;
                max_dd_duration = max_dd_duration.max(current_dd_duration);
            }
        }

        let returns = close_returns(candles);
        let sharpe_ratio = annualized_ratio(&returns, returns.clone().std_dev());

        Some(BuyHoldResult {
            initial_capital,
            final_value,
            total_return,
            total_return_pct,
            max_drawdown_pct: max_dd * 100.0,
            max_drawdown_duration_hours: max_dd_duration,
            sharpe_ratio,
            btc_amount,
            start_price,
            end_price,
        })
    }

    /// Outperformance requires beating buy-and-hold on both return and
    /// Sharpe; a higher return bought with far more risk does not count.
    pub fn compare(summary: &BacktestSummary, buy_hold: &BuyHoldResult) -> BenchmarkComparison {
        let return_diff = summary.total_return_pct - buy_hold.total_return_pct;
        let sharpe_diff = summary.sharpe_ratio - buy_hold.sharpe_ratio;
        let dd_diff = summary.max_drawdown_pct - buy_hold.max_drawdown_pct;

        BenchmarkComparison {
            strategy_beats_buy_hold: return_diff > 0.0 && sharpe_diff > 0.0,
            return_difference_pct: return_diff,
            sharpe_ratio_difference: sharpe_diff,
            drawdown_difference_pct: dd_diff,
            strategy: StrategyComparisonSide {
                total_return_pct: summary.total_return_pct,
                sharpe_ratio: summary.sharpe_ratio,
                max_drawdown_pct: summary.max_drawdown_pct,
                total_trades: summary.total_trades,
                win_rate: summary.win_rate,
            },
            buy_and_hold: BenchmarkComparisonSide {
                total_return_pct: buy_hold.total_return_pct,
                sharpe_ratio: buy_hold.sharpe_ratio,
                max_drawdown_pct: buy_hold.max_drawdown_pct,
            },
        }
    }

    pub fn risk_metrics(equity_values: &[f64]) -> Option<RiskMetrics> {
        if equity_values.is_empty() {
            return None;
        }

        let values = equity_values;
        let returns = pct_changes(values);

        let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
        let downside_std = if downside.is_empty() {
            0.0
        } else {
            downside.std_dev()
        };
        let sortino_ratio = annualized_ratio(&returns, downside_std);

        let max_dd = max_drawdown_ratio(values);
        let annual_return =
            (values[values.len() - 1] / values[0]).powf(365.0 / values.len() as f64) - 1.0;
        let calmar_ratio = if max_dd != 0.0 {
            annual_return / max_dd.abs()
        } else {
            0.0
        };

        let (max_drawdown_period, current_drawdown_period) = drawdown_periods(values);

        let value_at_risk_95 = if returns.is_empty() {
            0.0
        } else {
            percentile(&returns, 0.05)
        };

        Some(RiskMetrics {
            sortino_ratio,
            calmar_ratio,
            max_consecutive_losses: max_consecutive_losses(&returns),
            max_drawdown_period,
            current_drawdown_period,
            value_at_risk_95,
        })
    }
}

fn close_returns(candles: &[Candle]) -> Vec<f64> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    pct_changes(&closes)
}

fn pct_changes(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn annualized_ratio(returns: &[f64], std_dev: f64) -> f64 {
    if returns.is_empty() || !std_dev.is_finite() || std_dev <= 0.0 {
        return 0.0;
    }
    ANNUALIZATION_PERIODS.sqrt() * returns.to_vec().mean() / std_dev
}

/// Most negative peak-to-trough ratio, as a signed fraction (<= 0).
fn max_drawdown_ratio(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut min_dd = 0.0f64;
    for &value in values {
        peak = peak.max(value);
        if peak > 0.0 {
            min_dd = min_dd.min((value - peak) / peak);
        }
    }
    min_dd
}

fn drawdown_periods(values: &[f64]) -> (i32, i32) {
    let mut peak = f64::NEG_INFINITY;
    let mut max_period = 0i32;
    let mut current_period = 0i32;
    for &value in values {
        peak = peak.max(value);
        if value < peak {
            current_period += 1;
            max_period = max_period.max(current_period);
        } else {
            current_period = 0;
        }
    }
    (max_period, current_period)
}

fn max_consecutive_losses(returns: &[f64]) -> i32 {
    let mut max_losses = 0i32;
    let mut current_losses = 0i32;
    for &ret in returns {
        if ret < 0.0 {
            current_losses += 1;
            max_losses = max_losses.max(current_losses);
        } else {
            current_losses = 0;
        }
    }
    max_losses
}

/// Quantile with linear interpolation between the two nearest ranks.
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (sorted.len() - 1) as f64 * q;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn summary_with(total_return_pct: f64, sharpe_ratio: f64) -> BacktestSummary {
        BacktestSummary {
            strategy_id: "ma_cross".to_string(),
            symbol: "BTC_JPY".to_string(),
            interval: "1hour".to_string(),
            start_date: "2024-01-01".to_string(),
            end_date: "2024-02-01".to_string(),
            initial_capital: 1_000_000.0,
            final_balance: 1_000_000.0,
            total_return: 0.0,
            total_return_pct,
            total_trades: 3,
            winning_trades: 2,
            losing_trades: 1,
            win_rate: 66.7,
            profit_factor: 2.0,
            max_drawdown: 0.0,
            max_drawdown_pct: 5.0,
            sharpe_ratio,
            average_win: 0.0,
            average_loss: 0.0,
            largest_win: 0.0,
            largest_loss: 0.0,
            total_fees: 0.0,
        }
    }

    #[test]
    fn commission_is_charged_on_both_legs() {
        let candles = candles_from_closes(&[100.0, 100.0, 100.0]);
        let result = BenchmarkComparator::buy_and_hold(&candles, 1_000_000.0, 0.0009).unwrap();

        let expected_btc = 1_000_000.0 * (1.0 - 0.0009) / 100.0;
        assert!((result.btc_amount - expected_btc).abs() < 1e-9);
        let expected_final = expected_btc * 100.0 * (1.0 - 0.0009);
        assert!((result.final_value - expected_final).abs() < 1e-6);
        // a flat market still loses the two commissions
        assert!(result.total_return < 0.0);
    }

    #[test]
    fn drawdown_duration_counts_bars_below_the_peak() {
        let candles = candles_from_closes(&[100.0, 120.0, 90.0, 95.0, 110.0, 130.0]);
        let result = BenchmarkComparator::buy_and_hold(&candles, 1_000_000.0, 0.0).unwrap();

        assert!((result.max_drawdown_pct - 25.0).abs() < 1e-9);
        // bars 90, 95, 110 sit below the 120 peak
        assert_eq!(result.max_drawdown_duration_hours, 3);
    }

    #[test]
    fn empty_window_has_no_benchmark() {
        assert!(BenchmarkComparator::buy_and_hold(&[], 1_000_000.0, 0.0009).is_none());
    }

    #[test]
    fn outperformance_requires_both_deltas_positive() {
        let buy_hold = BuyHoldResult {
            initial_capital: 1_000_000.0,
            final_value: 1_050_000.0,
            total_return: 50_000.0,
            total_return_pct: 5.0,
            max_drawdown_pct: 10.0,
            max_drawdown_duration_hours: 4,
            sharpe_ratio: 1.0,
            btc_amount: 0.2,
            start_price: 5_000_000.0,
            end_price: 5_250_000.0,
        };

        let comparison = BenchmarkComparator::compare(&summary_with(8.0, 1.5), &buy_hold);
        assert!(comparison.strategy_beats_buy_hold);

        // higher return but worse Sharpe does not outperform
        let comparison = BenchmarkComparator::compare(&summary_with(8.0, 0.5), &buy_hold);
        assert!(!comparison.strategy_beats_buy_hold);
        assert!(comparison.return_difference_pct > 0.0);
        assert!(comparison.sharpe_ratio_difference < 0.0);

        let comparison = BenchmarkComparator::compare(&summary_with(3.0, 1.5), &buy_hold);
        assert!(!comparison.strategy_beats_buy_hold);
    }

    #[test]
    fn var_uses_linear_interpolation() {
        // ten returns, 5th percentile interpolates between the two smallest
        let returns = [-0.05, -0.04, -0.03, -0.02, -0.01, 0.01, 0.02, 0.03, 0.04, 0.05];
        let value = percentile(&returns, 0.05);
        assert!((value - (-0.0455)).abs() < 1e-9);
    }

    #[test]
    fn risk_metrics_track_consecutive_losing_bars() {
        let metrics =
            BenchmarkComparator::risk_metrics(&[100.0, 99.0, 98.0, 97.0, 101.0]).unwrap();
        assert_eq!(metrics.max_consecutive_losses, 3);
        assert_eq!(metrics.max_drawdown_period, 3);
        assert_eq!(metrics.current_drawdown_period, 0);
        assert!(metrics.value_at_risk_95 < 0.0);
    }

    #[test]
    fn sortino_is_zero_without_downside_bars() {
        let metrics =
            BenchmarkComparator::risk_metrics(&[100.0, 101.0, 102.0, 103.0]).unwrap();
        assert_eq!(metrics.sortino_ratio, 0.0);
        // no drawdown means the Calmar denominator is empty
        assert_eq!(metrics.calmar_ratio, 0.0);
    }
}

use crate::models::Candle;

/// Simple moving average with NaN warm-up for the first `period - 1` slots,
/// so cross comparisons against unwarmed values are always false.
pub fn calculate_sma(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }
    if period <= 1 {
        return prices.to_vec();
    }
    if prices.len() < period {
        return vec![f64::NAN; prices.len()];
    }

    let mut sma_values = vec![f64::NAN; period - 1];
    let mut window_sum: f64 = prices[..period].iter().sum();
    sma_values.push(window_sum / period as f64);
    for i in period..prices.len() {
        window_sum += prices[i] - prices[i - period];
        sma_values.push(window_sum / period as f64);
    }

    sma_values
}

pub fn calculate_ema(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema_values = Vec::with_capacity(prices.len());
    ema_values.push(prices[0]);

    for i in 1..prices.len() {
        let ema = (prices[i] * multiplier) + (ema_values[i - 1] * (1.0 - multiplier));
        ema_values.push(ema);
    }

    ema_values
}

pub fn calculate_macd(
    prices: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let fast_ema = calculate_ema(prices, fast_period);
    let slow_ema = calculate_ema(prices, slow_period);

    let mut macd_line = Vec::with_capacity(prices.len());
    for i in 0..prices.len() {
        macd_line.push(fast_ema[i] - slow_ema[i]);
    }

    let signal_line = calculate_ema(&macd_line, signal_period);

    let mut histogram = Vec::with_capacity(macd_line.len());
    for i in 0..macd_line.len() {
        histogram.push(macd_line[i] - signal_line[i]);
    }

    (macd_line, signal_line, histogram)
}

fn rsi_from_avgs(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

/// RSI with Wilder smoothing; unwarmed slots hold the neutral 50.0.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }
    if period == 0 || prices.len() < period + 1 {
        return vec![50.0; prices.len()];
    }

    let mut rsi_values = vec![50.0; prices.len()];
    let mut sum_gain = 0.0f64;
    let mut sum_loss = 0.0f64;
    for i in 1..=period {
        let delta = prices[i] - prices[i - 1];
        if delta >= 0.0 {
            sum_gain += delta;
        } else {
            sum_loss += -delta;
        }
    }

    let mut avg_gain = sum_gain / period as f64;
    let mut avg_loss = sum_loss / period as f64;
    rsi_values[period] = rsi_from_avgs(avg_gain, avg_loss);

    for i in (period + 1)..prices.len() {
        let delta = prices[i] - prices[i - 1];
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { -delta } else { 0.0 };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        rsi_values[i] = rsi_from_avgs(avg_gain, avg_loss);
    }

    rsi_values
}

/// Wilder ATR aligned to candle indices, NaN until index == period.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Vec<f64> {
    let n = candles.len();
    let mut atr = vec![f64::NAN; n];
    if n == 0 || period == 0 {
        return atr;
    }

    let mut tr_sum = 0.0f64;
    let mut prev_close = candles[0].close;
    for i in 1..n {
        let c = &candles[i];
        let high_low = c.high - c.low;
        let high_prev = (c.high - prev_close).abs();
        let low_prev = (c.low - prev_close).abs();
        let tr = high_low.max(high_prev).max(low_prev);

        if i <= period {
            tr_sum += tr;
            if i == period {
                atr[i] = tr_sum / period as f64;
            }
        } else {
            let prev_atr = atr[i - 1];
            atr[i] = ((prev_atr * (period as f64 - 1.0)) + tr) / period as f64;
        }
        prev_close = c.close;
    }

    atr
}

/// ATR of the bar at `index`, None while the series is still warming up.
pub fn atr_at(candles: &[Candle], index: usize, period: usize) -> Option<f64> {
    if index >= candles.len() {
        return None;
    }
    let value = calculate_atr(candles, period)[index];
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
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
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn sma_warms_up_with_nan_then_rolls() {
        let prices = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sma = calculate_sma(&prices, 3);
        assert!(sma[0].is_nan());
        assert!(sma[1].is_nan());
        assert_eq!(sma[2], 2.0);
        assert_eq!(sma[3], 3.0);
        assert_eq!(sma[4], 4.0);
    }

    #[test]
    fn rsi_is_100_on_monotonic_rise() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let rsi = calculate_rsi(&prices, 14);
        assert_eq!(rsi[0], 50.0);
        assert_eq!(rsi[19], 100.0);
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let (line, signal, histogram) = calculate_macd(&prices, 12, 26, 9);
        assert_eq!(line.len(), prices.len());
        for i in 0..prices.len() {
            assert!((histogram[i] - (line[i] - signal[i])).abs() < 1e-12);
        }
    }

    #[test]
    fn atr_at_is_none_until_warm() {
        let candles = candles_from_closes(&[100.0; 20]);
        assert!(atr_at(&candles, 5, 14).is_none());
        // constant closes with 2-point ranges give a 2.0 true range everywhere
        assert_eq!(atr_at(&candles, 14, 14), Some(2.0));
        assert!(atr_at(&candles, 25, 14).is_none());
    }
}

//! Technical indicator calculations over close-price series
//!
//! All functions take a chronologically ascending slice and return a vector
//! of the same length. Positions where a window has not warmed up yet are
//! padded with 0.0; the standardizer decides which positions become `None`
//! on the canonical row.
//!
//! Two RSI variants are deliberately provided:
//! - [`rsi_smoothed`]: exponential weighting with `com = N-1` (windows
//!   6/12/24), the mainland-China charting convention
//! - [`rsi_simple`]: simple rolling mean of gains/losses (RSI14), the
//!   conventional western formula
//!
//! They are numerically different on identical input and both are emitted.

/// Calculate Simple Moving Average for a given period
///
/// # Returns
/// * Vector of SMA values (positions before the window fills are 0.0)
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];

    if period == 0 || values.len() < period {
        return out;
    }

    for i in (period - 1)..values.len() {
        let start = i + 1 - period;
        let sum: f64 = values[start..=i].iter().sum();
        out[i] = sum / period as f64;
    }

    out
}

/// Exponential moving average with span-style smoothing (alpha = 2/(span+1)),
/// seeded from the first value.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];

    if values.is_empty() || span == 0 {
        return out;
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    out[0] = values[0];
    for i in 1..values.len() {
        out[i] = alpha * values[i] + (1.0 - alpha) * out[i - 1];
    }

    out
}

/// Exponentially weighted mean with center-of-mass smoothing and
/// adjust-style normalization: each output is a weighted mean of the full
/// history with weights (1-alpha)^k, alpha = 1/(1+com).
pub fn ewm_mean(values: &[f64], com: f64) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];

    if values.is_empty() {
        return out;
    }

    let alpha = 1.0 / (1.0 + com);
    let decay = 1.0 - alpha;
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for (i, &value) in values.iter().enumerate() {
        numerator = value + decay * numerator;
        denominator = 1.0 + decay * denominator;
        out[i] = numerator / denominator;
    }

    out
}

/// MACD: EMA(12) - EMA(26) as DIF, 9-period EMA of DIF as DEA, and
/// DIF - DEA as the histogram.
///
/// # Returns
/// * `(dif, dea, histogram)` vectors, each the length of the input
pub fn macd(closes: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let ema12 = ema(closes, 12);
    let ema26 = ema(closes, 26);

    let dif: Vec<f64> = ema12
        .iter()
        .zip(ema26.iter())
        .map(|(fast, slow)| fast - slow)
        .collect();
    let dea = ema(&dif, 9);
    let hist: Vec<f64> = dif.iter().zip(dea.iter()).map(|(d, s)| d - s).collect();

    (dif, dea, hist)
}

/// Exponentially-smoothed RSI with `com = period - 1`
///
/// Gains and losses are smoothed with [`ewm_mean`]; the value at index 0 has
/// no price change to work from and stays 0.0.
pub fn rsi_smoothed(closes: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![0.0; closes.len()];

    if closes.len() < 2 || period == 0 {
        return out;
    }

    let mut gains = Vec::with_capacity(closes.len() - 1);
    let mut losses = Vec::with_capacity(closes.len() - 1);
    for i in 1..closes.len() {
        let delta = closes[i] - closes[i - 1];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    let com = period as f64 - 1.0;
    let avg_gain = ewm_mean(&gains, com);
    let avg_loss = ewm_mean(&losses, com);

    for i in 0..gains.len() {
        let total = avg_gain[i] + avg_loss[i];
        out[i + 1] = if total == 0.0 {
            50.0
        } else {
            100.0 * avg_gain[i] / total
        };
    }

    out
}

/// Conventional RSI using a simple rolling mean of gains and losses
///
/// Defined once `period` price changes exist, i.e. from index `period`.
pub fn rsi_simple(closes: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![0.0; closes.len()];

    if period == 0 || closes.len() <= period {
        return out;
    }

    let mut gains = Vec::with_capacity(closes.len() - 1);
    let mut losses = Vec::with_capacity(closes.len() - 1);
    for i in 1..closes.len() {
        let delta = closes[i] - closes[i - 1];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    for i in period..closes.len() {
        // Window over the last `period` changes, ending at change i-1
        let start = i - period;
        let avg_gain: f64 = gains[start..i].iter().sum::<f64>() / period as f64;
        let avg_loss: f64 = losses[start..i].iter().sum::<f64>() / period as f64;

        out[i] = if avg_loss == 0.0 {
            if avg_gain == 0.0 {
                50.0
            } else {
                100.0
            }
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };
    }

    out
}

/// Bollinger Bands: 20-period SMA +/- `width` sample standard deviations
///
/// # Returns
/// * `(upper, middle, lower)` vectors, 0.0 before the window fills
pub fn bollinger(closes: &[f64], period: usize, width: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let middle = sma(closes, period);
    let mut upper = vec![0.0; closes.len()];
    let mut lower = vec![0.0; closes.len()];

    if period < 2 || closes.len() < period {
        return (upper, middle, lower);
    }

    for i in (period - 1)..closes.len() {
        let start = i + 1 - period;
        let window = &closes[start..=i];
        let mean = middle[i];
        let variance: f64 =
            window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (period as f64 - 1.0);
        let std_dev = variance.sqrt();
        upper[i] = mean + width * std_dev;
        lower[i] = mean - width * std_dev;
    }

    (upper, middle, lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let closes = vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0];
        let ma3 = sma(&closes, 3);

        assert_eq!(ma3[0], 0.0); // Not enough data
        assert_eq!(ma3[1], 0.0); // Not enough data
        assert_eq!(ma3[2], 11.0); // (10+11+12)/3
        assert_eq!(ma3[3], 12.0); // (11+12+13)/3
        assert_eq!(ma3[5], 14.0); // (13+14+15)/3
    }

    #[test]
    fn test_ewm_mean_adjusted_weights() {
        // com = 1 -> alpha = 0.5
        let out = ewm_mean(&[1.0, 2.0], 1.0);
        assert!((out[0] - 1.0).abs() < 1e-12);
        // (2 + 0.5 * 1) / (1 + 0.5) = 5/3
        assert!((out[1] - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_ema_seeded_from_first_value() {
        let out = ema(&[10.0, 10.0, 10.0], 12);
        assert_eq!(out, vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_macd_flat_series_is_zero() {
        let closes = vec![50.0; 40];
        let (dif, dea, hist) = macd(&closes);
        assert!(dif.iter().all(|v| v.abs() < 1e-12));
        assert!(dea.iter().all(|v| v.abs() < 1e-12));
        assert!(hist.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_rsi_simple_alternating_series() {
        // +1/-1 alternating: equal average gain and loss over any 2-change
        // window, so RSI = 50
        let closes = vec![10.0, 11.0, 10.0, 11.0, 10.0];
        let out = rsi_simple(&closes, 2);
        assert!((out[2] - 50.0).abs() < 1e-9);
        assert!((out[4] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_simple_all_gains_is_100() {
        let closes = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let out = rsi_simple(&closes, 3);
        assert_eq!(out[3], 100.0);
        assert_eq!(out[4], 100.0);
    }

    #[test]
    fn test_rsi_variants_differ_on_same_input() {
        // Deterministic pseudo-trend with reversals; the exponential variant
        // weights recent changes more than the rolling mean does
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1)
            .collect();

        let smoothed = rsi_smoothed(&closes, 14);
        let simple = rsi_simple(&closes, 14);

        let last = closes.len() - 1;
        assert!(smoothed[last] > 0.0 && smoothed[last] < 100.0);
        assert!(simple[last] > 0.0 && simple[last] < 100.0);
        assert!(
            (smoothed[last] - simple[last]).abs() > 1e-6,
            "expected distinct RSI variants, both were {}",
            smoothed[last]
        );
    }

    #[test]
    fn test_bollinger_constant_series_collapses() {
        let closes = vec![25.0; 30];
        let (upper, middle, lower) = bollinger(&closes, 20, 2.0);
        assert_eq!(middle[19], 25.0);
        assert_eq!(upper[19], 25.0);
        assert_eq!(lower[19], 25.0);
        assert_eq!(upper[5], 0.0); // before the window fills
    }

    #[test]
    fn test_bollinger_bands_bracket_mean() {
        let closes: Vec<f64> = (0..25).map(|i| 10.0 + (i % 5) as f64).collect();
        let (upper, middle, lower) = bollinger(&closes, 20, 2.0);
        let i = 24;
        assert!(upper[i] > middle[i]);
        assert!(lower[i] < middle[i]);
        // Symmetric around the middle band
        assert!(((upper[i] - middle[i]) - (middle[i] - lower[i])).abs() < 1e-9);
    }
}

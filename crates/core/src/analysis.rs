//! Pure indicator math over close-price series. All helpers return `None`
//! when the series is too short for the requested window.

/// Simple moving average of the trailing `period` values.
pub fn sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average over the whole series, seeded with the first
/// value.
pub fn ema(closes: &[f64], period: usize) -> Option<f64> {
    if closes.is_empty() || period == 0 {
        return None;
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut value = closes[0];
    for close in &closes[1..] {
        value = close * multiplier + value * (1.0 - multiplier);
    }
    Some(value)
}

/// Wilder-style RSI over the trailing `period` deltas (simple averages of
/// gains and losses). 100 when there are no losses in the window.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }
    let window = &closes[closes.len() - (period + 1)..];
    let mut gain = 0.0;
    let mut loss = 0.0;
    for pair in window.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            gain += delta;
        } else {
            loss -= delta;
        }
    }
    let avg_gain = gain / period as f64;
    let avg_loss = loss / period as f64;
    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// MACD line and its signal line (fast/slow/signal EMAs).
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<(f64, f64)> {
    if closes.len() < slow {
        return None;
    }

    // Signal line is the EMA of the MACD series, so build the series first.
    let mut macd_series = Vec::with_capacity(closes.len());
    for end in slow..=closes.len() {
        let prefix = &closes[..end];
        let f = ema(prefix, fast)?;
        let s = ema(prefix, slow)?;
        macd_series.push(f - s);
    }
    let line = *macd_series.last()?;
    let signal_line = ema(&macd_series, signal)?;
    Some((line, signal_line))
}

/// Raw dividend-yield fractions are reported as percentages downstream.
pub fn yield_to_percent(raw: Option<f64>) -> Option<f64> {
    raw.map(|y| y * 100.0)
}

/// Normalized distance to the 52-week high: `last / high`.
pub fn price_to_high_ratio(last: Option<f64>, high: Option<f64>) -> Option<f64> {
    match (last, high) {
        (Some(last), Some(high)) if high > 0.0 => Some(last / high),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn sma_averages_the_trailing_window() {
        let closes = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(sma(&closes, 2), Some(3.5));
        assert_eq!(sma(&closes, 4), Some(2.5));
        assert_eq!(sma(&closes, 5), None);
    }

    #[test]
    fn ema_converges_toward_recent_values() {
        let closes = rising(30);
        let ema12 = ema(&closes, 12).unwrap();
        let sma12 = sma(&closes, 12).unwrap();
        // On a rising series the EMA should sit above the equally-weighted mean.
        assert!(ema12 > sma12 - 6.0);
        assert!(ema12 <= *closes.last().unwrap());
    }

    #[test]
    fn rsi_is_100_on_an_all_gain_window() {
        let closes = rising(20);
        assert_eq!(rsi(&closes, 14), Some(100.0));
    }

    #[test]
    fn rsi_is_balanced_on_alternating_moves() {
        let mut closes = vec![100.0];
        for i in 0..20 {
            let last = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { last + 1.0 } else { last - 1.0 });
        }
        let value = rsi(&closes, 14).unwrap();
        assert!((value - 50.0).abs() < 10.0, "rsi={value}");
    }

    #[test]
    fn macd_is_positive_on_an_uptrend() {
        let closes = rising(60);
        let (line, signal) = macd(&closes, 12, 26, 9).unwrap();
        assert!(line > 0.0);
        assert!(signal > 0.0);
    }

    #[test]
    fn macd_needs_enough_history() {
        assert!(macd(&rising(10), 12, 26, 9).is_none());
    }

    #[test]
    fn ratio_helpers_handle_missing_inputs() {
        assert_eq!(yield_to_percent(Some(0.025)), Some(2.5));
        assert_eq!(yield_to_percent(None), None);
        assert_eq!(price_to_high_ratio(Some(90.0), Some(100.0)), Some(0.9));
        assert_eq!(price_to_high_ratio(Some(90.0), None), None);
        assert_eq!(price_to_high_ratio(Some(90.0), Some(0.0)), None);
    }
}

/// Exponential Moving Average seeded with the first price.
///
/// Multiplier `k = 2 / (period + 1)`. Unlike the SMA the series has a value
/// from the first bar on, so callers gate on history length themselves.
#[derive(Debug, Clone)]
pub struct EmaIndicator {
    pub period: usize,
}

impl EmaIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self { period }
    }

    pub fn multiplier(&self) -> f64 {
        2.0 / (self.period as f64 + 1.0)
    }

    /// Full EMA series for `closes` (oldest first).
    pub fn series(&self, closes: &[f64]) -> Vec<f64> {
        let k = self.multiplier();
        let mut out = Vec::with_capacity(closes.len());
        let mut prev: Option<f64> = None;
        for &price in closes {
            let value = match prev {
                None => price,
                Some(p) => price * k + p * (1.0 - k),
            };
            out.push(value);
            prev = Some(value);
        }
        out
    }

    pub fn latest(&self, closes: &[f64]) -> Option<f64> {
        self.series(closes).last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_starts_at_first_price() {
        let ema = EmaIndicator::new(3);
        let series = ema.series(&[10.0, 20.0]);
        assert_eq!(series[0], 10.0);
        // k = 0.5 → 20 * 0.5 + 10 * 0.5
        assert!((series[1] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn ema_of_constant_series_is_constant() {
        let ema = EmaIndicator::new(50);
        let series = ema.series(&[42.0; 120]);
        assert!(series.iter().all(|v| (v - 42.0).abs() < 1e-12));
    }

    #[test]
    fn ema_lags_a_rising_series() {
        let ema = EmaIndicator::new(5);
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let last = ema.latest(&prices).unwrap();
        assert!(last < 129.0 && last > 120.0, "unexpected EMA {last}");
    }

    #[test]
    fn empty_input_has_no_latest() {
        assert!(EmaIndicator::new(5).latest(&[]).is_none());
    }
}

/// Simple Moving Average over a trailing window.
///
/// The series is aligned with the input: the first `period - 1` entries are
/// `None` because the window is not yet full.
#[derive(Debug, Clone)]
pub struct SmaIndicator {
    pub period: usize,
}

impl SmaIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self { period }
    }

    /// Full SMA series for `closes` (oldest first).
    pub fn series(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let mut out = Vec::with_capacity(closes.len());
        let mut window_sum = 0.0;
        for (i, &price) in closes.iter().enumerate() {
            window_sum += price;
            if i >= self.period {
                window_sum -= closes[i - self.period];
            }
            if i + 1 >= self.period {
                out.push(Some(window_sum / self.period as f64));
            } else {
                out.push(None);
            }
        }
        out
    }

    /// SMA of the last `period` values, or `None` if there are fewer.
    pub fn latest(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.period {
            return None;
        }
        let window = &closes[closes.len() - self.period..];
        Some(window.iter().sum::<f64>() / self.period as f64)
    }
}

// Column statistics for outlier detection.

/// Threshold above which |z| marks a value as an outlier.
pub const Z_SCORE_THRESHOLD: f64 = 2.0;

/// Mean and population standard deviation of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub mean: f64,
    pub std_dev: f64,
}

impl Moments {
    /// `None` for an empty sample.
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Moments {
            mean,
            std_dev: variance.sqrt(),
        })
    }

    /// Whether z-scores against these moments carry any information.
    pub fn is_degenerate(&self) -> bool {
        self.std_dev == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.mean.is_finite() && self.std_dev.is_finite()
    }

    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.mean) / self.std_dev
    }

    /// |z| strictly above the threshold. Never true for a zero deviation.
    pub fn is_outlier(&self, value: f64) -> bool {
        !self.is_degenerate() && self.z_score(value).abs() > Z_SCORE_THRESHOLD
    }
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

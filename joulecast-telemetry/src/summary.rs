//! Cross-Trial Summary Statistics
//!
//! Aggregates per-trial energy totals for one experiment condition into the
//! statistics the run report carries. Trial counts are small (tens), so the
//! raw values are aggregated as-is.

/// Summary statistics over the successful trials of one condition.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStatistics {
    /// Number of values aggregated.
    pub sample_count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Median (linear midpoint for even counts).
    pub median: f64,
    /// Sample standard deviation (n − 1 denominator).
    pub std_dev: f64,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
}

/// Compute summary statistics over raw values. An empty slice yields an
/// all-zero summary.
pub fn compute_summary(values: &[f64]) -> SummaryStatistics {
    if values.is_empty() {
        return SummaryStatistics {
            sample_count: 0,
            mean: 0.0,
            median: 0.0,
            std_dev: 0.0,
            min: 0.0,
            max: 0.0,
        };
    }

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };

    let std_dev = if n < 2 {
        0.0
    } else {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    };

    SummaryStatistics {
        sample_count: n,
        mean,
        median,
        std_dev,
        min: sorted[0],
        max: sorted[n - 1],
    }
}

impl SummaryStatistics {
    /// Coefficient of variation in percent (relative stddev). Zero when the
    /// mean is zero.
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            (self.std_dev / self.mean) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_summary() {
        let summary = compute_summary(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(summary.sample_count, 5);
        assert!((summary.mean - 3.0).abs() < 1e-9);
        assert!((summary.median - 3.0).abs() < 1e-9);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 5.0);
    }

    #[test]
    fn test_even_count_median() {
        let summary = compute_summary(&[4.0, 1.0, 3.0, 2.0]);
        assert!((summary.median - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_values() {
        let summary = compute_summary(&[]);
        assert_eq!(summary.sample_count, 0);
        assert!((summary.mean - 0.0).abs() < f64::EPSILON);
        assert!((summary.coefficient_of_variation() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_single_value_no_variance() {
        let summary = compute_summary(&[7.5]);
        assert_eq!(summary.sample_count, 1);
        assert_eq!(summary.std_dev, 0.0);
        assert_eq!(summary.median, 7.5);
    }

    #[test]
    fn test_coefficient_of_variation() {
        let summary = compute_summary(&[100.0, 100.0, 100.0]);
        assert!((summary.coefficient_of_variation() - 0.0).abs() < f64::EPSILON);
    }
}

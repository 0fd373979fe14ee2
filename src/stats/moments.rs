//! Distribution moments and Z-score outlier detection

use serde::{Deserialize, Serialize};

use crate::types::analysis_thresholds::EPSILON;

/// First four moments of a sample
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionMoments {
    pub mean: f64,
    /// Population variance
    pub variance: f64,
    pub std_dev: f64,
    /// Third standardized moment
    pub skewness: f64,
    /// Fourth standardized moment minus 3
    pub excess_kurtosis: f64,
    pub count: usize,
}

impl DistributionMoments {
    fn empty() -> Self {
        Self {
            mean: 0.0,
            variance: 0.0,
            std_dev: 0.0,
            skewness: 0.0,
            excess_kurtosis: 0.0,
            count: 0,
        }
    }
}

/// Compute mean, variance, std, skewness and excess kurtosis in one pass
/// over central moments. Degenerate (constant or empty) samples report zero
/// skew and kurtosis rather than NaN.
pub fn moments(values: &[f64]) -> DistributionMoments {
    let count = values.len();
    if count == 0 {
        return DistributionMoments::empty();
    }
    let n = count as f64;
    let mean = values.iter().sum::<f64>() / n;

    let mut m2 = 0.0;
    let mut m3 = 0.0;
    let mut m4 = 0.0;
    for v in values {
        let d = v - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    m2 /= n;
    m3 /= n;
    m4 /= n;

    let std_dev = m2.sqrt();
    let (skewness, excess_kurtosis) = if m2 > EPSILON {
        (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
    } else {
        (0.0, 0.0)
    };

    DistributionMoments {
        mean,
        variance: m2,
        std_dev,
        skewness,
        excess_kurtosis,
        count,
    }
}

/// Indices of values with |Z| beyond the threshold.
///
/// A constant sample has no outliers by definition.
pub fn detect_outliers(values: &[f64], threshold: f64) -> Vec<usize> {
    let stats = moments(values);
    if stats.std_dev <= EPSILON {
        return Vec::new();
    }
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| ((*v - stats.mean) / stats.std_dev).abs() > threshold)
        .map(|(i, _)| i)
        .collect()
}

//! Sample-size and statistical-power estimates

use serde::{Deserialize, Serialize};

use crate::types::analysis_thresholds::EPSILON;

/// Observed statistical power against the required sample size
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerResult {
    /// clamp(n / required, 0.3, 1.0)
    pub observed: f64,
    /// max(30, ceil(20 / min_detectable_frequency))
    pub required: usize,
    /// observed >= 0.8
    pub adequate: bool,
}

/// Minimum sample size for estimating a proportion within a margin of error,
/// with finite-population correction when a population size is given.
///
/// n0 = z^2 * p(1 - p) / me^2; corrected n = n0 / (1 + (n0 - 1) / N).
pub fn minimum_sample_size(p: f64, margin_of_error: f64, z: f64, population: Option<usize>) -> usize {
    let p = p.clamp(0.0, 1.0);
    let me = margin_of_error.max(EPSILON);
    let n0 = z * z * p * (1.0 - p) / (me * me);

    let n = match population {
        Some(pop) if pop > 0 => n0 / (1.0 + (n0 - 1.0) / pop as f64),
        _ => n0,
    };
    n.ceil() as usize
}

/// Observed power for detecting patterns at the given minimum frequency.
pub fn statistical_power(n: usize, min_detectable_frequency: f64) -> PowerResult {
    let freq = min_detectable_frequency.max(EPSILON);
    let required = ((20.0 / freq).ceil() as usize).max(30);
    let observed = (n as f64 / required as f64).clamp(0.3, 1.0);
    PowerResult {
        observed,
        required,
        adequate: observed >= 0.8,
    }
}

//! Concentration and diversity measures: HHI, Shannon entropy, effective count

use crate::types::analysis_thresholds::EPSILON;

/// Herfindahl-Hirschman index over a distribution of percentages (0-100).
///
/// Sum of squared shares divided by 10000, giving a value in [0, 1]: 1.0 for
/// a single platform, 1/k for k equal platforms.
pub fn hhi(percentages: &[f64]) -> f64 {
    percentages
        .iter()
        .filter(|p| p.is_finite())
        .map(|p| p * p)
        .sum::<f64>()
        / 10_000.0
}

/// Shannon diversity H = -sum(p * ln p) over proportions.
///
/// Zero and non-finite proportions contribute nothing. Maximized by the
/// uniform distribution at ln(k).
pub fn shannon_diversity(proportions: &[f64]) -> f64 {
    -proportions
        .iter()
        .filter(|p| p.is_finite() && **p > EPSILON)
        .map(|p| p * p.ln())
        .sum::<f64>()
}

/// Effective number of categories: exp(H). Never exceeds the category count.
pub fn effective_count(proportions: &[f64]) -> f64 {
    shannon_diversity(proportions).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hhi_single_platform_is_one() {
        assert!((hhi(&[100.0]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn hhi_equal_platforms_is_reciprocal() {
        // Four CMS at 25% each: 4 * 625 / 10000 = 0.25
        assert!((hhi(&[25.0, 25.0, 25.0, 25.0]) - 0.25).abs() < 1e-9);
        assert!((hhi(&[50.0, 50.0]) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn shannon_uniform_is_maximal() {
        let uniform = shannon_diversity(&[0.25, 0.25, 0.25, 0.25]);
        let skewed = shannon_diversity(&[0.7, 0.1, 0.1, 0.1]);
        assert!(uniform > skewed);
        assert!((uniform - 4.0_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn shannon_single_category_is_zero() {
        assert!(shannon_diversity(&[1.0]).abs() < 1e-12);
    }

    #[test]
    fn effective_count_bounded_by_k() {
        let proportions = [0.5, 0.3, 0.2];
        assert!(effective_count(&proportions) <= 3.0 + 1e-9);
        assert!((effective_count(&[0.25; 4]) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn zero_proportions_ignored() {
        let with_zero = shannon_diversity(&[0.5, 0.5, 0.0]);
        let without = shannon_diversity(&[0.5, 0.5]);
        assert!((with_zero - without).abs() < 1e-12);
    }
}

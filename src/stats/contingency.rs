//! Contingency-table tests: chi-square with Yates correction, Fisher exact
//! via normal-approximation bucketing, binomial proportion test, and the
//! selector that picks between them.
//!
//! The Fisher path intentionally buckets hypergeometric p-values through a
//! normal approximation instead of computing them exactly. Callers that need
//! strict exactness must escalate to a full gamma-function implementation.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

use crate::types::analysis_thresholds::{
    EPSILON, FISHER_MAX_N, LOW_EXPECTED_COUNT, SIGNIFICANCE_ALPHA, STRICT_ALPHA,
};

/// Critical values for df in 1..=4 at alpha = 0.05 and alpha = 0.01
const CRITICAL_05: [f64; 4] = [3.841, 5.991, 7.815, 9.488];
const CRITICAL_01: [f64; 4] = [6.635, 9.210, 11.345, 13.277];

/// Conservative per-df increments used to extend the table beyond df = 4
const EXTENSION_STEP_05: f64 = 2.2;
const EXTENSION_STEP_01: f64 = 2.7;

/// Which test actually ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMethod {
    ChiSquare,
    Fisher,
    Binomial,
    /// Input was statistically invalid (negative counts, wrong shape)
    NotApplicable,
}

/// What the caller should do with the tested association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestRecommendation {
    /// Significant at alpha = 0.01
    Use,
    /// Significant at alpha = 0.05
    Caution,
    Reject,
}

/// Chi-square test result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChiSquareResult {
    /// Test statistic (Yates-corrected for 2x2 tables)
    pub statistic: f64,
    /// (rows - 1) * (cols - 1)
    pub degrees_of_freedom: usize,
    /// CDF-refined p-value; bucket flags below are table-driven
    pub p_value: f64,
    /// Statistic beyond the 0.05 critical value
    pub significant_05: bool,
    /// Statistic beyond the 0.01 critical value
    pub significant_01: bool,
    /// Any expected cell count below 5
    pub low_expected: bool,
    /// Expected counts, row-major
    pub expected: Vec<Vec<f64>>,
}

/// Fisher exact test result (normal-approximation buckets)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FisherResult {
    /// Bucketed p-value: one of 0.01, 0.05, 0.1, 0.2
    pub p_value: f64,
    /// ad / bc with epsilon-guarded denominator
    pub odds_ratio: f64,
    /// 95% CI lower bound on the odds ratio
    pub ci_low: f64,
    /// 95% CI upper bound on the odds ratio
    pub ci_high: f64,
    /// p below 0.05
    pub significant: bool,
}

/// Binomial proportion test result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinomialResult {
    /// Two-tailed p-value (normal approximation) or conservative bucket
    pub p_value: f64,
    /// Z statistic when the normal approximation applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// p below 0.05
    pub significant: bool,
}

/// Outcome of the test selector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignificanceOutcome {
    /// Test that ran
    pub method: TestMethod,
    /// p-value from the chosen test
    pub p_value: f64,
    /// Test statistic (0 for Fisher buckets)
    pub statistic: f64,
    /// use / caution / reject
    pub recommendation: TestRecommendation,
}

impl SignificanceOutcome {
    /// The fixed outcome for invalid tables: never an error
    fn not_applicable() -> Self {
        Self {
            method: TestMethod::NotApplicable,
            p_value: 1.0,
            statistic: 0.0,
            recommendation: TestRecommendation::Reject,
        }
    }
}

/// Critical value for the given df, extending the table conservatively
fn critical_value(df: usize, strict: bool) -> f64 {
    let (table, step) = if strict {
        (&CRITICAL_01, EXTENSION_STEP_01)
    } else {
        (&CRITICAL_05, EXTENSION_STEP_05)
    };
    if df == 0 {
        return f64::INFINITY;
    }
    if df <= 4 {
        table[df - 1]
    } else {
        // Coarse linear extension; not suitable for precise inferential claims
        table[3] + step * (df - 4) as f64
    }
}

/// Chi-square p-value refined through the statrs CDF, falling back to the
/// bucketed table value when the distribution cannot be constructed
fn chi_square_p(statistic: f64, df: usize) -> f64 {
    if df == 0 {
        return 1.0;
    }
    match ChiSquared::new(df as f64) {
        Ok(dist) => 1.0 - dist.cdf(statistic),
        Err(_) => {
            if statistic >= critical_value(df, true) {
                STRICT_ALPHA
            } else if statistic >= critical_value(df, false) {
                SIGNIFICANCE_ALPHA
            } else {
                0.5
            }
        }
    }
}

/// Standard normal upper-tail probability
fn normal_upper_tail(z: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(dist) => 1.0 - dist.cdf(z),
        Err(_) => 0.5,
    }
}

/// Whether the table is statistically valid (rectangular, non-negative, 2+x2+)
fn table_valid(table: &[Vec<f64>]) -> bool {
    if table.len() < 2 {
        return false;
    }
    let cols = table[0].len();
    if cols < 2 {
        return false;
    }
    table
        .iter()
        .all(|row| row.len() == cols && row.iter().all(|&v| v >= 0.0 && v.is_finite()))
}

/// Chi-square test over an r x c table. 2x2 tables get the Yates continuity
/// correction (|o - e| reduced by 0.5, floored at 0).
pub fn chi_square(table: &[Vec<f64>]) -> Option<ChiSquareResult> {
    if !table_valid(table) {
        return None;
    }
    let rows = table.len();
    let cols = table[0].len();

    let row_totals: Vec<f64> = table.iter().map(|r| r.iter().sum()).collect();
    let col_totals: Vec<f64> = (0..cols)
        .map(|j| table.iter().map(|r| r[j]).sum())
        .collect();
    let n: f64 = row_totals.iter().sum();
    if n <= 0.0 {
        return None;
    }

    let yates = rows == 2 && cols == 2;
    let mut statistic = 0.0;
    let mut low_expected = false;
    let mut expected = vec![vec![0.0; cols]; rows];

    for i in 0..rows {
        for j in 0..cols {
            let e = row_totals[i] * col_totals[j] / n;
            expected[i][j] = e;
            if e < LOW_EXPECTED_COUNT {
                low_expected = true;
            }
            if e <= EPSILON {
                continue;
            }
            let mut diff = (table[i][j] - e).abs();
            if yates {
                diff = (diff - 0.5).max(0.0);
            }
            statistic += diff * diff / e;
        }
    }

    let degrees_of_freedom = (rows - 1) * (cols - 1);
    let p_value = chi_square_p(statistic, degrees_of_freedom);

    Some(ChiSquareResult {
        statistic,
        degrees_of_freedom,
        p_value,
        significant_05: statistic >= critical_value(degrees_of_freedom, false),
        significant_01: statistic >= critical_value(degrees_of_freedom, true),
        low_expected,
        expected,
    })
}

/// Chi-square over a 2x2 table given as [[a, b], [c, d]]
pub fn chi_square_2x2(a: f64, b: f64, c: f64, d: f64) -> Option<ChiSquareResult> {
    chi_square(&[vec![a, b], vec![c, d]])
}

/// Fisher exact test for a 2x2 table [[a, b], [c, d]].
///
/// The hypergeometric p-value is bucketed through a normal approximation:
/// compute the expected value and variance of cell (0,0), take
/// Z = |a - E| / sqrt(Var), and map Z to {0.01, 0.05, 0.1, 0.2}.
pub fn fisher_exact(a: f64, b: f64, c: f64, d: f64) -> Option<FisherResult> {
    if [a, b, c, d].iter().any(|&v| v < 0.0 || !v.is_finite()) {
        return None;
    }
    let n = a + b + c + d;
    if n <= 0.0 {
        return None;
    }

    let row1 = a + b;
    let row2 = c + d;
    let col1 = a + c;
    let col2 = b + d;

    let expected = row1 * col1 / n;
    let variance = if n > 1.0 {
        row1 * row2 * col1 * col2 / (n * n * (n - 1.0))
    } else {
        0.0
    };

    let z = if variance > EPSILON {
        (a - expected).abs() / variance.sqrt()
    } else {
        0.0
    };

    let p_value = if z > 2.576 {
        0.01
    } else if z > 1.96 {
        0.05
    } else if z > 1.645 {
        0.1
    } else {
        0.2
    };

    let odds_ratio = (a * d) / (b * c).max(EPSILON);

    // 95% CI on log-odds; zero cells push the interval wide rather than NaN
    let se = (1.0 / a.max(EPSILON)
        + 1.0 / b.max(EPSILON)
        + 1.0 / c.max(EPSILON)
        + 1.0 / d.max(EPSILON))
    .sqrt();
    let log_or = odds_ratio.max(EPSILON).ln();
    let ci_low = (log_or - 1.96 * se).exp();
    let ci_high = (log_or + 1.96 * se).exp();

    Some(FisherResult {
        p_value,
        odds_ratio,
        ci_low,
        ci_high,
        significant: p_value < SIGNIFICANCE_ALPHA,
    })
}

/// Binomial test of an observed proportion against a baseline rate.
///
/// Uses the Z approximation when `n >= 30` and the expected success count is
/// at least 5; otherwise returns a conservative bucketed p-value.
pub fn binomial_test(successes: usize, n: usize, baseline: f64) -> BinomialResult {
    if n == 0 || !(0.0..=1.0).contains(&baseline) {
        return BinomialResult {
            p_value: 1.0,
            z: None,
            significant: false,
        };
    }

    let nf = n as f64;
    let k = successes as f64;
    let expected = nf * baseline;

    if n >= 30 && expected >= LOW_EXPECTED_COUNT {
        let variance = nf * baseline * (1.0 - baseline);
        let z = if variance > EPSILON {
            (k - expected) / variance.sqrt()
        } else {
            0.0
        };
        let p_value = (2.0 * normal_upper_tail(z.abs())).min(1.0);
        return BinomialResult {
            p_value,
            z: Some(z),
            significant: p_value < SIGNIFICANCE_ALPHA,
        };
    }

    // Small-sample fallback: only a clear excess over baseline is called
    // significant, everything else is inconclusive
    let proportion = k / nf;
    let p_value = if successes >= 3 && proportion >= 3.0 * baseline {
        0.01
    } else {
        0.5
    };
    BinomialResult {
        p_value,
        z: None,
        significant: p_value < SIGNIFICANCE_ALPHA,
    }
}

/// Pick the appropriate test for a 2x2 table and run it.
///
/// Fisher when `n <= 100` or any expected cell count is below 5, chi-square
/// otherwise. Invalid tables return `method = NotApplicable,
/// recommendation = Reject` instead of an error.
pub fn select_test(a: f64, b: f64, c: f64, d: f64) -> SignificanceOutcome {
    if [a, b, c, d].iter().any(|&v| v < 0.0 || !v.is_finite()) {
        return SignificanceOutcome::not_applicable();
    }
    let n = a + b + c + d;
    if n <= 0.0 {
        return SignificanceOutcome::not_applicable();
    }

    let chi = match chi_square_2x2(a, b, c, d) {
        Some(chi) => chi,
        None => return SignificanceOutcome::not_applicable(),
    };

    let use_fisher = n <= FISHER_MAX_N as f64 || chi.low_expected;

    let (method, p_value, statistic) = if use_fisher {
        match fisher_exact(a, b, c, d) {
            Some(fisher) => (TestMethod::Fisher, fisher.p_value, 0.0),
            None => return SignificanceOutcome::not_applicable(),
        }
    } else {
        (TestMethod::ChiSquare, chi.p_value, chi.statistic)
    };

    let recommendation = if p_value <= STRICT_ALPHA {
        TestRecommendation::Use
    } else if p_value <= SIGNIFICANCE_ALPHA {
        TestRecommendation::Caution
    } else {
        TestRecommendation::Reject
    };

    SignificanceOutcome {
        method,
        p_value,
        statistic,
        recommendation,
    }
}

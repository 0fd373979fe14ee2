//! Statistical Kernel
//!
//! Pure, side-effect-free statistical routines over plain numeric arrays and
//! contingency tables. Every function is idempotent; nothing here touches the
//! dataset types or performs I/O.
//!
//! ## Architecture
//! - `contingency`: chi-square (with Yates), Fisher exact (normal-approximation
//!   buckets), binomial test, and the test selector
//! - `diversity`: HHI, Shannon diversity, effective count
//! - `moments`: distribution moments and Z-score outlier detection
//! - `sanity`: the six cross-analyzer sanity checks
//! - `power`: minimum sample size and observed statistical power
//!
//! P-value refinement uses `statrs` distributions (normal and chi-squared
//! CDFs); significance *buckets* stay table-driven so callers get the same
//! use/caution/reject semantics regardless of the refinement.

pub mod contingency;
pub mod diversity;
pub mod moments;
pub mod power;
pub mod sanity;

pub use contingency::{
    binomial_test, chi_square, chi_square_2x2, fisher_exact, select_test, BinomialResult,
    ChiSquareResult, FisherResult, SignificanceOutcome, TestMethod, TestRecommendation,
};
pub use diversity::{effective_count, hhi, shannon_diversity};
pub use moments::{detect_outliers, moments, DistributionMoments};
pub use power::{minimum_sample_size, statistical_power, PowerResult};
pub use sanity::{run_all_checks, SanityCheck, SanityInputs, SanityOutcome};

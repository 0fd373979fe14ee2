//! Frequency Analyzers
//!
//! Four sibling analyzers turn the dataset into pattern maps keyed by a typed
//! fingerprint, all through the same aggregation contract:
//!
//! 1. Traverse sites once, collecting fingerprint -> site set (and per-value
//!    site sets)
//! 2. Count each pattern strictly once by set cardinality
//! 3. Apply the `min_occurrences` filter exactly once
//! 4. Optionally drop fingerprints on the static semantic skip list
//! 5. Attach deduplicated, truncated examples
//! 6. Sort by descending frequency, then site count, then fingerprint
//!
//! ## Architecture
//! - `aggregate`: the shared `PatternAggregator` implementing the contract
//! - `headers`: HTTP response header names
//! - `meta_tags`: `{name|property|http-equiv}:{key}` fingerprints
//! - `scripts`: script URL hosts and recognized library tokens
//! - `semantic`: category/vendor roll-ups over precomputed classifications

pub mod aggregate;
pub mod headers;
pub mod meta_tags;
pub mod scripts;
pub mod semantic;

pub use aggregate::PatternAggregator;
pub use headers::{HeaderAnalysis, HeaderAnalyzer};
pub use meta_tags::{MetaAnalysis, MetaAnalyzer, MetaType};
pub use scripts::{ScriptAnalysis, ScriptAnalyzer};
pub use semantic::{SemanticAnalysis, SemanticAnalyzer};

use crate::types::{AnalysisError, AnalysisOptions, AnalysisResult, PreprocessedDataset};

/// Common surface of every analyzer in the pipeline
pub trait CorpusAnalyzer {
    /// Analyzer-specific payload type
    type Payload;

    /// Stable analyzer identifier, e.g. `MetaAnalyzerV2`
    fn name(&self) -> &'static str;

    /// Run the analyzer over the read-only dataset.
    ///
    /// Empty datasets produce empty pattern maps, never errors; only option
    /// contract violations are fatal.
    fn analyze(
        &self,
        dataset: &PreprocessedDataset,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult<Self::Payload>, AnalysisError>;
}

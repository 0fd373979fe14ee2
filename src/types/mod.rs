//! Shared data structures for the corpus analysis pipeline
//!
//! This module defines the core types, in dependency order:
//! - C1: `SiteObservation`, `PreprocessedDataset` (immutable input)
//! - C3: `PatternRecord`, `AnalysisResult` (the common analyzer output)
//! - C4: vendor detections, technology stack, signatures, conflicts
//! - C5: header pair statistics and exclusivity groups
//! - C6: discovered patterns, emerging vendors, anomalies
//! - C7: validation stage results and quality grading
//! - C8: bias distribution, correlation, adjustment and risk records
//! - C9: filter/retain recommendations

mod dataset;
mod pattern;
// Public because it contains the `analysis_thresholds` sub-module
// which must remain accessible as `types::thresholds`.
pub mod thresholds;
mod vendor;
mod cooccurrence;
mod discovery;
mod validation;
mod bias;
mod recommendation;

pub use dataset::*;
pub use pattern::*;
pub use thresholds::*;
pub use vendor::*;
pub use cooccurrence::*;
pub use discovery::*;
pub use validation::*;
pub use bias::*;
pub use recommendation::*;

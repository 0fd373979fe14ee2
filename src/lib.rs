//! sitelens: Site Corpus Operational Intelligence
//!
//! Frequency- and bias-analysis engine over a fixed dataset of structured
//! site observations (HTTP headers, meta tags, script URLs, CMS labels).
//!
//! ## Architecture
//!
//! - **Statistical Kernel**: pure chi-square / Fisher / diversity / power math
//! - **Frequency Analyzers**: Headers, MetaTags, Scripts, Semantic
//! - **Vendor Analyzer**: catalog matching, stack inference, conflicts
//! - **Co-occurrence Analyzer**: pair statistics over site bitsets
//! - **Pattern Discovery**: name-shape inference and emerging vendors
//! - **Validation Pipeline**: seven ordered quality stages
//! - **Bias Analyzer**: composition-bias measurement and adjustment
//! - **Recommendations**: filter/retain decisions with confidence buckets

pub mod analyzers;
pub mod bias;
pub mod config;
pub mod cooccurrence;
pub mod dataset;
pub mod discovery;
pub mod pipeline;
pub mod recommendations;
pub mod stats;
pub mod types;
pub mod validation;
pub mod vendor;

// Re-export the dataset model
pub use types::{
    DatasetError, PreprocessedDataset, SiteObservation,
};

// Re-export the common analyzer surface
pub use analyzers::{
    CorpusAnalyzer, HeaderAnalyzer, MetaAnalyzer, ScriptAnalyzer, SemanticAnalyzer,
};
pub use types::{AnalysisError, AnalysisOptions, AnalysisResult, PatternRecord};

// Re-export the dependent analyzers
pub use bias::BiasAnalyzer;
pub use cooccurrence::CooccurrenceAnalyzer;
pub use discovery::DiscoveryAnalyzer;
pub use vendor::VendorAnalyzer;

// Re-export the pipeline surface
pub use config::AnalysisConfig;
pub use pipeline::{AnalysisCoordinator, CorpusReport};
pub use recommendations::RecommendationsGenerator;
pub use validation::ValidationPipeline;
pub use types::{QualityGrade, ValidationSummary};

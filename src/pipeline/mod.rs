//! Analysis Coordinator - Phased Processing Sequence for Corpus Intelligence
//!
//! This module drives the analyzers in topological order:
//!
//! ```text
//! PHASE 1: Frequency + Vendor (independent; parallel on the rayon pool)
//!          Headers | MetaTags | Scripts | Semantic | Vendor
//! PHASE 2: Co-occurrence (vendor snapshot injected)
//! PHASE 3: Pattern Discovery (validation context from dataset metadata)
//! PHASE 4: Validation Pipeline (seeded from the frequency analyzers)
//! PHASE 5: Bias Analysis (vendor + semantic + discovery snapshots injected)
//! PHASE 6: Recommendations
//! ```
//!
//! Injections are one-way snapshots: a consumer receives an already-finished
//! producer payload before it starts; nothing runs concurrently with its
//! producer. The dataset is shared read-only throughout.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analyzers::{
    CorpusAnalyzer, HeaderAnalysis, HeaderAnalyzer, MetaAnalysis, MetaAnalyzer, ScriptAnalysis,
    ScriptAnalyzer, SemanticAnalysis, SemanticAnalyzer,
};
use crate::bias::BiasAnalyzer;
use crate::config::AnalysisConfig;
use crate::cooccurrence::CooccurrenceAnalyzer;
use crate::discovery::DiscoveryAnalyzer;
use crate::recommendations::RecommendationsGenerator;
use crate::types::{
    AnalysisError, AnalysisResult, BiasAnalysis, CooccurrenceAnalysis, DiscoveryAnalysis,
    PreprocessedDataset, RecommendationReport, ValidationSummary, VendorAnalysis,
};
use crate::validation::ValidationPipeline;
use crate::vendor::VendorAnalyzer;

/// Aggregated output of one full analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusReport {
    /// When the run completed
    pub analyzed_at: DateTime<Utc>,
    /// Total sites in the input dataset
    pub total_sites: usize,
    pub headers: AnalysisResult<HeaderAnalysis>,
    pub meta_tags: AnalysisResult<MetaAnalysis>,
    pub scripts: AnalysisResult<ScriptAnalysis>,
    pub semantic: AnalysisResult<SemanticAnalysis>,
    pub vendor: AnalysisResult<VendorAnalysis>,
    pub cooccurrence: AnalysisResult<CooccurrenceAnalysis>,
    pub discovery: AnalysisResult<DiscoveryAnalysis>,
    pub validation: ValidationSummary,
    pub bias: AnalysisResult<BiasAnalysis>,
    pub recommendations: RecommendationReport,
    /// Wall-clock milliseconds per phase
    pub phase_timings_ms: BTreeMap<String, f64>,
}

/// Coordinates the full analyzer sequence over one dataset
pub struct AnalysisCoordinator {
    config: AnalysisConfig,
}

impl AnalysisCoordinator {
    /// Coordinator with built-in default configuration
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
        }
    }

    /// Coordinator with explicit configuration
    pub fn with_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Run the full phased sequence over the dataset.
    ///
    /// The dataset's invariants are checked once at entry; analyzers assume
    /// them from then on.
    pub fn run(&self, dataset: &PreprocessedDataset) -> Result<CorpusReport, AnalysisError> {
        dataset
            .check_invariants()
            .map_err(|e| AnalysisError::InvalidDataset(e.to_string()))?;
        let options = &self.config.options;
        options.validate()?;

        info!(
            total_sites = dataset.total_sites,
            parallel = self.config.pipeline.parallel,
            "Starting corpus analysis"
        );
        let mut phase_timings_ms = BTreeMap::new();

        // PHASE 1: independent analyzers
        let phase_start = Instant::now();
        let (headers, meta_tags, scripts, semantic, vendor) = if self.config.pipeline.parallel {
            let ((headers, meta_tags), ((scripts, semantic), vendor)) = rayon::join(
                || {
                    rayon::join(
                        || HeaderAnalyzer::new().analyze(dataset, options),
                        || MetaAnalyzer::new().analyze(dataset, options),
                    )
                },
                || {
                    rayon::join(
                        || {
                            rayon::join(
                                || ScriptAnalyzer::new().analyze(dataset, options),
                                || SemanticAnalyzer::new().analyze(dataset, options),
                            )
                        },
                        || VendorAnalyzer::new().analyze(dataset, options),
                    )
                },
            );
            (headers?, meta_tags?, scripts?, semantic?, vendor?)
        } else {
            (
                HeaderAnalyzer::new().analyze(dataset, options)?,
                MetaAnalyzer::new().analyze(dataset, options)?,
                ScriptAnalyzer::new().analyze(dataset, options)?,
                SemanticAnalyzer::new().analyze(dataset, options)?,
                VendorAnalyzer::new().analyze(dataset, options)?,
            )
        };
        phase_timings_ms.insert(
            "frequency_and_vendor".to_string(),
            phase_start.elapsed().as_secs_f64() * 1000.0,
        );
        info!(
            header_patterns = headers.patterns.len(),
            meta_patterns = meta_tags.patterns.len(),
            vendors = vendor.analyzer_specific.statistics.vendors.len(),
            "Phase 1 complete"
        );

        // PHASE 2: co-occurrence with the vendor snapshot
        let phase_start = Instant::now();
        let mut cooccurrence_analyzer = CooccurrenceAnalyzer::new();
        cooccurrence_analyzer.set_vendor_data(vendor.analyzer_specific.clone());
        let cooccurrence = cooccurrence_analyzer.analyze(dataset, options)?;
        phase_timings_ms.insert(
            "cooccurrence".to_string(),
            phase_start.elapsed().as_secs_f64() * 1000.0,
        );

        // PHASE 3: pattern discovery
        let phase_start = Instant::now();
        let discovery = DiscoveryAnalyzer::new().analyze(dataset, options)?;
        phase_timings_ms.insert(
            "discovery".to_string(),
            phase_start.elapsed().as_secs_f64() * 1000.0,
        );

        // PHASE 4: validation over the frequency analyzer outputs
        let phase_start = Instant::now();
        let validation = ValidationPipeline::new().run(
            dataset,
            options,
            &[
                ("header", &headers.patterns),
                ("meta", &meta_tags.patterns),
                ("script", &scripts.patterns),
                ("semantic", &semantic.patterns),
            ],
        );
        phase_timings_ms.insert(
            "validation".to_string(),
            phase_start.elapsed().as_secs_f64() * 1000.0,
        );
        info!(
            stages_passed = validation.stages_passed,
            grade = %validation.quality_grade,
            "Validation pipeline complete"
        );

        // PHASE 5: bias with every producer snapshot
        let phase_start = Instant::now();
        let mut bias_analyzer = BiasAnalyzer::new();
        bias_analyzer.set_vendor_data(vendor.analyzer_specific.clone());
        bias_analyzer.set_semantic_data(semantic.analyzer_specific.clone());
        bias_analyzer.set_discovery_data(discovery.analyzer_specific.clone());
        let bias = bias_analyzer.analyze(dataset, options)?;
        phase_timings_ms.insert(
            "bias".to_string(),
            phase_start.elapsed().as_secs_f64() * 1000.0,
        );
        info!(
            warnings = bias.analyzer_specific.warnings.len(),
            hhi = bias.analyzer_specific.concentration.hhi,
            "Bias analysis complete"
        );

        // PHASE 6: recommendations
        let phase_start = Instant::now();
        let mut generator = RecommendationsGenerator::new();
        if let Some(semantic_block) = dataset.metadata.semantic.as_ref() {
            generator.set_semantic_data(semantic_block.clone());
        }
        let recommendations = generator.generate(&headers.patterns, options);
        phase_timings_ms.insert(
            "recommendations".to_string(),
            phase_start.elapsed().as_secs_f64() * 1000.0,
        );

        info!(
            recommendations = recommendations.recommendations.len(),
            "Corpus analysis complete"
        );

        Ok(CorpusReport {
            analyzed_at: Utc::now(),
            total_sites: dataset.total_sites,
            headers,
            meta_tags,
            scripts,
            semantic,
            vendor,
            cooccurrence,
            discovery,
            validation,
            bias,
            recommendations,
            phase_timings_ms,
        })
    }
}

impl Default for AnalysisCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

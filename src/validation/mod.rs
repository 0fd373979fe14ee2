//! Validation Pipeline
//!
//! Seven ordered stages sharing a mutable context over the frequency
//! analyzers' outputs. Every stage always runs, even after earlier failures;
//! a stage error is caught, converted into a synthetic failed result, and the
//! pipeline continues. The final summary carries per-stage results, the
//! accumulated quality score and a letter grade.
//!
//! ## Stages
//!
//! 1. **FrequencyValidation** - drop sub-threshold patterns, warn on extremes
//! 2. **SampleSizeValidation** - corpus size errors, observed power
//! 3. **DistributionValidation** - moments, outliers, skew warnings
//! 4. **CorrelationValidation** - CMS balance and correlation strength
//! 5. **SanityValidation** - the six statistical kernel sanity checks
//! 6. **SignificanceValidation** - per-pattern significance testing
//! 7. **RecommendationValidation** - aggregate and score recommendations

pub mod stages;

pub use stages::default_stages;

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::types::analysis_thresholds::{
    MIN_STAGES_PASSED, STAGE_PASS_SCORE, VALIDATION_STAGE_COUNT,
};
use crate::types::{
    AnalysisError, AnalysisOptions, PatternRecord, PreprocessedDataset, QualityGrade,
    QualityMetrics, StageResult, ValidationSummary,
};

/// Mutable state threaded through the stage sequence
pub struct ValidationContext<'a> {
    /// The read-only dataset under validation
    pub dataset: &'a PreprocessedDataset,
    /// Options the frequency analyzers ran with
    pub options: &'a AnalysisOptions,
    /// Surviving patterns keyed `{domain}:{fingerprint}`
    pub validated_patterns: BTreeMap<String, PatternRecord>,
    /// Patterns flagged by distribution or significance stages
    pub flagged_patterns: BTreeSet<String>,
    /// Running quality score, seeded at 1.0
    pub quality_score: f64,
    /// Per-dimension quality accumulators
    pub quality_metrics: QualityMetrics,
    /// Finished stage results, in execution order
    pub stage_results: Vec<StageResult>,
}

impl<'a> ValidationContext<'a> {
    /// Seed the context from frequency analyzer outputs, one map per domain
    pub fn new(
        dataset: &'a PreprocessedDataset,
        options: &'a AnalysisOptions,
        seeds: &[(&str, &BTreeMap<String, PatternRecord>)],
    ) -> Self {
        let mut validated_patterns = BTreeMap::new();
        for (domain, patterns) in seeds {
            for (fingerprint, record) in patterns.iter() {
                validated_patterns.insert(format!("{domain}:{fingerprint}"), record.clone());
            }
        }
        Self {
            dataset,
            options,
            validated_patterns,
            flagged_patterns: BTreeSet::new(),
            quality_score: 1.0,
            quality_metrics: QualityMetrics::default(),
            stage_results: Vec::new(),
        }
    }

    /// Fold a finished stage score into the running quality score
    /// (running mean seeded with the initial 1.0)
    fn accumulate_score(&mut self, score: f64) {
        let completed = self.stage_results.len() as f64;
        self.quality_score = (self.quality_score * (completed + 1.0) + score) / (completed + 2.0);
    }
}

/// One validation stage over the shared context
pub trait ValidationStage: Send + Sync {
    /// Stage name, e.g. `FrequencyValidation`
    fn name(&self) -> &'static str;

    /// Run the stage. An `Err` is caught by the pipeline and converted into
    /// a synthetic failed stage result; later stages still run.
    fn execute(&self, ctx: &mut ValidationContext<'_>) -> Result<StageResult, AnalysisError>;
}

/// The seven-stage validation pipeline
pub struct ValidationPipeline {
    stages: Vec<Box<dyn ValidationStage>>,
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationPipeline {
    /// Pipeline with the standard seven stages in canonical order
    pub fn new() -> Self {
        Self {
            stages: default_stages(),
        }
    }

    /// Run every stage in sequence and summarize.
    ///
    /// `seeds` are the frequency analyzers' pattern maps, keyed into the
    /// context as `{domain}:{fingerprint}`.
    pub fn run(
        &self,
        dataset: &PreprocessedDataset,
        options: &AnalysisOptions,
        seeds: &[(&str, &BTreeMap<String, PatternRecord>)],
    ) -> ValidationSummary {
        let mut ctx = ValidationContext::new(dataset, options, seeds);
        debug!(
            seeded = ctx.validated_patterns.len(),
            stages = self.stages.len(),
            "Starting validation pipeline"
        );

        for stage in &self.stages {
            let result = match stage.execute(&mut ctx) {
                Ok(mut result) => {
                    result.passed = result.score >= STAGE_PASS_SCORE && result.errors.is_empty();
                    result
                }
                Err(e) => {
                    warn!(stage = stage.name(), error = %e, "Validation stage failed");
                    let mut result = StageResult::new(stage.name());
                    result.errors.push(format!("stage execution failed: {e}"));
                    result
                }
            };
            ctx.accumulate_score(result.score);
            ctx.stage_results.push(result);
        }

        let stages_passed = ctx.stage_results.iter().filter(|r| r.passed).count();
        let stages_failed = ctx.stage_results.len() - stages_passed;
        let has_errors = ctx.stage_results.iter().any(|r| !r.errors.is_empty());

        debug_assert_eq!(ctx.stage_results.len(), VALIDATION_STAGE_COUNT);

        ValidationSummary {
            stages_passed,
            stages_failed,
            overall_passed: stages_passed >= MIN_STAGES_PASSED && !has_errors,
            quality_score: ctx.quality_score,
            quality_grade: QualityGrade::from_score(ctx.quality_score),
            quality_metrics: ctx.quality_metrics,
            validated_pattern_count: ctx.validated_patterns.len(),
            flagged_patterns: ctx.flagged_patterns,
            stages: ctx.stage_results,
        }
    }
}

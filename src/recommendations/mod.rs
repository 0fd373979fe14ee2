//! Recommendations Generator
//!
//! Turns the aggregated header analysis into filter/retain recommendations.
//! Semantic classifications drive the action when available; otherwise a
//! frequency policy applies. Confidence comes from the semantic
//! discriminative score when present, else from a deterministic frequency
//! mapping.

use std::collections::BTreeMap;

use crate::types::analysis_thresholds::UNIVERSAL_FREQUENCY;
use crate::types::{
    AnalysisOptions, ConfidenceBucket, ConfidenceDistribution, PatternRecord, Recommendation,
    RecommendationAction, RecommendationConfidence, RecommendationReport, SemanticMetadata,
};

/// Moderate-frequency band that defaults to `retain` without semantic data
const MODERATE_BAND: (f64, f64) = (0.2, 0.6);

/// Deterministic frequency -> confidence mapping for unclassified headers
fn frequency_confidence(frequency: f64) -> f64 {
    if frequency < 0.01 {
        0.3
    } else if frequency < MODERATE_BAND.0 {
        0.5
    } else if frequency <= MODERATE_BAND.1 {
        0.8
    } else if frequency <= UNIVERSAL_FREQUENCY {
        0.6
    } else {
        0.75
    }
}

/// Filter/retain recommendation generator over header patterns
#[derive(Debug, Default)]
pub struct RecommendationsGenerator {
    semantic: Option<SemanticMetadata>,
}

impl RecommendationsGenerator {
    pub fn new() -> Self {
        Self { semantic: None }
    }

    /// Inject the dataset's semantic block; classification then drives
    /// actions and confidence
    pub fn set_semantic_data(&mut self, snapshot: SemanticMetadata) {
        self.semantic = Some(snapshot);
    }

    fn recommend_one(&self, record: &PatternRecord) -> Recommendation {
        let header = record.pattern.as_str();
        let semantic = self.semantic.as_ref();
        let category = semantic.and_then(|s| s.categories.get(header));
        let classification = semantic.and_then(|s| s.classifications.get(header));

        let (action, reasoning) = if category.is_some_and(|c| c.as_str() == "security") {
            (
                RecommendationAction::Filter,
                "security header; reflects hardening policy, not the platform".to_string(),
            )
        } else if classification.is_some_and(|c| c.recommend_filter) {
            (
                RecommendationAction::Filter,
                "upstream classification recommends filtering".to_string(),
            )
        } else if record.frequency > UNIVERSAL_FREQUENCY {
            (
                RecommendationAction::Filter,
                format!(
                    "near-universal ({:.0}% of sites); carries no discriminative signal",
                    record.frequency * 100.0
                ),
            )
        } else if semantic.is_none()
            && record.frequency >= MODERATE_BAND.0
            && record.frequency <= MODERATE_BAND.1
        {
            (
                RecommendationAction::Retain,
                format!(
                    "moderate frequency ({:.0}% of sites) suggests a usable signal",
                    record.frequency * 100.0
                ),
            )
        } else {
            (
                RecommendationAction::Retain,
                "no filter policy matched; retained by default".to_string(),
            )
        };

        let confidence_value = classification
            .map(|c| c.discriminative_score)
            .unwrap_or_else(|| frequency_confidence(record.frequency));

        Recommendation {
            kind: "header".to_string(),
            pattern: header.to_string(),
            action,
            confidence: RecommendationConfidence::from_value(confidence_value),
            reasoning,
        }
    }

    /// Generate recommendations for every header pattern clearing the
    /// occurrence threshold
    pub fn generate(
        &self,
        header_patterns: &BTreeMap<String, PatternRecord>,
        options: &AnalysisOptions,
    ) -> RecommendationReport {
        let recommendations: Vec<Recommendation> = header_patterns
            .values()
            .filter(|record| record.site_count >= options.min_occurrences)
            .map(|record| self.recommend_one(record))
            .collect();

        let distribution = if recommendations.is_empty() {
            ConfidenceDistribution::uniform()
        } else {
            let total = recommendations.len() as f64;
            let count = |bucket: ConfidenceBucket| {
                recommendations
                    .iter()
                    .filter(|r| r.confidence.level == bucket)
                    .count() as f64
                    / total
            };
            ConfidenceDistribution {
                low: count(ConfidenceBucket::Low),
                medium: count(ConfidenceBucket::Medium),
                high: count(ConfidenceBucket::High),
                very_high: count(ConfidenceBucket::VeryHigh),
            }
        };

        RecommendationReport {
            recommendations,
            distribution,
        }
    }
}

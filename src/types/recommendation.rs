//! Recommendation types: filter/retain actions with bucketed confidence

use serde::{Deserialize, Serialize};

/// What to do with a header pattern downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationAction {
    /// Exclude the pattern from discriminative use
    Filter,
    /// Keep the pattern
    Retain,
}

/// Confidence bucket boundaries: 0.5 / 0.7 / 0.9
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfidenceBucket {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceBucket {
    /// Bucket a confidence value
    pub fn from_value(value: f64) -> Self {
        if value < 0.5 {
            Self::Low
        } else if value < 0.7 {
            Self::Medium
        } else if value < 0.9 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }
}

/// Confidence value with its bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationConfidence {
    /// Confidence, in [0, 1]
    pub value: f64,
    /// Bucketed level
    pub level: ConfidenceBucket,
}

impl RecommendationConfidence {
    pub fn from_value(value: f64) -> Self {
        let value = value.clamp(0.0, 1.0);
        Self {
            value,
            level: ConfidenceBucket::from_value(value),
        }
    }
}

/// One filter/retain recommendation for a pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Pattern domain, e.g. `header`
    #[serde(rename = "type")]
    pub kind: String,
    /// Pattern fingerprint
    pub pattern: String,
    /// Filter or retain
    pub action: RecommendationAction,
    /// Confidence with bucket
    pub confidence: RecommendationConfidence,
    /// Why the action was chosen
    pub reasoning: String,
}

/// Share of recommendations per confidence bucket; sums to 1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceDistribution {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub very_high: f64,
}

impl ConfidenceDistribution {
    /// Evenly split distribution, the convention for empty input
    pub fn uniform() -> Self {
        Self {
            low: 0.25,
            medium: 0.25,
            high: 0.25,
            very_high: 0.25,
        }
    }

    /// Sum of the four shares
    pub fn total(&self) -> f64 {
        self.low + self.medium + self.high + self.very_high
    }
}

/// Output of the recommendations generator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationReport {
    /// All emitted recommendations
    pub recommendations: Vec<Recommendation>,
    /// Bucket distribution over emitted confidences
    pub distribution: ConfidenceDistribution,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_boundaries() {
        assert_eq!(ConfidenceBucket::from_value(0.49), ConfidenceBucket::Low);
        assert_eq!(ConfidenceBucket::from_value(0.5), ConfidenceBucket::Medium);
        assert_eq!(ConfidenceBucket::from_value(0.69), ConfidenceBucket::Medium);
        assert_eq!(ConfidenceBucket::from_value(0.7), ConfidenceBucket::High);
        assert_eq!(ConfidenceBucket::from_value(0.9), ConfidenceBucket::VeryHigh);
    }

    #[test]
    fn uniform_distribution_sums_to_one() {
        assert!((ConfidenceDistribution::uniform().total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn recommendation_serializes_type_field() {
        let rec = Recommendation {
            kind: "header".to_string(),
            pattern: "x-powered-by".to_string(),
            action: RecommendationAction::Filter,
            confidence: RecommendationConfidence::from_value(0.8),
            reasoning: "security header".to_string(),
        };
        let json = serde_json::to_value(&rec).expect("serializes");
        assert_eq!(json["type"], "header");
        assert_eq!(json["action"], "filter");
        assert_eq!(json["confidence"]["level"], "high");
    }
}

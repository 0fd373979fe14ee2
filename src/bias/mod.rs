//! Bias Analyzer
//!
//! Measures how much of the corpus signal is an artifact of dataset
//! composition. Eight passes over the shared site index:
//!
//! 1. CMS distribution with Unknown-site categorization
//! 2. Concentration metrics (HHI, Shannon diversity, dominance ratio)
//! 3. Header-CMS correlations (chi-square, conditionals, specificity,
//!    bias adjustment, recommendation risk)
//! 4. Bias warnings
//! 5. Statistical summary
//! 6. Cross-analyzer assessments (only for injected snapshots)
//! 7. Statistical enhancement (kernel-grade refinement and consistency)
//! 8. Reporting (visuals, severity, impact)
//!
//! ## Architecture
//! - `distribution`: CMS bucketing and Unknown categorization
//! - `concentration`: HHI / diversity / dominance risk levels
//! - `correlation`: the per-header correlation engine
//! - `assessments`: warnings and cross-analyzer bias assessments
//! - `enhancement`: kernel-backed refinement pass
//! - `reporting`: visualization structures and impact assessment

pub mod assessments;
pub mod concentration;
pub mod correlation;
pub mod distribution;
pub mod enhancement;
pub mod reporting;

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::analyzers::{aggregate::result_metadata, CorpusAnalyzer};
use crate::dataset::SiteIndex;
use crate::types::analysis_thresholds::{
    SAMPLE_ADEQUATE_EXPECTED, SAMPLE_MARGINAL_EXPECTED,
};
use crate::analyzers::SemanticAnalysis;
use crate::types::{
    AnalysisError, AnalysisOptions, AnalysisResult, BiasAnalysis, BiasStatisticalSummary,
    DiscoveryAnalysis, PatternRecord, PreprocessedDataset, RiskLevel, SampleAdequacy,
    VendorAnalysis,
};

/// Corpus bias analyzer with optional producer snapshots
#[derive(Debug, Default)]
pub struct BiasAnalyzer {
    vendor: Option<VendorAnalysis>,
    semantic: Option<SemanticAnalysis>,
    discovery: Option<DiscoveryAnalysis>,
}

impl BiasAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject the finished vendor analyzer payload
    pub fn set_vendor_data(&mut self, snapshot: VendorAnalysis) {
        self.vendor = Some(snapshot);
    }

    /// Inject the finished semantic analyzer payload
    pub fn set_semantic_data(&mut self, snapshot: SemanticAnalysis) {
        self.semantic = Some(snapshot);
    }

    /// Inject the finished pattern-discovery payload
    pub fn set_discovery_data(&mut self, snapshot: DiscoveryAnalysis) {
        self.discovery = Some(snapshot);
    }

    /// Pass 5: aggregate statistical summary
    fn statistical_summary(
        analysis: &BiasAnalysis,
        total_sites: usize,
    ) -> BiasStatisticalSummary {
        let correlations = &analysis.correlations;
        let count = correlations.len();

        let mean_confidence = if count == 0 {
            0.0
        } else {
            correlations.values().map(|c| c.risk.confidence).sum::<f64>() / count as f64
        };
        let average_chi_square = if count == 0 {
            0.0
        } else {
            correlations.values().map(|c| c.chi_square).sum::<f64>() / count as f64
        };
        let average_p_value = if analysis.enhancement.headers.is_empty() {
            1.0
        } else {
            analysis
                .enhancement
                .headers
                .iter()
                .map(|h| h.p_value)
                .sum::<f64>()
                / analysis.enhancement.headers.len() as f64
        };
        let significant_headers = correlations
            .values()
            .filter(|c| c.per_cms.values().any(|m| m.significant))
            .count();

        // Adequacy buckets by the smallest expected cell count per header
        let mut sample_adequacy: BTreeMap<SampleAdequacy, usize> = BTreeMap::new();
        for correlation in correlations.values() {
            let min_expected = correlation
                .per_cms
                .values()
                .map(|m| m.expected)
                .fold(f64::INFINITY, f64::min);
            let bucket = if min_expected >= SAMPLE_ADEQUATE_EXPECTED {
                SampleAdequacy::High
            } else if min_expected >= SAMPLE_MARGINAL_EXPECTED {
                SampleAdequacy::Medium
            } else {
                SampleAdequacy::Low
            };
            *sample_adequacy.entry(bucket).or_default() += 1;
        }

        let diversity_component = (analysis.concentration.shannon_diversity / 3.0).min(1.0);
        let hhi_component = (1.0 - analysis.concentration.hhi).clamp(0.0, 1.0);
        let size_component = if total_sites == 0 {
            0.0
        } else {
            ((total_sites as f64).log10() / 1000_f64.log10()).min(1.0)
        };
        let dataset_quality_score =
            (diversity_component + hhi_component + size_component) / 3.0;

        BiasStatisticalSummary {
            mean_confidence,
            average_chi_square,
            average_p_value,
            significant_headers,
            sample_adequacy,
            dataset_quality_score,
        }
    }
}

impl CorpusAnalyzer for BiasAnalyzer {
    type Payload = BiasAnalysis;

    fn name(&self) -> &'static str {
        "BiasAnalyzerV2"
    }

    fn analyze(
        &self,
        dataset: &PreprocessedDataset,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult<Self::Payload>, AnalysisError> {
        options.validate()?;

        let index = SiteIndex::build(dataset);
        let total_sites = dataset.total_sites;

        // Passes 1-2
        let dist = distribution::cms_distribution(dataset);
        let conc = concentration::concentration_metrics(&dist);
        info!(
            platforms = dist.buckets.len(),
            hhi = conc.hhi,
            risk = %conc.overall_risk,
            "CMS distribution computed"
        );

        // Pass 3
        let correlations = correlation::header_correlations(dataset, &index, &dist, options);
        debug!(headers = correlations.len(), "Header-CMS correlations built");

        // Pass 4
        let warnings =
            assessments::bias_warnings(&dist, &conc, &correlations, self.vendor.as_ref());

        // Pass 6: assessments only for present snapshots
        let technology_bias = self
            .vendor
            .as_ref()
            .map(|vendor| assessments::technology_bias(vendor, &dist));
        let semantic_bias = dataset
            .metadata
            .semantic
            .as_ref()
            .map(|metadata| assessments::semantic_bias(metadata, self.semantic.as_ref()));
        let discovery_bias = self
            .discovery
            .as_ref()
            .map(|discovery| assessments::discovery_bias(discovery, &dist));

        // Pass 7
        let enhancement = enhancement::enhance(&index, &dist, &conc, &correlations);

        // Pass 8
        let visuals = reporting::visuals(&dist, &correlations);
        let cross_levels: Vec<RiskLevel> = technology_bias
            .iter()
            .map(|a| a.level)
            .chain(semantic_bias.iter().map(|a| a.level))
            .chain(discovery_bias.iter().map(|a| a.level))
            .collect();
        let impact = reporting::impact(&conc, &correlations, &warnings, &cross_levels);

        let mut analysis = BiasAnalysis {
            distribution: dist,
            concentration: conc,
            correlations,
            warnings,
            summary: BiasStatisticalSummary::default(),
            technology_bias,
            semantic_bias,
            discovery_bias,
            enhancement,
            visuals,
            impact,
        };
        // Pass 5 runs over the assembled analysis
        analysis.summary = Self::statistical_summary(&analysis, total_sites);

        // Pattern records mirror the correlation set
        let mut patterns: BTreeMap<String, PatternRecord> = BTreeMap::new();
        for (header, correlation) in &analysis.correlations {
            let sites = index
                .sites_with(header)
                .map(|bitset| index.urls(bitset))
                .unwrap_or_default();
            let mut metadata = BTreeMap::new();
            metadata.insert(
                "platformSpecificity".to_string(),
                serde_json::json!(correlation.specificity.score),
            );
            metadata.insert(
                "adjustmentFactor".to_string(),
                serde_json::json!(correlation.adjustment.adjustment_factor),
            );
            patterns.insert(
                header.clone(),
                PatternRecord {
                    pattern: header.clone(),
                    site_count: correlation.occurrences,
                    sites,
                    frequency: correlation.frequency,
                    examples: None,
                    metadata: Some(metadata),
                },
            );
        }

        let total_found = patterns.len();
        Ok(AnalysisResult {
            total_sites,
            metadata: result_metadata(self.name(), total_found, total_found, options),
            analyzer_specific: analysis,
            patterns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeSet;

    use crate::types::SiteObservation;

    fn make_site(url: &str, cms: Option<&str>, headers: &[&str]) -> SiteObservation {
        SiteObservation {
            url: format!("https://{url}"),
            normalized_url: url.to_string(),
            cms: cms.map(str::to_string),
            confidence: 0.9,
            headers: headers
                .iter()
                .map(|h| (h.to_string(), BTreeSet::new()))
                .collect(),
            meta_tags: BTreeMap::new(),
            scripts: BTreeSet::new(),
            technologies: BTreeSet::new(),
            captured_at: DateTime::<Utc>::UNIX_EPOCH,
            page_types: BTreeMap::new(),
        }
    }

    fn biased_dataset() -> PreprocessedDataset {
        let mut sites = Vec::new();
        for i in 0..90 {
            sites.push(make_site(
                &format!("wp{i}.example"),
                Some("WordPress"),
                &["x-pingback", "server"],
            ));
        }
        for i in 0..10 {
            sites.push(make_site(&format!("d{i}.example"), Some("Drupal"), &["server"]));
        }
        PreprocessedDataset::from_sites(sites)
    }

    #[test]
    fn cross_analyzer_fields_omitted_without_injection() {
        let result = BiasAnalyzer::new()
            .analyze(&biased_dataset(), &AnalysisOptions::default())
            .expect("analyzes");

        let payload = &result.analyzer_specific;
        assert!(payload.technology_bias.is_none());
        assert!(payload.semantic_bias.is_none());
        assert!(payload.discovery_bias.is_none());
        // The dataset-only passes still ran in full
        assert!(!payload.correlations.is_empty());
        assert!(!payload.warnings.is_empty());
    }

    #[test]
    fn injected_vendor_snapshot_enables_technology_bias() {
        let dataset = biased_dataset();
        let vendor_result = crate::vendor::VendorAnalyzer::new()
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("vendor analyzes");

        let mut analyzer = BiasAnalyzer::new();
        analyzer.set_vendor_data(vendor_result.analyzer_specific);
        let result = analyzer
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("analyzes");

        let technology = result
            .analyzer_specific
            .technology_bias
            .as_ref()
            .expect("assessment present");
        assert!(technology.vendor_hhi > 0.0);
    }

    #[test]
    fn dominance_warning_on_biased_corpus() {
        let result = BiasAnalyzer::new()
            .analyze(&biased_dataset(), &AnalysisOptions::default())
            .expect("analyzes");

        assert!(result
            .analyzer_specific
            .warnings
            .iter()
            .any(|w| matches!(
                w,
                crate::types::BiasWarning::PlatformDominance { cms, .. } if cms == "WordPress"
            )));
    }

    #[test]
    fn summary_counts_significant_headers() {
        let result = BiasAnalyzer::new()
            .analyze(&biased_dataset(), &AnalysisOptions::default())
            .expect("analyzes");

        let summary = &result.analyzer_specific.summary;
        assert!(summary.significant_headers >= 1, "x-pingback skews to WordPress");
        assert!(summary.average_chi_square > 0.0);
        assert!(summary.dataset_quality_score > 0.0 && summary.dataset_quality_score < 1.0);
    }

    #[test]
    fn patterns_mirror_correlations() {
        let result = BiasAnalyzer::new()
            .analyze(&biased_dataset(), &AnalysisOptions::default())
            .expect("analyzes");

        assert_eq!(
            result.patterns.len(),
            result.analyzer_specific.correlations.len()
        );
        let record = &result.patterns["x-pingback"];
        assert_eq!(record.site_count, 90);
        assert_eq!(record.sites.len(), 90);
        assert!((record.frequency - 0.9).abs() < 1e-9);
    }

    #[test]
    fn empty_dataset_yields_empty_bias_analysis() {
        let result = BiasAnalyzer::new()
            .analyze(&PreprocessedDataset::default(), &AnalysisOptions::default())
            .expect("analyzes");
        assert!(result.patterns.is_empty());
        assert!(result.analyzer_specific.correlations.is_empty());
        assert!(result.analyzer_specific.warnings.is_empty());
    }
}

//! Pattern Discovery Analyzer
//!
//! Infers name-shape patterns over corpus header names: shared prefix, suffix
//! and middle tokens (split on `-`), plus structural regex shapes with digit
//! and ID segments substituted by a placeholder. Candidate patterns are
//! significance-tested against a baseline occurrence rate, emerging vendor
//! tokens are proposed when absent from the vendor catalog, and semantic
//! anomalies are flagged when a header's name class disagrees with its
//! co-occurrence neighborhood.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use tracing::debug;

use crate::analyzers::{aggregate::result_metadata, CorpusAnalyzer};
use crate::cooccurrence::classify_header;
use crate::dataset::{SiteBitset, SiteIndex};
use crate::stats::binomial_test;
use crate::types::analysis_thresholds::{DISCOVERY_BASELINE_RATE, VALIDATION_BOOST_CAP};
use crate::types::{
    AnalysisError, AnalysisOptions, AnalysisResult, DiscoveredPattern, DiscoveryAnalysis,
    EmergingVendor, HeaderClass, PatternRecord, PatternShape, PreprocessedDataset,
    SemanticAnomaly, ValidationMetadata,
};
use crate::vendor::VENDOR_CATALOG;

/// Leading tokens never proposed as vendor names
const VENDOR_STOP_LIST: &[&str] = &[
    "x", "cache", "content", "accept", "access", "via", "age", "set", "strict", "cross",
    "permissions", "referrer", "sec", "upgrade", "vary", "server", "transfer", "last",
];

/// Candidate pattern accumulator keyed by fingerprint
#[derive(Debug, Default)]
struct Candidate {
    shape: Option<PatternShape>,
    headers: BTreeSet<String>,
}

/// Matches tokens that are numeric or hex identifiers rather than words
fn id_token_pattern() -> &'static Regex {
    static ID_TOKEN: OnceLock<Regex> = OnceLock::new();
    ID_TOKEN.get_or_init(|| {
        Regex::new(r"^(?:[0-9]+|[0-9a-f]{8,})$").expect("static pattern compiles")
    })
}

/// Substitute digit/ID tokens with a placeholder to derive a shape class
fn shape_of(header: &str) -> Option<String> {
    let tokens: Vec<&str> = header.split('-').collect();
    if tokens.len() < 2 {
        return None;
    }
    let rendered: Vec<String> = tokens
        .iter()
        .map(|token| {
            if !token.is_empty() && id_token_pattern().is_match(token) {
                "{id}".to_string()
            } else if *token == "x" {
                "x".to_string()
            } else {
                "{word}".to_string()
            }
        })
        .collect();
    Some(rendered.join("-"))
}

/// Discovery analyzer over header name structure
#[derive(Debug, Default)]
pub struct DiscoveryAnalyzer {
    validation: Option<ValidationMetadata>,
}

impl DiscoveryAnalyzer {
    pub fn new() -> Self {
        Self { validation: None }
    }

    /// Inject a validation snapshot; boosts discovered-pattern confidence.
    /// Falls back to dataset validation metadata when absent.
    pub fn set_validation_data(&mut self, snapshot: ValidationMetadata) {
        self.validation = Some(snapshot);
    }

    /// Collect prefix/suffix/contains/shape candidates over header names
    fn collect_candidates(headers: &[&str]) -> BTreeMap<String, Candidate> {
        let mut candidates: BTreeMap<String, Candidate> = BTreeMap::new();
        let mut push = |key: String, shape: PatternShape, header: &str| {
            let entry = candidates.entry(key).or_default();
            entry.shape.get_or_insert(shape);
            entry.headers.insert(header.to_string());
        };

        for &header in headers {
            let tokens: Vec<&str> = header.split('-').filter(|t| !t.is_empty()).collect();
            if tokens.len() >= 2 {
                // Leading "x" is a convention, not a vendor token; prefix
                // candidates skip past it
                let lead = if tokens[0] == "x" && tokens.len() >= 3 {
                    tokens[1]
                } else {
                    tokens[0]
                };
                push(format!("prefix:{lead}"), PatternShape::Prefix, header);

                if let Some(last) = tokens.last() {
                    push(format!("suffix:{last}"), PatternShape::Suffix, header);
                }
                for middle in &tokens[1..tokens.len().saturating_sub(1)] {
                    if *middle != lead {
                        push(format!("contains:{middle}"), PatternShape::Contains, header);
                    }
                }
            }
            if let Some(shape) = shape_of(header) {
                push(format!("shape:{shape}"), PatternShape::RegexShape, header);
            }
        }

        // A single-header "pattern" is just the header again
        candidates.retain(|_, c| c.headers.len() >= 2);
        candidates
    }

    /// Union of site bitsets across a candidate's member headers
    fn union_sites(index: &SiteIndex, headers: &BTreeSet<String>) -> SiteBitset {
        let mut union = SiteBitset::with_capacity(index.total_sites());
        for header in headers {
            if let Some(bitset) = index.sites_with(header) {
                for id in bitset.iter() {
                    union.insert(id);
                }
            }
        }
        union
    }

    /// CMS label -> fraction of matching sites carrying that label
    fn cms_correlation(index: &SiteIndex, sites: &SiteBitset) -> BTreeMap<String, f64> {
        let total = sites.len();
        if total == 0 {
            return BTreeMap::new();
        }
        index
            .cms_groups()
            .iter()
            .filter_map(|(cms, members)| {
                let overlap = sites.intersection_count(members);
                if overlap == 0 {
                    None
                } else {
                    Some((cms.clone(), overlap as f64 / total as f64))
                }
            })
            .collect()
    }

    /// Emerging vendors: multi-header, multi-site prefix tokens missing from
    /// the catalog
    fn emerging_vendors(
        candidates: &BTreeMap<String, Candidate>,
        index: &SiteIndex,
    ) -> Vec<EmergingVendor> {
        let catalog_names: BTreeSet<String> = VENDOR_CATALOG
            .iter()
            .map(|v| v.name.to_ascii_lowercase().replace(' ', ""))
            .collect();

        let mut vendors = Vec::new();
        for (key, candidate) in candidates {
            let Some(token) = key.strip_prefix("prefix:") else {
                continue;
            };
            if VENDOR_STOP_LIST.contains(&token) {
                continue;
            }
            if catalog_names
                .iter()
                .any(|name| name.contains(token) || token.contains(name.as_str()))
            {
                continue;
            }
            let sites = Self::union_sites(index, &candidate.headers);
            if candidate.headers.len() < 2 || sites.len() < 2 {
                continue;
            }

            let confidence = (0.4
                + 0.1 * (candidate.headers.len() as f64 - 2.0).min(3.0)
                + 0.1 * (sites.len() as f64).log10().min(2.0))
            .clamp(0.0, 1.0);

            vendors.push(EmergingVendor {
                token: token.to_string(),
                headers: candidate.headers.clone(),
                site_count: sites.len(),
                confidence,
            });
        }

        vendors.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.token.cmp(&b.token))
        });
        vendors
    }

    /// Semantic anomalies: declared name class versus the dominant class of
    /// the co-occurrence neighborhood
    fn semantic_anomalies(index: &SiteIndex, headers: &[&str]) -> Vec<SemanticAnomaly> {
        let mut anomalies = Vec::new();

        for &header in headers {
            let declared = classify_header(header);
            if declared == HeaderClass::Custom {
                continue;
            }
            let Some(own_sites) = index.sites_with(header) else {
                continue;
            };
            let own_count = own_sites.len();
            if own_count == 0 {
                continue;
            }

            // Neighborhood: headers sharing more than half of this header's sites
            let mut class_counts: BTreeMap<HeaderClass, usize> = BTreeMap::new();
            let mut neighborhood = 0usize;
            for &other in headers {
                if other == header {
                    continue;
                }
                let Some(other_sites) = index.sites_with(other) else {
                    continue;
                };
                let overlap = own_sites.intersection_count(other_sites);
                if (overlap as f64 / own_count as f64) > 0.5 {
                    *class_counts.entry(classify_header(other)).or_default() += 1;
                    neighborhood += 1;
                }
            }
            if neighborhood < 2 {
                continue;
            }

            let Some((&observed, &dominant_count)) =
                class_counts.iter().max_by_key(|(_, &count)| count)
            else {
                continue;
            };
            if observed == declared || observed == HeaderClass::Custom {
                continue;
            }
            let confidence = dominant_count as f64 / neighborhood as f64;
            if confidence <= 0.5 {
                continue;
            }

            anomalies.push(SemanticAnomaly {
                header: header.to_string(),
                declared_class: declared,
                observed_class: observed,
                confidence,
            });
        }

        anomalies.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.header.cmp(&b.header))
        });
        anomalies
    }
}

impl CorpusAnalyzer for DiscoveryAnalyzer {
    type Payload = DiscoveryAnalysis;

    fn name(&self) -> &'static str {
        "PatternDiscoveryV2"
    }

    fn analyze(
        &self,
        dataset: &PreprocessedDataset,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult<Self::Payload>, AnalysisError> {
        options.validate()?;

        let index = SiteIndex::build(dataset);
        let headers: Vec<&str> = index.header_names().collect();
        let total_sites = dataset.total_sites;

        let candidates = Self::collect_candidates(&headers);
        let total_found = candidates.len();
        debug!(candidates = total_found, "Collected discovery candidates");

        let validation = self
            .validation
            .as_ref()
            .or(dataset.metadata.validation.as_ref());
        let (boost, boost_applied) = match validation {
            Some(v) => (
                (1.0 + v.quality_score * 0.2).min(VALIDATION_BOOST_CAP),
                true,
            ),
            None => (1.0, false),
        };

        let mut discovered = Vec::new();
        let mut patterns: BTreeMap<String, PatternRecord> = BTreeMap::new();

        for (fingerprint, candidate) in &candidates {
            let sites = Self::union_sites(&index, &candidate.headers);
            let site_count = sites.len();
            if site_count < options.min_occurrences {
                continue;
            }

            let frequency = if total_sites > 0 {
                site_count as f64 / total_sites as f64
            } else {
                0.0
            };
            let test = binomial_test(site_count, total_sites, DISCOVERY_BASELINE_RATE);

            let mut confidence = 0.4
                + 0.1 * (candidate.headers.len() as f64 - 1.0).min(3.0)
                + if test.significant { 0.2 } else { 0.0 };
            confidence = (confidence * boost).clamp(0.0, 1.0);

            let inferred_vendor = fingerprint.strip_prefix("prefix:").and_then(|token| {
                if VENDOR_STOP_LIST.contains(&token) {
                    None
                } else {
                    Some(token.to_string())
                }
            });

            let shape = candidate.shape.unwrap_or(PatternShape::Prefix);
            let site_urls = index.urls(&sites);

            discovered.push(DiscoveredPattern {
                pattern: fingerprint.clone(),
                shape,
                headers: candidate.headers.clone(),
                site_count,
                sites: site_urls.clone(),
                frequency,
                p_value: test.p_value,
                significant: test.significant,
                confidence,
                inferred_vendor,
                cms_correlation: Self::cms_correlation(&index, &sites),
                validation_boost_applied: boost_applied,
            });

            patterns.insert(
                fingerprint.clone(),
                PatternRecord {
                    pattern: fingerprint.clone(),
                    site_count,
                    sites: site_urls,
                    frequency,
                    examples: None,
                    metadata: None,
                },
            );
        }

        discovered.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.pattern.cmp(&b.pattern))
        });

        let emerging_vendors = Self::emerging_vendors(&candidates, &index);
        let anomalies = Self::semantic_anomalies(&index, &headers);

        Ok(AnalysisResult {
            total_sites,
            metadata: result_metadata(self.name(), total_found, patterns.len(), options),
            analyzer_specific: DiscoveryAnalysis {
                discovered,
                emerging_vendors,
                anomalies,
            },
            patterns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

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

    #[test]
    fn shape_substitutes_ids_and_digits() {
        assert_eq!(shape_of("x-cache-status"), Some("x-{word}-{word}".to_string()));
        assert_eq!(shape_of("x-request-12345"), Some("x-{word}-{id}".to_string()));
        assert_eq!(
            shape_of("x-trace-deadbeef01"),
            Some("x-{word}-{id}".to_string())
        );
        assert_eq!(shape_of("server"), None);
    }

    #[test]
    fn prefix_patterns_span_multiple_headers() {
        let sites: Vec<_> = (0..6)
            .map(|i| {
                make_site(
                    &format!("s{i}.example"),
                    None,
                    &["x-shopify-stage", "x-shopify-shop-id"],
                )
            })
            .collect();
        let dataset = PreprocessedDataset::from_sites(sites);

        let result = DiscoveryAnalyzer::new()
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("analyzes");

        let prefix = result
            .analyzer_specific
            .discovered
            .iter()
            .find(|p| p.pattern == "prefix:shopify")
            .expect("shopify prefix discovered");
        assert_eq!(prefix.shape, PatternShape::Prefix);
        assert_eq!(prefix.headers.len(), 2);
        assert_eq!(prefix.site_count, 6);
        assert_eq!(prefix.inferred_vendor.as_deref(), Some("shopify"));
    }

    #[test]
    fn single_header_candidates_dropped() {
        let dataset = PreprocessedDataset::from_sites(vec![
            make_site("a.example", None, &["x-lonely-header"]),
            make_site("b.example", None, &["unrelated"]),
        ]);

        let result = DiscoveryAnalyzer::new()
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("analyzes");
        assert!(
            !result.patterns.keys().any(|k| k.contains("lonely")),
            "patterns spanning one header are not patterns"
        );
    }

    #[test]
    fn cms_correlation_fractions_sum_over_matches() {
        let mut sites = vec![
            make_site("wp1.example", Some("WordPress"), &["x-acme-a", "x-acme-b"]),
            make_site("wp2.example", Some("WordPress"), &["x-acme-a", "x-acme-b"]),
        ];
        sites.push(make_site("d1.example", Some("Drupal"), &["x-acme-a", "x-acme-b"]));
        let dataset = PreprocessedDataset::from_sites(sites);

        let result = DiscoveryAnalyzer::new()
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("analyzes");

        let pattern = result
            .analyzer_specific
            .discovered
            .iter()
            .find(|p| p.pattern == "prefix:acme")
            .expect("acme prefix discovered");
        assert!((pattern.cms_correlation["WordPress"] - 2.0 / 3.0).abs() < 1e-9);
        assert!((pattern.cms_correlation["Drupal"] - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn emerging_vendor_proposed_when_absent_from_catalog() {
        let sites: Vec<_> = (0..4)
            .map(|i| {
                make_site(
                    &format!("s{i}.example"),
                    None,
                    &["x-acmecorp-cache", "x-acmecorp-node"],
                )
            })
            .collect();
        let dataset = PreprocessedDataset::from_sites(sites);

        let result = DiscoveryAnalyzer::new()
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("analyzes");

        let emerging = &result.analyzer_specific.emerging_vendors;
        assert!(
            emerging.iter().any(|v| v.token == "acmecorp"),
            "got {:?}",
            emerging.iter().map(|v| &v.token).collect::<Vec<_>>()
        );
    }

    #[test]
    fn known_vendor_prefixes_not_proposed_as_emerging() {
        let sites: Vec<_> = (0..4)
            .map(|i| {
                make_site(
                    &format!("s{i}.example"),
                    None,
                    &["x-shopify-stage", "x-shopify-shop-id"],
                )
            })
            .collect();
        let dataset = PreprocessedDataset::from_sites(sites);

        let result = DiscoveryAnalyzer::new()
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("analyzes");
        assert!(!result
            .analyzer_specific
            .emerging_vendors
            .iter()
            .any(|v| v.token == "shopify"));
    }

    #[test]
    fn validation_context_boosts_confidence() {
        let sites: Vec<_> = (0..4)
            .map(|i| make_site(&format!("s{i}.example"), None, &["x-acme-a", "x-acme-b"]))
            .collect();
        let dataset = PreprocessedDataset::from_sites(sites);

        let plain = DiscoveryAnalyzer::new()
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("plain run");

        let mut boosted_analyzer = DiscoveryAnalyzer::new();
        boosted_analyzer.set_validation_data(ValidationMetadata {
            validated_patterns: BTreeMap::new(),
            quality_score: 1.0,
            validation_passed: true,
        });
        let boosted = boosted_analyzer
            .analyze(&dataset, &AnalysisOptions::default())
            .expect("boosted run");

        let find = |result: &AnalysisResult<DiscoveryAnalysis>| {
            result
                .analyzer_specific
                .discovered
                .iter()
                .find(|p| p.pattern == "prefix:acme")
                .map(|p| (p.confidence, p.validation_boost_applied))
                .expect("acme present")
        };
        let (plain_confidence, plain_flag) = find(&plain);
        let (boosted_confidence, boosted_flag) = find(&boosted);

        assert!(!plain_flag);
        assert!(boosted_flag);
        assert!(boosted_confidence >= plain_confidence);
    }
}

//! Pipeline Integration Tests
//!
//! Exercises the full analysis sequence through AnalysisCoordinator with a
//! synthetic corpus. Asserts on pattern-record invariants, validation stage
//! counts, bias warnings, and recommendation distribution integrity.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use sitelens::config::AnalysisConfig;
use sitelens::pipeline::AnalysisCoordinator;
use sitelens::types::{
    AnalysisOptions, BiasWarning, HeaderClassification, PatternRecord, PreprocessedDataset,
    RecommendationAction, SemanticMetadata, SiteObservation,
};

/// Build one synthetic site observation
fn make_site(
    url: &str,
    cms: Option<&str>,
    confidence: f64,
    headers: &[(&str, &str)],
    meta_tags: &[(&str, &str)],
    scripts: &[&str],
) -> SiteObservation {
    let mut header_map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (name, value) in headers {
        header_map
            .entry(name.to_string())
            .or_default()
            .insert(value.to_string());
    }
    let mut meta_map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (name, value) in meta_tags {
        meta_map
            .entry(name.to_string())
            .or_default()
            .insert(value.to_string());
    }
    SiteObservation {
        url: format!("https://{url}"),
        normalized_url: url.to_string(),
        cms: cms.map(str::to_string),
        confidence,
        headers: header_map,
        meta_tags: meta_map,
        scripts: scripts.iter().map(|s| s.to_string()).collect(),
        technologies: BTreeSet::new(),
        captured_at: DateTime::<Utc>::UNIX_EPOCH,
        page_types: BTreeMap::new(),
    }
}

/// A WordPress-heavy corpus with a Drupal minority and a few unlabeled sites
fn synthetic_corpus() -> PreprocessedDataset {
    let mut sites = Vec::new();
    for i in 0..14 {
        sites.push(make_site(
            &format!("wp{i}.example"),
            Some("WordPress"),
            0.9,
            &[
                ("x-pingback", "https://wp.example/xmlrpc.php"),
                ("server", "nginx"),
                ("cf-ray", "8a1b2c3d4e5f"),
            ],
            &[
                ("name:generator", "WordPress 6.4"),
                ("property:og:type", "website"),
                ("name:viewport", "width=device-width"),
            ],
            &["https://wp.example/wp-includes/js/jquery.min.js"],
        ));
    }
    for i in 0..4 {
        sites.push(make_site(
            &format!("drupal{i}.example"),
            Some("Drupal"),
            0.8,
            &[("x-drupal-cache", "HIT"), ("server", "apache")],
            &[
                ("name:generator", "Drupal 10"),
                ("name:twitter:card", "summary"),
            ],
            &["https://drupal.example/core/misc/drupal.js"],
        ));
    }
    for i in 0..2 {
        sites.push(make_site(
            &format!("unknown{i}.example"),
            None,
            0.0,
            &[("server", "cloudflare"), ("cf-ray", "9f8e7d6c")],
            &[],
            &[],
        ));
    }
    PreprocessedDataset::from_sites(sites)
}

fn assert_pattern_invariants(patterns: &BTreeMap<String, PatternRecord>, total_sites: usize) {
    for (key, record) in patterns {
        assert_eq!(
            record.site_count,
            record.sites.len(),
            "{key}: site_count must equal |sites|"
        );
        let derived = record.site_count as f64 / total_sites.max(1) as f64;
        assert!(
            (record.frequency - derived).abs() < 1e-9,
            "{key}: frequency must derive from site_count"
        );
        assert!(
            (0.0..=1.0).contains(&record.frequency),
            "{key}: frequency must be a probability"
        );
    }
}

#[test]
fn full_pipeline_preserves_pattern_invariants() {
    let dataset = synthetic_corpus();
    let report = AnalysisCoordinator::new().run(&dataset).expect("pipeline runs");

    assert_eq!(report.total_sites, 20);
    assert_pattern_invariants(&report.headers.patterns, 20);
    assert_pattern_invariants(&report.meta_tags.patterns, 20);
    assert_pattern_invariants(&report.scripts.patterns, 20);
    assert_pattern_invariants(&report.cooccurrence.patterns, 20);
    assert_pattern_invariants(&report.discovery.patterns, 20);
    assert_pattern_invariants(&report.bias.patterns, 20);
}

#[test]
fn classifier_maps_are_subsets_of_pattern_keys() {
    let report = AnalysisCoordinator::new()
        .run(&synthetic_corpus())
        .expect("pipeline runs");

    let meta = &report.meta_tags;
    for tag in meta
        .analyzer_specific
        .og_tags
        .iter()
        .chain(meta.analyzer_specific.twitter_tags.iter())
    {
        assert!(meta.patterns.contains_key(tag), "{tag} missing from patterns");
    }
}

#[test]
fn validation_summary_counts_add_up() {
    let report = AnalysisCoordinator::new()
        .run(&synthetic_corpus())
        .expect("pipeline runs");

    let validation = &report.validation;
    assert_eq!(validation.stages.len(), 7);
    assert_eq!(validation.stages_passed + validation.stages_failed, 7);
}

#[test]
fn bias_flags_wordpress_dominance() {
    let report = AnalysisCoordinator::new()
        .run(&synthetic_corpus())
        .expect("pipeline runs");

    let bias = &report.bias.analyzer_specific;
    assert!(
        bias.warnings.iter().any(|w| matches!(
            w,
            BiasWarning::PlatformDominance { cms, .. } if cms == "WordPress"
        )),
        "WordPress holds 70% of the corpus"
    );

    // x-pingback only appears on WordPress sites
    let pingback = &bias.correlations["x-pingback"];
    assert_eq!(
        pingback.conditionals.max_cms_given_header, 1.0,
        "every x-pingback carrier is WordPress"
    );
}

#[test]
fn vendor_detections_survive_into_cooccurrence_labels() {
    let report = AnalysisCoordinator::new()
        .run(&synthetic_corpus())
        .expect("pipeline runs");

    assert!(report
        .vendor
        .analyzer_specific
        .detections
        .contains_key("cf-ray"));
    assert!(report
        .cooccurrence
        .analyzer_specific
        .pairs
        .iter()
        .any(|p| p.vendor_a.as_deref() == Some("Cloudflare")
            || p.vendor_b.as_deref() == Some("Cloudflare")));
}

#[test]
fn recommendations_are_well_formed() {
    let report = AnalysisCoordinator::new()
        .run(&synthetic_corpus())
        .expect("pipeline runs");

    let recs = &report.recommendations;
    assert!(!recs.recommendations.is_empty());
    for rec in &recs.recommendations {
        assert!(matches!(
            rec.action,
            RecommendationAction::Filter | RecommendationAction::Retain
        ));
        assert!((0.0..=1.0).contains(&rec.confidence.value));
        assert!(!rec.reasoning.is_empty());
    }
    assert!(
        (recs.distribution.total() - 1.0).abs() < 1e-5,
        "confidence distribution must sum to 1"
    );
}

#[test]
fn rerun_is_idempotent() {
    let dataset = synthetic_corpus();
    let first = AnalysisCoordinator::new().run(&dataset).expect("run 1");
    let second = AnalysisCoordinator::new().run(&dataset).expect("run 2");

    assert_eq!(first.headers.patterns, second.headers.patterns);
    assert_eq!(first.meta_tags.patterns, second.meta_tags.patterns);
    assert_eq!(first.scripts.patterns, second.scripts.patterns);
    assert_eq!(
        first.bias.analyzer_specific.concentration.hhi,
        second.bias.analyzer_specific.concentration.hhi
    );
    assert_eq!(
        first.recommendations.recommendations.len(),
        second.recommendations.recommendations.len()
    );
}

#[test]
fn empty_dataset_produces_empty_but_valid_report() {
    let dataset = PreprocessedDataset::default();
    let report = AnalysisCoordinator::new().run(&dataset).expect("pipeline runs");

    assert_eq!(report.total_sites, 0);
    assert!(report.headers.patterns.is_empty());
    assert!(report.vendor.analyzer_specific.detections.is_empty());
    assert!(report.bias.analyzer_specific.warnings.is_empty());
    assert_eq!(report.validation.stages.len(), 7);
}

#[test]
fn single_site_corpus_errors_on_sample_size_stage() {
    let dataset = PreprocessedDataset::from_sites(vec![make_site(
        "only.example",
        Some("WordPress"),
        0.9,
        &[("server", "nginx")],
        &[],
        &[],
    )]);
    let report = AnalysisCoordinator::new().run(&dataset).expect("pipeline runs");

    let sample_stage = report
        .validation
        .stages
        .iter()
        .find(|s| s.stage == "SampleSizeValidation")
        .expect("stage present");
    assert!(!sample_stage.errors.is_empty());
    assert!(!report.validation.overall_passed);
    // Analyzers still returned valid outputs
    assert!(!report.headers.patterns.is_empty());
}

#[test]
fn semantic_metadata_drives_filter_recommendations() {
    let mut dataset = synthetic_corpus();
    let mut semantic = SemanticMetadata::default();
    semantic
        .categories
        .insert("x-pingback".to_string(), "platform".to_string());
    semantic
        .categories
        .insert("server".to_string(), "infrastructure".to_string());
    semantic.categories.insert(
        "strict-transport-security".to_string(),
        "security".to_string(),
    );
    semantic.classifications.insert(
        "x-pingback".to_string(),
        HeaderClassification {
            category: "platform".to_string(),
            discriminative_score: 0.95,
            recommend_filter: false,
        },
    );
    dataset.metadata.semantic = Some(semantic);

    let report = AnalysisCoordinator::new().run(&dataset).expect("pipeline runs");

    let pingback = report
        .recommendations
        .recommendations
        .iter()
        .find(|r| r.pattern == "x-pingback")
        .expect("recommendation for x-pingback");
    assert_eq!(pingback.action, RecommendationAction::Retain);
    assert!((pingback.confidence.value - 0.95).abs() < 1e-9);

    // Semantic analyzer now produces patterns for classified headers
    assert!(report.semantic.patterns.contains_key("x-pingback"));
}

#[test]
fn larger_min_occurrences_only_removes_patterns() {
    let dataset = synthetic_corpus();

    let loose = AnalysisCoordinator::new().run(&dataset).expect("loose run");

    let mut config = AnalysisConfig::default();
    config.options = AnalysisOptions {
        min_occurrences: 5,
        ..AnalysisOptions::default()
    };
    let strict = AnalysisCoordinator::with_config(config)
        .run(&dataset)
        .expect("strict run");

    for (key, record) in &strict.headers.patterns {
        let loose_record = loose
            .headers
            .patterns
            .get(key)
            .unwrap_or_else(|| panic!("{key} missing from loose run"));
        assert_eq!(record.site_count, loose_record.site_count);
    }
    assert!(strict.headers.patterns.len() <= loose.headers.patterns.len());
    assert!(!strict.headers.patterns.contains_key("x-drupal-cache"));
}

//! Script URL frequency analyzer
//!
//! Fingerprints script sources two ways: by serving host (`host:{hostname}`)
//! and, for recognized library file names, by library token (`lib:{name}`).
//! The payload separates first-party from third-party hosts relative to each
//! site's own host.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::aggregate::{result_metadata, PatternAggregator};
use super::CorpusAnalyzer;
use crate::types::{AnalysisError, AnalysisOptions, AnalysisResult, PreprocessedDataset};

/// Library file-name stems recognized in script paths
const KNOWN_LIBRARIES: &[&str] = &[
    "jquery",
    "react",
    "angular",
    "vue",
    "bootstrap",
    "modernizr",
    "underscore",
    "lodash",
    "gtag",
    "analytics",
    "gtm",
    "wp-embed",
    "wp-emoji-release",
    "drupal",
    "prototype",
    "mootools",
];

/// Analyzer-specific payload of the script analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptAnalysis {
    /// Hosts serving scripts to sites other than their own
    pub third_party_hosts: BTreeSet<String>,
    /// Recognized library tokens (subset of `lib:` pattern keys)
    pub libraries: BTreeSet<String>,
    /// Sites serving at least one script from their own host
    pub first_party_sites: usize,
}

/// Extract the lowercased host from a script URL, tolerating scheme-relative
/// and relative URLs
fn script_host(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .or_else(|| url.strip_prefix("//"))?;
    let host = rest.split(['/', '?', '#']).next()?;
    // Strip credentials and ports
    let host = host.rsplit('@').next()?.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

/// Match a script path against the known library stems
fn library_token(url: &str) -> Option<&'static str> {
    let file = url
        .split(['?', '#'])
        .next()?
        .rsplit('/')
        .next()?
        .to_ascii_lowercase();
    KNOWN_LIBRARIES
        .iter()
        .find(|lib| {
            file == format!("{lib}.js")
                || file == format!("{lib}.min.js")
                || file.starts_with(&format!("{lib}-"))
                || file.starts_with(&format!("{lib}."))
        })
        .copied()
}

/// Host of the site itself, from its normalized URL
fn site_host(normalized_url: &str) -> String {
    script_host(normalized_url)
        .unwrap_or_else(|| normalized_url.split('/').next().unwrap_or("").to_ascii_lowercase())
}

/// Frequency analysis over script URLs
#[derive(Debug, Default)]
pub struct ScriptAnalyzer;

impl ScriptAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl CorpusAnalyzer for ScriptAnalyzer {
    type Payload = ScriptAnalysis;

    fn name(&self) -> &'static str {
        "ScriptAnalyzerV2"
    }

    fn analyze(
        &self,
        dataset: &PreprocessedDataset,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult<Self::Payload>, AnalysisError> {
        options.validate()?;

        let mut aggregator = PatternAggregator::new(dataset.total_sites);
        let mut third_party_hosts = BTreeSet::new();
        let mut libraries = BTreeSet::new();
        let mut first_party_sites = 0usize;

        for (url, site) in &dataset.sites {
            let own_host = site_host(url);
            let mut served_first_party = false;

            for script in &site.scripts {
                if let Some(host) = script_host(script) {
                    aggregator.observe(&format!("host:{host}"), url, [script.as_str()]);
                    if host == own_host {
                        served_first_party = true;
                    } else {
                        third_party_hosts.insert(host);
                    }
                }
                if let Some(lib) = library_token(script) {
                    aggregator.observe(&format!("lib:{lib}"), url, [script.as_str()]);
                    libraries.insert(lib.to_string());
                }
            }
            if served_first_party {
                first_party_sites += 1;
            }
        }

        let total_found = aggregator.total_found();
        let patterns = aggregator.finish(options, false);

        // Keep the library roll-up consistent with the filtered pattern set
        libraries.retain(|lib| patterns.contains_key(&format!("lib:{lib}")));
        third_party_hosts.retain(|host| patterns.contains_key(&format!("host:{host}")));

        Ok(AnalysisResult {
            total_sites: dataset.total_sites,
            metadata: result_metadata(self.name(), total_found, patterns.len(), options),
            analyzer_specific: ScriptAnalysis {
                third_party_hosts,
                libraries,
                first_party_sites,
            },
            patterns,
        })
    }
}

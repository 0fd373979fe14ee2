//! Interned site index with dense bitsets
//!
//! The nested `header -> cms -> site set` aggregations the analyzers need are
//! backed by a flat arena: sites get small integer IDs and membership is a
//! dense bitset, so pair intersections are popcounts and per-CMS
//! cardinalities are O(1) words. Built once per run from the read-only
//! dataset; analyzers share it immutably.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{PreprocessedDataset, SiteObservation};

/// Dense bitset over interned site IDs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteBitset {
    words: Vec<u64>,
}

impl SiteBitset {
    /// Empty set sized for `capacity` sites
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
        }
    }

    /// Mark a site ID as present
    pub fn insert(&mut self, id: usize) {
        let word = id / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (id % 64);
    }

    /// Whether a site ID is present
    pub fn contains(&self, id: usize) -> bool {
        self.words
            .get(id / 64)
            .is_some_and(|w| w & (1 << (id % 64)) != 0)
    }

    /// Cardinality by popcount
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// |self AND other| without materializing the intersection
    pub fn intersection_count(&self, other: &Self) -> usize {
        self.words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum()
    }

    /// Materialized intersection
    pub fn intersection(&self, other: &Self) -> Self {
        let words = self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| a & b)
            .collect();
        Self { words }
    }

    /// Iterate present site IDs in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &word)| {
            (0..64).filter_map(move |bit| {
                if word & (1 << bit) != 0 {
                    Some(wi * 64 + bit)
                } else {
                    None
                }
            })
        })
    }
}

/// Flat arena over the dataset: interned site IDs, per-header membership
/// bitsets, and per-CMS group bitsets
#[derive(Debug, Clone)]
pub struct SiteIndex {
    site_urls: Vec<String>,
    id_by_url: BTreeMap<String, usize>,
    total_sites: usize,
    headers: BTreeMap<String, SiteBitset>,
    cms_groups: BTreeMap<String, SiteBitset>,
}

impl SiteIndex {
    /// Build the index over every header in the dataset
    pub fn build(dataset: &PreprocessedDataset) -> Self {
        Self::build_filtered(dataset, None)
    }

    /// Build the index restricted to an allowed header subset (the validated
    /// headers from dataset metadata, when present)
    pub fn build_with_headers(
        dataset: &PreprocessedDataset,
        allowed: &BTreeSet<String>,
    ) -> Self {
        Self::build_filtered(dataset, Some(allowed))
    }

    fn build_filtered(
        dataset: &PreprocessedDataset,
        allowed: Option<&BTreeSet<String>>,
    ) -> Self {
        let total_sites = dataset.sites.len();
        let mut site_urls = Vec::with_capacity(total_sites);
        let mut id_by_url = BTreeMap::new();
        let mut headers: BTreeMap<String, SiteBitset> = BTreeMap::new();
        let mut cms_groups: BTreeMap<String, SiteBitset> = BTreeMap::new();

        for (id, (url, site)) in dataset.sites.iter().enumerate() {
            site_urls.push(url.clone());
            id_by_url.insert(url.clone(), id);

            for header in site.headers.keys() {
                if let Some(allowed) = allowed {
                    if !allowed.contains(header) {
                        continue;
                    }
                }
                headers
                    .entry(header.clone())
                    .or_insert_with(|| SiteBitset::with_capacity(total_sites))
                    .insert(id);
            }

            cms_groups
                .entry(site.cms_label().to_string())
                .or_insert_with(|| SiteBitset::with_capacity(total_sites))
                .insert(id);
        }

        Self {
            site_urls,
            id_by_url,
            total_sites,
            headers,
            cms_groups,
        }
    }

    pub fn total_sites(&self) -> usize {
        self.total_sites
    }

    /// Interned ID of a normalized URL
    pub fn id_of(&self, url: &str) -> Option<usize> {
        self.id_by_url.get(url).copied()
    }

    /// Normalized URL of an interned ID
    pub fn url_of(&self, id: usize) -> Option<&str> {
        self.site_urls.get(id).map(String::as_str)
    }

    /// All indexed header names, ascending
    pub fn header_names(&self) -> impl Iterator<Item = &str> {
        self.headers.keys().map(String::as_str)
    }

    /// Membership bitset for a header
    pub fn sites_with(&self, header: &str) -> Option<&SiteBitset> {
        self.headers.get(header)
    }

    /// Corpus frequency of a header
    pub fn header_frequency(&self, header: &str) -> f64 {
        if self.total_sites == 0 {
            return 0.0;
        }
        self.headers
            .get(header)
            .map_or(0.0, |b| b.len() as f64 / self.total_sites as f64)
    }

    /// CMS label -> member bitset
    pub fn cms_groups(&self) -> &BTreeMap<String, SiteBitset> {
        &self.cms_groups
    }

    /// The site observation backing an interned ID
    pub fn site<'d>(
        &self,
        dataset: &'d PreprocessedDataset,
        id: usize,
    ) -> Option<&'d SiteObservation> {
        self.url_of(id).and_then(|url| dataset.sites.get(url))
    }

    /// Render a bitset back to normalized URLs
    pub fn urls(&self, bitset: &SiteBitset) -> BTreeSet<String> {
        bitset
            .iter()
            .filter_map(|id| self.url_of(id).map(str::to_string))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

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

    fn make_dataset() -> PreprocessedDataset {
        PreprocessedDataset::from_sites(vec![
            make_site("a.example", Some("WordPress"), &["server", "x-powered-by"]),
            make_site("b.example", Some("WordPress"), &["server"]),
            make_site("c.example", None, &["server", "cf-ray"]),
        ])
    }

    #[test]
    fn bitset_popcount_and_intersection() {
        let mut a = SiteBitset::with_capacity(100);
        let mut b = SiteBitset::with_capacity(100);
        for i in [1, 5, 64, 99] {
            a.insert(i);
        }
        for i in [5, 64, 70] {
            b.insert(i);
        }
        assert_eq!(a.len(), 4);
        assert_eq!(a.intersection_count(&b), 2);
        assert_eq!(a.intersection(&b).iter().collect::<Vec<_>>(), vec![5, 64]);
    }

    #[test]
    fn index_counts_headers_by_distinct_site() {
        let index = SiteIndex::build(&make_dataset());
        assert_eq!(index.total_sites(), 3);
        assert_eq!(index.sites_with("server").map(SiteBitset::len), Some(3));
        assert_eq!(index.sites_with("cf-ray").map(SiteBitset::len), Some(1));
        assert!((index.header_frequency("server") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cms_groups_apply_unknown_convention() {
        let index = SiteIndex::build(&make_dataset());
        let groups = index.cms_groups();
        assert_eq!(groups.get("WordPress").map(SiteBitset::len), Some(2));
        assert_eq!(groups.get("Unknown").map(SiteBitset::len), Some(1));
    }

    #[test]
    fn header_restriction_drops_unlisted_headers() {
        let allowed: BTreeSet<String> = ["server".to_string()].into_iter().collect();
        let index = SiteIndex::build_with_headers(&make_dataset(), &allowed);
        assert!(index.sites_with("server").is_some());
        assert!(index.sites_with("cf-ray").is_none());
    }

    #[test]
    fn urls_round_trip_through_ids() {
        let index = SiteIndex::build(&make_dataset());
        let bitset = index.sites_with("x-powered-by").expect("indexed");
        let urls = index.urls(bitset);
        assert_eq!(urls.into_iter().collect::<Vec<_>>(), vec!["a.example"]);
    }
}

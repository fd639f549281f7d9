//! The core match decision: given a searchee and a candidate's fetched
//! torrent metadata, decide MATCH / MATCH_PARTIAL / MATCH_SIZE_ONLY /
//! NO_MATCH (or one of the rejection/error decisions).
//!
//! Grounded structurally on the teacher's `decision::engine` (a `*Engine`
//! struct holding config, exposing one decision entry point backed by small
//! per-rule helper methods) — the rules themselves are new: the teacher
//! ranks releases by quality score, this engine compares file trees.

use cross_seed_core::error::DecisionKind;
use cross_seed_core::models::{Candidate, Searchee, TorrentMetadata};
use cross_seed_core::MatcherConfig;
use std::collections::HashMap;

pub struct MatchEngine {
    config: MatcherConfig,
}

/// Files already known to exist locally, by infoHash — used for the
/// INFO_HASH_ALREADY_EXISTS dedup check (§4.5 step 3).
pub struct KnownState<'a> {
    pub known_info_hashes: &'a [String],
}

impl MatchEngine {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Step 1: size prefilter, run before any network fetch. Skipped
    /// whenever partial or size-only matching is enabled, since both rely on
    /// `decide()` seeing candidates whose size legitimately diverges from
    /// the searchee's (a single episode against a season pack, a renamed
    /// file of the same length) — the bag comparison in `decide()` is what
    /// actually rejects those, not a size gate.
    pub fn size_prefilter(&self, searchee: &Searchee, candidate_size: u64) -> Option<DecisionKind> {
        if searchee.total_size == 0 {
            return None;
        }
        if self.config.partial_match_enabled || self.config.size_only_match_enabled {
            return None;
        }
        let diff = (candidate_size as i128 - searchee.total_size as i128).unsigned_abs() as f64;
        let allowed = searchee.total_size as f64 * self.config.size_fuzz;
        if diff > allowed {
            Some(DecisionKind::SizeMismatch)
        } else {
            None
        }
    }

    /// Full decision given fetched metadata, per §4.5 steps 3-4.
    pub fn decide(&self, searchee: &Searchee, metadata: &TorrentMetadata, known: &KnownState) -> DecisionKind {
        if known.known_info_hashes.iter().any(|h| h.eq_ignore_ascii_case(&metadata.info_hash))
            || searchee
                .info_hash
                .as_deref()
                .map(|h| h.eq_ignore_ascii_case(&metadata.info_hash))
                .unwrap_or(false)
        {
            return DecisionKind::InfoHashAlreadyExists;
        }

        let searchee_bag = bag_of(&searchee.file_list.iter().map(|f| (f.basename().to_string(), f.size)).collect::<Vec<_>>());
        let candidate_bag = bag_of(
            &metadata
                .file_list
                .iter()
                .map(|f| (f.basename().to_string(), f.size))
                .collect::<Vec<_>>(),
        );

        if bags_equal(&searchee_bag, &candidate_bag) {
            return DecisionKind::Match;
        }

        if self.config.partial_match_enabled {
            if let Some(coverage) = subset_coverage(&candidate_bag, &searchee_bag) {
                if coverage >= self.config.partial_threshold {
                    return DecisionKind::MatchPartial;
                }
            }
        }

        if self.config.size_only_match_enabled
            && metadata.file_list.len() == 1
            && searchee.file_list.len() == 1
            && metadata.file_list[0].size == searchee.file_list[0].size
        {
            return DecisionKind::MatchSizeOnly;
        }

        DecisionKind::FileTreeMismatch
    }
}

fn bag_of(entries: &[(String, u64)]) -> HashMap<(String, u64), u32> {
    let mut bag = HashMap::new();
    for entry in entries {
        *bag.entry(entry.clone()).or_insert(0) += 1;
    }
    bag
}

fn bags_equal(a: &HashMap<(String, u64), u32>, b: &HashMap<(String, u64), u32>) -> bool {
    a == b
}

/// Fraction of `subset`'s total size found (with matching counts) within
/// `superset`. Returns `None` if `subset` isn't actually a subset.
fn subset_coverage(subset: &HashMap<(String, u64), u32>, superset: &HashMap<(String, u64), u32>) -> Option<f64> {
    let mut covered_size: u64 = 0;
    let mut total_size: u64 = 0;

    for ((name, size), count) in subset {
        total_size += size * (*count as u64);
        match superset.get(&(name.clone(), *size)) {
            Some(available) if *available >= *count => covered_size += size * (*count as u64),
            Some(available) => covered_size += size * (*available as u64),
            None => return None,
        }
    }

    if total_size == 0 {
        return Some(0.0);
    }
    Some(covered_size as f64 / total_size as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cross_seed_core::models::{FileEntry, SearcheeOrigin};
    use std::collections::HashSet;

    fn searchee_with(files: Vec<(&str, u64)>) -> Searchee {
        let file_list = files
            .into_iter()
            .map(|(name, size)| FileEntry { relative_path: name.to_string(), size })
            .collect::<Vec<_>>();
        let total_size = file_list.iter().map(|f| f.size).sum();
        Searchee {
            name: "searchee".into(),
            file_list,
            total_size,
            info_hash: None,
            origin: SearcheeOrigin::DataDir,
            trackers: HashSet::new(),
            source_path: None,
        }
    }

    fn metadata_with(info_hash: &str, files: Vec<(&str, u64)>) -> TorrentMetadata {
        TorrentMetadata {
            info_hash: info_hash.to_string(),
            name: "candidate".into(),
            file_list: files
                .into_iter()
                .map(|(name, size)| FileEntry { relative_path: name.to_string(), size })
                .collect(),
            piece_length: 16384,
            private: false,
            announce_list: vec![],
            raw: vec![],
        }
    }

    #[test]
    fn full_match_on_identical_bags() {
        let engine = MatchEngine::new(MatcherConfig::default());
        let searchee = searchee_with(vec![("E01.mkv", 1000), ("E02.mkv", 1000)]);
        let metadata = metadata_with("a".repeat(40).as_str(), vec![("E02.mkv", 1000), ("E01.mkv", 1000)]);
        let known = KnownState { known_info_hashes: &[] };
        assert_eq!(engine.decide(&searchee, &metadata, &known), DecisionKind::Match);
    }

    #[test]
    fn size_mismatch_beyond_fuzz() {
        let mut config = MatcherConfig::default();
        config.partial_match_enabled = false;
        let engine = MatchEngine::new(config);
        let searchee = searchee_with(vec![("E01.mkv", 1000)]);
        assert_eq!(
            engine.size_prefilter(&searchee, 2500),
            Some(DecisionKind::SizeMismatch)
        );
    }

    #[test]
    fn prefilter_skipped_when_partial_match_enabled() {
        let engine = MatchEngine::new(MatcherConfig::default());
        let searchee = searchee_with(vec![
            ("E01.mkv", 1000),
            ("E02.mkv", 1000),
            ("E03.mkv", 1000),
            ("E04.mkv", 1000),
            ("E05.mkv", 1000),
            ("E06.mkv", 1000),
            ("E07.mkv", 1000),
            ("E08.mkv", 1000),
            ("E09.mkv", 1000),
            ("E10.mkv", 1000),
        ]);
        assert_eq!(engine.size_prefilter(&searchee, 1000), None);

        let metadata = metadata_with("f".repeat(40).as_str(), vec![("E01.mkv", 1000)]);
        let known = KnownState { known_info_hashes: &[] };
        assert_eq!(engine.decide(&searchee, &metadata, &known), DecisionKind::MatchPartial);
    }

    #[test]
    fn partial_match_when_candidate_is_subset() {
        let engine = MatchEngine::new(MatcherConfig::default());
        let searchee = searchee_with(vec![("E01.mkv", 1000), ("E02.mkv", 1000), ("E03.mkv", 1000)]);
        let metadata = metadata_with("b".repeat(40).as_str(), vec![("E01.mkv", 1000)]);
        let known = KnownState { known_info_hashes: &[] };
        assert_eq!(engine.decide(&searchee, &metadata, &known), DecisionKind::MatchPartial);
    }

    #[test]
    fn info_hash_dedup_short_circuits_file_comparison() {
        let engine = MatchEngine::new(MatcherConfig::default());
        let mut searchee = searchee_with(vec![("E01.mkv", 1000)]);
        searchee.info_hash = Some("c".repeat(40));
        let metadata = metadata_with("c".repeat(40).as_str(), vec![("different.mkv", 9999)]);
        let known = KnownState { known_info_hashes: &[] };
        assert_eq!(
            engine.decide(&searchee, &metadata, &known),
            DecisionKind::InfoHashAlreadyExists
        );
    }

    #[test]
    fn file_tree_mismatch_when_nothing_lines_up() {
        let engine = MatchEngine::new(MatcherConfig::default());
        let searchee = searchee_with(vec![("E01.mkv", 1000)]);
        let metadata = metadata_with("d".repeat(40).as_str(), vec![("totally-different.mkv", 50)]);
        let known = KnownState { known_info_hashes: &[] };
        assert_eq!(engine.decide(&searchee, &metadata, &known), DecisionKind::FileTreeMismatch);
    }

    #[test]
    fn size_only_match_when_enabled_and_single_file() {
        let mut config = MatcherConfig::default();
        config.size_only_match_enabled = true;
        config.partial_match_enabled = false;
        let engine = MatchEngine::new(config);
        let searchee = searchee_with(vec![("original.mkv", 1000)]);
        let metadata = metadata_with("e".repeat(40).as_str(), vec![("renamed.mkv", 1000)]);
        let known = KnownState { known_info_hashes: &[] };
        assert_eq!(engine.decide(&searchee, &metadata, &known), DecisionKind::MatchSizeOnly);
    }
}

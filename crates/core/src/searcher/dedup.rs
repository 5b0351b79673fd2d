//! Deduplication of enriched candidates by info_hash.

use std::collections::HashSet;

use super::Candidate;

/// Deduplicate candidates by info_hash.
///
/// The first candidate seen for a hash wins and keeps its position; later
/// ones are dropped. Candidates without resolved infos have no hash and
/// are dropped too, since nothing downstream can act on them.
pub fn deduplicate_by_hash(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| match c.info_hash() {
            Some(hash) if !hash.is_empty() => seen.insert(hash.to_lowercase()),
            _ => false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_first_occurrence_wins() {
        let a = fixtures::enriched_candidate("Release A", "aaaa", 10);
        let b = fixtures::enriched_candidate("Release B", "bbbb", 20);
        let a2 = fixtures::enriched_candidate("Release A (other indexer)", "AAAA", 99);

        let result = deduplicate_by_hash(vec![a, b, a2]);
        let names: Vec<_> = result.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Release A", "Release B"]);
    }

    #[test]
    fn test_unresolved_candidates_dropped() {
        let resolved = fixtures::enriched_candidate("Resolved", "aaaa", 1);
        let raw = fixtures::candidate("Raw", 1);
        let result = deduplicate_by_hash(vec![raw, resolved]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "Resolved");
    }

    #[test]
    fn test_one_entry_per_hash() {
        let hashes = ["h1", "h2", "h1", "h3", "h2", "h1"];
        let candidates: Vec<_> = hashes
            .iter()
            .enumerate()
            .map(|(i, h)| fixtures::enriched_candidate(&format!("c{}", i), h, 0))
            .collect();
        let result = deduplicate_by_hash(candidates);
        let names: Vec<_> = result.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["c0", "c1", "c3"]);
    }
}

//! Candidate filtering, sorting and prioritization.
//!
//! Everything here is pure: functions take ownership of a candidate list and
//! hand back the reordered list. Sorting is stable, so candidates that tie on
//! every key keep their incoming order.

use std::cmp::Ordering;

use super::release::parse_words;
use super::Candidate;
use crate::media::{MediaKind, MediaQuery};
use crate::profile::{SortField, SortKey, UserProfile};

fn compare_field(a: &Candidate, b: &Candidate, field: SortField) -> Ordering {
    match field {
        SortField::Quality => a.quality.cmp(&b.quality),
        SortField::Seeders => a.seeders.cmp(&b.seeders),
        SortField::Size => a.size_bytes.cmp(&b.size_bytes),
    }
}

/// Stable multi-key sort. Ties on one key fall through to the next.
pub fn sort_candidates(items: &mut [Candidate], keys: &[SortKey]) {
    items.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let ord = compare_field(a, b, key.field);
                if key.descending {
                    ord.reverse()
                } else {
                    ord
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

/// Move up to `max` items matching `pred` to the front (all of them when
/// `max` is `None`), preserving the relative order of both groups.
pub fn prioritize<F>(items: Vec<Candidate>, pred: F, max: Option<usize>) -> Vec<Candidate>
where
    F: Fn(&Candidate) -> bool,
{
    let limit = max.unwrap_or(usize::MAX);
    let mut front = Vec::new();
    let mut rest = Vec::with_capacity(items.len());
    for item in items {
        if front.len() < limit && pred(&item) {
            front.push(item);
        } else {
            rest.push(item);
        }
    }
    front.extend(rest);
    front
}

/// Keep candidates released in `year` if there are any, otherwise keep all.
/// Candidates without a parsed year count as matching.
pub fn prefer_year(items: Vec<Candidate>, year: Option<u32>) -> Vec<Candidate> {
    let Some(year) = year else {
        return items;
    };
    let matches = |c: &Candidate| c.year.map_or(true, |y| y == year);
    if items.iter().any(|c| c.year == Some(year)) {
        items.into_iter().filter(matches).collect()
    } else {
        items
    }
}

/// Whether a candidate passes the profile's quality allow-list and
/// excluded keywords (matched as whole words).
pub fn passes_search_filter(candidate: &Candidate, profile: &UserProfile) -> bool {
    if !profile.qualities.contains(&candidate.quality.value()) {
        return false;
    }
    if profile.exclude_keywords.is_empty() {
        return true;
    }
    let words = parse_words(&candidate.name.to_lowercase());
    !profile
        .exclude_keywords
        .iter()
        .any(|k| words.iter().any(|w| *w == k.to_lowercase()))
}

/// Drop candidates failing [`passes_search_filter`].
pub fn filter_search(items: Vec<Candidate>, profile: &UserProfile) -> Vec<Candidate> {
    items
        .into_iter()
        .filter(|c| passes_search_filter(c, profile))
        .collect()
}

/// Number of language matches pulled to the front during search narrowing.
fn language_slots(max_torrents: usize) -> usize {
    ((max_torrents as f64 * 0.33).round() as usize).max(1)
}

/// Replace the tail of `items` with the best packs when no pack survived.
pub fn promote_packs(items: &mut Vec<Candidate>, packs: Vec<Candidate>, count: usize) {
    if count == 0 || packs.is_empty() || items.iter().any(|c| c.is_pack) {
        return;
    }
    let best: Vec<Candidate> = packs.into_iter().take(count).collect();
    let keep = items.len().saturating_sub(best.len());
    items.truncate(keep);
    items.extend(best);
}

/// Search-phase narrowing of raw fan-out results.
///
/// Prefers same-year releases, applies the quality and keyword filters,
/// sorts by seeders, pulls a third of the slots forward for preferred
/// languages and keeps `max_torrents + 2` entries to absorb later hash
/// duplicates. For series, season packs are forced in when none made it.
pub fn narrow_search(
    items: Vec<Candidate>,
    query: &MediaQuery,
    profile: &UserProfile,
) -> Vec<Candidate> {
    let items = prefer_year(items, query.year);
    let mut items = filter_search(items, profile);
    sort_candidates(&mut items, &[SortKey::desc(SortField::Seeders)]);

    let packs: Vec<Candidate> = items.iter().filter(|c| c.is_pack).cloned().collect();

    let mut items = prioritize(
        items,
        |c| c.matches_languages(&profile.prioritize_languages),
        Some(language_slots(profile.max_torrents)),
    );
    items.truncate(profile.max_torrents + 2);

    if query.kind == MediaKind::Series {
        promote_packs(&mut items, packs, profile.prioritize_pack_torrents);
    }

    items
}

/// Generic rank: sort by `keys` then move up to `max` matches of `pred` forward.
pub fn rank<F>(
    mut items: Vec<Candidate>,
    keys: &[SortKey],
    pred: F,
    max: Option<usize>,
) -> Vec<Candidate>
where
    F: Fn(&Candidate) -> bool,
{
    sort_candidates(&mut items, keys);
    prioritize(items, pred, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searcher::{Language, Quality};

    fn candidate(name: &str, quality: Quality, seeders: u32, size: u64) -> Candidate {
        let mut c = Candidate::new(name, "idx", "", size, seeders);
        c.quality = quality;
        c
    }

    fn names(items: &[Candidate]) -> Vec<&str> {
        items.iter().map(|c| c.name.as_str()).collect()
    }

    fn movie_query(year: Option<u32>) -> MediaQuery {
        MediaQuery {
            media_id: "tt1".to_string(),
            external_id: "tt1".to_string(),
            kind: MediaKind::Movie,
            title: "Movie".to_string(),
            season: None,
            episode: None,
            year,
            language: String::new(),
        }
    }

    #[test]
    fn test_sort_is_stable_multi_key() {
        let mut items = vec![
            candidate("a", Quality::P720, 10, 1),
            candidate("b", Quality::P1080, 5, 1),
            candidate("c", Quality::P1080, 20, 1),
            candidate("d", Quality::P1080, 5, 1),
        ];
        sort_candidates(
            &mut items,
            &[
                SortKey::desc(SortField::Quality),
                SortKey::desc(SortField::Seeders),
            ],
        );
        assert_eq!(names(&items), vec!["c", "b", "d", "a"]);
    }

    #[test]
    fn test_sort_ascending() {
        let mut items = vec![
            candidate("big", Quality::P720, 0, 300),
            candidate("small", Quality::P720, 0, 100),
        ];
        sort_candidates(&mut items, &[SortKey::asc(SortField::Size)]);
        assert_eq!(names(&items), vec!["small", "big"]);
    }

    #[test]
    fn test_prioritize_respects_max_and_order() {
        let items = vec![
            candidate("x1", Quality::P720, 0, 0),
            candidate("m1", Quality::P720, 0, 0),
            candidate("x2", Quality::P720, 0, 0),
            candidate("m2", Quality::P720, 0, 0),
            candidate("m3", Quality::P720, 0, 0),
        ];
        let out = prioritize(items, |c| c.name.starts_with('m'), Some(2));
        assert_eq!(names(&out), vec!["m1", "m2", "x1", "x2", "m3"]);
    }

    #[test]
    fn test_prioritize_unbounded() {
        let items = vec![
            candidate("x1", Quality::P720, 0, 0),
            candidate("m1", Quality::P720, 0, 0),
            candidate("m2", Quality::P720, 0, 0),
        ];
        let out = prioritize(items, |c| c.name.starts_with('m'), None);
        assert_eq!(names(&out), vec!["m1", "m2", "x1"]);
    }

    #[test]
    fn test_prefer_year() {
        let mut a = candidate("a", Quality::P720, 0, 0);
        a.year = Some(1995);
        let mut b = candidate("b", Quality::P720, 0, 0);
        b.year = Some(2009);
        let c = candidate("c", Quality::P720, 0, 0);

        let out = prefer_year(vec![a.clone(), b.clone(), c.clone()], Some(1995));
        assert_eq!(names(&out), vec!["a", "c"]);

        let out = prefer_year(vec![b, c], Some(1995));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_filter_quality_and_keywords() {
        let mut profile = UserProfile::default();
        profile.qualities = vec![1080];
        profile.exclude_keywords = vec!["cam".to_string()];

        let items = vec![
            candidate("Movie 1080p", Quality::P1080, 0, 0),
            candidate("Movie 720p", Quality::P720, 0, 0),
            candidate("Movie CAM 1080p", Quality::P1080, 0, 0),
            candidate("Movie Camera 1080p", Quality::P1080, 0, 0),
        ];
        let out = filter_search(items, &profile);
        assert_eq!(names(&out), vec!["Movie 1080p", "Movie Camera 1080p"]);
    }

    #[test]
    fn test_narrow_search_truncates_with_slack() {
        let mut profile = UserProfile::default();
        profile.max_torrents = 2;
        let items: Vec<_> = (0..10)
            .map(|i| candidate(&format!("m{}", i), Quality::P1080, i, 0))
            .collect();
        let out = narrow_search(items, &movie_query(None), &profile);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].seeders, 9);
    }

    #[test]
    fn test_narrow_search_prioritizes_language() {
        let mut profile = UserProfile::default();
        profile.max_torrents = 3;
        profile.prioritize_languages = vec!["french".to_string()];
        let mut fr = candidate("fr", Quality::P1080, 1, 0);
        fr.languages = vec![Language::French];
        let items = vec![
            candidate("a", Quality::P1080, 50, 0),
            fr,
            candidate("b", Quality::P1080, 40, 0),
        ];
        let out = narrow_search(items, &movie_query(None), &profile);
        assert_eq!(names(&out), vec!["fr", "a", "b"]);
    }

    #[test]
    fn test_promote_packs_replaces_tail() {
        let mut items = vec![
            candidate("e1", Quality::P1080, 0, 0),
            candidate("e2", Quality::P1080, 0, 0),
            candidate("e3", Quality::P1080, 0, 0),
        ];
        let mut pack = candidate("pack", Quality::P1080, 0, 0);
        pack.is_pack = true;
        promote_packs(&mut items, vec![pack], 2);
        assert_eq!(names(&items), vec!["e1", "e2", "pack"]);
    }

    #[test]
    fn test_promote_packs_noop_when_pack_present() {
        let mut existing = candidate("p0", Quality::P1080, 0, 0);
        existing.is_pack = true;
        let mut items = vec![candidate("e1", Quality::P1080, 0, 0), existing];
        let mut pack = candidate("p1", Quality::P1080, 0, 0);
        pack.is_pack = true;
        promote_packs(&mut items, vec![pack], 2);
        assert_eq!(names(&items), vec!["e1", "p0"]);
    }

    #[test]
    fn test_language_slots() {
        assert_eq!(language_slots(8), 3);
        assert_eq!(language_slots(1), 1);
        assert_eq!(language_slots(0), 1);
    }
}

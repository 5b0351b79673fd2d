//! Season pack classification.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::release::parse_words;

static SEASON_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"s(\d{2,}) s(\d{2,})").expect("valid season range regex"));

static EXPLICIT_SEASON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" (s\d{2,}|season \d+) ").expect("valid season marker regex"));

/// Whether a whole-season search result covers `season`.
///
/// Matches `season N`, an `sNN` token, an `sAA sBB` range containing the
/// season, or `complete` when the name carries no explicit season marker.
pub fn is_season_pack(name: &str, season: u32) -> bool {
    let words = parse_words(&name.to_lowercase());
    let joined = words.join(" ");

    let names_season = words
        .windows(2)
        .any(|w| w[0] == "season" && w[1].parse::<u32>().ok() == Some(season));
    if names_season || words.iter().any(|w| *w == format!("s{:02}", season)) {
        return true;
    }

    if let Some(caps) = SEASON_RANGE.captures(&joined) {
        let from = caps[1].parse::<u32>().unwrap_or(u32::MAX);
        let to = caps[2].parse::<u32>().unwrap_or(0);
        if (from..=to).contains(&season) {
            return true;
        }
    }

    words.iter().any(|w| w == "complete") && !EXPLICIT_SEASON.is_match(&format!(" {} ", joined))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_phrase() {
        assert!(is_season_pack("Show Season 2 1080p", 2));
        assert!(!is_season_pack("Show Season 12 1080p", 1));
    }

    #[test]
    fn test_season_token() {
        assert!(is_season_pack("Show.S02.1080p.WEB", 2));
        assert!(!is_season_pack("Show.S03.1080p.WEB", 2));
    }

    #[test]
    fn test_season_range() {
        assert!(is_season_pack("Show S01-S05 Complete", 3));
        assert!(!is_season_pack("Show S01-S02 1080p", 3));
    }

    #[test]
    fn test_complete_series() {
        assert!(is_season_pack("Show Complete Series 1080p", 4));
        // "complete" next to an explicit other season is not a series pack
        assert!(!is_season_pack("Show S03 Complete 1080p", 4));
        assert!(!is_season_pack("Show Season 3 Complete", 4));
    }

    #[test]
    fn test_single_episode_is_not_pack() {
        assert!(!is_season_pack("Show.S02E05.1080p", 2));
    }
}

//! Release name parsing.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::{Language, Quality};

/// Attributes extracted from a release name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRelease {
    pub quality: Quality,
    pub languages: Vec<Language>,
    pub year: Option<u32>,
}

static LANGUAGE_PATTERNS: Lazy<Vec<(Language, Regex)>> = Lazy::new(|| {
    Language::ALL
        .iter()
        .filter_map(|lang| {
            Regex::new(&format!("(?i) ({}) ", lang.pattern()))
                .ok()
                .map(|re| (*lang, re))
        })
        .collect()
});

/// Split a name into words on any non-alphanumeric character.
pub fn parse_words(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse quality, languages and year from a release name.
pub fn parse_release(name: &str) -> ParsedRelease {
    let words: Vec<String> = parse_words(&name.to_lowercase());
    let padded = format!(" {} ", words.join(" "));

    ParsedRelease {
        quality: parse_quality(&words),
        languages: LANGUAGE_PATTERNS
            .iter()
            .filter(|(_, re)| re.is_match(&padded))
            .map(|(lang, _)| *lang)
            .collect(),
        year: parse_year(&words),
    }
}

fn parse_quality(words: &[String]) -> Quality {
    let has = |tokens: &[&str]| words.iter().any(|w| tokens.contains(&w.as_str()));
    if has(&["2160p", "4k", "uhd"]) {
        Quality::P2160
    } else if has(&["1080p", "1080i"]) {
        Quality::P1080
    } else if has(&["720p"]) {
        Quality::P720
    } else if has(&["480p"]) {
        Quality::P480
    } else if has(&["360p"]) {
        Quality::P360
    } else {
        Quality::Unknown
    }
}

// Last plausible token wins so titles that start with a number ("2012")
// still pick up the release year that follows.
fn parse_year(words: &[String]) -> Option<u32> {
    words
        .iter()
        .filter(|w| w.len() == 4)
        .filter_map(|w| w.parse::<u32>().ok())
        .filter(|y| (1900..=2099).contains(y))
        .last()
}

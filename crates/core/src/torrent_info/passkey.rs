//! Private tracker passkey rewriting.
//!
//! Torrents fetched through the operator's tracker account embed the
//! operator's passkey in their announce URLs. Before such a torrent is
//! handed to a storage backend on a user's behalf, the passkey is swapped
//! for the user's own. The rewrite decodes the torrent and re-encodes it,
//! so every length prefix is regenerated. The `info` dictionary is left
//! alone and must already be canonically encoded, which keeps its bytes
//! and therefore the info hash unchanged.

use regex_lite::Regex;
use serde_bencode::value::Value;
use thiserror::Error;

const INFO_KEY: &[u8] = b"info";

#[derive(Debug, Error)]
pub enum PasskeyError {
    #[error("Invalid torrent encoding: {0}")]
    Encoding(#[from] serde_bencode::Error),

    #[error("Torrent root is not a dictionary")]
    NotADictionary,

    #[error("Info dictionary is not canonically encoded")]
    NonCanonicalInfo,

    #[error("Invalid passkey pattern: {0}")]
    InvalidPattern(String),
}

/// Whether `passkey` fully matches the operator-configured `pattern`.
pub fn is_valid_passkey(passkey: &str, pattern: &str) -> Result<bool, PasskeyError> {
    let anchored = Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| PasskeyError::InvalidPattern(e.to_string()))?;
    Ok(anchored.is_match(passkey))
}

/// Replace every occurrence of `placeholder` in the torrent's byte strings
/// outside the `info` dictionary.
pub fn replace_passkey(
    torrent: &[u8],
    placeholder: &str,
    passkey: &str,
) -> Result<Vec<u8>, PasskeyError> {
    let Value::Dict(mut root) = serde_bencode::from_bytes::<Value>(torrent)? else {
        return Err(PasskeyError::NotADictionary);
    };

    if let Some(info) = root.get(INFO_KEY) {
        let mut raw = b"4:info".to_vec();
        raw.extend_from_slice(&serde_bencode::to_bytes(info)?);
        if !contains(torrent, &raw) {
            return Err(PasskeyError::NonCanonicalInfo);
        }
    }

    let (from, to) = (placeholder.as_bytes(), passkey.as_bytes());
    for (key, value) in root.iter_mut() {
        if key.as_slice() != INFO_KEY {
            replace_in(value, from, to);
        }
    }
    Ok(serde_bencode::to_bytes(&Value::Dict(root))?)
}

fn replace_in(value: &mut Value, from: &[u8], to: &[u8]) {
    match value {
        Value::Bytes(bytes) => *bytes = replace_bytes(bytes, from, to),
        Value::List(items) => items.iter_mut().for_each(|v| replace_in(v, from, to)),
        Value::Dict(entries) => entries.values_mut().for_each(|v| replace_in(v, from, to)),
        Value::Int(_) => {}
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn replace_bytes(haystack: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    if from.is_empty() || haystack.len() < from.len() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(from) {
            out.extend_from_slice(to);
            i += from.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use crate::torrent_info::torrent_parser::parse_torrent;

    #[test]
    fn test_replace_regenerates_length_prefix() {
        let original = b"d8:announce37:http://t.example/OPERATORKEY/announcee";
        let rewritten = replace_passkey(original, "OPERATORKEY", "me").unwrap();
        assert_eq!(
            rewritten,
            b"d8:announce28:http://t.example/me/announcee".to_vec()
        );
        assert!(serde_bencode::from_bytes::<Value>(&rewritten).is_ok());
    }

    #[test]
    fn test_replace_covers_announce_list_and_keeps_info_hash() {
        let original = fixtures::torrent_bytes(
            "OPERATORKEY.mkv",
            &[],
            true,
            "http://t.example/OPERATORKEY/announce",
        );
        let rewritten = replace_passkey(&original, "OPERATORKEY", "longeruserpasskey").unwrap();

        let text = String::from_utf8_lossy(&rewritten);
        assert!(text.contains("http://t.example/longeruserpasskey/announce"));
        // info dictionary untouched
        assert!(text.contains("OPERATORKEY.mkv"));
        assert_eq!(
            parse_torrent(&original).unwrap().info_hash,
            parse_torrent(&rewritten).unwrap().info_hash
        );
    }

    #[test]
    fn test_replace_rejects_malformed_torrent() {
        assert!(matches!(
            replace_passkey(b"d8:announce99:short", "a", "b"),
            Err(PasskeyError::Encoding(_))
        ));
    }

    #[test]
    fn test_replace_refuses_non_canonical_info() {
        // "name" sorted before "length": re-encoding would change the hash
        let original = b"d8:announce5:KEY/a4:infod4:name1:a6:lengthi1eee";
        assert!(matches!(
            replace_passkey(original, "KEY", "me"),
            Err(PasskeyError::NonCanonicalInfo)
        ));
        assert!(matches!(
            replace_passkey(b"li1ee", "KEY", "me"),
            Err(PasskeyError::NotADictionary)
        ));
    }

    #[test]
    fn test_passkey_validation_is_anchored() {
        assert!(is_valid_passkey("abc123", "[a-zA-Z0-9]+").unwrap());
        assert!(!is_valid_passkey("abc 123", "[a-zA-Z0-9]+").unwrap());
        assert!(!is_valid_passkey("", "[a-zA-Z0-9]+").unwrap());
        assert!(is_valid_passkey("x", "[").is_err());
    }

    #[test]
    fn test_replace_bytes() {
        assert_eq!(replace_bytes(b"aXbXc", b"X", b"YY"), b"aYYbYYc");
        assert_eq!(replace_bytes(b"abc", b"", b"Z"), b"abc");
    }
}

//! Magnet URI parsing.

use super::TorrentInfoError;

/// Hash and display name extracted from a magnet URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetLink {
    /// Lowercase hex info hash.
    pub info_hash: String,
    pub name: Option<String>,
}

/// Parse `magnet:?xt=urn:btih:<hash>&dn=<name>`.
///
/// Accepts 40-char hex and 32-char base32 hashes.
pub fn parse_magnet(uri: &str) -> Result<MagnetLink, TorrentInfoError> {
    let query = uri
        .strip_prefix("magnet:?")
        .ok_or_else(|| TorrentInfoError::InvalidMagnet(uri.to_string()))?;

    let mut info_hash = None;
    let mut name = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "xt" => {
                if let Some(hash) = value.strip_prefix("urn:btih:") {
                    info_hash = Some(normalize_hash(hash)?);
                }
            }
            "dn" => {
                let value = value.replace('+', " ");
                name = urlencoding::decode(&value).ok().map(|s| s.into_owned());
            }
            _ => {}
        }
    }

    let info_hash = info_hash.ok_or_else(|| TorrentInfoError::InvalidMagnet(uri.to_string()))?;
    Ok(MagnetLink { info_hash, name })
}

fn normalize_hash(hash: &str) -> Result<String, TorrentInfoError> {
    match hash.len() {
        40 if hash.chars().all(|c| c.is_ascii_hexdigit()) => Ok(hash.to_ascii_lowercase()),
        32 => decode_base32(hash)
            .map(|bytes| bytes.iter().map(|b| format!("{:02x}", b)).collect())
            .ok_or_else(|| TorrentInfoError::InvalidMagnet(format!("bad base32 hash {}", hash))),
        _ => Err(TorrentInfoError::InvalidMagnet(format!(
            "unsupported hash {}",
            hash
        ))),
    }
}

/// RFC 4648 base32 without padding.
fn decode_base32(input: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer: u64 = 0;
    let mut bits = 0;
    for c in input.chars() {
        let value = match c.to_ascii_uppercase() {
            c @ 'A'..='Z' => c as u64 - 'A' as u64,
            c @ '2'..='7' => c as u64 - '2' as u64 + 26,
            _ => return None,
        };
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_magnet() {
        let link = parse_magnet(
            "magnet:?xt=urn:btih:ABCDEF0123456789ABCDEF0123456789ABCDEF01&dn=Some+Movie%202020&tr=udp%3A%2F%2Ft",
        )
        .unwrap();
        assert_eq!(link.info_hash, "abcdef0123456789abcdef0123456789abcdef01");
        assert_eq!(link.name.as_deref(), Some("Some Movie 2020"));
    }

    #[test]
    fn test_parse_base32_magnet() {
        // 20 zero bytes
        let link = parse_magnet("magnet:?xt=urn:btih:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").unwrap();
        assert_eq!(link.info_hash, "0".repeat(40));
        assert!(link.name.is_none());
    }

    #[test]
    fn test_parse_rejects_missing_hash() {
        assert!(parse_magnet("magnet:?dn=foo").is_err());
        assert!(parse_magnet("http://example.com").is_err());
        assert!(parse_magnet("magnet:?xt=urn:btih:xyz").is_err());
    }
}

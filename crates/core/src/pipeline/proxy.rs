//! MediaFlow proxy rewriting of resolved download URLs.

use crate::profile::UserProfile;

/// Route `url` through the profile's MediaFlow proxy when enabled.
pub fn apply_mediaflow(url: &str, profile: &UserProfile) -> String {
    let base = profile.mediaflow_proxy_url.trim_end_matches('/');
    if !profile.enable_mediaflow || base.is_empty() {
        return url.to_string();
    }
    format!(
        "{}/proxy/stream?d={}&api_password={}",
        base,
        urlencoding::encode(url),
        urlencoding::encode(&profile.mediaflow_api_password)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_leaves_url_untouched() {
        let profile = UserProfile::default();
        assert_eq!(
            apply_mediaflow("https://cdn.example/a.mkv", &profile),
            "https://cdn.example/a.mkv"
        );
    }

    #[test]
    fn test_enabled_wraps_url() {
        let profile = UserProfile {
            enable_mediaflow: true,
            mediaflow_proxy_url: "https://mfp.example/".to_string(),
            mediaflow_api_password: "p w".to_string(),
            ..UserProfile::default()
        };
        assert_eq!(
            apply_mediaflow("https://cdn.example/a b.mkv", &profile),
            "https://mfp.example/proxy/stream?d=https%3A%2F%2Fcdn.example%2Fa%20b.mkv&api_password=p%20w"
        );
    }

    #[test]
    fn test_enabled_without_proxy_url() {
        let profile = UserProfile {
            enable_mediaflow: true,
            ..UserProfile::default()
        };
        assert_eq!(apply_mediaflow("u", &profile), "u");
    }
}

use regex_lite::Regex;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Public URL is an http(s) URL
/// - Jackett URL is set
/// - Indexer ids are unique
/// - Passkey pattern compiles
/// - Resolver concurrency, batch size and cache purge interval are positive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let public_url = &config.server.public_url;
    if !public_url.starts_with("http://") && !public_url.starts_with("https://") {
        return Err(ConfigError::ValidationError(format!(
            "server.public_url must start with http:// or https://, got {}",
            public_url
        )));
    }

    if config.jackett.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "jackett.url cannot be empty".to_string(),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for indexer in &config.jackett.indexers {
        if !seen.insert(indexer.id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate indexer id: {}",
                indexer.id
            )));
        }
    }

    Regex::new(&config.passkey.pattern).map_err(|e| {
        ConfigError::ValidationError(format!("passkey.pattern is not a valid regex: {}", e))
    })?;

    if config.resolver.info_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "resolver.info_concurrency must be at least 1".to_string(),
        ));
    }
    if config.cache.purge_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "cache.purge_interval_secs must be at least 1".to_string(),
        ));
    }
    if config.resolver.check_batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "resolver.check_batch_size must be at least 1".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn base_config() -> Config {
        load_config_from_str(
            r#"
[jackett]
url = "http://localhost:9117"
api_key = "key"

[[jackett.indexers]]
id = "yts"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = base_config();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_public_url_scheme() {
        let mut config = base_config();
        config.server.public_url = "debridge.local".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_duplicate_indexer() {
        let mut config = base_config();
        let dup = config.jackett.indexers[0].clone();
        config.jackett.indexers.push(dup);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate indexer id"));
    }

    #[test]
    fn test_validate_bad_passkey_pattern() {
        let mut config = base_config();
        config.passkey.pattern = "[a-z".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_purge_interval() {
        let mut config = base_config();
        config.cache.purge_interval_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let mut config = base_config();
        config.resolver.info_concurrency = 0;
        assert!(validate_config(&config).is_err());
    }
}

use std::sync::Arc;

use debridge_core::{Config, ProfileError, SanitizedConfig, StreamResolver, UserProfile};

/// Shared application state
pub struct AppState {
    config: Config,
    resolver: Arc<StreamResolver>,
}

impl AppState {
    pub fn new(config: Config, resolver: Arc<StreamResolver>) -> Self {
        Self { config, resolver }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn resolver(&self) -> &Arc<StreamResolver> {
        &self.resolver
    }

    /// Decode the profile path segment over the operator defaults.
    pub fn profile(&self, encoded: &str) -> Result<UserProfile, ProfileError> {
        UserProfile::decode(
            encoded,
            &self.config.defaults.profile,
            &self.config.defaults.immutable_keys,
        )
    }
}

//! Known debrid providers and backend construction from a profile.

use std::sync::Arc;

use tracing::debug;

use super::stremthru::{store_short_name, StremThruBackend, StremThruOptions, STREMTHRU_ID};
use super::{BackendDescriptor, ConfigField, DebridError, StorageBackend};
use crate::profile::UserProfile;

const DEFAULT_STORE: &str = "realdebrid";

/// Provider id and display name.
const PROVIDERS: [(&str, &str); 9] = [
    ("debridlink", "Debrid-Link"),
    ("alldebrid", "AllDebrid"),
    ("realdebrid", "Real-Debrid"),
    ("premiumize", "Premiumize"),
    (STREMTHRU_ID, "StremThru"),
    ("pikpak", "PikPak"),
    ("easydebrid", "EasyDebrid"),
    ("offcloud", "Offcloud"),
    ("torbox", "TorBox"),
];

/// Builds the storage backend a request should use.
pub trait BackendFactory: Send + Sync {
    fn create(&self, profile: &UserProfile) -> Result<Arc<dyn StorageBackend>, DebridError>;

    /// All selectable providers.
    fn descriptors(&self) -> Vec<BackendDescriptor>;
}

/// Default factory.
///
/// Every provider is reached through StremThru: a provider other than
/// StremThru itself is wrapped, with the provider named as the StremThru
/// store.
#[derive(Debug, Default, Clone)]
pub struct DebridRegistry;

impl DebridRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn is_known(id: &str) -> bool {
        PROVIDERS.iter().any(|(known, _)| *known == id)
    }
}

impl BackendFactory for DebridRegistry {
    fn create(&self, profile: &UserProfile) -> Result<Arc<dyn StorageBackend>, DebridError> {
        let id = profile.debrid_id.as_str();
        if !Self::is_known(id) {
            return Err(DebridError::UnknownBackend(id.to_string()));
        }

        let store = if id == STREMTHRU_ID {
            profile
                .stremthru_store
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_STORE.to_string())
        } else if profile.use_stremthru && !profile.stremthru_url.is_empty() {
            id.to_string()
        } else {
            return Err(DebridError::Unsupported(id.to_string()));
        };

        if profile.stremthru_url.is_empty() {
            return Err(DebridError::MissingSetting("stremthru_url"));
        }
        if profile.debrid_api_key.is_empty() {
            return Err(DebridError::MissingSetting("debrid_api_key"));
        }

        let client_ip = if profile.enable_mediaflow {
            profile.mediaflow_public_ip.clone()
        } else {
            String::new()
        };

        debug!(provider = id, store = %store, "Creating StremThru backend");
        let backend = StremThruBackend::new(StremThruOptions {
            base_url: profile.stremthru_url.clone(),
            store,
            api_key: profile.debrid_api_key.clone(),
            client_ip,
        })?;
        Ok(Arc::new(backend))
    }

    fn descriptors(&self) -> Vec<BackendDescriptor> {
        PROVIDERS
            .iter()
            .map(|(id, name)| {
                let config_fields = if *id == STREMTHRU_ID {
                    vec![
                        ConfigField::text(
                            "stremthru_url",
                            "StremThru URL",
                            Some("https://stremthru.13377001.xyz"),
                        ),
                        ConfigField::text("stremthru_store", "StremThru Store", Some(DEFAULT_STORE)),
                        ConfigField::password("debrid_api_key", "API Key"),
                    ]
                } else {
                    vec![ConfigField::password("debrid_api_key", "API Key")]
                };
                BackendDescriptor {
                    id: id.to_string(),
                    name: name.to_string(),
                    short_name: store_short_name(id).to_string(),
                    config_fields,
                }
            })
            .collect()
    }
}

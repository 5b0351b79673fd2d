//! Common test utilities for in-process API testing with mocks.
//!
//! This module provides a test fixture that creates the router with a
//! stream resolver wired to mock collaborators, so the addon routes can be
//! exercised without Jackett, Cinemeta or a debrid account.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use debridge_core::{
    config::SlowIndexerConfig,
    load_config_from_str,
    testing::{
        MockBackendFactory, MockIndexerGateway, MockMetadataProvider, MockStorageBackend,
        MockTorrentInfoResolver,
    },
    AvailabilityResolver, FanoutCoordinator, InfoEnricher, MemoryCacheStore, ResolverSettings,
    SlowIndexerTracker, StreamResolver, UserProfile,
};

/// Re-export fixtures for test convenience
pub use debridge_core::testing::fixtures;

pub const PUBLIC_URL: &str = "http://addon.test";

/// Test fixture with controllable mocks behind the router.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_listing() {
///     let fixture = TestFixture::new().await;
///     fixture.gateway.set_results("idx", vec![fixtures::candidate("Test Movie 2020 1080p", 5)]).await;
///
///     let response = fixture.get(&fixture.stream_path("movie", "tt1")).await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock indexer gateway - configure search results
    pub gateway: Arc<MockIndexerGateway>,
    /// Mock torrent info resolver - map candidate names to hashes
    pub infos: Arc<MockTorrentInfoResolver>,
    /// Mock debrid backend - control availability and transfers
    pub backend: Arc<MockStorageBackend>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub location: Option<String>,
}

impl TestFixture {
    pub async fn new() -> Self {
        let config = load_config_from_str(&format!(
            r#"
[server]
public_url = "{}"

[cache]
backend = "memory"

[jackett]
url = "http://jackett.test"
api_key = "secret-jackett-key"

[resolver]
magnet_poll_attempts = 1
magnet_poll_interval_ms = 10

[defaults]
immutable_keys = ["stremthru_url"]
"#,
            PUBLIC_URL
        ))
        .expect("Failed to parse test config");

        let gateway = Arc::new(MockIndexerGateway::with_backends(vec![fixtures::indexer(
            "idx",
        )]));
        let infos = Arc::new(MockTorrentInfoResolver::new());
        let backend = Arc::new(MockStorageBackend::new());

        let tracker = Arc::new(SlowIndexerTracker::new(&SlowIndexerConfig {
            duration_secs: 30,
            window_secs: 1800,
            request_limit: 3,
        }));
        let resolver = StreamResolver::new(
            ResolverSettings::from_config(&config),
            Arc::new(MockMetadataProvider::new()),
            FanoutCoordinator::new(Arc::clone(&gateway) as _, tracker),
            InfoEnricher::new(Arc::clone(&infos) as _, 4, Duration::from_secs(5)),
            AvailabilityResolver::new(Duration::from_secs(300), 50),
            Arc::new(MockBackendFactory::new(Arc::clone(&backend))),
            Arc::new(MemoryCacheStore::new()),
        );

        let state = Arc::new(debridge_server::state::AppState::new(
            config,
            Arc::new(resolver),
        ));
        let router = debridge_server::api::create_router(state);

        Self {
            router,
            gateway,
            infos,
            backend,
        }
    }

    /// Encoded default profile, as found in listed action URLs.
    pub fn profile(&self) -> String {
        UserProfile::default().encode()
    }

    pub fn stream_path(&self, kind: &str, id: &str) -> String {
        format!("/{}/stream/{}/{}.json", self.profile(), kind, id)
    }

    pub fn download_path(&self, kind: &str, id: &str, torrent_id: &str) -> String {
        format!(
            "/{}/download/{}/{}/{}/file.mkv",
            self.profile(),
            kind,
            id,
            torrent_id
        )
    }

    /// Send a GET request to the test router.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            body,
            location,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

//! StremThru storage backend.
//!
//! StremThru fronts many debrid stores behind one API; the store to use and
//! the caller's credential for it travel as request headers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CacheCheck, DebridError, DebridFile, StorageBackend, Transfer, TransferStatus};
use crate::metrics;

pub const STREMTHRU_ID: &str = "stremthru";

const MAX_RETRIES: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for one caller.
#[derive(Debug, Clone)]
pub struct StremThruOptions {
    pub base_url: String,
    /// Underlying store ("realdebrid", "alldebrid", ...).
    pub store: String,
    pub api_key: String,
    /// Forwarded to the store for geo-sensitive links; may be empty.
    pub client_ip: String,
}

pub struct StremThruBackend {
    client: Client,
    options: StremThruOptions,
    short_name: &'static str,
}

impl StremThruBackend {
    pub fn new(options: StremThruOptions) -> Result<Self, DebridError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DebridError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            client,
            short_name: store_short_name(&options.store),
            options,
        })
    }

    pub fn store(&self) -> &str {
        &self.options.store
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/v0/store{}",
            self.options.base_url.trim_end_matches('/'),
            path
        )
    }

    fn check_path(&self, hashes: &[String], sid: &str) -> String {
        let magnets = hashes
            .iter()
            .map(|hash| format!("magnet:?xt=urn:btih:{}", hash))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "/magnets/check?magnet={}&client_ip={}&sid={}",
            urlencoding::encode(&magnets),
            urlencoding::encode(&self.options.client_ip),
            urlencoding::encode(sid)
        )
    }

    /// Send a request, retrying transient error codes.
    async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, DebridError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let store = self.options.store.as_str();
        let mut attempt = 0;
        loop {
            debug!(method = %method, path = path, store = store, "StremThru request");
            let result = self.send_once::<T, B>(method.clone(), path, body).await;
            match result {
                Err(DebridError::ApiError { ref code, .. })
                    if is_transient(code) && attempt < MAX_RETRIES =>
                {
                    attempt += 1;
                    metrics::DEBRID_REQUESTS
                        .with_label_values(&[store, "retry"])
                        .inc();
                    warn!(
                        code = %code,
                        attempt = attempt,
                        max_retries = MAX_RETRIES,
                        "StremThru transient error, retrying"
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Ok(data) => {
                    metrics::DEBRID_REQUESTS
                        .with_label_values(&[store, "success"])
                        .inc();
                    return Ok(data);
                }
                Err(e) => {
                    metrics::DEBRID_REQUESTS
                        .with_label_values(&[store, "error"])
                        .inc();
                    return Err(e);
                }
            }
        }
    }

    async fn send_once<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, DebridError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self.authorized(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }
        Self::send(request).await
    }

    fn authorized(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("accept", "application/json")
            .header("X-StremThru-Store-Name", &self.options.store)
            .header(
                "X-StremThru-Store-Authorization",
                format!("Bearer {}", self.options.api_key),
            )
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, DebridError> {
        let response = request
            .send()
            .await
            .map_err(|e| DebridError::ConnectionFailed(e.to_string()))?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| DebridError::InvalidResponse(e.to_string()))?;
        envelope.into_result()
    }
}

/// Abbreviation of a store, "ST" when unknown.
pub fn store_short_name(store: &str) -> &'static str {
    match store {
        "realdebrid" => "RD",
        "alldebrid" => "AD",
        "debridlink" => "DL",
        "premiumize" => "PM",
        "pikpak" => "PP",
        "easydebrid" => "ED",
        "offcloud" => "OC",
        "torbox" => "TB",
        _ => "ST",
    }
}

fn is_transient(code: &str) -> bool {
    matches!(code, "FORBIDDEN" | "INTERNAL_SERVER_ERROR")
}

fn classify(error: ApiErrorBody) -> DebridError {
    match error.code.as_str() {
        "UNAUTHORIZED" | "PAYMENT_REQUIRED" => DebridError::ExpiredCredential,
        _ => DebridError::ApiError {
            code: error.code,
            message: error.message.unwrap_or_default(),
        },
    }
}

fn into_transfer(magnet: MagnetData) -> Transfer {
    let ready = magnet.status.is_ready();
    let files = magnet
        .files
        .into_iter()
        .map(|f| DebridFile {
            id: format!("{}:{}", magnet.id, f.index),
            name: f.name.rsplit('/').next().unwrap_or_default().to_string(),
            size: f.size,
            ready,
        })
        .collect();
    Transfer {
        id: magnet.id,
        status: magnet.status,
        files,
    }
}

#[async_trait]
impl StorageBackend for StremThruBackend {
    fn id(&self) -> &str {
        STREMTHRU_ID
    }

    fn short_name(&self) -> &str {
        self.short_name
    }

    fn availability_icon(&self, cached: bool) -> &'static str {
        if cached {
            "⚡"
        } else {
            "⬇️"
        }
    }

    fn cache_scope(&self) -> String {
        format!("{}:{}:{}", STREMTHRU_ID, self.options.store, self.user_hash())
    }

    fn user_hash(&self) -> String {
        format!("{:x}", md5::compute(self.options.api_key.as_bytes()))
    }

    async fn check_cache(
        &self,
        hashes: &[String],
        sid: &str,
    ) -> Result<Vec<CacheCheck>, DebridError> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let data: CheckData = self
            .request(Method::GET, &self.check_path(hashes, sid), None::<&()>)
            .await?;
        Ok(data
            .items
            .into_iter()
            .map(|item| CacheCheck {
                hash: item.hash.to_lowercase(),
                status: item.status,
                files: item
                    .files
                    .into_iter()
                    .enumerate()
                    .map(|(i, f)| DebridFile {
                        id: f.index.unwrap_or(i as u64).to_string(),
                        name: f.name.rsplit('/').next().unwrap_or_default().to_string(),
                        size: f.size,
                        ready: item.status.is_ready(),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn add_magnet(&self, magnet: &str) -> Result<Transfer, DebridError> {
        let data: MagnetData = self
            .request(Method::POST, "/magnets", Some(&AddMagnetBody { magnet }))
            .await?;
        debug!(id = %data.id, status = data.status.as_str(), "Magnet added to StremThru");
        Ok(into_transfer(data))
    }

    async fn add_torrent_file(
        &self,
        torrent: &[u8],
        info_hash: &str,
    ) -> Result<Transfer, DebridError> {
        let part = Part::bytes(torrent.to_vec())
            .file_name(format!("{}.torrent", info_hash))
            .mime_str("application/x-bittorrent")
            .map_err(|e| DebridError::InvalidResponse(e.to_string()))?;
        let request = self
            .authorized(Method::POST, "/magnets")
            .multipart(Form::new().part("torrent", part));

        let store = self.options.store.as_str();
        let result: Result<MagnetData, DebridError> = Self::send(request).await;
        let outcome = if result.is_ok() { "success" } else { "error" };
        metrics::DEBRID_REQUESTS
            .with_label_values(&[store, outcome])
            .inc();

        let data = result?;
        debug!(id = %data.id, status = data.status.as_str(), "Torrent uploaded to StremThru");
        Ok(into_transfer(data))
    }

    async fn get_transfer(&self, id: &str) -> Result<Transfer, DebridError> {
        let path = format!("/magnets/{}", urlencoding::encode(id));
        let data: MagnetData = self.request(Method::GET, &path, None::<&()>).await?;
        Ok(into_transfer(data))
    }

    async fn resolve_download(&self, file: &DebridFile) -> Result<String, DebridError> {
        let (magnet_id, index) = file
            .id
            .rsplit_once(':')
            .ok_or_else(|| DebridError::FileNotFound(file.id.clone()))?;

        let path = format!("/magnets/{}", urlencoding::encode(magnet_id));
        let magnet: MagnetData = self.request(Method::GET, &path, None::<&()>).await?;
        if !magnet.status.is_ready() {
            return Err(DebridError::NotReady);
        }

        let link = magnet
            .files
            .into_iter()
            .find(|f| f.index.to_string() == index)
            .and_then(|f| f.link)
            .ok_or_else(|| DebridError::FileNotFound(file.id.clone()))?;

        let body = GenerateLinkBody { link: &link };
        let generated: LinkData = self
            .request(Method::POST, "/link/generate", Some(&body))
            .await?;
        Ok(generated.link)
    }
}

// StremThru API types

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<ApiErrorBody>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T, DebridError> {
        if let Some(error) = self.error {
            return Err(classify(error));
        }
        self.data
            .ok_or_else(|| DebridError::InvalidResponse("missing data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckData {
    #[serde(default)]
    items: Vec<CheckItem>,
}

#[derive(Debug, Deserialize)]
struct CheckItem {
    hash: String,
    status: TransferStatus,
    #[serde(default)]
    files: Vec<CheckFile>,
}

#[derive(Debug, Deserialize)]
struct CheckFile {
    #[serde(default)]
    index: Option<u64>,
    name: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct MagnetData {
    id: String,
    status: TransferStatus,
    #[serde(default)]
    files: Vec<MagnetFile>,
}

#[derive(Debug, Deserialize)]
struct MagnetFile {
    index: u64,
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkData {
    link: String,
}

#[derive(Serialize)]
struct AddMagnetBody<'a> {
    magnet: &'a str,
}

#[derive(Serialize)]
struct GenerateLinkBody<'a> {
    link: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(store: &str) -> StremThruBackend {
        StremThruBackend::new(StremThruOptions {
            base_url: "https://stremthru.example/".to_string(),
            store: store.to_string(),
            api_key: "secret".to_string(),
            client_ip: "1.2.3.4".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_short_names() {
        assert_eq!(backend("realdebrid").short_name(), "RD");
        assert_eq!(backend("torbox").short_name(), "TB");
        assert_eq!(backend("newstore").short_name(), "ST");
    }

    #[test]
    fn test_user_hash_is_md5_of_key() {
        assert_eq!(backend("realdebrid").user_hash(), "5ebe2294ecd0e0f08eab7690d2a6ee69");
    }

    #[test]
    fn test_cache_scope_separates_stores() {
        let rd = backend("realdebrid").cache_scope();
        let ad = backend("alldebrid").cache_scope();
        assert_ne!(rd, ad);
        assert!(rd.starts_with("stremthru:realdebrid:"));
    }

    #[test]
    fn test_check_path() {
        let b = backend("realdebrid");
        let path = b.check_path(&["aa".to_string(), "bb".to_string()], "tt1:1:2");
        assert_eq!(
            b.url(&path),
            "https://stremthru.example/v0/store/magnets/check?magnet=magnet%3A%3Fxt%3Durn%3Abtih%3Aaa%2Cmagnet%3A%3Fxt%3Durn%3Abtih%3Abb&client_ip=1.2.3.4&sid=tt1%3A1%3A2"
        );
    }

    #[test]
    fn test_envelope_error_classification() {
        let env: Envelope<LinkData> =
            serde_json::from_str(r#"{"error":{"code":"UNAUTHORIZED","message":"bad key"}}"#)
                .unwrap();
        assert!(matches!(env.into_result(), Err(DebridError::ExpiredCredential)));

        let env: Envelope<LinkData> =
            serde_json::from_str(r#"{"error":{"code":"BAD_REQUEST"}}"#).unwrap();
        assert!(matches!(
            env.into_result(),
            Err(DebridError::ApiError { code, .. }) if code == "BAD_REQUEST"
        ));

        let env: Envelope<LinkData> =
            serde_json::from_str(r#"{"data":{"link":"https://cdn/x"}}"#).unwrap();
        assert_eq!(env.into_result().unwrap().link, "https://cdn/x");
    }

    #[test]
    fn test_transient_codes() {
        assert!(is_transient("FORBIDDEN"));
        assert!(is_transient("INTERNAL_SERVER_ERROR"));
        assert!(!is_transient("BAD_REQUEST"));
    }

    #[test]
    fn test_into_transfer_maps_files() {
        let data: MagnetData = serde_json::from_str(
            r#"{"id":"m1","status":"downloaded","files":[
                {"index":0,"name":"/Show/S01/e1.mkv","size":10,"link":"l0"},
                {"index":3,"name":"e2.mkv","size":20}
            ]}"#,
        )
        .unwrap();
        let transfer = into_transfer(data);
        assert_eq!(transfer.status, TransferStatus::Downloaded);
        assert_eq!(transfer.files[0].id, "m1:0");
        assert_eq!(transfer.files[0].name, "e1.mkv");
        assert_eq!(transfer.files[1].id, "m1:3");
        assert!(transfer.files.iter().all(|f| f.ready));
    }
}

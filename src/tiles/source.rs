//! Where manifest, base-layer and tile bytes come from

use crate::core::config::HttpSourceConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::path::PathBuf;

/// Shared async HTTP client; building it once keeps one connection pool for
/// every tile request in the process.
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    build_client(&HttpSourceConfig::default()).expect("failed to build reqwest async client")
});

fn build_client(config: &HttpSourceConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.request_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build()
}

/// Anything that can produce the bytes stored under a source-relative path.
///
/// The session fetches the manifest, the base layer and tiles through this
/// seam only, so hosts (and tests) can plug in their own transport.
#[async_trait]
pub trait ClimateSource: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>>;

    /// Human readable location, used in log messages
    fn describe(&self, path: &str) -> String {
        path.to_string()
    }
}

/// Fetches from a static file server
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
    client: Option<reqwest::Client>,
}

impl HttpSource {
    /// Uses the shared client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: None,
        }
    }

    /// Builds a dedicated client from `config`
    pub fn with_config(base_url: impl Into<String>, config: &HttpSourceConfig) -> Result<Self> {
        let base_url = base_url.into();
        let client = build_client(config).map_err(|e| Error::fetch(base_url.as_str(), e))?;
        Ok(Self {
            base_url,
            client: Some(client),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn client(&self) -> &reqwest::Client {
        self.client.as_ref().unwrap_or(&*HTTP_CLIENT)
    }
}

#[async_trait]
impl ClimateSource for HttpSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.url(path);
        log::debug!("GET {}", url);

        let response = self
            .client()
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::fetch(path, e))?;

        if !response.status().is_success() {
            return Err(Error::fetch(path, format!("HTTP {}", response.status())));
        }

        let bytes = response.bytes().await.map_err(|e| Error::fetch(path, e))?;
        Ok(bytes.to_vec())
    }

    fn describe(&self, path: &str) -> String {
        self.url(path)
    }
}

/// Reads from a local directory laid out like the static server
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ClimateSource for DirectorySource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.path(path);

        #[cfg(feature = "tokio-runtime")]
        let bytes = tokio::fs::read(&full).await;
        #[cfg(not(feature = "tokio-runtime"))]
        let bytes = std::fs::read(&full);

        bytes.map_err(|e| Error::fetch(path, format!("{}: {}", full.display(), e)))
    }

    fn describe(&self, path: &str) -> String {
        self.path(path).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_url_joining() {
        let source = HttpSource::new("https://example.org/data/");
        assert_eq!(
            source.url("/tiles/manifest.json"),
            "https://example.org/data/tiles/manifest.json"
        );
        assert_eq!(source.describe("a.json"), "https://example.org/data/a.json");
    }

    #[test]
    fn test_http_with_config() {
        let config = HttpSourceConfig {
            user_agent: "test-agent".to_string(),
            ..HttpSourceConfig::default()
        };
        let source = HttpSource::with_config("http://localhost:1", &config).unwrap();
        assert!(source.client.is_some());
    }

    #[tokio::test]
    async fn test_directory_source_reads_and_reports_missing() {
        let root = std::env::temp_dir().join(format!("koppen-source-{}", std::process::id()));
        std::fs::create_dir_all(root.join("tiles")).unwrap();
        std::fs::write(root.join("tiles/a.json"), b"{}").unwrap();

        let source = DirectorySource::new(&root);
        assert_eq!(source.fetch("tiles/a.json").await.unwrap(), b"{}".to_vec());

        let err = source.fetch("tiles/missing.json").await.unwrap_err();
        assert!(err.is_fetch());

        std::fs::remove_dir_all(&root).ok();
    }
}

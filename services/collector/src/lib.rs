//! Collector - Fetches raw source files with a local on-disk cache
//!
//! Responsibilities:
//! - Fetch files from public hosts (CSV published by health agencies)
//! - Apply rate limiting to avoid degrading source sites
//! - Cache responses under a directory mirroring `host/path`
//! - Report a distinguishable "not found" for unpublished files
//!
//! The cache is keyed purely by location: a cached file is returned as-is
//! unless the caller asks for a refresh.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, info};

const USER_AGENT: &str = "case-reconciler/0.1 (batch research pipeline)";

/// Errors raised while fetching a remote file
#[derive(Error, Debug)]
pub enum FetchError {
    /// The remote resource does not exist (HTTP 404)
    #[error("Not found: {url}")]
    NotFound { url: String },

    /// Any other transport or HTTP status failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Reading or writing the cache failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

/// A fetched file, either read back from the cache or freshly downloaded
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub from_cache: bool,
    pub content_hash: String,
    pub captured_at: DateTime<Utc>,
    pub cache_path: PathBuf,
}

/// Anything able to hand back the bytes of `host/path`.
///
/// `refresh = false` allows a stale cached copy to be returned.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    async fn fetch(&self, host: &str, path: &str, refresh: bool) -> Result<Fetched, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub cache_dir: PathBuf,
    pub rate_limit: Duration,
    pub timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache"),
            rate_limit: Duration::from_millis(1000),
            timeout: Duration::from_secs(120),
        }
    }
}

impl FetcherConfig {
    /// Read `CACHE_DIR` and `RATE_LIMIT_MS`, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_dir: std::env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            rate_limit: std::env::var("RATE_LIMIT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.rate_limit),
            timeout: defaults.timeout,
        }
    }
}

/// HTTP fetcher backed by a filesystem cache
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    config: FetcherConfig,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, config })
    }

    async fn read_cached(&self, path: &Path) -> Result<Option<Fetched>, FetchError> {
        if !fs::try_exists(path).await? {
            return Ok(None);
        }
        let bytes = fs::read(path).await?;
        let captured_at = fs::metadata(path)
            .await?
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(Some(Fetched {
            content_hash: content_hash(&bytes),
            bytes,
            from_cache: true,
            captured_at,
            cache_path: path.to_path_buf(),
        }))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if !self.config.rate_limit.is_zero() {
            debug!("Rate limit: waiting {}ms", self.config.rate_limit.as_millis());
            sleep(self.config.rate_limit).await;
        }

        info!("Fetching: {}", url);
        let resp = self.client.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound { url: url.to_string() });
        }
        let bytes = resp.error_for_status()?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

impl Fetch for Fetcher {
    async fn fetch(&self, host: &str, path: &str, refresh: bool) -> Result<Fetched, FetchError> {
        let cache_path = cache_path(&self.config.cache_dir, host, path);

        if !refresh {
            if let Some(cached) = self.read_cached(&cache_path).await? {
                debug!("Found cached file '{}'", cache_path.display());
                return Ok(cached);
            }
        }

        let url = format!("{}/{}", host.trim_end_matches('/'), path.trim_start_matches('/'));
        let bytes = self.download(&url).await?;
        let hash = content_hash(&bytes);
        info!("  Downloaded: {} bytes, hash: {}", bytes.len(), hash);

        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&cache_path, &bytes).await?;
        debug!("  Cached to: {}", cache_path.display());

        Ok(Fetched {
            bytes,
            from_cache: false,
            content_hash: hash,
            captured_at: Utc::now(),
            cache_path,
        })
    }
}

/// Cache location for `host/path`: the scheme is dropped, everything else mirrored
pub fn cache_path(cache_dir: &Path, host: &str, path: &str) -> PathBuf {
    let host = host
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(host)
        .trim_end_matches('/');
    let mut out = cache_dir.to_path_buf();
    for segment in host.split('/').chain(path.split('/')) {
        if !segment.is_empty() && segment != "." && segment != ".." {
            out.push(segment);
        }
    }
    out
}

pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}

//! Remote source file access

pub mod table;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

pub use table::{RawTable, RawTransaction, REQUIRED_COLUMNS};

use crate::config::SourceConfig;
use crate::error::FetchError;

const USER_AGENT: &str = concat!("txn-pipeline/", env!("CARGO_PKG_VERSION"));

const GOOGLE_DRIVE_DOWNLOAD_URL: &str = "https://drive.google.com/uc?id=";

/// Downloads the raw source file
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Where the bytes come from, for logs
    fn location(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<u8>, FetchError>;
}

/// Plain HTTP(S) download. No retries: a failed download fails the run.
pub struct HttpSourceFetcher {
    client: Client,
    url: String,
}

impl HttpSourceFetcher {
    pub fn new(config: &SourceConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Client)?;

        let url = resolve_download_url(&config.url);
        if url != config.url {
            debug!(
                share_url = %config.url,
                download_url = %url,
                "Rewrote share link to direct download"
            );
        }

        Ok(Self { client, url })
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    fn location(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        info!(url = %self.url, "Downloading source file");

        let http_error = |source| FetchError::Http {
            url: self.url.clone(),
            source,
        };

        let response = self.client.get(&self.url).send().await.map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(http_error)?;
        info!(bytes = bytes.len(), "Source file downloaded");
        Ok(bytes.to_vec())
    }
}

/// Fixed in-memory source, for tests and local dry runs
pub struct StaticSource {
    location: String,
    body: Vec<u8>,
}

impl StaticSource {
    pub fn new(location: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            location: location.into(),
            body: body.into(),
        }
    }
}

#[async_trait]
impl SourceFetcher for StaticSource {
    fn location(&self) -> &str {
        &self.location
    }

    async fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        Ok(self.body.clone())
    }
}

/// Turn a Google Drive share link into its direct download URL.
///
/// `https://drive.google.com/file/d/<id>/view?usp=sharing` becomes
/// `https://drive.google.com/uc?id=<id>`. Any other URL is returned unchanged.
pub fn resolve_download_url(url: &str) -> String {
    let Some(rest) = url
        .strip_prefix("https://drive.google.com/file/d/")
        .or_else(|| url.strip_prefix("http://drive.google.com/file/d/"))
    else {
        return url.to_string();
    };

    let file_id = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if file_id.is_empty() {
        return url.to_string();
    }

    format!("{}{}", GOOGLE_DRIVE_DOWNLOAD_URL, file_id)
}

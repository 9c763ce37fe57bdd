use std::path::Path;
use std::time::Duration;

use reqwest::{Client, Response, Url};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0 Safari/537.36";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
    #[error("unexpected http status {0}")]
    HttpStatus(u16),
    #[error(transparent)]
    Network(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// Retrieves page bodies (index and detail pages) as text.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;
}

/// Transfers one remote resource into a local file and returns the number of bytes written.
#[async_trait::async_trait]
pub trait DownloadExecutor: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError>;
}

/// Request time limits. `page` caps a whole page fetch; downloads are only bounded by
/// `connect` and by `read`, which restarts after every chunk received.
#[derive(Debug, Clone, Copy)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub page: Duration,
    pub read: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            page: Duration::from_secs(30),
            read: Duration::from_secs(60),
        }
    }
}

/// reqwest-backed implementation of both [`Fetcher`] and [`DownloadExecutor`].
/// A desktop-like User-Agent header is added to every request.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    page_timeout: Duration,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeouts(HttpTimeouts::default())
    }

    pub fn with_timeouts(timeouts: HttpTimeouts) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            page_timeout: timeouts.page,
        })
    }

    async fn get(&self, url: &str, total: Option<Duration>) -> Result<Response, FetchError> {
        let url = Url::parse(url)?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        }

        let mut request = self.client.get(url);
        if let Some(total) = total {
            request = request.timeout(total);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let body = self.get(url, Some(self.page_timeout)).await?.text().await?;
        Ok(body)
    }
}

#[async_trait::async_trait]
impl DownloadExecutor for HttpFetcher {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let mut response = self.get(url, None).await?;

        // Create-or-truncate; an interrupted stream leaves a partial file behind.
        let mut file = File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(FetchError::from)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

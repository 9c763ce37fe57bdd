#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bookcrawl_core::{
    CheckpointStore, CrawlConfig, DirectoryCreator, DownloadError, DownloadExecutor, FetchError,
    Fetcher, PatternExtractor, Pipeline,
};

pub const BASE: &str = "http://example.test/page";

pub type Events = Arc<Mutex<Vec<String>>>;

pub fn index_body(links: &[&str]) -> String {
    let mut body = String::from("<html><body>");
    for link in links {
        body.push_str(&format!(
            "<article><h2 class=\"entry-title\"><a href=\"{link}\" rel=\"bookmark\">Book</a></h2></article>\n"
        ));
    }
    body.push_str("</body></html>");
    body
}

pub fn detail_body(download: Option<&str>, category: Option<&str>) -> String {
    let mut body = String::from("<html><body><div class=\"entry\">");
    if let Some(category) = category {
        body.push_str(&format!(
            "<dl><dt>Category:</dt><dd><a href=\"http://example.test/category/x/\" rel=\"category tag\">{category}</a></dd></dl>"
        ));
    }
    if let Some(link) = download {
        body.push_str(&format!(
            "<span class=\"download-links\"><a href=\"{link}\" target=\"_blank\"><i></i>Download PDF</a></span>"
        ));
    }
    body.push_str("</div></body></html>");
    body
}

pub fn index_url(page: u32) -> String {
    format!("{BASE}/{page}")
}

pub fn test_config(dir: &Path) -> CrawlConfig {
    CrawlConfig {
        base_url: BASE.to_string(),
        output_dir: dir.join("out"),
        checkpoint_path: dir.join("lastpagenumber.txt"),
        ledger_path: dir.join("links.csv"),
        workers: 2,
        ..CrawlConfig::default()
    }
}

/// Map-backed fetcher. Unknown URLs answer 404.
#[derive(Clone, Default)]
pub struct StubFetcher {
    pages: Arc<Mutex<HashMap<String, String>>>,
    pub events: Events,
}

impl StubFetcher {
    pub fn new(events: Events) -> Self {
        Self {
            pages: Arc::default(),
            events,
        }
    }

    pub fn page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.lock().unwrap().insert(url.into(), body.into());
        self
    }

    pub fn fetched(&self, url: &str) -> bool {
        self.events
            .lock()
            .unwrap()
            .iter()
            .any(|e| e == &format!("fetch:{url}"))
    }
}

#[async_trait::async_trait]
impl Fetcher for StubFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        self.events.lock().unwrap().push(format!("fetch:{url}"));
        match self.pages.lock().unwrap().get(url) {
            Some(body) => Ok(body.clone()),
            None => Err(FetchError::HttpStatus(404)),
        }
    }
}

/// Writes `payload:<url>` after an optional delay; URLs in `failing` error instead.
/// URLs in `stalled` never finish, like a transfer cut off by killing the process.
#[derive(Clone, Default)]
pub struct StubDownloader {
    pub delay: Duration,
    pub failing: Vec<String>,
    pub stalled: Vec<String>,
    pub events: Events,
}

impl StubDownloader {
    pub fn new(events: Events) -> Self {
        Self {
            delay: Duration::ZERO,
            failing: Vec::new(),
            stalled: Vec::new(),
            events,
        }
    }
}

#[async_trait::async_trait]
impl DownloadExecutor for StubDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.stalled.iter().any(|s| s == url) {
            self.events.lock().unwrap().push(format!("stalled:{url}"));
            std::future::pending::<()>().await;
        }
        if self.failing.iter().any(|f| f == url) {
            self.events.lock().unwrap().push(format!("failed:{url}"));
            return Err(DownloadError::Fetch(FetchError::HttpStatus(500)));
        }
        let payload = format!("payload:{url}");
        tokio::fs::write(dest, &payload).await?;
        self.events.lock().unwrap().push(format!("done:{url}"));
        Ok(payload.len() as u64)
    }
}

/// Creates directories for real and records every call.
#[derive(Clone, Default)]
pub struct RecordingDirs {
    pub calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl DirectoryCreator for RecordingDirs {
    fn create_dir(&mut self, path: &Path) -> std::io::Result<()> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        std::fs::create_dir_all(path)
    }
}

pub fn pipeline(
    config: CrawlConfig,
    fetcher: &StubFetcher,
    downloader: &StubDownloader,
    checkpoint: Arc<dyn CheckpointStore>,
) -> Pipeline {
    Pipeline::new(
        config,
        Arc::new(fetcher.clone()),
        Arc::new(PatternExtractor::default()),
        Arc::new(downloader.clone()),
        checkpoint,
    )
}

pub fn position(events: &Events, event: &str) -> Option<usize> {
    events.lock().unwrap().iter().position(|e| e == event)
}

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;

use crate::config::CrawlConfig;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("checkpoint content is not a page number: {0:?}")]
    Malformed(String),
}

/// Durable page cursor. `load` returning `Ok(None)` means "no usable checkpoint".
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Make sure the store is usable before the crawl starts. Existing content is untouched.
    async fn prepare(&self) -> Result<(), CheckpointError>;
    async fn load(&self) -> Result<Option<u32>, CheckpointError>;
    async fn save(&self, page: u32) -> Result<(), CheckpointError>;
}

/// Plain-text checkpoint holding the decimal number of the last fully processed page.
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn parse_cursor(raw: &str) -> Result<u32, CheckpointError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| CheckpointError::Malformed(raw.to_string()))
}

#[async_trait::async_trait]
impl CheckpointStore for FileCheckpoint {
    async fn prepare(&self) -> Result<(), CheckpointError> {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<u32>, CheckpointError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        parse_cursor(&raw).map(Some)
    }

    async fn save(&self, page: u32) -> Result<(), CheckpointError> {
        // Full overwrite through a sibling temp file so readers never see a half-written number.
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, page.to_string())
            .await
            .map_err(|e| self.io_error(e))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

/// In-memory checkpoint – useful for testing and embedding.
#[derive(Default, Clone)]
pub struct MemoryCheckpoint {
    inner: Arc<RwLock<Option<String>>>,
    saves: Arc<RwLock<Vec<u32>>>,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw content, as if read from a file.
    pub fn with_content(raw: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(raw.into()))),
            saves: Arc::default(),
        }
    }

    /// Every page number saved, in order.
    pub async fn saves(&self) -> Vec<u32> {
        self.saves.read().await.clone()
    }
}

#[async_trait::async_trait]
impl CheckpointStore for MemoryCheckpoint {
    async fn prepare(&self) -> Result<(), CheckpointError> {
        Ok(())
    }

    async fn load(&self) -> Result<Option<u32>, CheckpointError> {
        match self.inner.read().await.as_deref() {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => parse_cursor(raw).map(Some),
        }
    }

    async fn save(&self, page: u32) -> Result<(), CheckpointError> {
        *self.inner.write().await = Some(page.to_string());
        self.saves.write().await.push(page);
        Ok(())
    }
}

/// Pick the first index page to crawl. With `resume` set and a valid cursor `n` stored, the
/// crawl continues at `n + 1`; otherwise it starts at `config.start_page`.
pub async fn resolve_start_page(
    config: &CrawlConfig,
    store: &dyn CheckpointStore,
) -> Result<u32, CheckpointError> {
    if !config.resume {
        return Ok(config.start_page);
    }
    match store.load().await {
        Ok(Some(last)) => {
            log::info!("Resuming after checkpointed page {last}");
            Ok(last.saturating_add(1))
        }
        Ok(None) => {
            log::info!("No checkpoint found, starting at page {}", config.start_page);
            Ok(config.start_page)
        }
        Err(CheckpointError::Malformed(raw)) => {
            log::warn!(
                "Ignoring malformed checkpoint {raw:?}, starting at page {}",
                config.start_page
            );
            Ok(config.start_page)
        }
        Err(e) => Err(e),
    }
}

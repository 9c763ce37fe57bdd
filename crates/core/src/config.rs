use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::barrier::{Barrier, CountingBarrier, NoopBarrier};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

/// How far the crawler may run ahead of completed downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyMode {
    /// Each index page waits for all of its downloads and is then checkpointed.
    #[default]
    Slow,
    /// Pages overlap with in-flight downloads and the checkpoint is never written.
    Fast,
}

impl ConsistencyMode {
    pub fn is_fast(self) -> bool {
        self == ConsistencyMode::Fast
    }

    /// The barrier scoped to one index page for this mode.
    pub fn page_barrier(self) -> Arc<dyn Barrier> {
        match self {
            ConsistencyMode::Slow => Arc::new(CountingBarrier::new()),
            ConsistencyMode::Fast => Arc::new(NoopBarrier),
        }
    }
}

/// Crawl configuration, built once at startup and shared read-only by every stage.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub base_url: String,
    pub output_dir: PathBuf,
    pub checkpoint_path: PathBuf,
    pub ledger_path: PathBuf,
    pub workers: usize,
    pub start_page: u32,
    pub resume: bool,
    pub mode: ConsistencyMode,
    pub per_page_limit: usize,
    pub detail_queue_capacity: usize,
    pub record_queue_capacity: usize,
    pub pool_intake_capacity: usize,
    pub end_sentinel: String,
    pub default_category: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: "http://www.allitebooks.com/page".to_string(),
            output_dir: PathBuf::from("allitebooks"),
            checkpoint_path: PathBuf::from("lastpagenumber.txt"),
            ledger_path: PathBuf::from("links.csv"),
            workers: 10,
            start_page: 1,
            resume: false,
            mode: ConsistencyMode::Slow,
            per_page_limit: 10,
            detail_queue_capacity: 10,
            record_queue_capacity: 10,
            pool_intake_capacity: 100,
            end_sentinel: "No Posts Found.".to_string(),
            default_category: "Uncategorized".to_string(),
        }
    }
}

impl CrawlConfig {
    /// `{base_url}/{page}`, tolerating a trailing slash on the base.
    pub fn index_url(&self, page: u32) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), page)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.workers, "workers"),
            (self.per_page_limit, "per_page_limit"),
            (self.detail_queue_capacity, "detail_queue_capacity"),
            (self.record_queue_capacity, "record_queue_capacity"),
            (self.pool_intake_capacity, "pool_intake_capacity"),
            (self.start_page as usize, "start_page"),
        ];
        for (value, name) in checks {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        Ok(())
    }
}

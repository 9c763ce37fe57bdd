pub mod barrier;
pub mod checkpoint;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod layout;
pub mod ledger;
pub mod pipeline;
pub mod pool;
pub mod url_utils;

pub use barrier::{Barrier, CountingBarrier, NoopBarrier, Ticket};
pub use checkpoint::{resolve_start_page, CheckpointError, CheckpointStore, FileCheckpoint, MemoryCheckpoint};
pub use config::{ConfigError, ConsistencyMode, CrawlConfig};
pub use extract::{ExtractError, Extractor, ItemRecord, PatternExtractor, SelectorExtractor};
pub use fetch::{DownloadError, DownloadExecutor, FetchError, Fetcher, HttpFetcher, HttpTimeouts};
pub use layout::{ensure_output_dir, CategoryDirs, DirectoryCreator, FsDirectories};
pub use ledger::{Ledger, LedgerEntry, LedgerError};
pub use pipeline::{DetailPageRef, Pipeline, PipelineError, RunSummary};
pub use pool::{PoolError, PoolReport, PoolSender, WorkItem, WorkerPool};

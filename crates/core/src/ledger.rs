use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

pub const LEDGER_HEADER: &str = "\"Page\",\"Link\",\"Category\"";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One discovered link. Written once, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry<'a> {
    pub source_url: &'a str,
    pub link: &'a str,
    pub category: &'a str,
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

impl LedgerEntry<'_> {
    pub fn to_row(&self) -> String {
        format!(
            "{},{},{}\n",
            quote(self.source_url),
            quote(self.link),
            quote(self.category)
        )
    }
}

/// Append-only delimited ledger of every discovered (page, link, category) triple.
pub struct Ledger {
    path: PathBuf,
    file: File,
}

impl Ledger {
    /// Open for appending. The header row is written only when the file is new or empty.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| LedgerError::Io {
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        let len = file.metadata().await.map_err(io_err)?.len();
        if len == 0 {
            file.write_all(format!("{LEDGER_HEADER}\n").as_bytes())
                .await
                .map_err(io_err)?;
            file.flush().await.map_err(io_err)?;
        }
        Ok(Self { path, file })
    }

    pub async fn append(&mut self, entry: &LedgerEntry<'_>) -> Result<(), LedgerError> {
        let row = entry.to_row();
        let result = async {
            self.file.write_all(row.as_bytes()).await?;
            self.file.flush().await
        }
        .await;
        result.map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

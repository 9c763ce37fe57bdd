use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::{Extracted, PipelineError};
use crate::barrier::{Barrier, Ticket};
use crate::extract::ItemRecord;
use crate::layout::{destination_for, CategoryDirs};
use crate::ledger::{Ledger, LedgerEntry};
use crate::pool::{PoolSender, WorkItem};

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DispatchReport {
    pub work_items: usize,
}

/// Sole owner of the category directory set and the ledger handle.
pub(crate) struct DispatchStage {
    pub dirs: CategoryDirs,
    pub ledger: Ledger,
    pub pool: PoolSender,
    pub page_barrier: Arc<dyn Barrier>,
    pub run_barrier: Arc<dyn Barrier>,
    pub halt: watch::Sender<bool>,
}

impl DispatchStage {
    pub async fn run(
        mut self,
        mut records: mpsc::Receiver<Extracted>,
    ) -> Result<DispatchReport, PipelineError> {
        let mut report = DispatchReport::default();

        while let Some(Extracted { record, page, ticket }) = records.recv().await {
            match self.dispatch(&record, page).await {
                Ok(count) => report.work_items += count,
                Err(e) => {
                    // Raised before any ticket is released, so the crawler cannot
                    // checkpoint a page whose downloads were abandoned.
                    self.halt.send_replace(true);
                    drop(ticket);
                    return Err(e);
                }
            }
            // Every download of this record now holds its own page ticket.
            drop(ticket);
        }

        Ok(report)
    }

    async fn dispatch(&mut self, record: &ItemRecord, page: u32) -> Result<usize, PipelineError> {
        let dir = self
            .dirs
            .ensure(&record.category)
            .map_err(|source| PipelineError::CategoryDir {
                category: record.category.clone(),
                source,
            })?;
        log::debug!(
            "dispatching {} link(s) from {} (page {page})",
            record.download_links.len(),
            record.source_url
        );

        let mut count = 0;
        for link in &record.download_links {
            self.ledger
                .append(&LedgerEntry {
                    source_url: &record.source_url,
                    link,
                    category: &record.category,
                })
                .await?;

            let Some(destination) = destination_for(&dir, link) else {
                log::warn!("No file name in {link} (from {}), skipping", record.source_url);
                continue;
            };
            let item = WorkItem::new(
                link.clone(),
                destination,
                Ticket::issue(&self.page_barrier),
                Ticket::issue(&self.run_barrier),
            );
            self.pool
                .submit(item)
                .await
                .map_err(|_| PipelineError::StageClosed("worker pool"))?;
            count += 1;
        }
        Ok(count)
    }
}

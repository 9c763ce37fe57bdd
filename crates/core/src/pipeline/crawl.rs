use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::{DetailPageRef, PipelineError};
use crate::barrier::{Barrier, Ticket};
use crate::checkpoint::CheckpointStore;
use crate::config::CrawlConfig;
use crate::extract::Extractor;
use crate::fetch::Fetcher;
use crate::url_utils::resolve_link;

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct CrawlReport {
    pub last_page: Option<u32>,
    pub pages_crawled: usize,
    pub detail_pages: usize,
}

/// Walks index pages in order, feeding detail-page links into the bounded detail queue.
pub(crate) struct IndexCrawler {
    pub config: Arc<CrawlConfig>,
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn Extractor>,
    pub checkpoint: Arc<dyn CheckpointStore>,
    pub page_barrier: Arc<dyn Barrier>,
    pub halt: watch::Receiver<bool>,
}

impl IndexCrawler {
    fn check_halt(&self) -> Result<(), PipelineError> {
        if *self.halt.borrow() {
            return Err(PipelineError::StageClosed("record dispatch"));
        }
        Ok(())
    }

    /// Stops cleanly on the end sentinel or an index page without detail links.
    /// A failed index fetch is fatal.
    pub async fn run(
        self,
        start_page: u32,
        queue: mpsc::Sender<DetailPageRef>,
    ) -> Result<CrawlReport, PipelineError> {
        let mut report = CrawlReport::default();
        let mut page = start_page;

        loop {
            self.check_halt()?;
            let url = self.config.index_url(page);
            log::info!("Currently at {url}");
            let body = self
                .fetcher
                .fetch_page(&url)
                .await
                .map_err(|source| PipelineError::IndexFetch {
                    url: url.clone(),
                    source,
                })?;

            if body.contains(&self.config.end_sentinel) {
                log::info!("The site reports that {url} has no more entries");
                break;
            }

            let links: Vec<String> = self
                .extractor
                .detail_links(&body)
                .into_iter()
                .take(self.config.per_page_limit)
                .map(|link| resolve_link(&url, &link))
                .collect();
            if links.is_empty() {
                log::warn!("Couldn't find any detail pages on {url}, treating it as the end");
                break;
            }

            let count = links.len();
            for link in links {
                // The ticket keeps the page open until this item's downloads are registered.
                let detail = DetailPageRef {
                    url: link,
                    page,
                    ticket: Ticket::issue(&self.page_barrier),
                };
                queue
                    .send(detail)
                    .await
                    .map_err(|_| PipelineError::StageClosed("detail fetch"))?;
            }
            report.pages_crawled += 1;
            report.detail_pages += count;
            report.last_page = Some(page);

            if !self.config.mode.is_fast() {
                log::info!("Waiting for page [{page}] to finish downloading...");
                self.page_barrier.wait().await;
                self.check_halt()?;
                self.checkpoint.save(page).await?;
            }

            page += 1;
        }

        Ok(report)
    }
}

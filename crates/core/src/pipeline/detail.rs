use std::sync::Arc;

use tokio::sync::mpsc;

use super::{DetailPageRef, Extracted};
use crate::config::CrawlConfig;
use crate::extract::{Extractor, ItemRecord};
use crate::fetch::Fetcher;
use crate::url_utils::resolve_unique;

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DetailReport {
    pub records: usize,
    pub skipped: usize,
}

pub(crate) struct DetailStage {
    pub config: Arc<CrawlConfig>,
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn Extractor>,
}

impl DetailStage {
    pub async fn run(
        self,
        mut queue: mpsc::Receiver<DetailPageRef>,
        records: mpsc::Sender<Extracted>,
    ) -> DetailReport {
        let mut report = DetailReport::default();

        while let Some(DetailPageRef { url, page, ticket }) = queue.recv().await {
            let body = match self.fetcher.fetch_page(&url).await {
                Ok(body) => body,
                Err(e) => {
                    log::warn!("Error fetching detail page {url}: {e}");
                    report.skipped += 1;
                    continue;
                }
            };

            let download_links = resolve_unique(&url, self.extractor.download_links(&body));
            if download_links.is_empty() {
                log::warn!("No download links found on {url}");
                report.skipped += 1;
                continue;
            }

            let category = self
                .extractor
                .category(&body)
                .unwrap_or_else(|| self.config.default_category.clone());

            let extracted = Extracted {
                record: ItemRecord {
                    source_url: url,
                    category,
                    download_links,
                },
                page,
                ticket,
            };
            if records.send(extracted).await.is_err() {
                log::error!("Record dispatch stopped, abandoning detail fetch");
                break;
            }
            report.records += 1;
        }

        report
    }
}

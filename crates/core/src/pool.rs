use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::barrier::Ticket;
use crate::fetch::DownloadExecutor;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("worker pool intake is closed")]
    Closed,
}

/// One file to fetch. The tickets were registered when the item was built and are
/// signalled when it is dropped, after the transfer finished or failed.
#[derive(Debug)]
pub struct WorkItem {
    pub remote_url: String,
    pub destination: PathBuf,
    page_ticket: Ticket,
    run_ticket: Ticket,
}

impl WorkItem {
    pub fn new(remote_url: String, destination: PathBuf, page_ticket: Ticket, run_ticket: Ticket) -> Self {
        Self {
            remote_url,
            destination,
            page_ticket,
            run_ticket,
        }
    }

    fn complete(self) {
        let WorkItem { page_ticket, run_ticket, .. } = self;
        drop(page_ticket);
        drop(run_ticket);
    }
}

/// Totals reported once the pool has shut down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Handle to an idle worker. Leased by the dispatcher together with an item and handed back
/// to the idle queue by the worker when the item is done.
struct WorkerSlot {
    id: usize,
    tx: mpsc::Sender<Lease>,
}

struct Lease {
    item: WorkItem,
    slot: WorkerSlot,
}

/// Cloneable submission side of the pool.
#[derive(Clone)]
pub struct PoolSender {
    tx: mpsc::Sender<WorkItem>,
}

impl PoolSender {
    pub async fn submit(&self, item: WorkItem) -> Result<(), PoolError> {
        self.tx.send(item).await.map_err(|_| PoolError::Closed)
    }
}

/// Fixed set of download workers fed from a bounded intake queue.
pub struct WorkerPool {
    intake: PoolSender,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<PoolReport>>,
}

impl WorkerPool {
    pub fn start(size: usize, intake_capacity: usize, executor: Arc<dyn DownloadExecutor>) -> Self {
        let (intake_tx, intake_rx) = mpsc::channel::<WorkItem>(intake_capacity);
        let (idle_tx, idle_rx) = mpsc::channel::<WorkerSlot>(size);

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let (tx, rx) = mpsc::channel::<Lease>(1);
            // Capacity equals worker count, so seeding the idle queue never fails.
            let _ = idle_tx.try_send(WorkerSlot { id, tx });
            workers.push(tokio::spawn(run_worker(id, rx, idle_tx.clone(), Arc::clone(&executor))));
        }
        drop(idle_tx);

        let dispatcher = tokio::spawn(dispatch(intake_rx, idle_rx));
        Self {
            intake: PoolSender { tx: intake_tx },
            dispatcher,
            workers,
        }
    }

    pub fn sender(&self) -> PoolSender {
        self.intake.clone()
    }

    pub async fn submit(&self, item: WorkItem) -> Result<(), PoolError> {
        self.intake.submit(item).await
    }

    /// Close the intake, let queued work drain, and wait for every worker to exit.
    /// Returns once all other `PoolSender` clones have been dropped as well.
    pub async fn shutdown(self) -> PoolReport {
        let WorkerPool { intake, dispatcher, workers } = self;
        drop(intake);
        if let Err(e) = dispatcher.await {
            log::error!("pool dispatcher failed: {e}");
        }
        join_all(workers)
            .await
            .into_iter()
            .fold(PoolReport::default(), |mut total, joined| {
                match joined {
                    Ok(report) => {
                        total.succeeded += report.succeeded;
                        total.failed += report.failed;
                    }
                    Err(e) => log::error!("download worker failed: {e}"),
                }
                total
            })
    }
}

async fn dispatch(mut intake: mpsc::Receiver<WorkItem>, mut idle: mpsc::Receiver<WorkerSlot>) {
    while let Some(item) = intake.recv().await {
        let Some(slot) = idle.recv().await else {
            log::error!("no workers left, dropping {}", item.remote_url);
            break;
        };
        log::debug!("leasing worker {} for {}", slot.id, item.remote_url);
        let tx = slot.tx.clone();
        if tx.send(Lease { item, slot }).await.is_err() {
            log::error!("download worker exited unexpectedly");
            break;
        }
    }
    // Dropping `idle` here releases every parked slot, which lets idle workers exit.
}

async fn run_worker(
    id: usize,
    mut rx: mpsc::Receiver<Lease>,
    idle: mpsc::Sender<WorkerSlot>,
    executor: Arc<dyn DownloadExecutor>,
) -> PoolReport {
    let mut report = PoolReport::default();
    while let Some(Lease { item, slot }) = rx.recv().await {
        log::debug!("worker {id} downloading {}", item.remote_url);
        match executor.download(&item.remote_url, &item.destination).await {
            Ok(bytes) => {
                report.succeeded += 1;
                log::info!("Saved {} ({bytes} bytes) to {}", item.remote_url, item.destination.display());
            }
            Err(e) => {
                report.failed += 1;
                log::warn!("Error downloading/saving {} to {}: {e}", item.remote_url, item.destination.display());
            }
        }
        item.complete();

        // Rejoin the idle queue; failure means the dispatcher is gone and the pool is closing.
        if idle.send(slot).await.is_err() {
            break;
        }
    }
    report
}

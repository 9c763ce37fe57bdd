use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Counting completion signal. Units are registered with `add`, signalled with `done`,
/// and `wait` resolves once nothing is pending.
#[async_trait::async_trait]
pub trait Barrier: Send + Sync {
    fn add(&self, units: usize);
    fn done(&self);
    async fn wait(&self);
    fn pending(&self) -> usize;
}

/// Live barrier backed by a watch channel holding the pending count.
pub struct CountingBarrier {
    pending: watch::Sender<usize>,
    registered: AtomicU64,
    completed: AtomicU64,
}

impl CountingBarrier {
    pub fn new() -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            pending,
            registered: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    /// Total units ever registered.
    pub fn registered(&self) -> u64 {
        self.registered.load(Ordering::SeqCst)
    }

    /// Total units ever signalled done.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}

impl Default for CountingBarrier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Barrier for CountingBarrier {
    fn add(&self, units: usize) {
        if units == 0 {
            return;
        }
        self.registered.fetch_add(units as u64, Ordering::SeqCst);
        self.pending.send_modify(|n| *n += units);
    }

    fn done(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.pending.send_modify(|n| {
            if *n == 0 {
                log::error!("barrier signalled with nothing pending");
            }
            *n = n.saturating_sub(1);
        });
    }

    async fn wait(&self) {
        let mut rx = self.pending.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    fn pending(&self) -> usize {
        *self.pending.borrow()
    }
}

/// Stand-in for the page barrier in fast mode: nothing is counted and `wait` never blocks.
#[derive(Default)]
pub struct NoopBarrier;

#[async_trait::async_trait]
impl Barrier for NoopBarrier {
    fn add(&self, _units: usize) {}

    fn done(&self) {}

    async fn wait(&self) {}

    fn pending(&self) -> usize {
        0
    }
}

/// One registered unit on a barrier. Created with [`Ticket::issue`], signalled exactly once
/// when dropped, whichever path the owning item takes.
pub struct Ticket {
    barrier: Arc<dyn Barrier>,
}

impl Ticket {
    pub fn issue(barrier: &Arc<dyn Barrier>) -> Self {
        barrier.add(1);
        Self {
            barrier: Arc::clone(barrier),
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.barrier.done();
    }
}

impl std::fmt::Debug for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticket")
            .field("pending", &self.barrier.pending())
            .finish()
    }
}

//! Media worker pool
//!
//! A fixed pool of media-engine workers is spawned at startup, one per
//! available CPU core unless configured otherwise. Each worker forwards
//! RTP for the routers assigned to it; that packet path runs inside the
//! engine and is never entered by control-plane code here. Rooms are
//! bound to a worker round-robin at creation time and never rebalanced.

use crate::config::SfuConfig;
use crate::error::{Result, SfuError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Handle to one media-engine worker.
#[derive(Debug)]
pub struct Worker {
    id: String,
    index: usize,
    router_count: AtomicUsize,
    alive: watch::Sender<bool>,
}

impl Worker {
    fn new(index: usize) -> Self {
        let (alive, _) = watch::channel(true);
        Self {
            id: format!("worker-{}-{}", index, nanoid::nanoid!(6)),
            index,
            router_count: AtomicUsize::new(0),
            alive,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Number of live routers currently assigned to this worker.
    #[must_use]
    pub fn router_count(&self) -> usize {
        self.router_count.load(Ordering::Relaxed)
    }

    pub(crate) fn router_created(&self) {
        self.router_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn router_closed(&self) {
        self.router_count.fetch_sub(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }
}

/// Fixed-size pool of media workers with round-robin assignment.
///
/// The round-robin cursor is private to the pool instance, so independent
/// pools (e.g. in tests) never interfere with one another.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<Arc<Worker>>,
    next: AtomicUsize,
    death_tx: watch::Sender<Option<usize>>,
}

impl WorkerPool {
    /// Spawn the full pool. Must complete before any room is created;
    /// a pool without workers cannot serve media, so that is an error.
    pub fn spawn(config: &SfuConfig) -> Result<Self> {
        let count = if config.num_workers == 0 {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .map_err(|e| SfuError::WorkerPoolInit(e.to_string()))?
        } else {
            config.num_workers
        };

        if count == 0 {
            return Err(SfuError::WorkerPoolInit(
                "worker count resolved to zero".to_string(),
            ));
        }

        let workers: Vec<Arc<Worker>> =
            (0..count).map(|i| Arc::new(Worker::new(i))).collect();
        for worker in &workers {
            info!(worker_id = %worker.id(), "Media worker spawned");
        }

        let (death_tx, _) = watch::channel(None);
        Ok(Self {
            workers,
            next: AtomicUsize::new(0),
            death_tx,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Next worker in strict round-robin order. Called exactly once per
    /// room, at room-creation time.
    #[must_use]
    pub fn next_worker(&self) -> Arc<Worker> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        Arc::clone(&self.workers[index])
    }

    #[must_use]
    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    /// Watch channel that yields the index of a dead worker.
    ///
    /// Worker death is unrecoverable for the whole server: no room state
    /// can be continued without its worker, so the subscriber is expected
    /// to terminate the process.
    #[must_use]
    pub fn subscribe_death(&self) -> watch::Receiver<Option<usize>> {
        self.death_tx.subscribe()
    }

    /// Report a worker as dead (driven by the media engine's liveness
    /// signal). Marks the worker and notifies death subscribers.
    pub fn report_worker_death(&self, index: usize) {
        if let Some(worker) = self.workers.get(index) {
            error!(worker_id = %worker.id(), "Media worker died");
            worker.alive.send_replace(false);
            self.death_tx.send_replace(Some(index));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> WorkerPool {
        WorkerPool::spawn(&SfuConfig {
            num_workers: n,
            ..SfuConfig::default()
        })
        .expect("pool")
    }

    #[test]
    fn test_pool_size_from_config() {
        assert_eq!(pool(3).len(), 3);
    }

    #[test]
    fn test_auto_size_uses_available_cores() {
        let pool = pool(0);
        assert!(!pool.is_empty());
    }

    #[test]
    fn test_round_robin_assignment() {
        let pool = pool(2);
        let order: Vec<usize> = (0..5).map(|_| pool.next_worker().index()).collect();
        assert_eq!(order, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_independent_pools_do_not_share_cursor() {
        let a = pool(2);
        let b = pool(2);
        assert_eq!(a.next_worker().index(), 0);
        assert_eq!(a.next_worker().index(), 1);
        // Pool b starts from its own cursor
        assert_eq!(b.next_worker().index(), 0);
    }

    #[test]
    fn test_death_notification() {
        let pool = pool(2);
        let mut rx = pool.subscribe_death();
        assert_eq!(*rx.borrow(), None);
        pool.report_worker_death(1);
        assert!(rx.has_changed().expect("watch alive"));
        assert_eq!(*rx.borrow_and_update(), Some(1));
        assert!(!pool.workers()[1].is_alive());
        assert!(pool.workers()[0].is_alive());
    }
}

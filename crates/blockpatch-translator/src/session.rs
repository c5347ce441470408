use blockpatch_common::ViewerId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use tokio::time::Instant;

/// A connected viewer as seen by the pipeline.
#[derive(Debug)]
pub struct ViewerSession {
    pub viewer: ViewerId,
    pub name: String,
    pub connected_at: Instant,
    packets_handled: AtomicU64,
    chunks_translated: AtomicU64,
    // Hook evaluations hold a read guard until their result is cached.
    in_flight: Arc<RwLock<()>>,
}

impl ViewerSession {
    pub fn new(viewer: ViewerId, name: String) -> Self {
        Self {
            viewer,
            name,
            connected_at: Instant::now(),
            packets_handled: AtomicU64::new(0),
            chunks_translated: AtomicU64::new(0),
            in_flight: Arc::new(RwLock::new(())),
        }
    }

    pub fn record_packet(&self, chunks_translated: u64) {
        self.packets_handled.fetch_add(1, Ordering::Relaxed);
        self.chunks_translated.fetch_add(chunks_translated, Ordering::Relaxed);
    }

    pub fn packets_handled(&self) -> u64 {
        self.packets_handled.load(Ordering::Relaxed)
    }

    pub fn chunks_translated(&self) -> u64 {
        self.chunks_translated.load(Ordering::Relaxed)
    }

    /// Marks a hook evaluation as in flight. `None` once the session is
    /// being drained.
    pub fn track(&self) -> Option<OwnedRwLockReadGuard<()>> {
        Arc::clone(&self.in_flight).try_read_owned().ok()
    }

    /// Waits until every tracked evaluation has finished.
    pub async fn drain(&self) {
        let _idle = self.in_flight.write().await;
    }
}

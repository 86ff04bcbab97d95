use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Accounting for every decoded frame. Frames register themselves on
/// creation and deregister on drop, so a nonzero `live()` after engine
/// shutdown means a leak and `released > created` means a double free.
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    created: AtomicU64,
    released: AtomicU64,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_created(&self) {
        self.inner.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_released(&self) {
        self.inner.released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn created(&self) -> u64 {
        self.inner.created.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> u64 {
        self.inner.released.load(Ordering::Relaxed)
    }

    /// Frames currently held somewhere in the engine.
    pub fn live(&self) -> u64 {
        self.created().saturating_sub(self.released())
    }
}

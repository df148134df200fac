use std::sync::atomic::{AtomicU32, Ordering};

use contextdb_core::traits::IndexBackend;
use contextdb_core::types::BackendKind;
use contextdb_lexical::InMemoryIndex;
use contextdb_vector::PersistentIndex;

/// The closed set of backends an engine can run on.
pub enum Backend {
    Persistent(PersistentIndex),
    InMemory(InMemoryIndex),
}

impl Backend {
    /// The one place that picks an implementation.
    pub fn index(&self) -> &dyn IndexBackend {
        match self {
            Self::Persistent(p) => p,
            Self::InMemory(m) => m,
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Persistent(_) => BackendKind::Persistent,
            Self::InMemory(_) => BackendKind::InMemory,
        }
    }
}

/// Counts consecutive failures and says when to give up on a backend.
/// A threshold of 0 never trips.
#[derive(Debug)]
pub struct FailureTracker {
    threshold: u32,
    consecutive: AtomicU32,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self { Self { threshold, consecutive: AtomicU32::new(0) } }

    pub fn record_success(&self) { self.consecutive.store(0, Ordering::Relaxed); }

    /// Returns true once the threshold is reached.
    pub fn record_failure(&self) -> bool {
        let n = self.consecutive.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        self.threshold > 0 && n >= self.threshold
    }

    pub fn consecutive(&self) -> u32 { self.consecutive.load(Ordering::Relaxed) }
}

//! Process-wide cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable handle shared between the ingest thread, the writer pool,
/// and a `ctrlc` handler.
///
/// Mirrors the token used to tear down a block graph on Ctrl-C: every
/// long-running loop polls `is_canceled()` at a natural boundary (here,
/// between packets) instead of being interrupted asynchronously.
#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, not-yet-canceled token.
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True once `cancel()` has been called on any clone of this token.
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_across_clones() {
        let a = CancellationToken::new();
        let b = a.clone();
        assert!(!a.is_canceled());
        b.cancel();
        assert!(a.is_canceled());
    }
}

//! Cooperative cancellation token, shared by the coordinator loop and the
//! ctrl-c listener spawned in `main`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cheap-to-clone token backed by an `AtomicBool`. The coordinator checks
/// it once per batch boundary; it is never consulted mid-batch, so a
/// cancel request always finishes the in-flight persistence commit first.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)) }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled_and_latches_once_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}

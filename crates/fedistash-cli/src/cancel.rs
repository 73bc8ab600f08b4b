//! Cooperative cancellation for long destructive batches.
//!
//! Ctrl-C sets a flag; the batch loops poll it between items and flush a
//! checkpoint before exiting, so an interrupted run never loses the work it
//! already did. No raw signal handling happens inside the loops themselves.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

/// A flag that flips once the user asks to stop.
#[derive(Clone, Debug)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Install the Ctrl-C handler and return the token it trips.
    pub fn install() -> Self {
        let token = Self(Arc::new(AtomicBool::new(false)));
        let flag = Arc::clone(&token.0);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, finishing the current item");
                flag.store(true, Ordering::SeqCst);
            }
        });
        token
    }

    /// True once cancellation was requested.
    pub fn cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    #[cfg(test)]
    pub(crate) fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_flag_is_shared_across_clones() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.cancelled());
        token.cancel();
        assert!(observer.cancelled());
    }
}

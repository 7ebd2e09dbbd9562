use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{DatanetError, Result};

const RUNNING: u8 = 0;
const CANCELLED: u8 = 1;
const ABORTED: u8 = 2;

/// Cancel/abort flag shared with a running scan, polled at every run and
/// archive boundary.
#[derive(Debug, Clone, Default)]
pub struct ScanHandle {
    state: Arc<AtomicU8>,
}

impl ScanHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ends the current scan pass. The reader can start a new pass afterwards.
    pub fn cancel(&self) {
        let _ = self
            .state
            .compare_exchange(RUNNING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// Ends the scan for good; every later pass stops immediately.
    pub fn abort(&self) {
        self.state.store(ABORTED, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::SeqCst) == CANCELLED
    }

    pub fn is_aborted(&self) -> bool {
        self.state.load(Ordering::SeqCst) == ABORTED
    }

    /// `Err` once a stop was requested. Abort wins over cancel.
    pub fn check(&self) -> Result<()> {
        match self.state.load(Ordering::SeqCst) {
            RUNNING => Ok(()),
            ABORTED => Err(DatanetError::Aborted),
            _ => Err(DatanetError::Cancelled),
        }
    }

    /// Clears a pending cancel before a new pass. Aborts stick.
    pub(crate) fn rearm(&self) {
        let _ = self
            .state
            .compare_exchange(CANCELLED, RUNNING, Ordering::SeqCst, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_through_clones() {
        let handle = ScanHandle::new();
        let remote = handle.clone();
        assert!(handle.check().is_ok());

        remote.cancel();
        assert!(handle.is_cancelled());
        assert!(matches!(handle.check(), Err(DatanetError::Cancelled)));

        handle.rearm();
        assert!(handle.check().is_ok());
    }

    #[test]
    fn abort_overrides_cancel_and_sticks() {
        let handle = ScanHandle::new();
        handle.cancel();
        handle.abort();
        handle.cancel();
        handle.rearm();
        assert!(handle.is_aborted());
        assert!(matches!(handle.check(), Err(DatanetError::Aborted)));
    }

    #[test]
    fn cancel_from_another_thread() {
        let handle = ScanHandle::new();
        let remote = handle.clone();
        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(handle.is_cancelled());
    }
}

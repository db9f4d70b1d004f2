use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// Shared "a client is connected" gate.
///
/// The UART has a single reader at any time: the bridge while a client is
/// connected, the idle poller otherwise. The poller holds the gate for a whole
/// read-and-dispatch cycle via [`ActiveLink::hold_idle`], and
/// [`ActiveLink::claim`] waits for that cycle to finish before the bridge
/// takes over.
#[derive(Debug, Clone, Default)]
pub struct ActiveLink(Arc<Mutex<bool>>);

impl ActiveLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        *self.0.lock()
    }

    /// Mark a link as live until the returned guard is dropped.
    ///
    /// Blocks while an idle cycle is in progress.
    pub fn claim(&self) -> ActiveGuard {
        *self.0.lock() = true;
        ActiveGuard(self.clone())
    }

    /// Keep the link idle for as long as the returned guard lives.
    ///
    /// Returns `None` if a link is already live.
    pub fn hold_idle(&self) -> Option<IdleGuard<'_>> {
        let state = self.0.lock();
        if *state {
            None
        } else {
            Some(IdleGuard(state))
        }
    }
}

/// Clears the [`ActiveLink`] flag on drop.
#[derive(Debug)]
pub struct ActiveGuard(ActiveLink);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        *(self.0).0.lock() = false;
    }
}

/// Holds the [`ActiveLink`] in its idle state; no claim succeeds meanwhile.
#[derive(Debug)]
pub struct IdleGuard<'a>(MutexGuard<'a, bool>);

//! One-shot readiness signal between discovery and network I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_condvar::Condvar;

/// Closed at construction, opened exactly once, never re-closed.
///
/// Any number of lifecycles may [`wait`](Self::wait) on it; opening wakes them all.
pub struct RegistrationGate {
    open: Mutex<bool>,
    condvar: Condvar,
    opened: AtomicBool,
}

impl RegistrationGate {
    pub fn new() -> Self {
        Self {
            open: Mutex::new(false),
            condvar: Condvar::new(),
            opened: AtomicBool::new(false),
        }
    }

    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    /// Opens the gate. Returns `true` only for the call that actually opened it.
    pub async fn open(&self) -> bool {
        let mut open = self.open.lock().await;
        if *open {
            return false;
        }
        *open = true;
        self.opened.store(true, Ordering::Release);
        self.condvar.notify_all();
        true
    }

    /// Suspends until the gate is open.
    pub async fn wait(&self) {
        let mut open = self.open.lock().await;
        while !*open {
            open = self.condvar.wait(open).await;
        }
    }
}

impl Default for RegistrationGate {
    fn default() -> Self {
        Self::new()
    }
}

//! Unix signal handling for the listener daemon.
//!
//! SIGTERM and SIGINT request a graceful stop. The handler only sets a
//! flag; the listen loop checks it once per iteration, so the stop takes
//! effect within one receive timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::debug;

/// The flag wired to the process signal handlers.
static INSTALLED: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Cooperative shutdown flag shared between the signal handler and the
/// listen loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// Creates a new, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wires this flag to SIGTERM and SIGINT.
    ///
    /// Only the first flag installed in a process is wired; the daemon
    /// installs exactly one.
    #[cfg(unix)]
    pub fn install(&self) {
        let _ = INSTALLED.set(self.flag.clone());

        extern "C" fn on_signal(_signal: libc::c_int) {
            if let Some(flag) = INSTALLED.get() {
                flag.store(true, Ordering::SeqCst);
            }
        }

        let handler = on_signal as extern "C" fn(libc::c_int);
        unsafe {
            libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
            libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        }
        debug!("signal handlers installed");
    }

    /// Non-Unix: no signals are wired; the flag still works manually.
    #[cfg(not(unix))]
    pub fn install(&self) {}

    /// True once a stop has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Requests a stop programmatically.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

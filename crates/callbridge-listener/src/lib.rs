//! The callbridge daemon: holds the process lease, keeps a CTI session
//! alive and runs the listen loop that bridges the wire protocol to the
//! on-disk command inbox and event outbox.
//!
//! One listener process serves a machine. The [`Runner`] claims the
//! lease on startup and checks it before every write, so starting a
//! second listener quietly retires the first instead of racing it.
//!
//! # Example
//!
//! ```rust,no_run
//! use callbridge_core::StorageLayout;
//! use callbridge_listener::{ListenerConfig, Runner, ShutdownFlag};
//!
//! # fn main() -> callbridge_listener::ListenerResult<()> {
//! let shutdown = ShutdownFlag::new();
//! shutdown.install();
//! let mut runner = Runner::new(
//!     ListenerConfig::load()?,
//!     &StorageLayout::default_layout(),
//!     shutdown,
//! )?;
//! runner.run()?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod lease;
mod reconnect;
mod runner;
mod session;
mod signals;

pub use config::{ListenerConfig, ProxySettings};
pub use error::{ListenerError, ListenerResult};
pub use lease::{
    ProcessLease, ProcessRecord, ProcessStatus, is_running, kill, launch, read_record,
};
pub use reconnect::{ReconnectPolicy, ReconnectState};
pub use runner::Runner;
pub use session::{CtiSession, ProcessMask, ResponseCallback, dial, fresh_identity};
pub use signals::ShutdownFlag;

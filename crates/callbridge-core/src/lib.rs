//! Shared plumbing for the callbridge workspace: storage layout, the
//! command inbox and event outbox the daemon and accessory invocations
//! exchange state through, and tracing setup.

pub mod command;
pub mod record;
pub mod storage;
pub mod tracing;

pub use command::{Command, CommandInbox};
pub use record::{EventOutbox, EventRecord};
pub use storage::{StorageError, StorageLayout, StorageResult, default_config_path};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};

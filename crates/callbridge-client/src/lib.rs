//! CLI, bridge facade, listener entry point
//!
//! This crate provides the `callbridge` command-line interface.

pub mod cli;
pub mod error;
pub mod facade;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
pub use facade::{Bridge, ConnectOverrides};

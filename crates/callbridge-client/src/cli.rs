//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// callbridge - bridge a telephony switch into your contact tooling
#[derive(Debug, Parser)]
#[command(name = "callbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALLBRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start (or restart) the listener daemon and wait until it is up
    Connect {
        /// CTI server host
        #[arg(long)]
        host: Option<String>,

        /// CTI server port
        #[arg(long)]
        port: Option<u16>,

        /// Client id presented to the server
        #[arg(long)]
        client_id: Option<String>,

        /// Client type presented to the server
        #[arg(long)]
        client_type: Option<String>,

        /// Key the per-connection client GUID is derived from
        #[arg(long)]
        unique_key: Option<String>,

        /// Encrypt the connection with TLS
        #[arg(long)]
        tls: Option<bool>,

        /// Event subscription mask (1 transfer-request, 2 call-start,
        /// 4 call-end; OR them together)
        #[arg(long)]
        event_mask: Option<u8>,
    },

    /// Stop the listener daemon
    Disconnect,

    /// Show the listener state
    Status,

    /// Queue a call between two numbers
    Call {
        /// Calling number
        from: String,
        /// Called number
        to: String,
    },

    /// Queue a transfer of an active call
    Transfer {
        /// Call to redirect
        call_id: String,
        /// Receiving number
        to: String,
    },

    /// Drain accepted events and print them as JSON lines
    Events,

    /// Run the listener in the foreground
    Listen,
}

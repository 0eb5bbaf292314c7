//! callbridge CLI entry point.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use callbridge_core::{StorageLayout, TracingConfig, init_tracing};
use callbridge_listener::{ListenerConfig, Runner, ShutdownFlag, read_record};

use callbridge_client::cli::{Cli, Command};
use callbridge_client::error::{ClientError, ClientResult};
use callbridge_client::facade::{Bridge, ConnectOverrides};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = match (&cli.command, cli.debug) {
        (Some(Command::Listen), false) => TracingConfig::daemon(),
        (Some(Command::Listen), true) => {
            TracingConfig::daemon().with_env_filter("callbridge=debug,wire=debug")
        }
        (_, true) => TracingConfig::cli_debug(),
        (_, false) => TracingConfig::default().with_level(Level::WARN),
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> ClientResult<()> {
    let bridge = Bridge::new(StorageLayout::default_layout(), cli.config.clone());

    match cli.command {
        Some(Command::Connect {
            host,
            port,
            client_id,
            client_type,
            unique_key,
            tls,
            event_mask,
        }) => {
            let overrides = ConnectOverrides {
                host,
                port,
                client_id,
                client_type,
                unique_key,
                tls,
                event_mask,
            };
            bridge.connect(&overrides)?;
            println!("listener is up");
            Ok(())
        }
        Some(Command::Disconnect) => {
            bridge.disconnect()?;
            println!("listener stopped");
            Ok(())
        }
        Some(Command::Status) => status(&bridge),
        Some(Command::Call { from, to }) => {
            bridge.call(&from, &to)?;
            println!("call {} -> {} queued", from, to);
            Ok(())
        }
        Some(Command::Transfer { call_id, to }) => {
            bridge.transfer(&call_id, &to)?;
            println!("transfer of call {} to {} queued", call_id, to);
            Ok(())
        }
        Some(Command::Events) => events(&bridge),
        Some(Command::Listen) => listen(cli.config.as_deref()),
        None => {
            println!("callbridge - bridge a telephony switch into your contact tooling");
            println!();
            println!("Run 'callbridge --help' for usage information.");
            println!();
            println!("Quick start:");
            println!("  1. Start the listener: callbridge connect --host pbx.example.com --client-id 171");
            println!("  2. Place a call: callbridge call 555 222");
            println!("  3. Collect events: callbridge events");
            Ok(())
        }
    }
}

/// Prints the lease record in human-readable form.
fn status(bridge: &Bridge) -> ClientResult<()> {
    let Some(record) = read_record(&bridge.lease_path()) else {
        println!("listener: never started");
        return Ok(());
    };
    let running = bridge.is_connected();
    println!("listener: {}", if running { "running" } else { "not running" });
    println!("  pid: {}", record.id);
    println!("  status: {}", record.status.as_str());
    println!("  started: {}", format_stamp(record.time_start));
    println!("  last activity: {}", format_stamp(record.time_last_activity));
    if let Some(stop) = record.time_stop {
        println!("  stopped: {}", format_stamp(stop));
    }
    Ok(())
}

/// Prints drained events as JSON lines, oldest first.
fn events(bridge: &Bridge) -> ClientResult<()> {
    for record in bridge.get_events()? {
        let line = serde_json::to_string(&record)
            .map_err(|e| ClientError::Storage(format!("cannot render event: {}", e)))?;
        println!("{}", line);
    }
    Ok(())
}

/// Runs the listener in the foreground until a shutdown signal.
fn listen(config_path: Option<&Path>) -> ClientResult<()> {
    let config = match config_path {
        Some(path) => ListenerConfig::load_from(path)?,
        None => ListenerConfig::load()?,
    };
    let shutdown = ShutdownFlag::new();
    shutdown.install();
    let mut runner = Runner::new(config, &StorageLayout::default_layout(), shutdown)?;
    runner.run()?;
    Ok(())
}

fn format_stamp(stamp: i64) -> String {
    chrono::DateTime::from_timestamp(stamp, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| stamp.to_string())
}

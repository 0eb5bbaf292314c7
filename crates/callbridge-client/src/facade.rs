//! The bridge facade.
//!
//! Accessory invocations act on the shared filesystem surfaces (config
//! file, command inbox, event outbox, lease record), never on the socket.
//! The daemon picks the changes up on its own schedule.

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use callbridge_core::{
    Command, CommandInbox, EventOutbox, EventRecord, StorageLayout, default_config_path,
};
use callbridge_listener::{is_running, kill, launch};

use crate::error::{ClientError, ClientResult};

/// How long `connect` waits for the launched daemon to claim the lease.
const STARTUP_WAIT: Duration = Duration::from_secs(2);
const STARTUP_POLL: Duration = Duration::from_millis(100);

/// Config keys `connect` can override.
#[derive(Debug, Default)]
pub struct ConnectOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub client_id: Option<String>,
    pub client_type: Option<String>,
    pub unique_key: Option<String>,
    pub tls: Option<bool>,
    pub event_mask: Option<u8>,
}

impl ConnectOverrides {
    fn is_empty(&self) -> bool {
        self.host.is_none()
            && self.port.is_none()
            && self.client_id.is_none()
            && self.client_type.is_none()
            && self.unique_key.is_none()
            && self.tls.is_none()
            && self.event_mask.is_none()
    }

    fn apply(&self, doc: &mut toml_edit::DocumentMut) {
        if let Some(ref host) = self.host {
            doc["host"] = toml_edit::value(host.as_str());
        }
        if let Some(port) = self.port {
            doc["port"] = toml_edit::value(i64::from(port));
        }
        if let Some(ref client_id) = self.client_id {
            doc["client_id"] = toml_edit::value(client_id.as_str());
        }
        if let Some(ref client_type) = self.client_type {
            doc["client_type"] = toml_edit::value(client_type.as_str());
        }
        if let Some(ref unique_key) = self.unique_key {
            doc["unique_key"] = toml_edit::value(unique_key.as_str());
        }
        if let Some(tls) = self.tls {
            doc["tls"] = toml_edit::value(tls);
        }
        if let Some(mask) = self.event_mask {
            doc["event_mask"] = toml_edit::value(i64::from(mask));
        }
    }
}

/// An accessory process's handle on the listener.
#[derive(Debug)]
pub struct Bridge {
    layout: StorageLayout,
    config_path: Option<PathBuf>,
}

impl Bridge {
    /// Creates a facade over the given storage layout.
    ///
    /// `config_path` is the explicitly requested config file, if any;
    /// without one the daemon and the facade both use the default path.
    pub fn new(layout: StorageLayout, config_path: Option<PathBuf>) -> Self {
        Self {
            layout,
            config_path,
        }
    }

    /// (Re)starts the listener daemon.
    ///
    /// Stops any current holder of the lease, persists the overrides,
    /// launches a fresh daemon and waits for it to claim the lease.
    pub fn connect(&self, overrides: &ConnectOverrides) -> ClientResult<()> {
        self.layout.ensure_dirs()?;
        kill(&self.layout.lease_path())?;
        self.persist_overrides(overrides)?;
        launch(self.config_path.as_deref())?;
        self.await_listener()
    }

    /// Stops the listener daemon. Reconnection intent dies with the
    /// process, so a stopped listener stays stopped.
    pub fn disconnect(&self) -> ClientResult<()> {
        kill(&self.layout.lease_path())?;
        Ok(())
    }

    /// True while a live listener holds the lease.
    pub fn is_connected(&self) -> bool {
        is_running(&self.layout.lease_path(), false)
    }

    /// Queues a call command for the daemon's next pump.
    pub fn call(&self, from: &str, to: &str) -> ClientResult<()> {
        self.submit(Command::Call {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Queues a transfer command for the daemon's next pump.
    pub fn transfer(&self, call_id: &str, to: &str) -> ClientResult<()> {
        self.submit(Command::Transfer {
            call_id: call_id.to_string(),
            to: to.to_string(),
        })
    }

    /// Drains every stored event.
    pub fn get_events(&self) -> ClientResult<Vec<EventRecord>> {
        self.layout.ensure_dirs()?;
        Ok(EventOutbox::new(self.layout.events_dir()).drain()?)
    }

    /// The lease record path, for status display.
    pub fn lease_path(&self) -> PathBuf {
        self.layout.lease_path()
    }

    fn submit(&self, command: Command) -> ClientResult<()> {
        self.layout.ensure_dirs()?;
        CommandInbox::new(self.layout.commands_dir()).submit(&command)?;
        debug!(kind = command.kind(), "command queued");
        Ok(())
    }

    fn effective_config_path(&self) -> PathBuf {
        self.config_path.clone().unwrap_or_else(default_config_path)
    }

    fn persist_overrides(&self, overrides: &ConnectOverrides) -> ClientResult<()> {
        if overrides.is_empty() {
            return Ok(());
        }
        let path = self.effective_config_path();
        let content = if path.exists() {
            fs::read_to_string(&path)?
        } else {
            String::new()
        };
        let merged = merged_config(&content, overrides)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, merged)?;
        info!(path = %path.display(), "connection overrides saved");
        Ok(())
    }

    fn await_listener(&self) -> ClientResult<()> {
        let lease_path = self.layout.lease_path();
        let mut waited = Duration::ZERO;
        while waited < STARTUP_WAIT {
            if is_running(&lease_path, false) {
                return Ok(());
            }
            thread::sleep(STARTUP_POLL);
            waited += STARTUP_POLL;
        }
        Err(ClientError::Connection(
            "listener did not claim its lease in time".to_string(),
        ))
    }
}

/// Merges overrides into a TOML document, preserving its layout.
fn merged_config(content: &str, overrides: &ConnectOverrides) -> ClientResult<String> {
    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| ClientError::Config(format!("cannot edit config: {e}")))?;
    overrides.apply(&mut doc);
    Ok(doc.to_string())
}

//! Daemon configuration.
//!
//! All settings live in a single `config.toml` at
//! `~/.config/callbridge/config.toml` by default (`$CALLBRIDGE_CONFIG`
//! overrides the path). A missing file means defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use callbridge_core::default_config_path;
use callbridge_cti::EVENT_MASK_ALL;
use callbridge_ws::ProxyAddr;

use crate::error::{ListenerError, ListenerResult};

/// Configuration for the listener daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// CTI server host.
    pub host: String,

    /// CTI server port.
    pub port: u16,

    /// Line identifier this client presents to the server.
    pub client_id: String,

    /// Client type tag presented to the server.
    pub client_type: String,

    /// Secret mixed into the per-connection client GUID.
    pub unique_key: String,

    /// Queued commands older than this many seconds are dropped unsent.
    pub command_ttl_secs: u64,

    /// Connect with TLS; TLS also carries the XML without base64 wrapping.
    pub tls: bool,

    /// Forward proxy to tunnel through, when set.
    pub proxy: Option<ProxySettings>,

    /// Bitmask of event types written to the outbox.
    pub event_mask: u8,

    /// Keep reconnecting after the connection drops.
    pub auto_reconnect: bool,

    /// Blocking receive timeout in seconds.
    pub read_timeout_secs: u64,
}

/// Forward proxy address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 10150,
            client_id: String::new(),
            client_type: "callbridge".to_string(),
            unique_key: String::new(),
            command_ttl_secs: 10,
            tls: false,
            proxy: None,
            event_mask: EVENT_MASK_ALL,
            auto_reconnect: true,
            read_timeout_secs: 10,
        }
    }
}

impl ListenerConfig {
    /// Loads configuration from the default path.
    pub fn load() -> ListenerResult<Self> {
        let path = default_config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ListenerResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ListenerError::config(format!("failed to read config: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| ListenerError::config(format!("failed to parse config: {e}")))
    }

    /// The endpoint url; the scheme encodes TLS and proxy use.
    pub fn url(&self) -> String {
        let mut scheme = String::from("ws");
        if self.tls {
            scheme.push('s');
        }
        if self.proxy.is_some() {
            scheme.push('p');
        }
        format!("{scheme}://{}:{}/", self.host, self.port)
    }

    /// The proxy address for the connector, when configured.
    pub fn proxy_addr(&self) -> Option<ProxyAddr> {
        self.proxy.as_ref().map(|proxy| ProxyAddr {
            host: proxy.host.clone(),
            port: proxy.port,
        })
    }

    pub fn command_ttl(&self) -> Duration {
        Duration::from_secs(self.command_ttl_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// True when XML payloads are base64-wrapped on the wire; every
    /// non-TLS scheme wraps.
    pub fn wire_base64(&self) -> bool {
        !self.tls
    }
}

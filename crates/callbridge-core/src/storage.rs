//! On-disk layout shared by the listener daemon and accessory invocations.
//!
//! The two sides never talk directly: commands flow in through the command
//! inbox directory, events flow out through the event outbox directory, and
//! the lease file arbitrates which process is the authoritative listener.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by inbox/outbox filesystem operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying filesystem error.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An event record could not be serialized or parsed.
    #[error("malformed event record: {0}")]
    Record(#[from] serde_json::Error),
}

/// Filesystem layout for the bridge's shared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    /// Creates a layout rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the default layout.
    ///
    /// Uses `$CALLBRIDGE_DATA_DIR` if set, otherwise the platform data
    /// directory (`~/.local/share/callbridge` on Linux).
    pub fn default_layout() -> Self {
        if let Ok(dir) = std::env::var("CALLBRIDGE_DATA_DIR") {
            return Self::new(dir);
        }
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join("callbridge"))
    }

    /// Returns the layout root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding queued outbound commands.
    pub fn commands_dir(&self) -> PathBuf {
        self.root.join("commands")
    }

    /// Directory holding event records awaiting pickup.
    pub fn events_dir(&self) -> PathBuf {
        self.root.join("events")
    }

    /// Path of the listener lease record.
    pub fn lease_path(&self) -> PathBuf {
        self.root.join("listener.lease")
    }

    /// Creates the inbox and outbox directories if missing.
    pub fn ensure_dirs(&self) -> StorageResult<()> {
        fs::create_dir_all(self.commands_dir())?;
        fs::create_dir_all(self.events_dir())?;
        Ok(())
    }
}

/// Returns the default configuration file path.
///
/// Uses `$CALLBRIDGE_CONFIG` if set, otherwise the platform config
/// directory (`~/.config/callbridge/config.toml` on Linux).
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("CALLBRIDGE_CONFIG") {
        return PathBuf::from(path);
    }
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("callbridge").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn layout_paths() {
        let layout = StorageLayout::new("/var/lib/callbridge");
        assert_eq!(layout.commands_dir(), Path::new("/var/lib/callbridge/commands"));
        assert_eq!(layout.events_dir(), Path::new("/var/lib/callbridge/events"));
        assert_eq!(layout.lease_path(), Path::new("/var/lib/callbridge/listener.lease"));
    }

    #[test]
    fn ensure_dirs_creates_both() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("state"));

        layout.ensure_dirs().unwrap();

        assert!(layout.commands_dir().is_dir());
        assert!(layout.events_dir().is_dir());
    }

    #[test]
    fn ensure_dirs_is_idempotent() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());

        layout.ensure_dirs().unwrap();
        layout.ensure_dirs().unwrap();
    }

    #[test]
    fn default_config_path_shape() {
        let path = default_config_path();
        let s = path.to_string_lossy();
        assert!(s.contains("callbridge"));
        assert!(s.ends_with("config.toml"));
    }
}

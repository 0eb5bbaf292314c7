//! Listener process lease.
//!
//! A single record file arbitrates which process is the authoritative
//! listener. The daemon writes its record on startup and re-verifies
//! ownership before every later write, so a newer listener silently takes
//! over and the older one finds out at its next heartbeat. Accessory
//! invocations never hold the lease; they read it, launch a daemon, or
//! signal one.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{self, Stdio};

use tracing::{debug, info, warn};

use crate::error::{ListenerError, ListenerResult};

/// Interface tag the listener records in its lease.
const INTERFACE: &str = "cti";

/// Lease lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Claimed, not yet connected anywhere.
    Started,
    /// Connected to the CTI server.
    Active,
    /// Running without a live connection.
    Inactive,
    /// Shut down.
    Stopped,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Stopped => "stopped",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "started" => Some(Self::Started),
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }
}

/// One parsed lease record.
///
/// On disk this is a single line of `", "`-joined fields: id, interface,
/// start time, last-activity time, stop time (empty while running) and
/// status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub id: String,
    pub interface: String,
    pub time_start: i64,
    pub time_last_activity: i64,
    pub time_stop: Option<i64>,
    pub status: ProcessStatus,
}

impl ProcessRecord {
    fn to_line(&self) -> String {
        let stop = self.time_stop.map(|t| t.to_string()).unwrap_or_default();
        [
            self.id.clone(),
            self.interface.clone(),
            self.time_start.to_string(),
            self.time_last_activity.to_string(),
            stop,
            self.status.as_str().to_string(),
        ]
        .join(", ")
    }

    fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split(", ").collect();
        if parts.len() != 6 {
            return None;
        }
        Some(Self {
            id: parts[0].to_string(),
            interface: parts[1].to_string(),
            time_start: parts[2].parse().ok()?,
            time_last_activity: parts[3].parse().ok()?,
            time_stop: if parts[4].is_empty() {
                None
            } else {
                Some(parts[4].parse().ok()?)
            },
            status: ProcessStatus::parse(parts[5])?,
        })
    }
}

/// The daemon's claim on the listener role.
#[derive(Debug)]
pub struct ProcessLease {
    path: PathBuf,
    record: ProcessRecord,
}

impl ProcessLease {
    /// Claims the lease for the current process.
    ///
    /// Always overwrites an existing record; the newest claimant wins and
    /// the previous holder notices at its next verified write.
    pub fn claim(path: impl Into<PathBuf>) -> ListenerResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let now = chrono::Utc::now().timestamp();
        let record = ProcessRecord {
            id: process::id().to_string(),
            interface: INTERFACE.to_string(),
            time_start: now,
            time_last_activity: now,
            time_stop: None,
            status: ProcessStatus::Started,
        };
        let lease = Self { path, record };
        lease.save()?;
        info!(path = %lease.path.display(), id = %lease.record.id, "claimed listener lease");
        Ok(lease)
    }

    /// Returns the path of the lease record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True while the persisted record is still ours.
    pub fn verify(&self) -> bool {
        matches!(read_record(&self.path), Some(record) if record.id == self.record.id)
    }

    /// Re-stamps last activity.
    ///
    /// Fails closed when the persisted record is no longer ours; nothing
    /// is written in that case.
    pub fn update_activity(&mut self) -> ListenerResult<()> {
        self.checked_write(None)
    }

    /// Moves the lease to a new status, stamping activity (and stop time
    /// when stopping). Fails closed like [`ProcessLease::update_activity`].
    pub fn update_status(&mut self, status: ProcessStatus) -> ListenerResult<()> {
        self.checked_write(Some(status))
    }

    /// Marks the lease stopped; a lost mandate is not an error here.
    pub fn stop(&mut self) {
        if let Err(error) = self.update_status(ProcessStatus::Stopped) {
            debug!(%error, "lease already out of our hands at stop");
        }
    }

    fn checked_write(&mut self, status: Option<ProcessStatus>) -> ListenerResult<()> {
        if !self.verify() {
            let holder = read_record(&self.path).map(|r| r.id).unwrap_or_default();
            return Err(ListenerError::mandate_lost(format!(
                "lease record now belongs to process {holder:?}"
            )));
        }
        self.record.time_last_activity = chrono::Utc::now().timestamp();
        if let Some(status) = status {
            self.record.status = status;
            if status == ProcessStatus::Stopped {
                self.record.time_stop = Some(self.record.time_last_activity);
            }
        }
        self.save()
    }

    fn save(&self) -> ListenerResult<()> {
        fs::write(&self.path, self.record.to_line())?;
        Ok(())
    }
}

/// Reads the persisted lease record, if a well-formed one exists.
pub fn read_record(path: &Path) -> Option<ProcessRecord> {
    let text = fs::read_to_string(path).ok()?;
    ProcessRecord::parse(text.trim_end())
}

/// True when a live listener currently holds the lease.
///
/// With `any_interface` false, a record for a different interface does
/// not count.
pub fn is_running(path: &Path, any_interface: bool) -> bool {
    let Some(record) = read_record(path) else {
        return false;
    };
    if !any_interface && record.interface != INTERFACE {
        return false;
    }
    if record.status == ProcessStatus::Stopped {
        return false;
    }
    record.id.parse::<u32>().is_ok_and(process_alive)
}

/// Spawns the listener daemon detached from the calling terminal.
///
/// The caller polls [`is_running`] afterwards; the spawn itself only
/// proves the process started, not that it claimed the lease.
pub fn launch(config_path: Option<&Path>) -> ListenerResult<()> {
    let exe = std::env::current_exe()?;
    let mut command = process::Command::new(exe);
    if let Some(path) = config_path {
        command.arg("--config").arg(path);
    }
    command
        .arg("listen")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    detach(&mut command);
    let child = command.spawn()?;
    debug!(pid = child.id(), "launched listener process");
    Ok(())
}

/// Stops whatever process holds the lease; no-op when nothing does.
pub fn kill(path: &Path) -> ListenerResult<()> {
    if !is_running(path, true) {
        return Ok(());
    }
    let Some(record) = read_record(path) else {
        return Ok(());
    };
    let signalled = record.id.parse::<u32>().is_ok_and(signal_stop);
    if !signalled {
        // Cannot reach the process; drop the record so it stops counting
        // as running.
        warn!(id = %record.id, "removing lease record for unreachable listener");
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    // Signal 0 probes for existence without delivering anything.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(unix)]
fn signal_stop(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn signal_stop(_pid: u32) -> bool {
    false
}

/// Puts the daemon in its own session so terminal signals do not reach it.
#[cfg(unix)]
fn detach(command: &mut process::Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        command.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn detach(_command: &mut process::Command) {}

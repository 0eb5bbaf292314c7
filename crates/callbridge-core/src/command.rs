//! Outbound command inbox.
//!
//! Accessory invocations queue call and transfer commands as empty files in
//! the command directory; the listener daemon drains the directory once per
//! loop iteration. The file name is the whole record:
//! `{kind}_{unix-time}_{arg1}_{arg2}`.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::storage::StorageResult;

/// A command queued by an accessory invocation for the listener to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Originate a call from one number to another.
    Call { from: String, to: String },
    /// Transfer an active call to another number.
    Transfer { call_id: String, to: String },
}

impl Command {
    /// The kind tag used as the file-name prefix.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Call { .. } => "call",
            Command::Transfer { .. } => "transfer",
        }
    }

    /// Inbox file name for this command queued at `stamp` (unix seconds).
    pub fn file_name(&self, stamp: i64) -> String {
        let (a, b) = self.args();
        format!("{}_{}_{}_{}", self.kind(), stamp, a, b)
    }

    /// Hash of the normalized parameters, excluding the queue timestamp.
    ///
    /// Two commands with the same kind and arguments collapse to the same
    /// key, so re-queued duplicates are sent once per drain pass.
    pub fn dedup_key(&self) -> String {
        let (a, b) = self.args();
        format!("{:x}", md5::compute(format!("{}{}{}", self.kind(), a, b)))
    }

    fn args(&self) -> (&str, &str) {
        match self {
            Command::Call { from, to } => (from, to),
            Command::Transfer { call_id, to } => (call_id, to),
        }
    }

    /// Parses an inbox file name back into a command and its queue stamp.
    ///
    /// Returns `None` for anything that is not exactly four `_`-separated
    /// fields with a known kind and a numeric stamp.
    pub fn parse_file_name(name: &str) -> Option<(Command, i64)> {
        let parts: Vec<&str> = name.split('_').collect();
        if parts.len() != 4 {
            return None;
        }
        let stamp: i64 = parts[1].parse().ok()?;
        let command = match parts[0] {
            "call" => Command::Call {
                from: parts[2].to_string(),
                to: parts[3].to_string(),
            },
            "transfer" => Command::Transfer {
                call_id: parts[2].to_string(),
                to: parts[3].to_string(),
            },
            _ => return None,
        };
        Some((command, stamp))
    }
}

/// Filesystem inbox for outbound commands.
#[derive(Debug, Clone)]
pub struct CommandInbox {
    dir: PathBuf,
}

impl CommandInbox {
    /// Creates an inbox over the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Queues a command, stamped with the current wall-clock time.
    pub fn submit(&self, command: &Command) -> StorageResult<()> {
        let name = command.file_name(chrono::Utc::now().timestamp());
        fs::write(self.dir.join(&name), [])?;
        debug!(entry = %name, "queued command");
        Ok(())
    }

    /// Drains the inbox in a single pass.
    ///
    /// Every entry is removed whether or not it survives. Entries older
    /// than `ttl` (by their embedded stamp) and entries with unparseable
    /// names are discarded; survivors are deduplicated by normalized
    /// parameters within this pass. Calls are returned before transfers.
    pub fn drain(&self, ttl: Duration) -> StorageResult<Vec<Command>> {
        let now = chrono::Utc::now().timestamp();
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            names.push(entry.file_name());
        }
        // Deterministic pass order, which also puts calls ahead of
        // transfers for the dedup scan.
        names.sort();

        let mut seen = HashSet::new();
        let mut calls = Vec::new();
        let mut transfers = Vec::new();
        for name in names {
            let path = self.dir.join(&name);
            fs::remove_file(&path)?;

            let Some(text) = name.to_str() else {
                debug!(entry = ?name, "discarded unparseable command entry");
                continue;
            };
            let Some((command, stamp)) = Command::parse_file_name(text) else {
                debug!(entry = %text, "discarded unparseable command entry");
                continue;
            };
            if now - stamp > ttl.as_secs() as i64 {
                debug!(entry = %text, "discarded expired command entry");
                continue;
            }
            if !seen.insert(command.dedup_key()) {
                debug!(entry = %text, "discarded duplicate command entry");
                continue;
            }
            match command {
                Command::Call { .. } => calls.push(command),
                Command::Transfer { .. } => transfers.push(command),
            }
        }

        calls.extend(transfers);
        Ok(calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &std::path::Path, name: &str) {
        fs::write(dir.join(name), []).unwrap();
    }

    mod names {
        use super::*;

        #[test]
        fn call_file_name_round_trips() {
            let command = Command::Call {
                from: "555".into(),
                to: "222".into(),
            };
            let name = command.file_name(1700000000);
            assert_eq!(name, "call_1700000000_555_222");

            let (parsed, stamp) = Command::parse_file_name(&name).unwrap();
            assert_eq!(parsed, command);
            assert_eq!(stamp, 1700000000);
        }

        #[test]
        fn transfer_file_name_round_trips() {
            let command = Command::Transfer {
                call_id: "34".into(),
                to: "101".into(),
            };
            let name = command.file_name(42);
            assert_eq!(name, "transfer_42_34_101");

            let (parsed, stamp) = Command::parse_file_name(&name).unwrap();
            assert_eq!(parsed, command);
            assert_eq!(stamp, 42);
        }

        #[test]
        fn rejects_malformed_names() {
            assert!(Command::parse_file_name("call_123_555").is_none());
            assert!(Command::parse_file_name("call_123_555_222_extra").is_none());
            assert!(Command::parse_file_name("call_abc_555_222").is_none());
            assert!(Command::parse_file_name("hangup_123_555_222").is_none());
            assert!(Command::parse_file_name("notes.txt").is_none());
        }

        #[test]
        fn dedup_key_ignores_stamp() {
            let early = Command::Call {
                from: "555".into(),
                to: "222".into(),
            };
            let late = early.clone();
            assert_eq!(early.dedup_key(), late.dedup_key());
            assert_eq!(early.dedup_key(), "251d1fb5d13e1c96d11e9b6961c44917");
        }

        #[test]
        fn dedup_key_separates_kinds_and_args() {
            let call = Command::Call {
                from: "34".into(),
                to: "101".into(),
            };
            let transfer = Command::Transfer {
                call_id: "34".into(),
                to: "101".into(),
            };
            assert_ne!(call.dedup_key(), transfer.dedup_key());
            assert_eq!(transfer.dedup_key(), "adf7b65c72de337537931df0fd0ae367");
        }
    }

    mod drain {
        use super::*;

        #[test]
        fn duplicate_calls_collapse_to_one() {
            let dir = tempdir().unwrap();
            let inbox = CommandInbox::new(dir.path());
            let now = chrono::Utc::now().timestamp();

            touch(dir.path(), &format!("call_{}_555_222", now - 9));
            touch(dir.path(), &format!("call_{}_555_222", now - 2));

            let commands = inbox.drain(Duration::from_secs(10)).unwrap();
            assert_eq!(
                commands,
                vec![Command::Call {
                    from: "555".into(),
                    to: "222".into(),
                }]
            );
        }

        #[test]
        fn expired_entries_are_discarded_but_removed() {
            let dir = tempdir().unwrap();
            let inbox = CommandInbox::new(dir.path());
            let now = chrono::Utc::now().timestamp();

            touch(dir.path(), &format!("call_{}_555_222", now - 9));
            touch(dir.path(), &format!("call_{}_101_202", now - 11));

            let commands = inbox.drain(Duration::from_secs(10)).unwrap();
            assert_eq!(
                commands,
                vec![Command::Call {
                    from: "555".into(),
                    to: "222".into(),
                }]
            );
            assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        }

        #[test]
        fn malformed_entries_are_discarded_but_removed() {
            let dir = tempdir().unwrap();
            let inbox = CommandInbox::new(dir.path());
            let now = chrono::Utc::now().timestamp();

            touch(dir.path(), "junk");
            touch(dir.path(), &format!("transfer_{}_34_101", now));

            let commands = inbox.drain(Duration::from_secs(10)).unwrap();
            assert_eq!(
                commands,
                vec![Command::Transfer {
                    call_id: "34".into(),
                    to: "101".into(),
                }]
            );
            assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        }

        #[test]
        fn calls_come_before_transfers() {
            let dir = tempdir().unwrap();
            let inbox = CommandInbox::new(dir.path());
            let now = chrono::Utc::now().timestamp();

            touch(dir.path(), &format!("transfer_{}_34_101", now - 3));
            touch(dir.path(), &format!("call_{}_555_222", now - 1));

            let commands = inbox.drain(Duration::from_secs(10)).unwrap();
            assert_eq!(commands.len(), 2);
            assert!(matches!(commands[0], Command::Call { .. }));
            assert!(matches!(commands[1], Command::Transfer { .. }));
        }

        #[test]
        fn submit_then_drain_round_trips() {
            let dir = tempdir().unwrap();
            let inbox = CommandInbox::new(dir.path());
            let command = Command::Call {
                from: "171".into(),
                to: "222".into(),
            };

            inbox.submit(&command).unwrap();

            let commands = inbox.drain(Duration::from_secs(10)).unwrap();
            assert_eq!(commands, vec![command]);
            assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        }

        #[test]
        fn subdirectories_are_left_alone() {
            let dir = tempdir().unwrap();
            let inbox = CommandInbox::new(dir.path());

            fs::create_dir(dir.path().join("nested")).unwrap();

            let commands = inbox.drain(Duration::from_secs(10)).unwrap();
            assert!(commands.is_empty());
            assert!(dir.path().join("nested").is_dir());
        }
    }
}

//! Event outbox records.
//!
//! Each switch event the listener accepts becomes one JSON file in the event
//! directory; accessory invocations pick records up read-then-delete. The
//! JSON carries a `type` discriminant plus the per-type field subset, with
//! every value kept as the attribute text it had on the wire.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::storage::StorageResult;

/// An accepted switch event, in its external on-disk shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventRecord {
    /// The switch asks where to route an incoming call.
    #[serde(rename = "1")]
    TransferRequest {
        #[serde(rename = "callID")]
        call_id: String,
        from: String,
    },
    /// A call has been answered.
    #[serde(rename = "2")]
    CallStart {
        #[serde(rename = "callID")]
        call_id: String,
        from: String,
        to: String,
    },
    /// A call has finished; carries the full journal entry.
    #[serde(rename = "4")]
    CallEnd {
        #[serde(rename = "callID")]
        call_id: String,
        from: String,
        to: String,
        start: String,
        end: String,
        duration: String,
        direction: String,
        record: String,
    },
}

/// Filesystem outbox for accepted events.
#[derive(Debug, Clone)]
pub struct EventOutbox {
    dir: PathBuf,
}

impl EventOutbox {
    /// Creates an outbox over the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes one record.
    ///
    /// The name leads with the current unix time so a lexicographic pass
    /// reads records in arrival order; the uuid keeps same-second names
    /// apart.
    pub fn push(&self, record: &EventRecord) -> StorageResult<()> {
        let name = format!("{}_{}", chrono::Utc::now().timestamp(), Uuid::new_v4());
        let json = serde_json::to_string(record)?;
        fs::write(self.dir.join(&name), json)?;
        debug!(entry = %name, "wrote event record");
        Ok(())
    }

    /// Reads and removes every record, oldest first.
    ///
    /// Entries that do not parse as records are removed and skipped.
    pub fn drain(&self) -> StorageResult<Vec<EventRecord>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            names.push(entry.file_name());
        }
        names.sort();

        let mut records = Vec::new();
        for name in names {
            let path = self.dir.join(&name);
            let text = fs::read_to_string(&path)?;
            fs::remove_file(&path)?;
            match serde_json::from_str(&text) {
                Ok(record) => records.push(record),
                Err(error) => {
                    debug!(entry = ?name, %error, "discarded unparseable event record");
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    mod shape {
        use super::*;

        #[test]
        fn transfer_request_json() {
            let record = EventRecord::TransferRequest {
                call_id: "77".into(),
                from: "555".into(),
            };
            insta::assert_snapshot!(
                serde_json::to_string(&record).unwrap(),
                @r#"{"type":"1","callID":"77","from":"555"}"#
            );
        }

        #[test]
        fn call_start_json() {
            let record = EventRecord::CallStart {
                call_id: "34".into(),
                from: "101".into(),
                to: "202".into(),
            };
            insta::assert_snapshot!(
                serde_json::to_string(&record).unwrap(),
                @r#"{"type":"2","callID":"34","from":"101","to":"202"}"#
            );
        }

        #[test]
        fn call_end_json() {
            let record = EventRecord::CallEnd {
                call_id: "34".into(),
                from: "101".into(),
                to: "202".into(),
                start: "1700000000".into(),
                end: "1700000042".into(),
                duration: "42".into(),
                direction: "0".into(),
                record: "http://pbx/records/34.mp3".into(),
            };
            insta::assert_snapshot!(
                serde_json::to_string(&record).unwrap(),
                @r#"{"type":"4","callID":"34","from":"101","to":"202","start":"1700000000","end":"1700000042","duration":"42","direction":"0","record":"http://pbx/records/34.mp3"}"#
            );
        }

        #[test]
        fn json_round_trips() {
            let record = EventRecord::CallStart {
                call_id: "34".into(),
                from: "101".into(),
                to: "202".into(),
            };
            let json = serde_json::to_string(&record).unwrap();
            let parsed: EventRecord = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, record);
        }
    }

    mod outbox {
        use super::*;

        #[test]
        fn push_then_drain_round_trips_in_order() {
            let dir = tempdir().unwrap();
            let outbox = EventOutbox::new(dir.path());

            let first = EventRecord::CallStart {
                call_id: "34".into(),
                from: "101".into(),
                to: "202".into(),
            };
            let second = EventRecord::TransferRequest {
                call_id: "35".into(),
                from: "303".into(),
            };

            // Explicit names pin the arrival order without sleeping.
            fs::write(
                dir.path().join("1700000001_a"),
                serde_json::to_string(&first).unwrap(),
            )
            .unwrap();
            fs::write(
                dir.path().join("1700000002_b"),
                serde_json::to_string(&second).unwrap(),
            )
            .unwrap();

            let records = outbox.drain().unwrap();
            assert_eq!(records, vec![first, second]);
            assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        }

        #[test]
        fn push_writes_a_parseable_record() {
            let dir = tempdir().unwrap();
            let outbox = EventOutbox::new(dir.path());
            let record = EventRecord::TransferRequest {
                call_id: "77".into(),
                from: "555".into(),
            };

            outbox.push(&record).unwrap();

            assert_eq!(outbox.drain().unwrap(), vec![record]);
        }

        #[test]
        fn unparseable_entries_are_discarded_but_removed() {
            let dir = tempdir().unwrap();
            let outbox = EventOutbox::new(dir.path());

            fs::write(dir.path().join("1700000001_a"), "not json").unwrap();

            assert!(outbox.drain().unwrap().is_empty());
            assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        }

        #[test]
        fn drain_of_empty_outbox_is_empty() {
            let dir = tempdir().unwrap();
            let outbox = EventOutbox::new(dir.path());
            assert!(outbox.drain().unwrap().is_empty());
        }
    }
}

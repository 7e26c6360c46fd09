//! Event Log Contract
//!
//! Append-only ordered records with per-stream optimistic locking and
//! command-level idempotency. This module defines the abstract contract
//! (the storage-engine seam) and an in-memory implementation used by
//! tests and ephemeral kernels; the SQLite adapter lives in
//! `sqlite_store`.
//!
//! # Contract
//!
//! - `append` is atomic: all events persist with versions
//!   `expected_version+1 ..= expected_version+n`, or nothing is written.
//! - A batch containing an already-applied `command_id` is skipped
//!   wholesale and reported as `AlreadyApplied`, not an error.
//! - `load_all` returns the global insertion order; replay must use the
//!   same order every time.

use crate::governance::events::{Event, StreamId};
use crate::governance::ids::CommandId;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Result of an append attempt that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    /// The batch was persisted.
    Appended { count: usize },
    /// Some `command_id` in the batch was already present; nothing was
    /// written. Exactly-once semantics via the idempotency key.
    AlreadyApplied { command_id: CommandId },
}

/// Storage-layer failures.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// The stream head moved under the writer.
    VersionConflict {
        stream_id: StreamId,
        expected: u64,
        actual: u64,
    },
    /// Uniqueness or ordering constraints violated on read, or an
    /// unreadable record.
    Corrupt { stream_id: StreamId, detail: String },
    /// The log cannot be reached or written.
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VersionConflict {
                stream_id,
                expected,
                actual,
            } => write!(
                f,
                "version conflict on stream {}: expected {}, actual {}",
                stream_id, expected, actual
            ),
            Self::Corrupt { stream_id, detail } => {
                write!(f, "corrupt stream {}: {}", stream_id, detail)
            }
            Self::Unavailable(msg) => write!(f, "event log unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Abstract append-only event log.
pub trait EventLog: Send + Sync {
    /// Atomically append a batch to one stream at `expected_version`.
    ///
    /// Events arrive fully formed; the store validates that their
    /// versions are exactly `expected_version+1..` and that no
    /// `command_id` in the batch has been seen before.
    fn append(
        &self,
        stream_id: &str,
        expected_version: u64,
        events: Vec<Event>,
    ) -> Result<AppendOutcome, StoreError>;

    /// All events of one stream in version order.
    fn load_stream(&self, stream_id: &str) -> Result<Vec<Event>, StoreError>;

    /// Every event in the stable replay order.
    fn load_all(&self) -> Result<Vec<Event>, StoreError>;

    /// Current head version of a stream (0 if the stream is new).
    fn stream_version(&self, stream_id: &str) -> Result<u64, StoreError>;
}

// =============================================================================
// IN-MEMORY LOG
// =============================================================================

#[derive(Default)]
struct MemoryInner {
    /// Global insertion order, which is the replay order.
    global: Vec<Event>,
    /// Per-stream head version.
    heads: HashMap<StreamId, u64>,
    /// Applied idempotency keys.
    command_ids: HashSet<CommandId>,
}

/// In-memory event log for tests and ephemeral kernels.
#[derive(Default)]
pub struct MemoryEventLog {
    inner: RwLock<MemoryInner>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events in the log.
    pub fn len(&self) -> usize {
        self.inner.read().global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventLog for MemoryEventLog {
    fn append(
        &self,
        stream_id: &str,
        expected_version: u64,
        events: Vec<Event>,
    ) -> Result<AppendOutcome, StoreError> {
        if events.is_empty() {
            return Ok(AppendOutcome::Appended { count: 0 });
        }
        let mut inner = self.inner.write();

        if let Some(event) = events.iter().find(|e| inner.command_ids.contains(&e.command_id)) {
            return Ok(AppendOutcome::AlreadyApplied {
                command_id: event.command_id,
            });
        }

        let actual = inner.heads.get(stream_id).copied().unwrap_or(0);
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                stream_id: stream_id.to_string(),
                expected: expected_version,
                actual,
            });
        }

        for (i, event) in events.iter().enumerate() {
            let want = expected_version + 1 + i as u64;
            if event.stream_id != stream_id || event.version != want {
                return Err(StoreError::Corrupt {
                    stream_id: stream_id.to_string(),
                    detail: format!(
                        "batch event {} carries ({}, v{}), expected ({}, v{})",
                        event.event_id, event.stream_id, event.version, stream_id, want
                    ),
                });
            }
        }

        let count = events.len();
        let head = expected_version + count as u64;
        inner.heads.insert(stream_id.to_string(), head);
        for event in events {
            inner.command_ids.insert(event.command_id);
            inner.global.push(event);
        }
        Ok(AppendOutcome::Appended { count })
    }

    fn load_stream(&self, stream_id: &str) -> Result<Vec<Event>, StoreError> {
        let inner = self.inner.read();
        let mut events: Vec<Event> = inner
            .global
            .iter()
            .filter(|e| e.stream_id == stream_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        for (i, event) in events.iter().enumerate() {
            if event.version != i as u64 + 1 {
                return Err(StoreError::Corrupt {
                    stream_id: stream_id.to_string(),
                    detail: format!("version gap at position {}: v{}", i, event.version),
                });
            }
        }
        Ok(events)
    }

    fn load_all(&self) -> Result<Vec<Event>, StoreError> {
        Ok(self.inner.read().global.clone())
    }

    fn stream_version(&self, stream_id: &str) -> Result<u64, StoreError> {
        Ok(self.inner.read().heads.get(stream_id).copied().unwrap_or(0))
    }
}

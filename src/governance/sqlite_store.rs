//! SQLite Event Log
//!
//! Durable adapter for the log contract. One `events` table carries the
//! whole history; `UNIQUE(stream_id, version)` and `UNIQUE(command_id)`
//! enforce the envelope invariants at the storage layer, and a monotonic
//! `seq` column fixes the global replay order. A `projections` table
//! optionally caches snapshot state for fast startup; correctness never
//! depends on it.

use crate::governance::events::{Event, EventKind, StreamType};
use crate::governance::store::{AppendOutcome, EventLog, StoreError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};
use uuid::Uuid;

// =============================================================================
// STORAGE SCHEMA
// =============================================================================

const EVENTS_SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;

CREATE TABLE IF NOT EXISTS events (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL UNIQUE,
    stream_id TEXT NOT NULL,
    stream_type TEXT NOT NULL,
    version INTEGER NOT NULL,
    command_id TEXT NOT NULL UNIQUE,
    event_type TEXT NOT NULL,
    occurred_at TEXT NOT NULL,
    actor_id TEXT NOT NULL,
    payload TEXT NOT NULL,
    UNIQUE(stream_id, version)
);

CREATE INDEX IF NOT EXISTS idx_events_stream_version
    ON events(stream_id, version);

CREATE INDEX IF NOT EXISTS idx_events_type
    ON events(event_type);

CREATE INDEX IF NOT EXISTS idx_events_occurred_at
    ON events(occurred_at);

-- Optional snapshot cache; safe to drop at any time.
CREATE TABLE IF NOT EXISTS projections (
    name TEXT PRIMARY KEY,
    position_event_id TEXT NOT NULL,
    state_blob TEXT NOT NULL,
    updated_at TEXT NOT NULL
) WITHOUT ROWID;
"#;

// =============================================================================
// STATS
// =============================================================================

/// Append statistics.
#[derive(Debug, Default)]
pub struct SqliteLogStats {
    pub events_appended: AtomicU64,
    pub batches_committed: AtomicU64,
    pub duplicates_skipped: AtomicU64,
    pub version_conflicts: AtomicU64,
}

impl SqliteLogStats {
    pub fn summary(&self) -> String {
        format!(
            "events={}, batches={}, duplicates_skipped={}, conflicts={}",
            self.events_appended.load(Ordering::Relaxed),
            self.batches_committed.load(Ordering::Relaxed),
            self.duplicates_skipped.load(Ordering::Relaxed),
            self.version_conflicts.load(Ordering::Relaxed),
        )
    }
}

// =============================================================================
// SQLITE LOG
// =============================================================================

/// Durable event log backed by a single SQLite database.
pub struct SqliteEventLog {
    conn: Mutex<Connection>,
    stats: SqliteLogStats,
}

impl SqliteEventLog {
    /// Open or create the log at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.exists() && !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Unavailable(format!("create dir: {}", e)))?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("open {}: {}", path.display(), e)))?;
        conn.execute_batch(EVENTS_SCHEMA)
            .map_err(|e| StoreError::Unavailable(format!("schema: {}", e)))?;
        info!(db_path = %path.display(), "event log opened");
        Ok(Self {
            conn: Mutex::new(conn),
            stats: SqliteLogStats::default(),
        })
    }

    /// In-memory SQLite database, used by tests that want the real schema.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Unavailable(format!("open :memory:: {}", e)))?;
        conn.execute_batch(EVENTS_SCHEMA)
            .map_err(|e| StoreError::Unavailable(format!("schema: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
            stats: SqliteLogStats::default(),
        })
    }

    pub fn stats(&self) -> &SqliteLogStats {
        &self.stats
    }

    /// Cache a projection snapshot. Best effort; the caller decides what
    /// the blob contains.
    pub fn save_snapshot(
        &self,
        name: &str,
        position_event_id: Uuid,
        state_blob: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO projections (name, position_event_id, state_blob, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET
                 position_event_id = excluded.position_event_id,
                 state_blob = excluded.state_blob,
                 updated_at = excluded.updated_at",
            params![
                name,
                position_event_id.to_string(),
                state_blob,
                updated_at.to_rfc3339()
            ],
        )
        .map_err(|e| StoreError::Unavailable(format!("save snapshot: {}", e)))?;
        Ok(())
    }

    /// Load a cached projection snapshot, if any.
    pub fn load_snapshot(&self, name: &str) -> Result<Option<(Uuid, String)>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT position_event_id, state_blob FROM projections WHERE name = ?1",
            params![name],
            |row| {
                let id: String = row.get(0)?;
                let blob: String = row.get(1)?;
                Ok((id, blob))
            },
        )
        .optional()
        .map_err(|e| StoreError::Unavailable(format!("load snapshot: {}", e)))?
        .map(|(id, blob)| {
            let position = Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt {
                stream_id: name.to_string(),
                detail: format!("snapshot position id: {}", e),
            })?;
            Ok((position, blob))
        })
        .transpose()
    }

    fn row_to_event(row: &rusqlite::Row<'_>) -> Result<Event, StoreError> {
        let stream_id: String = row.get(1).map_err(sql_corrupt)?;
        let corrupt = |detail: String| StoreError::Corrupt {
            stream_id: stream_id.clone(),
            detail,
        };

        let event_id: String = row.get(0).map_err(sql_corrupt)?;
        let stream_type_raw: String = row.get(2).map_err(sql_corrupt)?;
        let version: i64 = row.get(3).map_err(sql_corrupt)?;
        let command_id: String = row.get(4).map_err(sql_corrupt)?;
        let occurred_at_raw: String = row.get(5).map_err(sql_corrupt)?;
        let actor_id: String = row.get(6).map_err(sql_corrupt)?;
        let payload: String = row.get(7).map_err(sql_corrupt)?;

        let stream_type = StreamType::parse(&stream_type_raw)
            .ok_or_else(|| corrupt(format!("unknown stream type '{}'", stream_type_raw)))?;
        // Unknown event types fail here: schema drift is fatal, not a no-op.
        let kind: EventKind = serde_json::from_str(&payload)
            .map_err(|e| corrupt(format!("payload decode: {}", e)))?;
        let occurred_at = DateTime::parse_from_rfc3339(&occurred_at_raw)
            .map_err(|e| corrupt(format!("occurred_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(Event {
            event_id: Uuid::parse_str(&event_id)
                .map_err(|e| corrupt(format!("event id: {}", e)))?,
            stream_id: stream_id.clone(),
            stream_type,
            version: version as u64,
            command_id: Uuid::parse_str(&command_id)
                .map_err(|e| corrupt(format!("command id: {}", e)))?,
            occurred_at,
            actor_id,
            kind,
        })
    }
}

fn sql_corrupt(e: rusqlite::Error) -> StoreError {
    StoreError::Corrupt {
        stream_id: String::new(),
        detail: format!("row decode: {}", e),
    }
}

const EVENT_COLUMNS: &str =
    "event_id, stream_id, stream_type, version, command_id, occurred_at, actor_id, payload";

impl EventLog for SqliteEventLog {
    fn append(
        &self,
        stream_id: &str,
        expected_version: u64,
        events: Vec<Event>,
    ) -> Result<AppendOutcome, StoreError> {
        if events.is_empty() {
            return Ok(AppendOutcome::Appended { count: 0 });
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Unavailable(format!("begin: {}", e)))?;

        // Idempotency gate: any known command id skips the whole batch.
        for event in &events {
            let seen: Option<i64> = tx
                .query_row(
                    "SELECT seq FROM events WHERE command_id = ?1",
                    params![event.command_id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| StoreError::Unavailable(format!("dedup check: {}", e)))?;
            if seen.is_some() {
                self.stats.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
                debug!(command_id = %event.command_id, "command already applied, skipping batch");
                return Ok(AppendOutcome::AlreadyApplied {
                    command_id: event.command_id,
                });
            }
        }

        let actual: u64 = tx
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM events WHERE stream_id = ?1",
                params![stream_id],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|e| StoreError::Unavailable(format!("head check: {}", e)))?
            as u64;
        if actual != expected_version {
            self.stats.version_conflicts.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::VersionConflict {
                stream_id: stream_id.to_string(),
                expected: expected_version,
                actual,
            });
        }

        let count = events.len();
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
            tx.execute(
                "INSERT INTO events (event_id, stream_id, stream_type, version, command_id,
                                     event_type, occurred_at, actor_id, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    event.event_id.to_string(),
                    event.stream_id,
                    event.stream_type.as_str(),
                    event.version as i64,
                    event.command_id.to_string(),
                    event.event_type(),
                    event.occurred_at.to_rfc3339(),
                    event.actor_id,
                    event.canonical_payload(),
                ],
            )
            .map_err(|e| StoreError::Unavailable(format!("insert: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| StoreError::Unavailable(format!("commit: {}", e)))?;
        self.stats
            .events_appended
            .fetch_add(count as u64, Ordering::Relaxed);
        self.stats.batches_committed.fetch_add(1, Ordering::Relaxed);
        Ok(AppendOutcome::Appended { count })
    }

    fn load_stream(&self, stream_id: &str) -> Result<Vec<Event>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM events WHERE stream_id = ?1 ORDER BY version",
                EVENT_COLUMNS
            ))
            .map_err(|e| StoreError::Unavailable(format!("prepare: {}", e)))?;
        let rows = stmt
            .query_map(params![stream_id], |row| {
                Ok(Self::row_to_event(row))
            })
            .map_err(|e| StoreError::Unavailable(format!("query: {}", e)))?;

        let mut events = Vec::new();
        for row in rows {
            let event = row.map_err(|e| StoreError::Unavailable(format!("row: {}", e)))??;
            let want = events.len() as u64 + 1;
            if event.version != want {
                return Err(StoreError::Corrupt {
                    stream_id: stream_id.to_string(),
                    detail: format!("version gap: expected v{}, found v{}", want, event.version),
                });
            }
            events.push(event);
        }
        Ok(events)
    }

    fn load_all(&self) -> Result<Vec<Event>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM events ORDER BY seq",
                EVENT_COLUMNS
            ))
            .map_err(|e| StoreError::Unavailable(format!("prepare: {}", e)))?;
        let rows = stmt
            .query_map([], |row| Ok(Self::row_to_event(row)))
            .map_err(|e| StoreError::Unavailable(format!("query: {}", e)))?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row.map_err(|e| StoreError::Unavailable(format!("row: {}", e)))??);
        }
        Ok(events)
    }

    fn stream_version(&self, stream_id: &str) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let head: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM events WHERE stream_id = ?1",
                params![stream_id],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Unavailable(format!("head: {}", e)))?;
        Ok(head as u64)
    }
}

//! Identifier Service
//!
//! Event ids are 128-bit and time-sortable: the high bits carry a
//! millisecond UTC timestamp, the low bits a random suffix (UUIDv7
//! layout). Command and correlation ids are opaque UUIDv4 drawn from OS
//! entropy. Weak generators (LCG, Mersenne Twister) are forbidden:
//! predictable ids would make procurement selection an attack surface.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// 128-bit time-sortable event identifier.
pub type EventId = Uuid;

/// Globally unique idempotency key, supplied by the caller per command.
pub type CommandId = Uuid;

/// Source of event, command, and correlation identifiers.
///
/// Together with [`super::clock::Clock`] this is the only source of
/// non-determinism in the kernel; both are substitutable for tests.
pub trait IdSource: Send + Sync {
    /// Next event id, time-sortable relative to `occurred_at`.
    fn next_event_id(&self, occurred_at: DateTime<Utc>) -> EventId;

    /// Fresh command id (for callers that do not supply their own).
    fn new_command_id(&self) -> CommandId;

    /// Fresh correlation id for cross-referencing logs.
    fn correlation_id(&self) -> Uuid;
}

/// Production id source backed by the operating system RNG.
#[derive(Debug, Clone, Default)]
pub struct CryptoIdSource;

impl CryptoIdSource {
    fn random_suffix() -> [u8; 10] {
        let mut suffix = [0u8; 10];
        OsRng.fill_bytes(&mut suffix);
        suffix
    }
}

impl IdSource for CryptoIdSource {
    fn next_event_id(&self, occurred_at: DateTime<Utc>) -> EventId {
        let millis = occurred_at.timestamp_millis().max(0) as u64;
        uuid::Builder::from_unix_timestamp_millis(millis, &Self::random_suffix()).into_uuid()
    }

    fn new_command_id(&self) -> CommandId {
        Uuid::new_v4()
    }

    fn correlation_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Deterministic id source for tests and replay harnesses.
///
/// Ids are drawn from a monotonic counter, so two runs that issue the
/// same operations in the same order mint identical ids.
#[derive(Debug, Default)]
pub struct SequentialIdSource {
    counter: AtomicU64,
}

impl SequentialIdSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl IdSource for SequentialIdSource {
    fn next_event_id(&self, occurred_at: DateTime<Utc>) -> EventId {
        let millis = occurred_at.timestamp_millis().max(0) as u128;
        Uuid::from_u128((millis << 64) | self.next() as u128)
    }

    fn new_command_id(&self) -> CommandId {
        // Disjoint from the event-id space via the tag in the high bits.
        Uuid::from_u128((0xC0DE_u128 << 96) | self.next() as u128)
    }

    fn correlation_id(&self) -> Uuid {
        Uuid::from_u128((0xCAFE_u128 << 96) | self.next() as u128)
    }
}

/// Generate a procurement selection seed from OS entropy.
///
/// Callers may supply any free-form seed string; this helper exists so
/// that operators who do not care get an unpredictable one.
pub fn random_selection_seed() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

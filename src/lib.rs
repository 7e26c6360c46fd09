//! Polity Kernel
//!
//! Event-sourced governance core: append-only log with per-stream
//! optimistic locking, replayable projections, anti-entrenchment
//! invariants, a deterministic reflex tick, and auditable procurement
//! selection. External surfaces (CLI, HTTP, exporters) live elsewhere;
//! this crate is the deterministic core they call into.

pub mod config;
pub mod governance;
pub mod telemetry;

pub use config::{KernelConfig, TimeSource};
pub use governance::{
    AggregateView, Command, CommandEnvelope, CommandOutcome, CryptoIdSource, EventLog,
    FreedomHealth, GovernanceKernel, KernelError, KernelResult, MemoryEventLog, RiskLevel,
    SafetyPolicy, SequentialIdSource, SqliteEventLog, SystemClock, VirtualClock,
};

//! Event-Sourced Governance Kernel
//!
//! Deterministic state machine over an append-only event log. Commands
//! flow through invariant checks into events; projections fold events
//! into read models; a reflex tick scans the projections and records
//! threshold breaches as events of their own.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       GovernanceKernel                          │
//! │  (single writer: version load → handler → append → apply)       │
//! └─────────────────────────────────────────────────────────────────┘
//!          │                    │                    │
//!          ▼                    ▼                    ▼
//!   ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//!   │  Handlers   │      │  EventLog   │      │ Projections │
//!   │ (pure fns)  │      │ (sqlite/mem)│      │ (replayable)│
//!   └──────┬──────┘      └─────────────┘      └──────┬──────┘
//!          │                                         │
//!          ▼                                         ▼
//!   ┌─────────────┐                           ┌─────────────┐
//!   │ Invariants  │                           │ Tick Engine │
//!   │ (pure fns)  │                           │ (reflexes)  │
//!   └─────────────┘                           └─────────────┘
//! ```
//!
//! # Determinism Guarantees
//!
//! - **Clock**: injected; kernel code never reads system time directly
//! - **Ids**: injected; the only other source of non-determinism
//! - **Money**: fixed-point integers, zero-sum checks are exact
//! - **Replay**: rebuilding from the log equals live projections
//! - **Selection**: SHA-256 over a caller seed, recorded for audit

pub mod amount;
pub mod budget_registry;
pub mod clock;
pub mod commands;
pub mod concentration;
pub mod delegation_graph;
pub mod error;
pub mod events;
pub mod expenditure_log;
pub mod facade;
pub mod freedom_health;
pub mod handlers;
pub mod ids;
pub mod invariants;
pub mod law_registry;
pub mod policy;
pub mod procurement;
pub mod projections;
pub mod reflex_state;
pub mod selector;
pub mod sqlite_store;
pub mod store;
pub mod tick;
pub mod workspace_registry;

#[cfg(test)]
mod facade_tests;
#[cfg(test)]
mod selector_tests;
#[cfg(test)]
mod tick_tests;

// Re-exports for convenience
pub use amount::{format_amount, from_amount, to_amount, Amount, AMOUNT_SCALE};
pub use clock::{Clock, SystemClock, VirtualClock};
pub use commands::{AdjustmentRequest, Command, CommandEnvelope};
pub use concentration::{gini, ConcentrationLevel};
pub use error::{KernelError, KernelResult};
pub use events::{
    AllocationChange, BudgetItemInit, BudgetStatus, Event, EventKind, FlexClass, LawStatus,
    Reversibility, ReviewOutcome, SelectionMechanism, StreamType, TenderStatus, Visibility,
};
pub use facade::{AggregateView, CommandOutcome, GovernanceKernel};
pub use freedom_health::{FreedomHealth, RiskLevel};
pub use ids::{random_selection_seed, CommandId, CryptoIdSource, EventId, IdSource,
    SequentialIdSource};
pub use invariants::ValidationError;
pub use policy::{BalanceMode, CheckpointDefaults, FlexLimits, SafetyPolicy};
pub use projections::ProjectionSet;
pub use selector::{
    feasible_set, seed_digest, select, sha256_index, FeasibilityGate, FeasibilityRequirements,
    NoFeasibleSupplier,
};
pub use sqlite_store::{SqliteEventLog, SqliteLogStats};
pub use store::{AppendOutcome, EventLog, MemoryEventLog, StoreError};
pub use tick::{plan_tick, TickPlan};

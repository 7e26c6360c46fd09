//! Event Model
//!
//! Canonical event types for the governance log. Every state change is
//! one immutable event on exactly one stream; projections are folds over
//! these and nothing else.
//!
//! # Envelope Invariants
//!
//! - `(stream_id, version)` unique, versions stream-local and monotonic from 1
//! - `command_id` globally unique (idempotency key)
//! - `event_id` unique and time-sortable
//!
//! # Canonical Serialization
//!
//! Payloads serialize through serde with fixed field order, `BTreeMap` /
//! `BTreeSet` collections, fixed-point integers for money, and RFC 3339
//! UTC timestamps, so the same event always produces the same bytes.

use crate::governance::amount::Amount;
use crate::governance::ids::{CommandId, EventId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Stream identifier, e.g. `law:energy-act` or `system:tick`.
pub type StreamId = String;

pub type WorkspaceId = String;
pub type DelegationId = String;
pub type LawId = String;
pub type BudgetId = String;
pub type ItemId = String;
pub type TenderId = String;
pub type SupplierId = String;
pub type ContractId = String;

/// Opaque actor attribution. Empty for reflex events.
pub type ActorId = String;

// =============================================================================
// STREAMS
// =============================================================================

/// Aggregate family that owns a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Workspace,
    Law,
    Delegation,
    Budget,
    Tender,
    Supplier,
    System,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Law => "law",
            Self::Delegation => "delegation",
            Self::Budget => "budget",
            Self::Tender => "tender",
            Self::Supplier => "supplier",
            Self::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "workspace" => Some(Self::Workspace),
            "law" => Some(Self::Law),
            "delegation" => Some(Self::Delegation),
            "budget" => Some(Self::Budget),
            "tender" => Some(Self::Tender),
            "supplier" => Some(Self::Supplier),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

pub fn workspace_stream(id: &str) -> StreamId {
    format!("workspace:{}", id)
}

pub fn delegation_stream(id: &str) -> StreamId {
    format!("delegation:{}", id)
}

pub fn law_stream(id: &str) -> StreamId {
    format!("law:{}", id)
}

pub fn budget_stream(id: &str) -> StreamId {
    format!("budget:{}", id)
}

pub fn tender_stream(id: &str) -> StreamId {
    format!("tender:{}", id)
}

pub fn supplier_stream(id: &str) -> StreamId {
    format!("supplier:{}", id)
}

/// Synthetic stream for expiry and checkpoint reflex events.
pub const SYSTEM_TICK_STREAM: &str = "system:tick";
/// Synthetic stream for delegation concentration reflex events.
pub const SYSTEM_DELEGATION_GINI_STREAM: &str = "system:delegation_gini";
/// Synthetic stream for supplier concentration reflex events.
pub const SYSTEM_SUPPLIER_GINI_STREAM: &str = "system:supplier_gini";
/// Synthetic stream for budget balance/overspend audits.
pub const SYSTEM_BUDGET_AUDIT_STREAM: &str = "system:budget_audit";

// =============================================================================
// DOMAIN ENUMS
// =============================================================================

/// Who may see a delegation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    OrgOnly,
    Public,
}

/// How hard a law is to unwind once active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reversibility {
    Reversible,
    SemiReversible,
    Irreversible,
}

/// Law lifecycle: DRAFT → ACTIVE → REVIEW → (ACTIVE | SUNSET); SUNSET → ARCHIVED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LawStatus {
    Draft,
    Active,
    Review,
    Sunset,
    Archived,
}

impl LawStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Archived)
    }
}

/// Budget lifecycle: DRAFT → ACTIVE → CLOSED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetStatus {
    Draft,
    Active,
    Closed,
}

/// Per-item adjustment ceiling class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlexClass {
    Critical,
    Important,
    Aspirational,
}

/// Tender lifecycle: DRAFT → OPEN → EVALUATING → AWARDED → CLOSED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenderStatus {
    Draft,
    Open,
    Evaluating,
    Awarded,
    Closed,
}

/// How a winner is picked from the feasible set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionMechanism {
    Rotation,
    Random,
    Hybrid,
}

/// Outcome of a completed law review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    Continue,
    Adjust,
    Sunset,
}

// =============================================================================
// PAYLOAD FRAGMENTS
// =============================================================================

/// Initial line item of a budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetItemInit {
    pub item_id: ItemId,
    pub name: String,
    pub allocated_amount: Amount,
    pub flex_class: FlexClass,
    pub category: String,
}

/// One leg of a zero-sum allocation adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationChange {
    pub item_id: ItemId,
    pub change_amount: Amount,
}

// =============================================================================
// EVENT KIND
// =============================================================================

/// Tagged event payload. Projections dispatch on this exhaustively; an
/// unrecognized tag on replay is a corruption error, never a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    // Workspaces
    WorkspaceCreated {
        workspace_id: WorkspaceId,
        name: String,
        parent_workspace_id: Option<WorkspaceId>,
        scope: BTreeMap<String, String>,
    },
    WorkspaceArchived {
        workspace_id: WorkspaceId,
    },

    // Delegations
    DecisionRightDelegated {
        delegation_id: DelegationId,
        workspace_id: WorkspaceId,
        from_actor: ActorId,
        to_actor: ActorId,
        ttl_days: u32,
        visibility: Visibility,
        expires_at: DateTime<Utc>,
    },
    DelegationRevoked {
        delegation_id: DelegationId,
    },
    DelegationExpired {
        delegation_id: DelegationId,
        workspace_id: WorkspaceId,
        expired_at: DateTime<Utc>,
    },

    // Laws
    LawCreated {
        law_id: LawId,
        workspace_id: WorkspaceId,
        title: String,
        scope: String,
        reversibility: Reversibility,
        checkpoints: Vec<u32>,
        params: BTreeMap<String, String>,
    },
    LawActivated {
        law_id: LawId,
        activated_at: DateTime<Utc>,
        next_checkpoint_at: DateTime<Utc>,
    },
    LawReviewTriggered {
        law_id: LawId,
        checkpoint_index: u32,
        due_at: DateTime<Utc>,
    },
    LawReviewCompleted {
        law_id: LawId,
        outcome: ReviewOutcome,
        new_status: LawStatus,
        checkpoint_index: u32,
        next_checkpoint_at: Option<DateTime<Utc>>,
    },
    LawArchived {
        law_id: LawId,
    },

    // Budgets
    BudgetCreated {
        budget_id: BudgetId,
        law_id: LawId,
        fiscal_year: u16,
        items: Vec<BudgetItemInit>,
        budget_total: Amount,
    },
    BudgetActivated {
        budget_id: BudgetId,
        activated_at: DateTime<Utc>,
    },
    AllocationAdjusted {
        budget_id: BudgetId,
        adjustments: Vec<AllocationChange>,
    },
    ExpenditureApproved {
        budget_id: BudgetId,
        item_id: ItemId,
        amount: Amount,
        memo: Option<String>,
    },
    ExpenditureRejected {
        budget_id: BudgetId,
        item_id: ItemId,
        amount: Amount,
        gate: String,
    },
    BudgetClosed {
        budget_id: BudgetId,
        closed_at: DateTime<Utc>,
    },

    // Procurement
    SupplierRegistered {
        supplier_id: SupplierId,
        name: String,
        supplier_type: String,
        max_contract_value: Amount,
        certifications: BTreeSet<String>,
        years_in_business: u32,
        reputation_score: f64,
    },
    TenderCreated {
        tender_id: TenderId,
        law_id: LawId,
        title: String,
        estimated_value: Amount,
        required_capabilities: BTreeSet<String>,
        min_years_experience: Option<u32>,
        min_reputation: Option<f64>,
        selection_mechanism: SelectionMechanism,
    },
    TenderOpened {
        tender_id: TenderId,
    },
    TenderEvaluated {
        tender_id: TenderId,
        feasible_set: Vec<SupplierId>,
    },
    TenderAwarded {
        tender_id: TenderId,
        supplier_id: SupplierId,
        mechanism: SelectionMechanism,
        seed: String,
        seed_digest: String,
        awarded_value: Amount,
        awarded_at: DateTime<Utc>,
    },
    TenderClosed {
        tender_id: TenderId,
    },

    // Reflex: delegation concentration
    DelegationConcentrationWarning {
        gini: f64,
        max_in_degree: u64,
        actor_count: u64,
        observed_at: DateTime<Utc>,
    },
    DelegationConcentrationHalt {
        gini: f64,
        max_in_degree: u64,
        actor_count: u64,
        observed_at: DateTime<Utc>,
    },
    TransparencyEscalated {
        reason: String,
        observed_at: DateTime<Utc>,
    },

    // Reflex: supplier concentration
    SupplierConcentrationWarning {
        gini: f64,
        supplier_count: u64,
        observed_at: DateTime<Utc>,
    },
    SupplierConcentrationHalt {
        gini: f64,
        supplier_count: u64,
        observed_at: DateTime<Utc>,
    },

    // Reflex: budget audits
    BudgetBalanceViolationDetected {
        budget_id: BudgetId,
        allocated_total: Amount,
        budget_total: Amount,
        observed_at: DateTime<Utc>,
    },
    BudgetOverspendDetected {
        budget_id: BudgetId,
        item_id: ItemId,
        spent_amount: Amount,
        allocated_amount: Amount,
        observed_at: DateTime<Utc>,
    },
}

impl EventKind {
    /// Stable discriminant string, identical to the serde tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::WorkspaceCreated { .. } => "WorkspaceCreated",
            Self::WorkspaceArchived { .. } => "WorkspaceArchived",
            Self::DecisionRightDelegated { .. } => "DecisionRightDelegated",
            Self::DelegationRevoked { .. } => "DelegationRevoked",
            Self::DelegationExpired { .. } => "DelegationExpired",
            Self::LawCreated { .. } => "LawCreated",
            Self::LawActivated { .. } => "LawActivated",
            Self::LawReviewTriggered { .. } => "LawReviewTriggered",
            Self::LawReviewCompleted { .. } => "LawReviewCompleted",
            Self::LawArchived { .. } => "LawArchived",
            Self::BudgetCreated { .. } => "BudgetCreated",
            Self::BudgetActivated { .. } => "BudgetActivated",
            Self::AllocationAdjusted { .. } => "AllocationAdjusted",
            Self::ExpenditureApproved { .. } => "ExpenditureApproved",
            Self::ExpenditureRejected { .. } => "ExpenditureRejected",
            Self::BudgetClosed { .. } => "BudgetClosed",
            Self::SupplierRegistered { .. } => "SupplierRegistered",
            Self::TenderCreated { .. } => "TenderCreated",
            Self::TenderOpened { .. } => "TenderOpened",
            Self::TenderEvaluated { .. } => "TenderEvaluated",
            Self::TenderAwarded { .. } => "TenderAwarded",
            Self::TenderClosed { .. } => "TenderClosed",
            Self::DelegationConcentrationWarning { .. } => "DelegationConcentrationWarning",
            Self::DelegationConcentrationHalt { .. } => "DelegationConcentrationHalt",
            Self::TransparencyEscalated { .. } => "TransparencyEscalated",
            Self::SupplierConcentrationWarning { .. } => "SupplierConcentrationWarning",
            Self::SupplierConcentrationHalt { .. } => "SupplierConcentrationHalt",
            Self::BudgetBalanceViolationDetected { .. } => "BudgetBalanceViolationDetected",
            Self::BudgetOverspendDetected { .. } => "BudgetOverspendDetected",
        }
    }
}

// =============================================================================
// EVENT ENVELOPE
// =============================================================================

/// One persisted record of the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub stream_id: StreamId,
    pub stream_type: StreamType,
    /// Stream-local version, monotonic from 1.
    pub version: u64,
    pub command_id: CommandId,
    pub occurred_at: DateTime<Utc>,
    /// Empty for reflex events.
    pub actor_id: ActorId,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    /// Canonical JSON rendering of the payload (same input, same bytes).
    pub fn canonical_payload(&self) -> String {
        // Struct fields serialize in declaration order; maps are BTree-backed.
        serde_json::to_string(&self.kind).unwrap_or_default()
    }
}

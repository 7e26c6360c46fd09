//! Command Surface
//!
//! Strongly-typed commands. Every command travels in an envelope with a
//! caller-generated `command_id` (the idempotency key; use a
//! cryptographically random value) and an `actor_id` for attribution.

use crate::governance::amount::Amount;
use crate::governance::events::{
    ActorId, BudgetId, BudgetItemInit, DelegationId, ItemId, LawId, ReviewOutcome,
    SelectionMechanism, Reversibility, SupplierId, TenderId, Visibility, WorkspaceId,
};
use crate::governance::ids::CommandId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One leg of a requested allocation adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRequest {
    pub item_id: ItemId,
    pub change_amount: Amount,
}

/// Tagged command payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    CreateWorkspace {
        workspace_id: WorkspaceId,
        name: String,
        parent_workspace_id: Option<WorkspaceId>,
        scope: BTreeMap<String, String>,
    },
    ArchiveWorkspace {
        workspace_id: WorkspaceId,
    },
    DelegateDecisionRight {
        delegation_id: DelegationId,
        workspace_id: WorkspaceId,
        from_actor: ActorId,
        to_actor: ActorId,
        ttl_days: u32,
        visibility: Visibility,
    },
    RevokeDelegation {
        delegation_id: DelegationId,
    },
    CreateLaw {
        law_id: LawId,
        workspace_id: WorkspaceId,
        title: String,
        scope: String,
        reversibility: Reversibility,
        /// Omitted: the policy's default schedule for the class applies.
        checkpoints: Option<Vec<u32>>,
        params: BTreeMap<String, String>,
    },
    ActivateLaw {
        law_id: LawId,
    },
    CompleteReview {
        law_id: LawId,
        outcome: ReviewOutcome,
    },
    ArchiveLaw {
        law_id: LawId,
    },
    CreateBudget {
        budget_id: BudgetId,
        law_id: LawId,
        fiscal_year: u16,
        items: Vec<BudgetItemInit>,
    },
    ActivateBudget {
        budget_id: BudgetId,
    },
    AdjustAllocation {
        budget_id: BudgetId,
        adjustments: Vec<AdjustmentRequest>,
    },
    ApproveExpenditure {
        budget_id: BudgetId,
        item_id: ItemId,
        amount: Amount,
        memo: Option<String>,
    },
    CloseBudget {
        budget_id: BudgetId,
    },
    RegisterSupplier {
        supplier_id: SupplierId,
        name: String,
        supplier_type: String,
        max_contract_value: Amount,
        certifications: BTreeSet<String>,
        years_in_business: u32,
        reputation_score: f64,
    },
    CreateTender {
        tender_id: TenderId,
        law_id: LawId,
        title: String,
        estimated_value: Amount,
        required_capabilities: BTreeSet<String>,
        min_years_experience: Option<u32>,
        min_reputation: Option<f64>,
        selection_mechanism: SelectionMechanism,
    },
    OpenTender {
        tender_id: TenderId,
    },
    AwardTender {
        tender_id: TenderId,
        /// Free-form selection seed; recorded in the award event so the
        /// draw is reproducible and auditable.
        seed: String,
    },
    CloseTender {
        tender_id: TenderId,
    },
}

impl Command {
    /// Short name for logs and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateWorkspace { .. } => "CreateWorkspace",
            Self::ArchiveWorkspace { .. } => "ArchiveWorkspace",
            Self::DelegateDecisionRight { .. } => "DelegateDecisionRight",
            Self::RevokeDelegation { .. } => "RevokeDelegation",
            Self::CreateLaw { .. } => "CreateLaw",
            Self::ActivateLaw { .. } => "ActivateLaw",
            Self::CompleteReview { .. } => "CompleteReview",
            Self::ArchiveLaw { .. } => "ArchiveLaw",
            Self::CreateBudget { .. } => "CreateBudget",
            Self::ActivateBudget { .. } => "ActivateBudget",
            Self::AdjustAllocation { .. } => "AdjustAllocation",
            Self::ApproveExpenditure { .. } => "ApproveExpenditure",
            Self::CloseBudget { .. } => "CloseBudget",
            Self::RegisterSupplier { .. } => "RegisterSupplier",
            Self::CreateTender { .. } => "CreateTender",
            Self::OpenTender { .. } => "OpenTender",
            Self::AwardTender { .. } => "AwardTender",
            Self::CloseTender { .. } => "CloseTender",
        }
    }
}

/// Command plus idempotency key and attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub command_id: CommandId,
    pub actor_id: ActorId,
    pub command: Command,
}

impl CommandEnvelope {
    pub fn new(command_id: CommandId, actor_id: impl Into<ActorId>, command: Command) -> Self {
        Self {
            command_id,
            actor_id: actor_id.into(),
            command,
        }
    }
}

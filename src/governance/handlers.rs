//! Command Handlers
//!
//! One handler per command: a deterministic pure function of
//! `(command, projections, now, policy)` producing the events for a
//! single stream. Handlers never touch the log; the façade owns version
//! assignment and the append. A handler that emits nothing is a valid
//! no-op.

use crate::governance::commands::{Command, CommandEnvelope};
use crate::governance::concentration::gini;
use crate::governance::error::{KernelError, KernelResult};
use crate::governance::events::{
    budget_stream, delegation_stream, law_stream, supplier_stream, tender_stream,
    workspace_stream, BudgetStatus, EventKind, LawStatus, ReviewOutcome, StreamId, StreamType,
    TenderStatus,
};
use crate::governance::invariants::{
    check_acyclic, check_allocation_floor, check_budget_items, check_budget_transition,
    check_checkpoints, check_delegation_ttl, check_flex_step, check_law_transition,
    check_reputation, check_tender_transition, check_zero_sum, ValidationError,
};
use crate::governance::policy::SafetyPolicy;
use crate::governance::projections::ProjectionSet;
use crate::governance::selector::{feasible_set, seed_digest, select, FeasibilityRequirements};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Snapshot the handler reads; nothing else may be consulted.
pub struct HandlerContext<'a> {
    pub now: DateTime<Utc>,
    pub policy: &'a SafetyPolicy,
    pub projections: &'a ProjectionSet,
}

/// Events a handler wants appended, all on one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutput {
    pub stream_id: StreamId,
    pub stream_type: StreamType,
    pub kinds: Vec<EventKind>,
}

impl HandlerOutput {
    fn one(stream_id: StreamId, stream_type: StreamType, kind: EventKind) -> Self {
        Self {
            stream_id,
            stream_type,
            kinds: vec![kind],
        }
    }
}

/// Dispatch a command to its handler.
pub fn handle(envelope: &CommandEnvelope, ctx: &HandlerContext<'_>) -> KernelResult<HandlerOutput> {
    match &envelope.command {
        Command::CreateWorkspace {
            workspace_id,
            name,
            parent_workspace_id,
            scope,
        } => create_workspace(ctx, workspace_id, name, parent_workspace_id.as_deref(), scope),
        Command::ArchiveWorkspace { workspace_id } => archive_workspace(ctx, workspace_id),
        Command::DelegateDecisionRight {
            delegation_id,
            workspace_id,
            from_actor,
            to_actor,
            ttl_days,
            visibility,
        } => delegate(
            ctx,
            delegation_id,
            workspace_id,
            from_actor,
            to_actor,
            *ttl_days,
            *visibility,
        ),
        Command::RevokeDelegation { delegation_id } => revoke_delegation(ctx, delegation_id),
        Command::CreateLaw {
            law_id,
            workspace_id,
            title,
            scope,
            reversibility,
            checkpoints,
            params,
        } => create_law(
            ctx,
            law_id,
            workspace_id,
            title,
            scope,
            *reversibility,
            checkpoints.as_deref(),
            params,
        ),
        Command::ActivateLaw { law_id } => activate_law(ctx, law_id),
        Command::CompleteReview { law_id, outcome } => complete_review(ctx, law_id, *outcome),
        Command::ArchiveLaw { law_id } => archive_law(ctx, law_id),
        Command::CreateBudget {
            budget_id,
            law_id,
            fiscal_year,
            items,
        } => create_budget(ctx, budget_id, law_id, *fiscal_year, items),
        Command::ActivateBudget { budget_id } => activate_budget(ctx, budget_id),
        Command::AdjustAllocation {
            budget_id,
            adjustments,
        } => adjust_allocation(ctx, budget_id, adjustments),
        Command::ApproveExpenditure {
            budget_id,
            item_id,
            amount,
            memo,
        } => approve_expenditure(ctx, budget_id, item_id, *amount, memo.clone()),
        Command::CloseBudget { budget_id } => close_budget(ctx, budget_id),
        Command::RegisterSupplier {
            supplier_id,
            name,
            supplier_type,
            max_contract_value,
            certifications,
            years_in_business,
            reputation_score,
        } => register_supplier(
            ctx,
            supplier_id,
            name,
            supplier_type,
            *max_contract_value,
            certifications,
            *years_in_business,
            *reputation_score,
        ),
        Command::CreateTender {
            tender_id,
            law_id,
            title,
            estimated_value,
            required_capabilities,
            min_years_experience,
            min_reputation,
            selection_mechanism,
        } => create_tender(
            ctx,
            tender_id,
            law_id,
            title,
            *estimated_value,
            required_capabilities,
            *min_years_experience,
            *min_reputation,
            *selection_mechanism,
        ),
        Command::OpenTender { tender_id } => open_tender(ctx, tender_id),
        Command::AwardTender { tender_id, seed } => award_tender(ctx, tender_id, seed),
        Command::CloseTender { tender_id } => close_tender(ctx, tender_id),
    }
}

// =============================================================================
// WORKSPACES
// =============================================================================

fn require_active_workspace(ctx: &HandlerContext<'_>, workspace_id: &str) -> KernelResult<()> {
    let workspace = ctx
        .projections
        .workspaces
        .workspace(workspace_id)
        .ok_or_else(|| ValidationError::UnknownAggregate {
            kind: "workspace",
            id: workspace_id.to_string(),
        })?;
    if !workspace.is_active() {
        return Err(ValidationError::WorkspaceNotActive {
            workspace_id: workspace_id.to_string(),
        }
        .into());
    }
    Ok(())
}

fn create_workspace(
    ctx: &HandlerContext<'_>,
    workspace_id: &str,
    name: &str,
    parent_workspace_id: Option<&str>,
    scope: &std::collections::BTreeMap<String, String>,
) -> KernelResult<HandlerOutput> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName.into());
    }
    if ctx.projections.workspaces.workspace(workspace_id).is_some() {
        return Err(ValidationError::AggregateAlreadyExists {
            kind: "workspace",
            id: workspace_id.to_string(),
        }
        .into());
    }
    if let Some(parent) = parent_workspace_id {
        require_active_workspace(ctx, parent)?;
    }
    Ok(HandlerOutput::one(
        workspace_stream(workspace_id),
        StreamType::Workspace,
        EventKind::WorkspaceCreated {
            workspace_id: workspace_id.to_string(),
            name: name.to_string(),
            parent_workspace_id: parent_workspace_id.map(str::to_string),
            scope: scope.clone(),
        },
    ))
}

fn archive_workspace(ctx: &HandlerContext<'_>, workspace_id: &str) -> KernelResult<HandlerOutput> {
    let workspace = ctx
        .projections
        .workspaces
        .workspace(workspace_id)
        .ok_or_else(|| ValidationError::UnknownAggregate {
            kind: "workspace",
            id: workspace_id.to_string(),
        })?;
    if !workspace.is_active() {
        return Err(ValidationError::IllegalStatusTransition {
            aggregate: "workspace",
            from: "Archived".to_string(),
            to: "Archived".to_string(),
        }
        .into());
    }
    Ok(HandlerOutput::one(
        workspace_stream(workspace_id),
        StreamType::Workspace,
        EventKind::WorkspaceArchived {
            workspace_id: workspace_id.to_string(),
        },
    ))
}

// =============================================================================
// DELEGATIONS
// =============================================================================

#[allow(clippy::too_many_arguments)]
fn delegate(
    ctx: &HandlerContext<'_>,
    delegation_id: &str,
    workspace_id: &str,
    from_actor: &str,
    to_actor: &str,
    ttl_days: u32,
    visibility: crate::governance::events::Visibility,
) -> KernelResult<HandlerOutput> {
    require_active_workspace(ctx, workspace_id)?;
    if from_actor == to_actor {
        return Err(ValidationError::SelfDelegation {
            actor: from_actor.to_string(),
        }
        .into());
    }
    check_delegation_ttl(ttl_days, ctx.policy)?;
    if ctx.projections.delegations.delegation(delegation_id).is_some() {
        return Err(ValidationError::AggregateAlreadyExists {
            kind: "delegation",
            id: delegation_id.to_string(),
        }
        .into());
    }
    let graph = &ctx.projections.delegations;
    check_acyclic(graph.adjacency(), from_actor, to_actor)?;

    // Halt gate: with a latched halt, refuse edges that concentrate
    // further: target already at the in-degree halt line, or the edge
    // pushing system Gini past the halt threshold.
    if ctx.projections.reflex.delegation_halt_active() {
        let in_degree = graph.in_degree(to_actor);
        let projected_gini = gini(&graph.in_degree_distribution_with_edge(to_actor));
        if in_degree >= ctx.policy.delegation_in_degree_halt
            || projected_gini >= ctx.policy.delegation_gini_halt
        {
            return Err(ValidationError::ConcentrationHaltActive {
                to_actor: to_actor.to_string(),
                in_degree,
                projected_gini,
            }
            .into());
        }
    }

    let expires_at = ctx.now + Duration::days(ttl_days as i64);
    Ok(HandlerOutput::one(
        delegation_stream(delegation_id),
        StreamType::Delegation,
        EventKind::DecisionRightDelegated {
            delegation_id: delegation_id.to_string(),
            workspace_id: workspace_id.to_string(),
            from_actor: from_actor.to_string(),
            to_actor: to_actor.to_string(),
            ttl_days,
            visibility,
            expires_at,
        },
    ))
}

fn revoke_delegation(ctx: &HandlerContext<'_>, delegation_id: &str) -> KernelResult<HandlerOutput> {
    let delegation = ctx
        .projections
        .delegations
        .delegation(delegation_id)
        .ok_or_else(|| ValidationError::UnknownAggregate {
            kind: "delegation",
            id: delegation_id.to_string(),
        })?;
    if !delegation.is_active() {
        return Err(ValidationError::DelegationNotActive {
            delegation_id: delegation_id.to_string(),
        }
        .into());
    }
    Ok(HandlerOutput::one(
        delegation_stream(delegation_id),
        StreamType::Delegation,
        EventKind::DelegationRevoked {
            delegation_id: delegation_id.to_string(),
        },
    ))
}

// =============================================================================
// LAWS
// =============================================================================

#[allow(clippy::too_many_arguments)]
fn create_law(
    ctx: &HandlerContext<'_>,
    law_id: &str,
    workspace_id: &str,
    title: &str,
    scope: &str,
    reversibility: crate::governance::events::Reversibility,
    checkpoints: Option<&[u32]>,
    params: &std::collections::BTreeMap<String, String>,
) -> KernelResult<HandlerOutput> {
    require_active_workspace(ctx, workspace_id)?;
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyName.into());
    }
    if ctx.projections.laws.law(law_id).is_some() {
        return Err(ValidationError::AggregateAlreadyExists {
            kind: "law",
            id: law_id.to_string(),
        }
        .into());
    }
    let checkpoints: Vec<u32> = match checkpoints {
        Some(schedule) => schedule.to_vec(),
        None => ctx
            .policy
            .checkpoint_defaults
            .for_class(reversibility)
            .to_vec(),
    };
    check_checkpoints(&checkpoints, reversibility, ctx.policy)?;
    Ok(HandlerOutput::one(
        law_stream(law_id),
        StreamType::Law,
        EventKind::LawCreated {
            law_id: law_id.to_string(),
            workspace_id: workspace_id.to_string(),
            title: title.to_string(),
            scope: scope.to_string(),
            reversibility,
            checkpoints,
            params: params.clone(),
        },
    ))
}

fn activate_law(ctx: &HandlerContext<'_>, law_id: &str) -> KernelResult<HandlerOutput> {
    let law = ctx
        .projections
        .laws
        .law(law_id)
        .ok_or_else(|| ValidationError::UnknownAggregate {
            kind: "law",
            id: law_id.to_string(),
        })?;
    // Activation is only legal from DRAFT; REVIEW re-activation goes
    // through CompleteReview.
    if law.status != LawStatus::Draft {
        return Err(ValidationError::IllegalStatusTransition {
            aggregate: "law",
            from: format!("{:?}", law.status),
            to: "Active".to_string(),
        }
        .into());
    }
    let next_checkpoint_at = ctx.now + Duration::days(law.checkpoints[0] as i64);
    Ok(HandlerOutput::one(
        law_stream(law_id),
        StreamType::Law,
        EventKind::LawActivated {
            law_id: law_id.to_string(),
            activated_at: ctx.now,
            next_checkpoint_at,
        },
    ))
}

fn complete_review(
    ctx: &HandlerContext<'_>,
    law_id: &str,
    outcome: ReviewOutcome,
) -> KernelResult<HandlerOutput> {
    let law = ctx
        .projections
        .laws
        .law(law_id)
        .ok_or_else(|| ValidationError::UnknownAggregate {
            kind: "law",
            id: law_id.to_string(),
        })?;
    if law.status != LawStatus::Review {
        return Err(ValidationError::IllegalStatusTransition {
            aggregate: "law",
            from: format!("{:?}", law.status),
            to: "review completion".to_string(),
        }
        .into());
    }

    let (new_status, checkpoint_index, next_checkpoint_at) = match outcome {
        ReviewOutcome::Continue => {
            let next_index = law.checkpoint_index + 1;
            match law.checkpoints.get(next_index as usize) {
                Some(days) => (
                    LawStatus::Active,
                    next_index,
                    Some(ctx.now + Duration::days(*days as i64)),
                ),
                // Schedule exhausted: the law sunsets.
                None => (LawStatus::Sunset, law.checkpoint_index, None),
            }
        }
        ReviewOutcome::Adjust => (
            LawStatus::Active,
            0,
            Some(ctx.now + Duration::days(law.checkpoints[0] as i64)),
        ),
        ReviewOutcome::Sunset => (LawStatus::Sunset, law.checkpoint_index, None),
    };
    check_law_transition(law.status, new_status)?;

    Ok(HandlerOutput::one(
        law_stream(law_id),
        StreamType::Law,
        EventKind::LawReviewCompleted {
            law_id: law_id.to_string(),
            outcome,
            new_status,
            checkpoint_index,
            next_checkpoint_at,
        },
    ))
}

fn archive_law(ctx: &HandlerContext<'_>, law_id: &str) -> KernelResult<HandlerOutput> {
    let law = ctx
        .projections
        .laws
        .law(law_id)
        .ok_or_else(|| ValidationError::UnknownAggregate {
            kind: "law",
            id: law_id.to_string(),
        })?;
    check_law_transition(law.status, LawStatus::Archived)?;
    Ok(HandlerOutput::one(
        law_stream(law_id),
        StreamType::Law,
        EventKind::LawArchived {
            law_id: law_id.to_string(),
        },
    ))
}

// =============================================================================
// BUDGETS
// =============================================================================

fn create_budget(
    ctx: &HandlerContext<'_>,
    budget_id: &str,
    law_id: &str,
    fiscal_year: u16,
    items: &[crate::governance::events::BudgetItemInit],
) -> KernelResult<HandlerOutput> {
    if ctx.projections.laws.law(law_id).is_none() {
        return Err(ValidationError::UnknownAggregate {
            kind: "law",
            id: law_id.to_string(),
        }
        .into());
    }
    if ctx.projections.budgets.budget(budget_id).is_some() {
        return Err(ValidationError::AggregateAlreadyExists {
            kind: "budget",
            id: budget_id.to_string(),
        }
        .into());
    }
    let budget_total = check_budget_items(items)?;
    Ok(HandlerOutput::one(
        budget_stream(budget_id),
        StreamType::Budget,
        EventKind::BudgetCreated {
            budget_id: budget_id.to_string(),
            law_id: law_id.to_string(),
            fiscal_year,
            items: items.to_vec(),
            budget_total,
        },
    ))
}

fn activate_budget(ctx: &HandlerContext<'_>, budget_id: &str) -> KernelResult<HandlerOutput> {
    let budget = ctx
        .projections
        .budgets
        .budget(budget_id)
        .ok_or_else(|| ValidationError::UnknownAggregate {
            kind: "budget",
            id: budget_id.to_string(),
        })?;
    check_budget_transition(budget.status, BudgetStatus::Active)?;
    Ok(HandlerOutput::one(
        budget_stream(budget_id),
        StreamType::Budget,
        EventKind::BudgetActivated {
            budget_id: budget_id.to_string(),
            activated_at: ctx.now,
        },
    ))
}

fn adjust_allocation(
    ctx: &HandlerContext<'_>,
    budget_id: &str,
    adjustments: &[crate::governance::commands::AdjustmentRequest],
) -> KernelResult<HandlerOutput> {
    let budget = ctx
        .projections
        .budgets
        .budget(budget_id)
        .ok_or_else(|| ValidationError::UnknownAggregate {
            kind: "budget",
            id: budget_id.to_string(),
        })?;
    if budget.status != BudgetStatus::Active {
        return Err(ValidationError::IllegalStatusTransition {
            aggregate: "budget",
            from: format!("{:?}", budget.status),
            to: "allocation adjustment".to_string(),
        }
        .into());
    }
    if adjustments.is_empty() {
        return Ok(HandlerOutput {
            stream_id: budget_stream(budget_id),
            stream_type: StreamType::Budget,
            kinds: Vec::new(),
        });
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for request in adjustments {
        if !seen.insert(request.item_id.as_str()) {
            return Err(ValidationError::DuplicateItem {
                item_id: request.item_id.clone(),
            }
            .into());
        }
        let item = budget.item(&request.item_id).ok_or_else(|| {
            ValidationError::UnknownAggregate {
                kind: "budget item",
                id: request.item_id.clone(),
            }
        })?;
        let ceiling = ctx.policy.budget_flex_limits.ceiling_bps(item.flex_class);
        check_flex_step(
            &request.item_id,
            item.allocated_amount,
            request.change_amount,
            ceiling,
        )?;
        check_allocation_floor(
            &request.item_id,
            item.allocated_amount,
            request.change_amount,
            item.spent_amount,
        )?;
    }
    check_zero_sum(adjustments.iter().map(|a| &a.change_amount))?;

    Ok(HandlerOutput::one(
        budget_stream(budget_id),
        StreamType::Budget,
        EventKind::AllocationAdjusted {
            budget_id: budget_id.to_string(),
            adjustments: adjustments
                .iter()
                .map(|a| crate::governance::events::AllocationChange {
                    item_id: a.item_id.clone(),
                    change_amount: a.change_amount,
                })
                .collect(),
        },
    ))
}

fn approve_expenditure(
    ctx: &HandlerContext<'_>,
    budget_id: &str,
    item_id: &str,
    amount: crate::governance::amount::Amount,
    memo: Option<String>,
) -> KernelResult<HandlerOutput> {
    let budget = ctx
        .projections
        .budgets
        .budget(budget_id)
        .ok_or_else(|| ValidationError::UnknownAggregate {
            kind: "budget",
            id: budget_id.to_string(),
        })?;
    if amount <= 0 {
        return Err(ValidationError::NonPositiveAmount { amount }.into());
    }

    // Gates reject with an audit event, not an error: the refusal itself
    // is part of the record.
    let reject = |gate: &str| {
        HandlerOutput::one(
            budget_stream(budget_id),
            StreamType::Budget,
            EventKind::ExpenditureRejected {
                budget_id: budget_id.to_string(),
                item_id: item_id.to_string(),
                amount,
                gate: gate.to_string(),
            },
        )
    };

    if budget.status != BudgetStatus::Active {
        return Ok(reject("budget_active"));
    }
    let Some(item) = budget.item(item_id) else {
        return Ok(reject("item_exists"));
    };
    if amount > item.available() {
        return Ok(reject("available_funds"));
    }

    Ok(HandlerOutput::one(
        budget_stream(budget_id),
        StreamType::Budget,
        EventKind::ExpenditureApproved {
            budget_id: budget_id.to_string(),
            item_id: item_id.to_string(),
            amount,
            memo,
        },
    ))
}

fn close_budget(ctx: &HandlerContext<'_>, budget_id: &str) -> KernelResult<HandlerOutput> {
    let budget = ctx
        .projections
        .budgets
        .budget(budget_id)
        .ok_or_else(|| ValidationError::UnknownAggregate {
            kind: "budget",
            id: budget_id.to_string(),
        })?;
    check_budget_transition(budget.status, BudgetStatus::Closed)?;
    Ok(HandlerOutput::one(
        budget_stream(budget_id),
        StreamType::Budget,
        EventKind::BudgetClosed {
            budget_id: budget_id.to_string(),
            closed_at: ctx.now,
        },
    ))
}

// =============================================================================
// PROCUREMENT
// =============================================================================

#[allow(clippy::too_many_arguments)]
fn register_supplier(
    ctx: &HandlerContext<'_>,
    supplier_id: &str,
    name: &str,
    supplier_type: &str,
    max_contract_value: crate::governance::amount::Amount,
    certifications: &std::collections::BTreeSet<String>,
    years_in_business: u32,
    reputation_score: f64,
) -> KernelResult<HandlerOutput> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName.into());
    }
    if ctx.projections.suppliers.supplier(supplier_id).is_some() {
        return Err(ValidationError::AggregateAlreadyExists {
            kind: "supplier",
            id: supplier_id.to_string(),
        }
        .into());
    }
    if max_contract_value < 0 {
        return Err(ValidationError::NonPositiveAmount {
            amount: max_contract_value,
        }
        .into());
    }
    check_reputation(reputation_score)?;
    Ok(HandlerOutput::one(
        supplier_stream(supplier_id),
        StreamType::Supplier,
        EventKind::SupplierRegistered {
            supplier_id: supplier_id.to_string(),
            name: name.to_string(),
            supplier_type: supplier_type.to_string(),
            max_contract_value,
            certifications: certifications.clone(),
            years_in_business,
            reputation_score,
        },
    ))
}

#[allow(clippy::too_many_arguments)]
fn create_tender(
    ctx: &HandlerContext<'_>,
    tender_id: &str,
    law_id: &str,
    title: &str,
    estimated_value: crate::governance::amount::Amount,
    required_capabilities: &std::collections::BTreeSet<String>,
    min_years_experience: Option<u32>,
    min_reputation: Option<f64>,
    selection_mechanism: crate::governance::events::SelectionMechanism,
) -> KernelResult<HandlerOutput> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyName.into());
    }
    if ctx.projections.laws.law(law_id).is_none() {
        return Err(ValidationError::UnknownAggregate {
            kind: "law",
            id: law_id.to_string(),
        }
        .into());
    }
    if ctx.projections.tenders.tender(tender_id).is_some() {
        return Err(ValidationError::AggregateAlreadyExists {
            kind: "tender",
            id: tender_id.to_string(),
        }
        .into());
    }
    if estimated_value <= 0 {
        return Err(ValidationError::NonPositiveAmount {
            amount: estimated_value,
        }
        .into());
    }
    if let Some(min) = min_reputation {
        check_reputation(min)?;
    }
    Ok(HandlerOutput::one(
        tender_stream(tender_id),
        StreamType::Tender,
        EventKind::TenderCreated {
            tender_id: tender_id.to_string(),
            law_id: law_id.to_string(),
            title: title.to_string(),
            estimated_value,
            required_capabilities: required_capabilities.clone(),
            min_years_experience,
            min_reputation,
            selection_mechanism,
        },
    ))
}

fn open_tender(ctx: &HandlerContext<'_>, tender_id: &str) -> KernelResult<HandlerOutput> {
    let tender = ctx
        .projections
        .tenders
        .tender(tender_id)
        .ok_or_else(|| ValidationError::UnknownAggregate {
            kind: "tender",
            id: tender_id.to_string(),
        })?;
    check_tender_transition(tender.status, TenderStatus::Open)?;
    Ok(HandlerOutput::one(
        tender_stream(tender_id),
        StreamType::Tender,
        EventKind::TenderOpened {
            tender_id: tender_id.to_string(),
        },
    ))
}

fn award_tender(
    ctx: &HandlerContext<'_>,
    tender_id: &str,
    seed: &str,
) -> KernelResult<HandlerOutput> {
    let tender = ctx
        .projections
        .tenders
        .tender(tender_id)
        .ok_or_else(|| ValidationError::UnknownAggregate {
            kind: "tender",
            id: tender_id.to_string(),
        })?;
    check_tender_transition(tender.status, TenderStatus::Evaluating)?;

    let requirements = FeasibilityRequirements {
        estimated_value: tender.estimated_value,
        required_capabilities: tender.required_capabilities.clone(),
        min_years_experience: tender.min_years_experience,
        min_reputation: tender.min_reputation,
    };
    let feasible = feasible_set(ctx.projections.suppliers.suppliers(), &requirements);
    let winner = select(tender.selection_mechanism, &feasible, seed).map_err(|_| {
        KernelError::NoFeasibleSupplier {
            tender_id: tender_id.to_string(),
        }
    })?;

    Ok(HandlerOutput {
        stream_id: tender_stream(tender_id),
        stream_type: StreamType::Tender,
        kinds: vec![
            EventKind::TenderEvaluated {
                tender_id: tender_id.to_string(),
                feasible_set: feasible.iter().map(|s| s.supplier_id.clone()).collect(),
            },
            EventKind::TenderAwarded {
                tender_id: tender_id.to_string(),
                supplier_id: winner.supplier_id.clone(),
                mechanism: tender.selection_mechanism,
                seed: seed.to_string(),
                seed_digest: seed_digest(seed),
                awarded_value: tender.estimated_value,
                awarded_at: ctx.now,
            },
        ],
    })
}

fn close_tender(ctx: &HandlerContext<'_>, tender_id: &str) -> KernelResult<HandlerOutput> {
    let tender = ctx
        .projections
        .tenders
        .tender(tender_id)
        .ok_or_else(|| ValidationError::UnknownAggregate {
            kind: "tender",
            id: tender_id.to_string(),
        })?;
    check_tender_transition(tender.status, TenderStatus::Closed)?;
    Ok(HandlerOutput::one(
        tender_stream(tender_id),
        StreamType::Tender,
        EventKind::TenderClosed {
            tender_id: tender_id.to_string(),
        },
    ))
}

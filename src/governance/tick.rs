//! Tick Engine
//!
//! Single-threaded scan over the projections that emits reflex events
//! when concentration, time, or balance thresholds are breached. Rules
//! run in a fixed order so replay is bit-stable; rules that shrink the
//! active set (expiry) run before rules that read it (concentration).
//!
//! # Rule Order
//!
//! 1. Delegation expiry            → `system:tick`
//! 2. Law checkpoint overrun       → `system:tick`
//! 3. Delegation concentration     → `system:delegation_gini`
//! 4. Budget balance audit         → `system:budget_audit`
//! 5. Overspend audit              → `system:budget_audit`
//! 6. Supplier concentration       → `system:supplier_gini`
//!
//! # Idempotency
//!
//! Running the tick twice at the same `now` with no interleaving
//! commands emits nothing the second time: expiry and overrun rules are
//! idempotent by state transition, concentration rules only emit on a
//! level change against the `ReflexState` latch, and audit rules latch
//! the exact violation signature.

use crate::governance::concentration::{gini, ConcentrationLevel};
use crate::governance::events::{
    EventKind, StreamId, SYSTEM_BUDGET_AUDIT_STREAM, SYSTEM_DELEGATION_GINI_STREAM,
    SYSTEM_SUPPLIER_GINI_STREAM, SYSTEM_TICK_STREAM,
};
use crate::governance::policy::SafetyPolicy;
use crate::governance::projections::ProjectionSet;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Reflex events to append, grouped per synthetic stream in rule order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickPlan {
    pub batches: Vec<(StreamId, Vec<EventKind>)>,
}

impl TickPlan {
    pub fn is_empty(&self) -> bool {
        self.batches.iter().all(|(_, kinds)| kinds.is_empty())
    }

    pub fn event_count(&self) -> usize {
        self.batches.iter().map(|(_, kinds)| kinds.len()).sum()
    }

    fn push(&mut self, stream: &str, kind: EventKind) {
        if let Some((_, kinds)) = self.batches.iter_mut().find(|(s, _)| s == stream) {
            kinds.push(kind);
        } else {
            self.batches.push((stream.to_string(), vec![kind]));
        }
    }
}

/// Evaluate every reflex rule against the given projections at `now`.
///
/// Pure: consumes projections and policy, produces event kinds. The
/// façade appends them through the normal path and applies them back.
pub fn plan_tick(
    now: DateTime<Utc>,
    policy: &SafetyPolicy,
    projections: &ProjectionSet,
) -> TickPlan {
    let mut plan = TickPlan::default();

    // Rule 1: delegation expiry.
    let mut expired: BTreeSet<String> = BTreeSet::new();
    for delegation in projections.delegations.expiring_before(now) {
        expired.insert(delegation.delegation_id.clone());
        plan.push(
            SYSTEM_TICK_STREAM,
            EventKind::DelegationExpired {
                delegation_id: delegation.delegation_id.clone(),
                workspace_id: delegation.workspace_id.clone(),
                expired_at: now,
            },
        );
    }

    // Rule 2: law checkpoint overrun.
    for law in projections.laws.list_overdue(now) {
        let due_at = law.next_checkpoint_at.unwrap_or(now);
        plan.push(
            SYSTEM_TICK_STREAM,
            EventKind::LawReviewTriggered {
                law_id: law.law_id.clone(),
                checkpoint_index: law.checkpoint_index,
                due_at,
            },
        );
    }

    // Rule 3: delegation concentration, over the post-expiry active set.
    let (distribution, max_in_degree, actor_count) =
        surviving_in_degrees(projections, &expired);
    let delegation_gini = gini(&distribution);
    let level = ConcentrationLevel::from_gini(
        delegation_gini,
        policy.delegation_gini_warn,
        policy.delegation_gini_halt,
    )
    .max(ConcentrationLevel::from_in_degree(
        max_in_degree,
        policy.delegation_in_degree_warn,
        policy.delegation_in_degree_halt,
    ));
    let last = projections.reflex.delegation_level();
    if level != last {
        match level {
            ConcentrationLevel::Warn => plan.push(
                SYSTEM_DELEGATION_GINI_STREAM,
                EventKind::DelegationConcentrationWarning {
                    gini: delegation_gini,
                    max_in_degree,
                    actor_count,
                    observed_at: now,
                },
            ),
            ConcentrationLevel::Halt => {
                plan.push(
                    SYSTEM_DELEGATION_GINI_STREAM,
                    EventKind::DelegationConcentrationHalt {
                        gini: delegation_gini,
                        max_in_degree,
                        actor_count,
                        observed_at: now,
                    },
                );
                plan.push(
                    SYSTEM_DELEGATION_GINI_STREAM,
                    EventKind::TransparencyEscalated {
                        reason: format!(
                            "delegation concentration halt: gini {:.4}, max in-degree {}",
                            delegation_gini, max_in_degree
                        ),
                        observed_at: now,
                    },
                );
            }
            ConcentrationLevel::Normal => {
                // No de-escalation event exists below Warn; the latch
                // keeps its last level until a later escalation.
                debug!(
                    gini = delegation_gini,
                    previous = last.as_str(),
                    "delegation concentration back to normal"
                );
            }
        }
    }

    // Rule 4: budget balance audit. Guarded at write time; a hit here
    // means corruption or a handler bug, and it must be on the record.
    for budget in projections
        .budgets
        .list_by_status(crate::governance::events::BudgetStatus::Active)
    {
        let allocated_total = budget.allocated_total();
        if allocated_total != budget.budget_total
            && !projections
                .reflex
                .balance_already_reported(&budget.budget_id, allocated_total)
        {
            plan.push(
                SYSTEM_BUDGET_AUDIT_STREAM,
                EventKind::BudgetBalanceViolationDetected {
                    budget_id: budget.budget_id.clone(),
                    allocated_total,
                    budget_total: budget.budget_total,
                    observed_at: now,
                },
            );
        }
    }

    // Rule 5: overspend audit.
    for budget in all_budgets_sorted(projections) {
        for item in budget.items.values() {
            if item.spent_amount > item.allocated_amount
                && !projections.reflex.overspend_already_reported(
                    &budget.budget_id,
                    &item.item_id,
                    item.spent_amount,
                    item.allocated_amount,
                )
            {
                plan.push(
                    SYSTEM_BUDGET_AUDIT_STREAM,
                    EventKind::BudgetOverspendDetected {
                        budget_id: budget.budget_id.clone(),
                        item_id: item.item_id.clone(),
                        spent_amount: item.spent_amount,
                        allocated_amount: item.allocated_amount,
                        observed_at: now,
                    },
                );
            }
        }
    }

    // Rule 6: supplier concentration.
    let supplier_distribution = projections.suppliers.awarded_distribution();
    let supplier_gini = gini(&supplier_distribution);
    let supplier_level = ConcentrationLevel::from_gini(
        supplier_gini,
        policy.supplier_gini_warn,
        policy.supplier_gini_halt,
    );
    let supplier_last = projections.reflex.supplier_level();
    if supplier_level != supplier_last {
        let supplier_count = projections.suppliers.len() as u64;
        match supplier_level {
            ConcentrationLevel::Warn => plan.push(
                SYSTEM_SUPPLIER_GINI_STREAM,
                EventKind::SupplierConcentrationWarning {
                    gini: supplier_gini,
                    supplier_count,
                    observed_at: now,
                },
            ),
            ConcentrationLevel::Halt => plan.push(
                SYSTEM_SUPPLIER_GINI_STREAM,
                EventKind::SupplierConcentrationHalt {
                    gini: supplier_gini,
                    supplier_count,
                    observed_at: now,
                },
            ),
            ConcentrationLevel::Normal => {}
        }
    }

    plan
}

/// In-degree distribution over active delegations minus the edges the
/// expiry rule just retired, plus max in-degree and actor count.
fn surviving_in_degrees(
    projections: &ProjectionSet,
    expired: &BTreeSet<String>,
) -> (Vec<u128>, u64, u64) {
    let mut in_degree: BTreeMap<&str, u64> = BTreeMap::new();
    let mut actors: BTreeSet<&str> = BTreeSet::new();
    for delegation in projections.delegations.active_delegations() {
        if expired.contains(&delegation.delegation_id) {
            continue;
        }
        actors.insert(delegation.from_actor.as_str());
        actors.insert(delegation.to_actor.as_str());
        *in_degree.entry(delegation.to_actor.as_str()).or_insert(0) += 1;
    }
    let distribution: Vec<u128> = actors
        .iter()
        .map(|actor| in_degree.get(actor).copied().unwrap_or(0) as u128)
        .collect();
    let max = in_degree.values().copied().max().unwrap_or(0);
    (distribution, max, actors.len() as u64)
}

fn all_budgets_sorted(
    projections: &ProjectionSet,
) -> Vec<&crate::governance::budget_registry::BudgetState> {
    use crate::governance::events::BudgetStatus::*;
    let mut budgets: Vec<_> = [Draft, Active, Closed]
        .iter()
        .flat_map(|status| projections.budgets.list_by_status(*status))
        .collect();
    budgets.sort_by(|a, b| a.budget_id.cmp(&b.budget_id));
    budgets
}

//! Budget Registry Projection
//!
//! Budgets with their line items, indexed by status and owning law.
//! `budget_total` is immutable after creation; the registry only moves
//! value between items as `AllocationAdjusted` events arrive, so the
//! write-time zero-sum guard keeps `Σ allocated = budget_total` here.

use crate::governance::amount::Amount;
use crate::governance::events::{
    BudgetId, BudgetStatus, Event, EventKind, FlexClass, ItemId, LawId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Materialized budget line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetItemState {
    pub item_id: ItemId,
    pub name: String,
    pub allocated_amount: Amount,
    pub spent_amount: Amount,
    pub flex_class: FlexClass,
    pub category: String,
}

impl BudgetItemState {
    pub fn available(&self) -> Amount {
        self.allocated_amount - self.spent_amount
    }
}

/// Materialized budget aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetState {
    pub budget_id: BudgetId,
    pub law_id: LawId,
    pub fiscal_year: u16,
    pub items: BTreeMap<ItemId, BudgetItemState>,
    /// Immutable after creation.
    pub budget_total: Amount,
    pub status: BudgetStatus,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl BudgetState {
    pub fn item(&self, item_id: &str) -> Option<&BudgetItemState> {
        self.items.get(item_id)
    }

    /// Exact sum of item allocations.
    pub fn allocated_total(&self) -> Amount {
        self.items.values().map(|i| i.allocated_amount).sum()
    }

    /// True when `Σ allocated = budget_total` holds.
    pub fn is_balanced(&self) -> bool {
        self.allocated_total() == self.budget_total
    }
}

/// Fold of budget events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetRegistry {
    budgets: HashMap<BudgetId, BudgetState>,
}

impl BudgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &Event) {
        match &event.kind {
            EventKind::BudgetCreated {
                budget_id,
                law_id,
                fiscal_year,
                items,
                budget_total,
            } => {
                let items = items
                    .iter()
                    .map(|init| {
                        (
                            init.item_id.clone(),
                            BudgetItemState {
                                item_id: init.item_id.clone(),
                                name: init.name.clone(),
                                allocated_amount: init.allocated_amount,
                                spent_amount: 0,
                                flex_class: init.flex_class,
                                category: init.category.clone(),
                            },
                        )
                    })
                    .collect();
                self.budgets.insert(
                    budget_id.clone(),
                    BudgetState {
                        budget_id: budget_id.clone(),
                        law_id: law_id.clone(),
                        fiscal_year: *fiscal_year,
                        items,
                        budget_total: *budget_total,
                        status: BudgetStatus::Draft,
                        created_at: event.occurred_at,
                        activated_at: None,
                        closed_at: None,
                        version: event.version,
                    },
                );
            }
            EventKind::BudgetActivated {
                budget_id,
                activated_at,
            } => {
                if let Some(budget) = self.budgets.get_mut(budget_id) {
                    budget.status = BudgetStatus::Active;
                    budget.activated_at = Some(*activated_at);
                    budget.version = event.version;
                }
            }
            EventKind::AllocationAdjusted {
                budget_id,
                adjustments,
            } => {
                if let Some(budget) = self.budgets.get_mut(budget_id) {
                    for change in adjustments {
                        if let Some(item) = budget.items.get_mut(&change.item_id) {
                            item.allocated_amount += change.change_amount;
                        }
                    }
                    budget.version = event.version;
                }
            }
            EventKind::ExpenditureApproved {
                budget_id,
                item_id,
                amount,
                ..
            } => {
                if let Some(budget) = self.budgets.get_mut(budget_id) {
                    if let Some(item) = budget.items.get_mut(item_id) {
                        item.spent_amount += *amount;
                    }
                    budget.version = event.version;
                }
            }
            EventKind::ExpenditureRejected { budget_id, .. } => {
                // Audit-only; spend is unchanged but the stream advanced.
                if let Some(budget) = self.budgets.get_mut(budget_id) {
                    budget.version = event.version;
                }
            }
            EventKind::BudgetClosed {
                budget_id,
                closed_at,
            } => {
                if let Some(budget) = self.budgets.get_mut(budget_id) {
                    budget.status = BudgetStatus::Closed;
                    budget.closed_at = Some(*closed_at);
                    budget.version = event.version;
                }
            }
            _ => {}
        }
    }

    pub fn budget(&self, id: &str) -> Option<&BudgetState> {
        self.budgets.get(id)
    }

    pub fn list_by_status(&self, status: BudgetStatus) -> Vec<&BudgetState> {
        let mut budgets: Vec<&BudgetState> = self
            .budgets
            .values()
            .filter(|b| b.status == status)
            .collect();
        budgets.sort_by(|a, b| a.budget_id.cmp(&b.budget_id));
        budgets
    }

    pub fn list_by_law(&self, law_id: &str) -> Vec<&BudgetState> {
        let mut budgets: Vec<&BudgetState> = self
            .budgets
            .values()
            .filter(|b| b.law_id == law_id)
            .collect();
        budgets.sort_by(|a, b| a.budget_id.cmp(&b.budget_id));
        budgets
    }

    pub fn len(&self) -> usize {
        self.budgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty()
    }
}

//! Reflex State Projection
//!
//! Latches what the tick engine has already said: the last emitted
//! concentration level per metric and the exact signatures of reported
//! budget audits. The tick consults this to stay idempotent at a fixed
//! `now`, and delegation handlers consult the halt latch to refuse
//! concentrating edges.

use crate::governance::amount::Amount;
use crate::governance::concentration::ConcentrationLevel;
use crate::governance::events::{BudgetId, Event, EventKind, ItemId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fold of reflex events into latch state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflexState {
    delegation_level: ConcentrationLevel,
    supplier_level: ConcentrationLevel,
    /// Last reported allocated total per unbalanced budget.
    balance_reports: BTreeMap<BudgetId, Amount>,
    /// Last reported (spent, allocated) per overspent item, keyed
    /// `budget_id/item_id`.
    overspend_reports: BTreeMap<String, (Amount, Amount)>,
}

fn overspend_key(budget_id: &str, item_id: &str) -> String {
    format!("{}/{}", budget_id, item_id)
}

impl ReflexState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &Event) {
        match &event.kind {
            EventKind::DelegationConcentrationWarning { .. } => {
                self.delegation_level = ConcentrationLevel::Warn;
            }
            EventKind::DelegationConcentrationHalt { .. } => {
                self.delegation_level = ConcentrationLevel::Halt;
            }
            EventKind::SupplierConcentrationWarning { .. } => {
                self.supplier_level = ConcentrationLevel::Warn;
            }
            EventKind::SupplierConcentrationHalt { .. } => {
                self.supplier_level = ConcentrationLevel::Halt;
            }
            EventKind::BudgetBalanceViolationDetected {
                budget_id,
                allocated_total,
                ..
            } => {
                self.balance_reports
                    .insert(budget_id.clone(), *allocated_total);
            }
            EventKind::BudgetOverspendDetected {
                budget_id,
                item_id,
                spent_amount,
                allocated_amount,
                ..
            } => {
                self.overspend_reports.insert(
                    overspend_key(budget_id, item_id),
                    (*spent_amount, *allocated_amount),
                );
            }
            _ => {}
        }
    }

    /// Last emitted delegation concentration level.
    pub fn delegation_level(&self) -> ConcentrationLevel {
        self.delegation_level
    }

    /// Last emitted supplier concentration level.
    pub fn supplier_level(&self) -> ConcentrationLevel {
        self.supplier_level
    }

    /// True while the most recent delegation reflex was a halt.
    pub fn delegation_halt_active(&self) -> bool {
        self.delegation_level == ConcentrationLevel::Halt
    }

    /// Has this exact balance violation already been reported?
    pub fn balance_already_reported(&self, budget_id: &str, allocated_total: Amount) -> bool {
        self.balance_reports.get(budget_id) == Some(&allocated_total)
    }

    /// Has this exact overspend already been reported?
    pub fn overspend_already_reported(
        &self,
        budget_id: &str,
        item_id: &ItemId,
        spent: Amount,
        allocated: Amount,
    ) -> bool {
        self.overspend_reports
            .get(&overspend_key(budget_id, item_id))
            == Some(&(spent, allocated))
    }
}

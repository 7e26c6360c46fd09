//! Expenditure Audit Log Projection
//!
//! Every approval and rejection, with enough context to audit a budget
//! without replaying the stream.

use crate::governance::amount::Amount;
use crate::governance::events::{ActorId, BudgetId, Event, EventKind, ItemId};
use crate::governance::ids::EventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One audited expenditure decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenditureRecord {
    pub event_id: EventId,
    pub budget_id: BudgetId,
    pub item_id: ItemId,
    pub amount: Amount,
    pub approved: bool,
    /// Failing gate name for rejections.
    pub gate: Option<String>,
    pub memo: Option<String>,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Append-only fold of expenditure decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenditureLog {
    records: Vec<ExpenditureRecord>,
}

impl ExpenditureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &Event) {
        match &event.kind {
            EventKind::ExpenditureApproved {
                budget_id,
                item_id,
                amount,
                memo,
            } => self.records.push(ExpenditureRecord {
                event_id: event.event_id,
                budget_id: budget_id.clone(),
                item_id: item_id.clone(),
                amount: *amount,
                approved: true,
                gate: None,
                memo: memo.clone(),
                actor_id: event.actor_id.clone(),
                occurred_at: event.occurred_at,
            }),
            EventKind::ExpenditureRejected {
                budget_id,
                item_id,
                amount,
                gate,
            } => self.records.push(ExpenditureRecord {
                event_id: event.event_id,
                budget_id: budget_id.clone(),
                item_id: item_id.clone(),
                amount: *amount,
                approved: false,
                gate: Some(gate.clone()),
                memo: None,
                actor_id: event.actor_id.clone(),
                occurred_at: event.occurred_at,
            }),
            _ => {}
        }
    }

    pub fn records(&self) -> &[ExpenditureRecord] {
        &self.records
    }

    pub fn for_budget(&self, budget_id: &str) -> Vec<&ExpenditureRecord> {
        self.records
            .iter()
            .filter(|r| r.budget_id == budget_id)
            .collect()
    }

    /// Exact approved total for one item.
    pub fn approved_total(&self, budget_id: &str, item_id: &str) -> Amount {
        self.records
            .iter()
            .filter(|r| r.approved && r.budget_id == budget_id && r.item_id == item_id)
            .map(|r| r.amount)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

//! Projection Set
//!
//! All materialized read models behind one `apply`. Rebuilding from an
//! empty set over the full log yields exactly the live state; every
//! sub-projection is a mechanical fold with no clock, RNG, or
//! cross-projection reads inside `apply`.

use crate::governance::budget_registry::BudgetRegistry;
use crate::governance::delegation_graph::DelegationGraph;
use crate::governance::events::Event;
use crate::governance::expenditure_log::ExpenditureLog;
use crate::governance::law_registry::LawRegistry;
use crate::governance::procurement::{ContractRegistry, SupplierRegistry, TenderRegistry};
use crate::governance::reflex_state::ReflexState;
use crate::governance::workspace_registry::WorkspaceRegistry;
use serde::{Deserialize, Serialize};

/// Every read model the kernel serves queries from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSet {
    pub workspaces: WorkspaceRegistry,
    pub delegations: DelegationGraph,
    pub laws: LawRegistry,
    pub budgets: BudgetRegistry,
    pub expenditures: ExpenditureLog,
    pub tenders: TenderRegistry,
    pub suppliers: SupplierRegistry,
    pub contracts: ContractRegistry,
    pub reflex: ReflexState,
}

impl ProjectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event to every sub-projection. Idempotent re-application
    /// of an already-seen version is the caller's concern; events carry
    /// their version for that purpose.
    pub fn apply(&mut self, event: &Event) {
        self.workspaces.apply(event);
        self.delegations.apply(event);
        self.laws.apply(event);
        self.budgets.apply(event);
        self.expenditures.apply(event);
        self.tenders.apply(event);
        self.suppliers.apply(event);
        self.contracts.apply(event);
        self.reflex.apply(event);
    }

    /// Fold a full event sequence in replay order.
    pub fn apply_all<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = &'a Event>,
    {
        for event in events {
            self.apply(event);
        }
    }
}

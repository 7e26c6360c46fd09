//! Procurement Projections
//!
//! Tender, supplier, and contract registries. Supplier
//! `total_value_awarded` accumulates from `TenderAwarded` events and is
//! monotonically non-decreasing; ROTATION and HYBRID selection read it.

use crate::governance::amount::Amount;
use crate::governance::events::{
    ContractId, Event, EventKind, LawId, SelectionMechanism, SupplierId, TenderId, TenderStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// SUPPLIERS
// =============================================================================

/// Materialized supplier aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierState {
    pub supplier_id: SupplierId,
    pub name: String,
    pub supplier_type: String,
    pub max_contract_value: Amount,
    pub certifications: BTreeSet<String>,
    pub years_in_business: u32,
    pub reputation_score: f64,
    /// Monotonically non-decreasing, from contract awards.
    pub total_value_awarded: Amount,
    pub version: u64,
}

/// Fold of supplier events, id-ordered for deterministic iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplierRegistry {
    suppliers: BTreeMap<SupplierId, SupplierState>,
}

impl SupplierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &Event) {
        match &event.kind {
            EventKind::SupplierRegistered {
                supplier_id,
                name,
                supplier_type,
                max_contract_value,
                certifications,
                years_in_business,
                reputation_score,
            } => {
                self.suppliers.insert(
                    supplier_id.clone(),
                    SupplierState {
                        supplier_id: supplier_id.clone(),
                        name: name.clone(),
                        supplier_type: supplier_type.clone(),
                        max_contract_value: *max_contract_value,
                        certifications: certifications.clone(),
                        years_in_business: *years_in_business,
                        reputation_score: *reputation_score,
                        total_value_awarded: 0,
                        version: event.version,
                    },
                );
            }
            EventKind::TenderAwarded {
                supplier_id,
                awarded_value,
                ..
            } => {
                if let Some(supplier) = self.suppliers.get_mut(supplier_id) {
                    supplier.total_value_awarded += *awarded_value;
                }
            }
            _ => {}
        }
    }

    pub fn supplier(&self, id: &str) -> Option<&SupplierState> {
        self.suppliers.get(id)
    }

    /// All suppliers in id order.
    pub fn suppliers(&self) -> impl Iterator<Item = &SupplierState> {
        self.suppliers.values()
    }

    /// Awarded-value distribution for the concentration scan.
    pub fn awarded_distribution(&self) -> Vec<u128> {
        self.suppliers
            .values()
            .map(|s| s.total_value_awarded.max(0) as u128)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.suppliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suppliers.is_empty()
    }
}

// =============================================================================
// TENDERS
// =============================================================================

/// Materialized tender aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderState {
    pub tender_id: TenderId,
    pub law_id: LawId,
    pub title: String,
    pub estimated_value: Amount,
    pub required_capabilities: BTreeSet<String>,
    pub min_years_experience: Option<u32>,
    pub min_reputation: Option<f64>,
    pub selection_mechanism: SelectionMechanism,
    pub status: TenderStatus,
    pub awarded_supplier_id: Option<SupplierId>,
    pub awarded_at: Option<DateTime<Utc>>,
    pub seed: Option<String>,
    pub feasible_set: Option<Vec<SupplierId>>,
    pub version: u64,
}

/// Fold of tender events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenderRegistry {
    tenders: BTreeMap<TenderId, TenderState>,
}

impl TenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &Event) {
        match &event.kind {
            EventKind::TenderCreated {
                tender_id,
                law_id,
                title,
                estimated_value,
                required_capabilities,
                min_years_experience,
                min_reputation,
                selection_mechanism,
            } => {
                self.tenders.insert(
                    tender_id.clone(),
                    TenderState {
                        tender_id: tender_id.clone(),
                        law_id: law_id.clone(),
                        title: title.clone(),
                        estimated_value: *estimated_value,
                        required_capabilities: required_capabilities.clone(),
                        min_years_experience: *min_years_experience,
                        min_reputation: *min_reputation,
                        selection_mechanism: *selection_mechanism,
                        status: TenderStatus::Draft,
                        awarded_supplier_id: None,
                        awarded_at: None,
                        seed: None,
                        feasible_set: None,
                        version: event.version,
                    },
                );
            }
            EventKind::TenderOpened { tender_id } => {
                if let Some(tender) = self.tenders.get_mut(tender_id) {
                    tender.status = TenderStatus::Open;
                    tender.version = event.version;
                }
            }
            EventKind::TenderEvaluated {
                tender_id,
                feasible_set,
            } => {
                if let Some(tender) = self.tenders.get_mut(tender_id) {
                    tender.status = TenderStatus::Evaluating;
                    tender.feasible_set = Some(feasible_set.clone());
                    tender.version = event.version;
                }
            }
            EventKind::TenderAwarded {
                tender_id,
                supplier_id,
                seed,
                awarded_at,
                ..
            } => {
                if let Some(tender) = self.tenders.get_mut(tender_id) {
                    tender.status = TenderStatus::Awarded;
                    tender.awarded_supplier_id = Some(supplier_id.clone());
                    tender.awarded_at = Some(*awarded_at);
                    tender.seed = Some(seed.clone());
                    tender.version = event.version;
                }
            }
            EventKind::TenderClosed { tender_id } => {
                if let Some(tender) = self.tenders.get_mut(tender_id) {
                    tender.status = TenderStatus::Closed;
                    tender.version = event.version;
                }
            }
            _ => {}
        }
    }

    pub fn tender(&self, id: &str) -> Option<&TenderState> {
        self.tenders.get(id)
    }

    pub fn list_by_status(&self, status: TenderStatus) -> Vec<&TenderState> {
        self.tenders
            .values()
            .filter(|t| t.status == status)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tenders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenders.is_empty()
    }
}

// =============================================================================
// CONTRACTS
// =============================================================================

/// Contract record derived from a tender award.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    pub contract_id: ContractId,
    pub tender_id: TenderId,
    pub supplier_id: SupplierId,
    pub law_id: LawId,
    pub value: Amount,
    pub awarded_at: DateTime<Utc>,
}

/// Fold of awards into contract records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractRegistry {
    contracts: BTreeMap<ContractId, ContractState>,
    /// Tender → law lookup populated from creation events.
    tender_laws: BTreeMap<TenderId, LawId>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &Event) {
        match &event.kind {
            EventKind::TenderCreated {
                tender_id, law_id, ..
            } => {
                self.tender_laws.insert(tender_id.clone(), law_id.clone());
            }
            EventKind::TenderAwarded {
                tender_id,
                supplier_id,
                awarded_value,
                awarded_at,
                ..
            } => {
                let contract_id = format!("contract:{}", tender_id);
                let law_id = self
                    .tender_laws
                    .get(tender_id)
                    .cloned()
                    .unwrap_or_default();
                self.contracts.insert(
                    contract_id.clone(),
                    ContractState {
                        contract_id,
                        tender_id: tender_id.clone(),
                        supplier_id: supplier_id.clone(),
                        law_id,
                        value: *awarded_value,
                        awarded_at: *awarded_at,
                    },
                );
            }
            _ => {}
        }
    }

    pub fn contract(&self, id: &str) -> Option<&ContractState> {
        self.contracts.get(id)
    }

    pub fn for_supplier(&self, supplier_id: &str) -> Vec<&ContractState> {
        self.contracts
            .values()
            .filter(|c| c.supplier_id == supplier_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

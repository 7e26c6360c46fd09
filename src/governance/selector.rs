//! Procurement Selector
//!
//! Feasibility is a pipeline of binary gates: a supplier is in or out,
//! never scored. Selection over the feasible set is deterministic given
//! the same set and seed, so any award can be re-derived from its event.
//!
//! # Mechanisms
//!
//! - **ROTATION**: least `total_value_awarded`, ties by lexicographic id
//! - **RANDOM**: id-sorted feasible set indexed by `SHA256(seed) mod n`
//! - **HYBRID**: restrict to `value ≤ 1.1 · min(value)`, then RANDOM

use crate::governance::amount::Amount;
use crate::governance::procurement::SupplierState;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

// =============================================================================
// FEASIBILITY GATES
// =============================================================================

/// What a tender demands of a supplier.
#[derive(Debug, Clone, PartialEq)]
pub struct FeasibilityRequirements {
    pub estimated_value: Amount,
    pub required_capabilities: BTreeSet<String>,
    pub min_years_experience: Option<u32>,
    pub min_reputation: Option<f64>,
}

/// The binary gates, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeasibilityGate {
    /// `max_contract_value ≥ estimated_value`
    Capacity,
    /// required capabilities ⊆ certifications
    Certification,
    /// `years_in_business ≥ min`
    Experience,
    /// `reputation_score ≥ min`
    Reputation,
}

impl FeasibilityGate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capacity => "capacity",
            Self::Certification => "certification",
            Self::Experience => "experience",
            Self::Reputation => "reputation",
        }
    }
}

/// First failing gate, or Ok if the supplier is feasible.
pub fn passes_gates(
    supplier: &SupplierState,
    req: &FeasibilityRequirements,
) -> Result<(), FeasibilityGate> {
    if supplier.max_contract_value < req.estimated_value {
        return Err(FeasibilityGate::Capacity);
    }
    if !req
        .required_capabilities
        .iter()
        .all(|cap| supplier.certifications.contains(cap))
    {
        return Err(FeasibilityGate::Certification);
    }
    if let Some(min_years) = req.min_years_experience {
        if supplier.years_in_business < min_years {
            return Err(FeasibilityGate::Experience);
        }
    }
    if let Some(min_reputation) = req.min_reputation {
        if supplier.reputation_score < min_reputation {
            return Err(FeasibilityGate::Reputation);
        }
    }
    Ok(())
}

/// Feasible suppliers in lexicographic id order.
pub fn feasible_set<'a, I>(suppliers: I, req: &FeasibilityRequirements) -> Vec<&'a SupplierState>
where
    I: IntoIterator<Item = &'a SupplierState>,
{
    let mut feasible: Vec<&SupplierState> = suppliers
        .into_iter()
        .filter(|s| passes_gates(s, req).is_ok())
        .collect();
    feasible.sort_by(|a, b| a.supplier_id.cmp(&b.supplier_id));
    feasible
}

// =============================================================================
// SELECTION
// =============================================================================

/// Selection over an empty feasible set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoFeasibleSupplier;

impl std::fmt::Display for NoFeasibleSupplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no feasible supplier")
    }
}

impl std::error::Error for NoFeasibleSupplier {}

/// Hex SHA-256 of the seed, recorded in award events for audit.
pub fn seed_digest(seed: &str) -> String {
    hex::encode(Sha256::digest(seed.as_bytes()))
}

/// Exact residue of the 256-bit digest modulo `n`.
///
/// Folds big-endian digest bytes so the result equals `int(h) mod n`
/// for the full 256-bit integer, with no truncation bias.
pub fn sha256_index(seed: &str, n: usize) -> usize {
    debug_assert!(n > 0);
    let digest = Sha256::digest(seed.as_bytes());
    let modulus = n as u128;
    let mut acc: u128 = 0;
    for byte in digest {
        acc = (acc * 256 + byte as u128) % modulus;
    }
    acc as usize
}

/// Pick the supplier with the least awarded value, ties by id.
fn select_rotation<'a>(feasible: &[&'a SupplierState]) -> Option<&'a SupplierState> {
    feasible.iter().copied().min_by(|a, b| {
        a.total_value_awarded
            .cmp(&b.total_value_awarded)
            .then_with(|| a.supplier_id.cmp(&b.supplier_id))
    })
}

/// Index the id-sorted feasible set by the seed digest.
fn select_random<'a>(feasible: &[&'a SupplierState], seed: &str) -> Option<&'a SupplierState> {
    if feasible.is_empty() {
        return None;
    }
    Some(feasible[sha256_index(seed, feasible.len())])
}

/// Restrict to suppliers within 10% of the least-awarded, then RANDOM.
fn select_hybrid<'a>(feasible: &[&'a SupplierState], seed: &str) -> Option<&'a SupplierState> {
    let min_awarded = feasible.iter().map(|s| s.total_value_awarded).min()?;
    // value ≤ 1.1 · min, exactly: 10 · value ≤ 11 · min.
    let shortlist: Vec<&SupplierState> = feasible
        .iter()
        .copied()
        .filter(|s| s.total_value_awarded * 10 <= min_awarded * 11)
        .collect();
    select_random(&shortlist, seed)
}

/// Deterministic selection from an id-sorted feasible set.
pub fn select<'a>(
    mechanism: crate::governance::events::SelectionMechanism,
    feasible: &[&'a SupplierState],
    seed: &str,
) -> Result<&'a SupplierState, NoFeasibleSupplier> {
    use crate::governance::events::SelectionMechanism::*;
    match mechanism {
        Rotation => select_rotation(feasible),
        Random => select_random(feasible, seed),
        Hybrid => select_hybrid(feasible, seed),
    }
    .ok_or(NoFeasibleSupplier)
}

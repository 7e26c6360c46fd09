//! Procurement Selector Tests
//!
//! Gate-by-gate feasibility, deterministic selection for all three
//! mechanisms, and the SHA-256 residue arithmetic.

use crate::governance::amount::to_amount;
use crate::governance::events::SelectionMechanism;
use crate::governance::procurement::SupplierState;
use crate::governance::selector::{
    feasible_set, passes_gates, seed_digest, select, sha256_index, FeasibilityGate,
    FeasibilityRequirements, NoFeasibleSupplier,
};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

fn supplier(id: &str, max_value: f64, certs: &[&str], years: u32, rep: f64, awarded: f64) -> SupplierState {
    SupplierState {
        supplier_id: id.to_string(),
        name: id.to_uppercase(),
        supplier_type: "generic".to_string(),
        max_contract_value: to_amount(max_value),
        certifications: certs.iter().map(|c| c.to_string()).collect(),
        years_in_business: years,
        reputation_score: rep,
        total_value_awarded: to_amount(awarded),
        version: 1,
    }
}

fn requirements(value: f64, caps: &[&str], years: Option<u32>, rep: Option<f64>) -> FeasibilityRequirements {
    FeasibilityRequirements {
        estimated_value: to_amount(value),
        required_capabilities: caps.iter().map(|c| c.to_string()).collect::<BTreeSet<_>>(),
        min_years_experience: years,
        min_reputation: rep,
    }
}

#[test]
fn test_each_gate_in_order() {
    let req = requirements(100.0, &["iso9001"], Some(5), Some(0.6));

    let too_small = supplier("s", 50.0, &["iso9001"], 10, 0.9, 0.0);
    let gate = passes_gates(&too_small, &req).unwrap_err();
    assert_eq!(gate, FeasibilityGate::Capacity);
    assert_eq!(gate.as_str(), "capacity");

    let uncertified = supplier("s", 500.0, &["other"], 10, 0.9, 0.0);
    assert_eq!(
        passes_gates(&uncertified, &req),
        Err(FeasibilityGate::Certification)
    );

    let green = supplier("s", 500.0, &["iso9001"], 3, 0.9, 0.0);
    assert_eq!(passes_gates(&green, &req), Err(FeasibilityGate::Experience));

    let disreputable = supplier("s", 500.0, &["iso9001"], 10, 0.5, 0.0);
    assert_eq!(
        passes_gates(&disreputable, &req),
        Err(FeasibilityGate::Reputation)
    );

    let fine = supplier("s", 100.0, &["iso9001", "extra"], 5, 0.6, 0.0);
    assert_eq!(passes_gates(&fine, &req), Ok(()), "boundaries are inclusive");
}

#[test]
fn test_feasible_set_is_id_sorted() {
    let req = requirements(10.0, &[], None, None);
    let suppliers = [
        supplier("zeta", 100.0, &[], 1, 0.5, 0.0),
        supplier("alpha", 100.0, &[], 1, 0.5, 0.0),
        supplier("tiny", 1.0, &[], 1, 0.5, 0.0),
    ];
    let feasible = feasible_set(suppliers.iter(), &req);
    let ids: Vec<&str> = feasible.iter().map(|s| s.supplier_id.as_str()).collect();
    assert_eq!(ids, vec!["alpha", "zeta"]);
}

#[test]
fn test_rotation_least_awarded_with_id_tiebreak() {
    let a = supplier("alpha", 100.0, &[], 1, 0.5, 50.0);
    let b = supplier("beta", 100.0, &[], 1, 0.5, 10.0);
    let c = supplier("gamma", 100.0, &[], 1, 0.5, 10.0);
    let feasible = vec![&a, &b, &c];
    let winner = select(SelectionMechanism::Rotation, &feasible, "ignored").unwrap();
    assert_eq!(winner.supplier_id, "beta", "least awarded, ties to lexicographic id");
}

#[test]
fn test_random_selection_reproducible() {
    let s1 = supplier("s1", 100.0, &[], 1, 0.5, 0.0);
    let s2 = supplier("s2", 100.0, &[], 1, 0.5, 0.0);
    let feasible = vec![&s1, &s2];

    let seed = "tender-42";
    let first = select(SelectionMechanism::Random, &feasible, seed).unwrap();
    let second = select(SelectionMechanism::Random, &feasible, seed).unwrap();
    assert_eq!(first.supplier_id, second.supplier_id);

    // int(SHA256(seed)) mod 2 equals the parity of the digest's last byte.
    let digest = Sha256::digest(seed.as_bytes());
    let expected = (digest[31] % 2) as usize;
    assert_eq!(sha256_index(seed, 2), expected);
    assert_eq!(first.supplier_id, feasible[expected].supplier_id);
}

#[test]
fn test_sha256_index_residue() {
    // n = 1 always selects the only candidate.
    assert_eq!(sha256_index("anything", 1), 0);
    // Residues are stable and within range across seeds and moduli.
    for n in [2usize, 3, 7, 10, 997] {
        for seed in ["a", "b", "tender-42", ""] {
            let index = sha256_index(seed, n);
            assert!(index < n);
            assert_eq!(index, sha256_index(seed, n), "stable for {} mod {}", seed, n);
        }
    }
    // Spot-check against u128 arithmetic on the digest tail: for a
    // modulus dividing 2^k the residue only depends on the low bits.
    let digest = Sha256::digest("tender-42".as_bytes());
    let low = u128::from_be_bytes(digest[16..32].try_into().unwrap());
    assert_eq!(sha256_index("tender-42", 16), (low % 16) as usize);
}

#[test]
fn test_hybrid_restricts_to_near_minimum() {
    let a = supplier("a", 1000.0, &[], 1, 0.5, 100.0);
    let b = supplier("b", 1000.0, &[], 1, 0.5, 105.0);
    let c = supplier("c", 1000.0, &[], 1, 0.5, 110.0);
    let d = supplier("d", 1000.0, &[], 1, 0.5, 111.0);
    let feasible = vec![&a, &b, &c, &d];

    // Shortlist is everyone within 1.1 × 100 inclusive: a, b, c.
    for seed in ["x", "y", "z", "tender-7", "anything at all"] {
        let winner = select(SelectionMechanism::Hybrid, &feasible, seed).unwrap();
        assert_ne!(winner.supplier_id, "d", "d is beyond 110 for seed {}", seed);
        let shortlist = vec![&a, &b, &c];
        let expected = &shortlist[sha256_index(seed, 3)];
        assert_eq!(winner.supplier_id, expected.supplier_id);
    }
}

#[test]
fn test_empty_feasible_set_is_an_error() {
    let feasible: Vec<&SupplierState> = Vec::new();
    for mechanism in [
        SelectionMechanism::Rotation,
        SelectionMechanism::Random,
        SelectionMechanism::Hybrid,
    ] {
        assert_eq!(
            select(mechanism, &feasible, "seed").unwrap_err(),
            NoFeasibleSupplier
        );
    }
}

#[test]
fn test_seed_digest_matches_sha256() {
    let digest = seed_digest("tender-42");
    assert_eq!(digest.len(), 64);
    assert_eq!(digest, hex::encode(Sha256::digest(b"tender-42")));
}

//! Freedom Health
//!
//! On-demand synthesis of concentration metrics, overdue reviews, and
//! halt latches into a single risk label. Never stored; recompute it
//! whenever it is asked for.

use crate::governance::concentration::{gini, ConcentrationLevel};
use crate::governance::policy::SafetyPolicy;
use crate::governance::projections::ProjectionSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall risk label, encoded 0/1/2 for metrics sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Elevated,
    Critical,
}

impl RiskLevel {
    pub fn as_code(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Elevated => 1,
            Self::Critical => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Elevated => "elevated",
            Self::Critical => "critical",
        }
    }
}

/// Snapshot of systemic health at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreedomHealth {
    pub risk: RiskLevel,
    pub delegation_gini: f64,
    pub supplier_gini: f64,
    pub max_in_degree: u64,
    pub overdue_reviews: usize,
    pub delegation_halt_latched: bool,
    pub computed_at: DateTime<Utc>,
}

/// Compute health from current projections.
pub fn compute(
    now: DateTime<Utc>,
    policy: &SafetyPolicy,
    projections: &ProjectionSet,
) -> FreedomHealth {
    let delegation_gini = gini(&projections.delegations.in_degree_distribution());
    let supplier_gini = gini(&projections.suppliers.awarded_distribution());
    let max_in_degree = projections.delegations.max_in_degree();
    let overdue_reviews = projections.laws.list_overdue(now).len();

    let delegation_level = ConcentrationLevel::from_gini(
        delegation_gini,
        policy.delegation_gini_warn,
        policy.delegation_gini_halt,
    )
    .max(ConcentrationLevel::from_in_degree(
        max_in_degree,
        policy.delegation_in_degree_warn,
        policy.delegation_in_degree_halt,
    ));
    let supplier_level = ConcentrationLevel::from_gini(
        supplier_gini,
        policy.supplier_gini_warn,
        policy.supplier_gini_halt,
    );
    let halt_latched = projections.reflex.delegation_halt_active();

    let risk = if delegation_level == ConcentrationLevel::Halt
        || supplier_level == ConcentrationLevel::Halt
        || halt_latched
    {
        RiskLevel::Critical
    } else if delegation_level == ConcentrationLevel::Warn
        || supplier_level == ConcentrationLevel::Warn
        || overdue_reviews > 0
    {
        RiskLevel::Elevated
    } else {
        RiskLevel::Low
    };

    FreedomHealth {
        risk,
        delegation_gini,
        supplier_gini,
        max_in_degree,
        overdue_reviews,
        delegation_halt_latched: halt_latched,
        computed_at: now,
    }
}

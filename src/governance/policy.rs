//! Safety Policy
//!
//! Immutable record carrying every numeric threshold the kernel
//! enforces. The policy is passed by reference into handlers and the
//! tick engine; there is no global mutable configuration.

use crate::governance::events::{FlexClass, Reversibility};
use serde::{Deserialize, Serialize};

/// Per-class allocation adjustment ceilings, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlexLimits {
    /// CRITICAL: 5%.
    pub critical_bps: u32,
    /// IMPORTANT: 15%.
    pub important_bps: u32,
    /// ASPIRATIONAL: 50%.
    pub aspirational_bps: u32,
}

impl Default for FlexLimits {
    fn default() -> Self {
        Self {
            critical_bps: 500,
            important_bps: 1500,
            aspirational_bps: 5000,
        }
    }
}

impl FlexLimits {
    pub fn ceiling_bps(&self, class: FlexClass) -> u32 {
        match class {
            FlexClass::Critical => self.critical_bps,
            FlexClass::Important => self.important_bps,
            FlexClass::Aspirational => self.aspirational_bps,
        }
    }
}

/// Budget balancing enforcement mode. Only STRICT exists today; the
/// variant is kept so the mode is explicit in config and audit payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceMode {
    #[default]
    Strict,
}

/// Default review schedules per reversibility class, in days after
/// activation, used when a law is created without an explicit schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointDefaults {
    pub reversible: Vec<u32>,
    pub semi_reversible: Vec<u32>,
    pub irreversible: Vec<u32>,
}

impl Default for CheckpointDefaults {
    fn default() -> Self {
        Self {
            reversible: vec![90, 180, 365],
            semi_reversible: vec![60, 120, 240, 365],
            irreversible: vec![30, 90, 180, 365],
        }
    }
}

impl CheckpointDefaults {
    pub fn for_class(&self, class: Reversibility) -> &[u32] {
        match class {
            Reversibility::Reversible => &self.reversible,
            Reversibility::SemiReversible => &self.semi_reversible,
            Reversibility::Irreversible => &self.irreversible,
        }
    }
}

/// Every threshold the kernel enforces, in one injected value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyPolicy {
    /// Upper bound for delegation TTLs, inclusive.
    pub max_delegation_ttl_days: u32,
    /// Delegation in-degree Gini warning threshold.
    pub delegation_gini_warn: f64,
    /// Delegation in-degree Gini halt threshold.
    pub delegation_gini_halt: f64,
    /// Per-actor in-degree warning threshold.
    pub delegation_in_degree_warn: u64,
    /// Per-actor in-degree halt threshold.
    pub delegation_in_degree_halt: u64,
    /// Allocation adjustment ceilings.
    pub budget_flex_limits: FlexLimits,
    /// Balance enforcement mode.
    pub budget_balance_mode: BalanceMode,
    /// Supplier awarded-value Gini warning threshold.
    pub supplier_gini_warn: f64,
    /// Supplier awarded-value Gini halt threshold.
    pub supplier_gini_halt: f64,
    /// Default review schedules per reversibility class.
    pub checkpoint_defaults: CheckpointDefaults,
    /// Irreversible laws must schedule their first review within this
    /// many days of activation.
    pub irreversible_first_checkpoint_max_days: u32,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            max_delegation_ttl_days: 365,
            // Small graphs are skewed by construction (one edge already
            // scores 0.5), so the delegation thresholds sit well above
            // the supplier ones.
            delegation_gini_warn: 0.85,
            delegation_gini_halt: 0.95,
            delegation_in_degree_warn: 500,
            delegation_in_degree_halt: 2000,
            budget_flex_limits: FlexLimits::default(),
            budget_balance_mode: BalanceMode::Strict,
            supplier_gini_warn: 0.30,
            supplier_gini_halt: 0.50,
            checkpoint_defaults: CheckpointDefaults::default(),
            irreversible_first_checkpoint_max_days: 30,
        }
    }
}

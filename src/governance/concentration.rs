//! Concentration Metrics
//!
//! Gini coefficient over non-negative distributions (delegation
//! in-degrees, supplier awarded value). Deterministic: the input is
//! sorted internally, so callers may pass values in any order.

/// Gini coefficient of a non-negative distribution.
///
/// Uses `G = (2·Σᵢ i·xᵢ) / (n·Σ xᵢ) − (n+1)/n` over the ascending,
/// 1-indexed sort. Empty and zero-total distributions are 0.0; a single
/// actor holding everything approaches `(n−1)/n`.
pub fn gini(values: &[u128]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let total: u128 = values.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, &x)| (i as f64 + 1.0) * x as f64)
        .sum();

    let n_f = n as f64;
    (2.0 * weighted) / (n_f * total as f64) - (n_f + 1.0) / n_f
}

/// Concentration level against a warn/halt threshold pair.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationLevel {
    #[default]
    Normal,
    Warn,
    Halt,
}

impl ConcentrationLevel {
    /// Classify a Gini coefficient.
    pub fn from_gini(gini: f64, warn: f64, halt: f64) -> Self {
        if gini >= halt {
            Self::Halt
        } else if gini >= warn {
            Self::Warn
        } else {
            Self::Normal
        }
    }

    /// Classify a maximum in-degree.
    pub fn from_in_degree(max_in_degree: u64, warn: u64, halt: u64) -> Self {
        if max_in_degree >= halt {
            Self::Halt
        } else if max_in_degree >= warn {
            Self::Warn
        } else {
            Self::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warn => "warn",
            Self::Halt => "halt",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gini_empty_and_zero() {
        assert_eq!(gini(&[]), 0.0);
        assert_eq!(gini(&[0, 0, 0]), 0.0);
    }

    #[test]
    fn test_gini_equal_distribution() {
        assert!(gini(&[5, 5, 5, 5]).abs() < 1e-12);
    }

    #[test]
    fn test_gini_full_concentration() {
        // One actor holds everything: G = (n-1)/n.
        let g = gini(&[0, 0, 0, 100]);
        assert!((g - 0.75).abs() < 1e-12, "got {}", g);

        let n = 1000usize;
        let mut values = vec![0u128; n];
        values[0] = 1;
        let g = gini(&values);
        assert!((g - (n as f64 - 1.0) / n as f64).abs() < 1e-9);
    }

    #[test]
    fn test_gini_order_independent() {
        assert_eq!(gini(&[1, 9, 3]), gini(&[9, 3, 1]));
    }

    #[test]
    fn test_level_thresholds_inclusive() {
        assert_eq!(
            ConcentrationLevel::from_gini(0.30, 0.30, 0.50),
            ConcentrationLevel::Warn
        );
        assert_eq!(
            ConcentrationLevel::from_gini(0.50, 0.30, 0.50),
            ConcentrationLevel::Halt
        );
        assert_eq!(
            ConcentrationLevel::from_in_degree(2000, 500, 2000),
            ConcentrationLevel::Halt
        );
    }
}

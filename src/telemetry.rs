//! Telemetry
//!
//! Tracing initialization and the fixed log-redaction list. Production
//! failures are logged with correlation ids, never stack traces, and
//! identity or monetary fields are redacted before they reach output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fields that never appear in clear text in logs.
pub const REDACTED_FIELDS: &[&str] = &["actor_id", "from_actor", "to_actor", "amount"];

/// Placeholder that replaces redacted values.
pub const REDACTED: &str = "[redacted]";

/// Is this field on the redaction list?
pub fn is_redacted_field(name: &str) -> bool {
    REDACTED_FIELDS.contains(&name)
}

/// Value of `field` as it may be logged.
pub fn redact(field: &str, value: &str) -> String {
    if is_redacted_field(field) {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}

/// Initialize the global subscriber: env-filter (RUST_LOG wins) with a
/// compact fmt layer. Safe to call more than once; later calls no-op.
pub fn init_logging(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction_list() {
        assert_eq!(redact("actor_id", "alice"), REDACTED);
        assert_eq!(redact("from_actor", "alice"), REDACTED);
        assert_eq!(redact("amount", "500000"), REDACTED);
        assert_eq!(redact("law_id", "energy-act"), "energy-act");
    }
}

//! Kernel Configuration
//!
//! Env-driven configuration for the storage path, logging, time source,
//! and every safety-policy threshold. The db path is validated against
//! an optional base directory so a hostile `POLITY_DB_PATH` cannot
//! traverse out of it.

use crate::governance::policy::SafetyPolicy;
use anyhow::{bail, Context, Result};
use std::env;
use std::path::{Component, Path, PathBuf};

/// Which clock the kernel runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeSource {
    #[default]
    Real,
    /// Virtual clock, advanced by the operator; replay and tests.
    Virtual,
}

impl TimeSource {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "real" => Some(Self::Real),
            "virtual" => Some(Self::Virtual),
            _ => None,
        }
    }
}

/// Full kernel configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelConfig {
    pub db_path: PathBuf,
    /// When set, `db_path` must resolve inside this directory.
    pub base_dir: Option<PathBuf>,
    pub log_level: String,
    pub time_source: TimeSource,
    pub policy: SafetyPolicy,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./polity.db"),
            base_dir: None,
            log_level: "info".to_string(),
            time_source: TimeSource::Real,
            policy: SafetyPolicy::default(),
        }
    }
}

impl KernelConfig {
    /// Load from the environment (`.env` tolerated, never required).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let db_path = PathBuf::from(
            env::var("POLITY_DB_PATH").unwrap_or_else(|_| "./polity.db".to_string()),
        );
        let base_dir = env::var("POLITY_BASE_DIR").ok().map(PathBuf::from);
        let log_level = env::var("POLITY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let time_source = env::var("POLITY_TIME_SOURCE")
            .ok()
            .and_then(|v| TimeSource::parse(&v))
            .unwrap_or_default();

        let mut policy = SafetyPolicy::default();
        if let Some(v) = parse_env::<u32>("POLITY_MAX_DELEGATION_TTL_DAYS") {
            policy.max_delegation_ttl_days = v;
        }
        if let Some(v) = parse_env::<f64>("POLITY_DELEGATION_GINI_WARN") {
            policy.delegation_gini_warn = v;
        }
        if let Some(v) = parse_env::<f64>("POLITY_DELEGATION_GINI_HALT") {
            policy.delegation_gini_halt = v;
        }
        if let Some(v) = parse_env::<u64>("POLITY_DELEGATION_IN_DEGREE_WARN") {
            policy.delegation_in_degree_warn = v;
        }
        if let Some(v) = parse_env::<u64>("POLITY_DELEGATION_IN_DEGREE_HALT") {
            policy.delegation_in_degree_halt = v;
        }
        if let Some(v) = parse_env::<f64>("POLITY_SUPPLIER_GINI_WARN") {
            policy.supplier_gini_warn = v;
        }
        if let Some(v) = parse_env::<f64>("POLITY_SUPPLIER_GINI_HALT") {
            policy.supplier_gini_halt = v;
        }
        if let Some(v) = parse_env::<u32>("POLITY_IRREVERSIBLE_FIRST_CHECKPOINT_MAX_DAYS") {
            policy.irreversible_first_checkpoint_max_days = v;
        }

        let config = Self {
            db_path,
            base_dir,
            log_level,
            time_source,
            policy,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check threshold sanity and the db-path containment rule.
    pub fn validate(&self) -> Result<()> {
        if self.policy.delegation_gini_warn > self.policy.delegation_gini_halt {
            bail!("delegation gini warn threshold exceeds halt threshold");
        }
        if self.policy.supplier_gini_warn > self.policy.supplier_gini_halt {
            bail!("supplier gini warn threshold exceeds halt threshold");
        }
        if self.policy.delegation_in_degree_warn > self.policy.delegation_in_degree_halt {
            bail!("delegation in-degree warn threshold exceeds halt threshold");
        }
        if self.policy.max_delegation_ttl_days == 0 {
            bail!("max delegation ttl must be at least one day");
        }
        if let Some(base) = &self.base_dir {
            validate_contained(&self.db_path, base)
                .context("POLITY_DB_PATH escapes POLITY_BASE_DIR")?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Lexically normalize `path` (resolving `.` and `..` without touching
/// the filesystem) and require it to stay inside `base`.
fn validate_contained(path: &Path, base: &Path) -> Result<()> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    bail!("path escapes the filesystem root");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    let mut base_normalized = PathBuf::new();
    for component in base.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                base_normalized.pop();
            }
            other => base_normalized.push(other.as_os_str()),
        }
    }
    if !normalized.starts_with(&base_normalized) {
        bail!(
            "{} resolves outside {}",
            normalized.display(),
            base_normalized.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_path_containment() {
        let base = Path::new("/var/lib/polity");
        assert!(validate_contained(Path::new("kernel.db"), base).is_ok());
        assert!(validate_contained(Path::new("sub/dir/kernel.db"), base).is_ok());
        assert!(validate_contained(Path::new("../outside.db"), base).is_err());
        assert!(validate_contained(Path::new("sub/../../outside.db"), base).is_err());
        assert!(validate_contained(Path::new("/etc/passwd"), base).is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(KernelConfig::default().validate().is_ok());
    }

    #[test]
    fn test_time_source_parse() {
        assert_eq!(TimeSource::parse("real"), Some(TimeSource::Real));
        assert_eq!(TimeSource::parse("virtual"), Some(TimeSource::Virtual));
        assert_eq!(TimeSource::parse("quartz"), None);
    }

    #[test]
    fn test_threshold_sanity() {
        let mut config = KernelConfig::default();
        config.policy.delegation_gini_warn = config.policy.delegation_gini_halt + 0.01;
        assert!(config.validate().is_err());
    }
}

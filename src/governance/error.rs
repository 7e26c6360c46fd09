//! Kernel Error Taxonomy
//!
//! Tagged variants, never exceptions-for-control-flow. Validation errors
//! surface to the caller unchanged; `VersionConflict` is retried once by
//! the façade; systemic errors abort the operation without partial
//! state. `CommandAlreadyApplied` is not here at all; the façade
//! coerces it to success.

use crate::governance::events::TenderId;
use crate::governance::invariants::ValidationError;
use crate::governance::store::StoreError;

pub type KernelResult<T> = Result<T, KernelError>;

/// Everything a command or tick can fail with.
#[derive(Debug, Clone)]
pub enum KernelError {
    /// A domain invariant rejected the command.
    Validation(ValidationError),
    /// Optimistic-lock failure that survived the single retry.
    VersionConflict {
        stream_id: String,
        expected: u64,
        actual: u64,
    },
    /// The feasibility pipeline left nothing to select from.
    NoFeasibleSupplier { tender_id: TenderId },
    /// The log cannot be reached or written.
    LogUnavailable(String),
    /// Stored events violate uniqueness/ordering, or decode failed.
    CorruptStream { stream_id: String, detail: String },
    /// The clock reported an instant earlier than the newest event.
    ClockRegression { now: String, newest: String },
}

impl std::fmt::Display for KernelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "{}", e),
            Self::VersionConflict {
                stream_id,
                expected,
                actual,
            } => write!(
                f,
                "version conflict on stream {}: expected {}, actual {}",
                stream_id, expected, actual
            ),
            Self::NoFeasibleSupplier { tender_id } => {
                write!(f, "no feasible supplier for tender {}", tender_id)
            }
            Self::LogUnavailable(msg) => write!(f, "event log unavailable: {}", msg),
            Self::CorruptStream { stream_id, detail } => {
                write!(f, "corrupt stream {}: {}", stream_id, detail)
            }
            Self::ClockRegression { now, newest } => {
                write!(f, "clock regression: now {} precedes newest event {}", now, newest)
            }
        }
    }
}

impl std::error::Error for KernelError {}

impl From<ValidationError> for KernelError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<StoreError> for KernelError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::VersionConflict {
                stream_id,
                expected,
                actual,
            } => Self::VersionConflict {
                stream_id,
                expected,
                actual,
            },
            StoreError::Corrupt { stream_id, detail } => Self::CorruptStream { stream_id, detail },
            StoreError::Unavailable(msg) => Self::LogUnavailable(msg),
        }
    }
}

impl KernelError {
    /// Validation failures are final; the façade must not retry them.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

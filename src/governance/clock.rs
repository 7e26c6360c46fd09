//! Time Provider
//!
//! Single source of truth for kernel time. All expiry, checkpoint, and
//! tick logic reads time exclusively through the `Clock` trait so that
//! tests and replay can substitute a virtual clock.
//!
//! # Determinism Contract
//! - `now()` is the only way kernel code observes time
//! - The virtual clock only moves forward; backward movement panics
//! - The system clock is never consulted directly outside `SystemClock`

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Wall-clock abstraction.
pub trait Clock: Send + Sync {
    /// Current instant, UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall clock.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mutable virtual clock for tests and deterministic replay.
///
/// Cloning yields a handle to the same underlying instant, so a test can
/// keep one handle and hand another to the kernel.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl VirtualClock {
    /// Create a virtual clock starting at the given instant.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance to an absolute instant. Panics if time would go backward.
    pub fn advance_to(&self, instant: DateTime<Utc>) {
        let mut current = self.current.lock();
        assert!(
            instant >= *current,
            "VirtualClock: cannot go backward from {} to {}",
            *current,
            instant
        );
        *current = instant;
    }

    /// Advance by a duration. Panics if the duration is negative.
    pub fn advance_by(&self, delta: Duration) {
        assert!(
            delta >= Duration::zero(),
            "VirtualClock: delta must be non-negative"
        );
        let mut current = self.current.lock();
        *current = *current + delta;
    }

    /// Advance by whole days.
    pub fn advance_days(&self, days: i64) {
        self.advance_by(Duration::days(days));
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

// crates/toolgate-core/src/time.rs
// ============================================================================
// Module: Toolgate Clock
// Description: Monotonic clock abstraction for breaker and rate limit state.
// Purpose: Let time-dependent state machines run against a controllable clock.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The circuit breaker and rate limiter never read wall-clock time directly;
//! they ask a [`Clock`] for a monotonic [`Instant`]. Production code uses
//! [`SystemClock`]; tests drive [`ManualClock`] forward explicitly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::Instant;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic tests.
///
/// # Invariants
/// - Time only moves forward, and only through [`ManualClock::advance`].
#[derive(Debug)]
pub struct ManualClock {
    /// Instant captured at construction.
    origin: Instant,
    /// Offset applied on top of `origin`.
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset = offset.saturating_add(by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.origin + offset
    }
}

// crates/toolgate-core/src/breaker.rs
// ============================================================================
// Module: Circuit Breaker
// Description: Per-upstream-label failure isolation state machine.
// Purpose: Stop forwarding to an upstream after repeated failures.
// Dependencies: dashmap, tracing, crate::model, crate::time
// ============================================================================

//! ## Overview
//! One breaker instance governs every upstream label. Thresholds are passed
//! per call so each label can carry its own [`CircuitBreakerConfig`].
//!
//! ## State Machine
//! - `Closed`: calls are allowed. Failures increment a consecutive counter;
//!   reaching `fail_threshold` opens the breaker and stamps `opened_at`.
//! - `Open`: calls are rejected until `open_duration` has elapsed since
//!   `opened_at`. After that, exactly one trial call is admitted while the
//!   state stays `Open`; every other caller is refused until the trial
//!   resolves. A success closes the breaker; a failure re-stamps
//!   `opened_at`, restarting the blackout.
//!
//! A trial that never reports back (dropped request, or a pipeline step
//! that rejected the call before forwarding without calling
//! [`CircuitBreaker::release_trial`]) holds its slot for at most one
//! `open_duration`, after which a new trial is admitted.
//!
//! ## Invariants
//! - Exactly one state per label, created lazily and never removed.
//! - Every read-modify-write happens under that label's mutex, so concurrent
//!   callers never observe a partially updated state.
//! - State is process-local; a restart resets every label to `Closed`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Instant;

use dashmap::DashMap;

use crate::model::CircuitBreakerConfig;
use crate::time::Clock;
use crate::time::SystemClock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Breaker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerPosition {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected until the blackout elapses.
    Open,
}

/// Point-in-time copy of one label's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    /// Current position.
    pub position: BreakerPosition,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// When the breaker last opened; `None` while closed.
    pub opened_at: Option<Instant>,
    /// Whether a post-blackout trial call is outstanding.
    pub trial_in_flight: bool,
}

/// How a call was admitted by [`CircuitBreaker::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Breaker closed; ordinary call.
    Closed,
    /// The single trial call after a blackout.
    Trial,
}

/// Mutable state for one label.
#[derive(Debug)]
struct BreakerState {
    /// Current position.
    position: BreakerPosition,
    /// Failures since the last success.
    consecutive_failures: u32,
    /// Valid only while `Open`.
    opened_at: Option<Instant>,
    /// When the outstanding trial was admitted.
    trial_started_at: Option<Instant>,
}

impl BreakerState {
    /// Initial closed state.
    const fn closed() -> Self {
        Self {
            position: BreakerPosition::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_started_at: None,
        }
    }

    /// Copies the state out.
    const fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            position: self.position,
            consecutive_failures: self.consecutive_failures,
            opened_at: self.opened_at,
            trial_in_flight: self.trial_started_at.is_some(),
        }
    }
}

/// Circuit breaker keyed by upstream label.
pub struct CircuitBreaker {
    /// Per-label state.
    states: DashMap<String, Arc<Mutex<BreakerState>>>,
    /// Time source.
    clock: Arc<dyn Clock>,
}

// ============================================================================
// SECTION: Implementation
// ============================================================================

impl CircuitBreaker {
    /// Creates a breaker on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a breaker on a caller-supplied clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            states: DashMap::new(),
            clock,
        }
    }

    /// Returns whether a call to `label` may proceed.
    pub fn allow(&self, label: &str, config: &CircuitBreakerConfig) -> bool {
        self.admit(label, config).is_some()
    }

    /// Admits a call to `label`, reporting whether it is the post-blackout
    /// trial. `None` means the call must be rejected.
    pub fn admit(&self, label: &str, config: &CircuitBreakerConfig) -> Option<Admission> {
        let now = self.clock.now();
        let entry = self.entry(label);
        let mut state = entry.lock().unwrap_or_else(PoisonError::into_inner);
        if state.position == BreakerPosition::Closed {
            return Some(Admission::Closed);
        }
        let blackout_over = state
            .opened_at
            .is_none_or(|opened_at| now.saturating_duration_since(opened_at) >= config.open_duration);
        let trial_busy = state.trial_started_at.is_some_and(|started| {
            now.saturating_duration_since(started) < config.open_duration
        });
        if !blackout_over || trial_busy {
            return None;
        }
        state.trial_started_at = Some(now);
        Some(Admission::Trial)
    }

    /// Frees the trial slot without recording an outcome.
    ///
    /// Used when an admitted trial is rejected before it reaches the upstream.
    pub fn release_trial(&self, label: &str) {
        let entry = self.entry(label);
        let mut state = entry.lock().unwrap_or_else(PoisonError::into_inner);
        state.trial_started_at = None;
    }

    /// Records a successful call: clears failures and closes the breaker.
    pub fn record_success(&self, label: &str) {
        let entry = self.entry(label);
        let mut state = entry.lock().unwrap_or_else(PoisonError::into_inner);
        if state.position == BreakerPosition::Open {
            tracing::info!(label, "circuit breaker closed");
        }
        *state = BreakerState::closed();
    }

    /// Records a failed call.
    ///
    /// Opens the breaker once `fail_threshold` consecutive failures are seen;
    /// while already open, restarts the blackout.
    pub fn record_failure(&self, label: &str, config: &CircuitBreakerConfig) {
        let now = self.clock.now();
        let entry = self.entry(label);
        let mut state = entry.lock().unwrap_or_else(PoisonError::into_inner);
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.trial_started_at = None;
        match state.position {
            BreakerPosition::Open => {
                state.opened_at = Some(now);
            }
            BreakerPosition::Closed if state.consecutive_failures >= config.fail_threshold => {
                state.position = BreakerPosition::Open;
                state.opened_at = Some(now);
                tracing::warn!(
                    label,
                    failures = state.consecutive_failures,
                    threshold = config.fail_threshold,
                    open_secs = config.open_duration.as_secs(),
                    "circuit breaker opened"
                );
            }
            BreakerPosition::Closed => {}
        }
    }

    /// Returns a copy of `label`'s state, if the label has been seen.
    #[must_use]
    pub fn snapshot(&self, label: &str) -> Option<BreakerSnapshot> {
        let entry = self.states.get(label).map(|entry| Arc::clone(entry.value()))?;
        let state = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Some(state.snapshot())
    }

    /// Fetches or lazily creates the state for `label`.
    fn entry(&self, label: &str) -> Arc<Mutex<BreakerState>> {
        if let Some(existing) = self.states.get(label) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .states
            .entry(label.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(BreakerState::closed())));
        Arc::clone(entry.value())
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

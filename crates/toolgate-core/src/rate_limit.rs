// crates/toolgate-core/src/rate_limit.rs
// ============================================================================
// Module: Fixed-Window Rate Limiter
// Description: In-memory per-key admission counters.
// Purpose: Bound request volume per (server, tool, caller) without a global lock.
// Dependencies: dashmap, crate::time
// ============================================================================

//! ## Overview
//! Each key owns a fixed window anchored at its first call. Window
//! boundaries then fall on whole multiples of `window` from that anchor; an
//! idle key that skips several windows lands on the boundary of the window
//! containing `now`, not on `now` itself. At most `limit` calls are admitted
//! per window; the next call is rejected until the window rolls over.
//!
//! ## Invariants
//! - Counters live for the life of the process and are never evicted.
//! - Each key has its own mutex; the map shard lock is held only long enough
//!   to fetch or create the entry, so unrelated keys do not serialize.
//! - A consumed slot is never refunded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::Instant;

use dashmap::DashMap;

use crate::time::Clock;
use crate::time::SystemClock;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default calls admitted per window for gateway tool calls.
pub const DEFAULT_GATEWAY_LIMIT: u32 = 60;
/// Default gateway window length.
pub const DEFAULT_GATEWAY_WINDOW: Duration = Duration::from_secs(60);

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the call is admitted.
    pub permitted: bool,
    /// Calls still admissible in the current window.
    pub remaining: u32,
    /// Time until the current window resets.
    pub reset_after: Duration,
}

/// Counter state for one key.
#[derive(Debug)]
struct Window {
    /// Start of the current window.
    started_at: Instant,
    /// Calls admitted in the current window.
    count: u32,
}

/// Fixed-window rate limiter keyed by arbitrary strings.
pub struct RateLimiter {
    /// Per-key windows.
    windows: DashMap<String, Arc<Mutex<Window>>>,
    /// Time source.
    clock: Arc<dyn Clock>,
}

// ============================================================================
// SECTION: Implementation
// ============================================================================

impl RateLimiter {
    /// Creates a limiter on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a limiter on a caller-supplied clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
        }
    }

    /// Builds the gateway key for a `(server, tool, caller)` triple.
    #[must_use]
    pub fn gateway_key(server_label: &str, tool_name: &str, caller_id: &str) -> String {
        format!("gateway:{server_label}:{tool_name}:{caller_id}")
    }

    /// Attempts to admit one call for `key`.
    ///
    /// A `limit` of zero rejects every call.
    pub fn allow(&self, key: &str, limit: u32, window: Duration) -> RateDecision {
        let now = self.clock.now();
        let entry = self.entry(key, now);
        let mut state = entry.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = now.saturating_duration_since(state.started_at);
        if elapsed >= window {
            state.started_at = current_window_start(now, elapsed, window);
            state.count = 0;
        }
        let reset_after = window.saturating_sub(now.saturating_duration_since(state.started_at));
        if state.count >= limit {
            return RateDecision {
                permitted: false,
                remaining: 0,
                reset_after,
            };
        }
        state.count += 1;
        RateDecision {
            permitted: true,
            remaining: limit - state.count,
            reset_after,
        }
    }

    /// Returns the number of tracked keys.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Fetches or lazily creates the window for `key`.
    fn entry(&self, key: &str, now: Instant) -> Arc<Mutex<Window>> {
        if let Some(existing) = self.windows.get(key) {
            return Arc::clone(existing.value());
        }
        let entry = self.windows.entry(key.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(Window {
                started_at: now,
                count: 0,
            }))
        });
        Arc::clone(entry.value())
    }
}

/// Start of the window containing `now`, given `elapsed` since the old start.
fn current_window_start(now: Instant, elapsed: Duration, window: Duration) -> Instant {
    if window.is_zero() {
        return now;
    }
    let into_window = elapsed.as_nanos() % window.as_nanos();
    u64::try_from(into_window)
        .ok()
        .and_then(|nanos| now.checked_sub(Duration::from_nanos(nanos)))
        .unwrap_or(now)
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

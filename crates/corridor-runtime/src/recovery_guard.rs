//! [`RecoveryGuard`] – optional bound on blocking recovery loops.
//!
//! Stop-and-recover and dodge keep re-pinging until the way ahead is clear.
//! With no limit they can spin forever in front of a permanent obstacle, which
//! matches the firmware.  A guard built with a limit lets the navigator give
//! up after that many re-ping rounds instead.
//!
//! # Example
//!
//! ```rust
//! use corridor_runtime::recovery_guard::RecoveryGuard;
//!
//! let mut guard = RecoveryGuard::new(Some(3));
//!
//! assert!(!guard.record_attempt());
//! assert!(!guard.record_attempt());
//! assert!(guard.record_attempt()); // third round reaches the limit
//!
//! guard.reset();
//! assert_eq!(guard.attempts(), 0);
//!
//! // Without a limit the guard never trips.
//! let mut unbounded = RecoveryGuard::new(None);
//! assert!((0..10_000).all(|_| !unbounded.record_attempt()));
//! ```

// ─────────────────────────────────────────────────────────────────────────────
// RecoveryGuard
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecoveryGuard {
    /// Maximum number of re-ping rounds, or `None` for unbounded.
    limit: Option<u32>,
    attempts: u32,
}

impl RecoveryGuard {
    pub fn new(limit: Option<u32>) -> Self {
        Self { limit, attempts: 0 }
    }

    /// Count one more re-ping round.
    ///
    /// Returns `true` once the number of rounds reaches the limit; the caller
    /// should abandon the recovery.  Always `false` without a limit.
    pub fn record_attempt(&mut self) -> bool {
        self.attempts = self.attempts.saturating_add(1);
        self.is_exhausted()
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.attempts >= limit)
    }

    /// Rounds recorded since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

//! [`CascadeGuard`] – runaway transition-cascade detector.
//!
//! A single [`StateMachine::step`][crate::StateMachine::step] keeps firing
//! transitions until a full scan of the current state's transitions finds
//! none that hold.  A graph whose predicates form a true→true cycle never
//! settles, so every step carries a guard that counts the hops it has taken
//! and trips once the configured limit is exceeded.
//!
//! The guard allocates nothing until the first hop, so a step that settles
//! immediately costs only the guard's construction.
//!
//! # Example
//!
//! ```rust
//! use tickflow_runtime::cascade_guard::CascadeGuard;
//!
//! let mut guard = CascadeGuard::new(2);
//! assert!(guard.path().is_empty());
//!
//! assert!(!guard.record("Idle", "Walk"));
//! assert!(!guard.record("Walk", "Bank"));
//! assert!(guard.record("Bank", "Walk")); // third hop → limit of 2 exceeded
//!
//! assert_eq!(guard.path(), ["Idle", "Walk", "Bank", "Walk"]);
//! ```

use tickflow_types::TickflowError;

// ─────────────────────────────────────────────────────────────────────────────
// CascadeGuard
// ─────────────────────────────────────────────────────────────────────────────

/// Counts the transitions fired during one step and flags a cascade that
/// exceeds its limit.
pub struct CascadeGuard {
    /// Maximum number of hops allowed before the cascade is considered stuck.
    limit: usize,
    /// Origin followed by every state entered.  Empty until the first hop.
    path: Vec<String>,
}

impl CascadeGuard {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            path: Vec::new(),
        }
    }

    /// Record a hop from `from` into `to`.
    ///
    /// `from` is only kept for the first hop, where it is the step's origin.
    /// Returns `true` once the number of recorded hops exceeds the limit,
    /// meaning the caller must abandon the step.
    pub fn record(&mut self, from: &str, to: &str) -> bool {
        if self.path.is_empty() {
            self.path.push(from.to_string());
        }
        self.path.push(to.to_string());
        self.is_exceeded()
    }

    /// Number of hops recorded so far.
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn is_exceeded(&self) -> bool {
        self.hops() > self.limit
    }

    /// States visited, origin first.  Empty while no hop was recorded.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Convert the guard into the error reported by a step that never settled.
    pub fn into_error(self) -> TickflowError {
        TickflowError::CascadeLimitExceeded {
            limit: self.limit,
            path: self.path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hops_within_limit_are_allowed() {
        let mut guard = CascadeGuard::new(3);
        assert!(!guard.record("A", "B"));
        assert!(!guard.record("B", "C"));
        assert!(!guard.record("C", "D"));
        assert_eq!(guard.hops(), 3);
    }

    #[test]
    fn trips_on_first_hop_past_limit() {
        let mut guard = CascadeGuard::new(2);
        guard.record("A", "B");
        guard.record("B", "A");
        assert!(guard.record("A", "B"));
        assert!(guard.is_exceeded());
    }

    #[test]
    fn stays_tripped_after_limit() {
        let mut guard = CascadeGuard::new(1);
        guard.record("A", "B");
        assert!(guard.record("B", "A"));
        assert!(guard.record("A", "B"));
    }

    #[test]
    fn fresh_guard_holds_no_path() {
        let guard = CascadeGuard::new(4);
        assert_eq!(guard.hops(), 0);
        assert!(guard.path().is_empty());
        assert_eq!(guard.path().len(), 0);
        assert!(!guard.is_exceeded());
    }

    #[test]
    fn origin_is_taken_from_first_hop_only() {
        let mut guard = CascadeGuard::new(4);
        guard.record("Start", "Walk");
        guard.record("ignored", "Bank");
        assert_eq!(guard.path(), ["Start", "Walk", "Bank"]);
    }

    #[test]
    fn error_carries_limit_and_path() {
        let mut guard = CascadeGuard::new(1);
        guard.record("A", "B");
        guard.record("B", "A");
        match guard.into_error() {
            TickflowError::CascadeLimitExceeded { limit, path } => {
                assert_eq!(limit, 1);
                assert_eq!(path, vec!["A", "B", "A"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

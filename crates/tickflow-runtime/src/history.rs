//! [`StateHistory`] – a short rolling record of state entries.
//!
//! Keeps the last few entered state names together with when they were
//! entered and how long each lasted.  Attach one to a machine with
//! [`history_listener`] to get a breadcrumb trail such as
//! `"Fish [2m 10s] -> Cook [0m 45s] -> Combat [1m 3s]"`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::state_machine::{State, StateChangeListener};

/// Number of entries kept by [`StateHistory::default`].
pub const DEFAULT_HISTORY_CAPACITY: usize = 5;

/// One recorded state entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub state: String,
    pub entered_at: Instant,
    /// Time spent in the state; `None` while it is still the latest entry.
    pub duration: Option<Duration>,
}

/// Bounded history of state entries, oldest first.
#[derive(Debug, Clone)]
pub struct StateHistory {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl Default for StateHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl StateHistory {
    /// Create an empty history keeping at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Record entry into `state` now.
    ///
    /// Returns `false` and records nothing when `state` is already the latest
    /// entry.
    pub fn record(&mut self, state: &str) -> bool {
        self.record_at(state, Instant::now())
    }

    pub(crate) fn record_at(&mut self, state: &str, now: Instant) -> bool {
        if self.current() == Some(state) {
            return false;
        }
        if let Some(last) = self.entries.back_mut() {
            last.duration = Some(now.saturating_duration_since(last.entered_at));
        }
        self.entries.push_back(HistoryEntry {
            state: state.to_string(),
            entered_at: now,
            duration: None,
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        true
    }

    /// Name of the most recently entered state.
    pub fn current(&self) -> Option<&str> {
        self.entries.back().map(|e| e.state.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Render the history as `"A [0m 3s] -> B [1m 0s]"`.  The latest entry
    /// shows the time elapsed since it was entered.
    pub fn summary(&self) -> String {
        self.summary_at(Instant::now())
    }

    pub(crate) fn summary_at(&self, now: Instant) -> String {
        self.entries
            .iter()
            .map(|entry| {
                let spent = entry
                    .duration
                    .unwrap_or_else(|| now.saturating_duration_since(entry.entered_at));
                let secs = spent.as_secs();
                format!("{} [{}m {}s]", entry.state, secs / 60, secs % 60)
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Build a state-change listener that records every entry into `history`.
///
/// A poisoned lock skips the record rather than panicking inside the step.
pub fn history_listener(history: Arc<Mutex<StateHistory>>) -> StateChangeListener {
    Arc::new(move |state: &State| {
        if let Ok(mut history) = history.lock() {
            history.record(state.name());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateMachineBuilder;

    #[test]
    fn records_entries_in_order() {
        let mut history = StateHistory::new(5);
        assert!(history.record("Fish"));
        assert!(history.record("Cook"));
        assert_eq!(history.current(), Some("Cook"));
        let names: Vec<&str> = history.entries().map(|e| e.state.as_str()).collect();
        assert_eq!(names, vec!["Fish", "Cook"]);
    }

    #[test]
    fn repeated_state_is_ignored() {
        let mut history = StateHistory::default();
        assert!(history.record("Bank"));
        assert!(!history.record("Bank"));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn oldest_entries_are_evicted() {
        let mut history = StateHistory::new(2);
        history.record("A");
        history.record("B");
        history.record("C");
        let names: Vec<&str> = history.entries().map(|e| e.state.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    #[test]
    fn zero_capacity_keeps_one_entry() {
        let mut history = StateHistory::new(0);
        history.record("A");
        history.record("B");
        assert_eq!(history.len(), 1);
        assert_eq!(history.current(), Some("B"));
    }

    #[test]
    fn previous_entry_duration_is_closed_on_next_record() {
        let base = Instant::now();
        let mut history = StateHistory::new(5);
        history.record_at("A", base);
        history.record_at("B", base + Duration::from_secs(3));

        let entries: Vec<&HistoryEntry> = history.entries().collect();
        assert_eq!(entries[0].duration, Some(Duration::from_secs(3)));
        assert_eq!(entries[1].duration, None);
    }

    #[test]
    fn summary_formats_minutes_and_seconds() {
        let base = Instant::now();
        let mut history = StateHistory::new(5);
        history.record_at("A", base);
        history.record_at("B", base + Duration::from_secs(3));
        let summary = history.summary_at(base + Duration::from_secs(63));
        assert_eq!(summary, "A [0m 3s] -> B [1m 0s]");
    }

    #[test]
    fn empty_history_has_empty_summary() {
        let history = StateHistory::default();
        assert!(history.is_empty());
        assert_eq!(history.summary(), "");
    }

    #[test]
    fn listener_records_machine_entries() {
        let history = Arc::new(Mutex::new(StateHistory::default()));
        let mut b = StateMachineBuilder::new();
        let a = b.state(State::new("A"));
        let c = b.state(State::new("C"));
        b.on(a, || true).to(c);
        let mut sm = b.build().unwrap();
        sm.set_shared_listener(history_listener(Arc::clone(&history)));

        sm.enter_initial_state();
        sm.step().unwrap();

        let history = history.lock().unwrap();
        let names: Vec<&str> = history.entries().map(|e| e.state.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }
}

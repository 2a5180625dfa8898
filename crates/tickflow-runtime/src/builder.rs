//! Graph construction for [`StateMachine`]s.
//!
//! Declare states first (each declaration returns a [`StateId`]), then wire
//! transitions between them.  Machine-wide transitions declared with
//! [`StateMachineBuilder::any`] are copied onto every state except their own
//! target when [`build`][StateMachineBuilder::build] runs.
//!
//! # Example
//!
//! ```rust
//! use tickflow_runtime::{State, StateMachineBuilder};
//!
//! let mut b = StateMachineBuilder::new();
//! let combat = b.state(State::new("Combat"));
//! let fish = b.state(State::new("Fish"));
//! let panic_room = b.state(State::new("Escape"));
//!
//! b.on(combat, || true).to(fish);
//! b.any(|| false).with_priority(-1).to(panic_room);
//!
//! let mut machine = b.build().expect("valid graph");
//! machine.enter_initial_state();
//! machine.step().expect("settles");
//! assert_eq!(machine.current_state().map(|s| s.name()), Some("Fish"));
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tickflow_types::TickflowError;
use tracing::debug;

use crate::state_machine::{Guard, MachineConfig, State, StateId, StateMachine, Transition};

/// Accumulates states and transitions, then validates them in
/// [`build`][Self::build].
#[derive(Default)]
pub struct StateMachineBuilder {
    states: Vec<State>,
    transitions: Vec<(StateId, Transition)>,
    global: Vec<Transition>,
    initial: Option<StateId>,
    config: MachineConfig,
}

impl StateMachineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a state and return its handle.
    pub fn state(&mut self, state: State) -> StateId {
        self.states.push(state);
        StateId(self.states.len() - 1)
    }

    /// Start a transition out of `from`, taken when `predicate` holds.
    pub fn on(
        &mut self,
        from: StateId,
        predicate: impl Fn() -> bool + Send + Sync + 'static,
    ) -> TransitionBuilder<'_> {
        TransitionBuilder {
            builder: self,
            from: Some(from),
            guard: Arc::new(predicate),
            priority: 0,
        }
    }

    /// Start a machine-wide transition, applied to every state except its
    /// target.
    pub fn any(
        &mut self,
        predicate: impl Fn() -> bool + Send + Sync + 'static,
    ) -> TransitionBuilder<'_> {
        TransitionBuilder {
            builder: self,
            from: None,
            guard: Arc::new(predicate),
            priority: 0,
        }
    }

    /// Mark the state [`StateMachine::enter_initial_state`] picks.  Defaults
    /// to the first declared state.
    pub fn initial_state(&mut self, id: StateId) -> &mut Self {
        self.initial = Some(id);
        self
    }

    pub fn with_config(&mut self, config: MachineConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Validate the graph and materialise every state's transition list.
    ///
    /// # Errors
    ///
    /// - [`TickflowError::EmptyMachine`] if no state was declared.
    /// - [`TickflowError::DuplicateState`] if two states share a name.
    /// - [`TickflowError::UnknownState`] if a handle does not belong to this
    ///   builder.
    /// - [`TickflowError::Config`] if `max_cascade` is zero.
    pub fn build(self) -> Result<StateMachine, TickflowError> {
        let Self {
            mut states,
            transitions,
            global,
            initial,
            config,
        } = self;

        if states.is_empty() {
            return Err(TickflowError::EmptyMachine);
        }
        if config.max_cascade == 0 {
            return Err(TickflowError::Config(
                "max_cascade must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::with_capacity(states.len());
        for state in &states {
            if !names.insert(state.name()) {
                return Err(TickflowError::DuplicateState(state.name().to_string()));
            }
        }

        let count = states.len();
        let check = |id: StateId| {
            if id.0 < count {
                Ok(id)
            } else {
                Err(TickflowError::UnknownState(format!("#{}", id.0)))
            }
        };

        if let Some(id) = initial {
            check(id)?;
        }

        for (from, transition) in transitions {
            check(from)?;
            check(transition.target)?;
            states[from.0].transitions.push(transition);
        }

        for transition in &global {
            check(transition.target)?;
            for (index, state) in states.iter_mut().enumerate() {
                // No self-loop onto the target itself.
                if index == transition.target.0 {
                    continue;
                }
                state.transitions.push(Transition {
                    guard: Arc::clone(&transition.guard),
                    target: transition.target,
                    priority: transition.priority,
                });
            }
        }

        // Stable: equal priorities keep declaration order.
        for state in &mut states {
            state.transitions.sort_by_key(|t| t.priority);
        }

        debug!(
            states = count,
            global = global.len(),
            max_cascade = config.max_cascade,
            "state machine built"
        );
        Ok(StateMachine::from_parts(states, initial, config))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TransitionBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// A transition awaiting its target.  Returned by
/// [`StateMachineBuilder::on`] and [`StateMachineBuilder::any`].
#[must_use = "a transition is only recorded once `to` is called"]
pub struct TransitionBuilder<'a> {
    builder: &'a mut StateMachineBuilder,
    /// `None` for machine-wide transitions.
    from: Option<StateId>,
    guard: Guard,
    priority: i32,
}

impl TransitionBuilder<'_> {
    /// Lower values are evaluated first.  Defaults to `0`.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Record the transition into `target`.
    pub fn to(self, target: StateId) {
        let transition = Transition {
            guard: self.guard,
            target,
            priority: self.priority,
        };
        match self.from {
            Some(from) => self.builder.transitions.push((from, transition)),
            None => self.builder.global.push(transition),
        }
    }
}

//! Hierarchical, priority-ordered state machine.
//!
//! A [`StateMachine`] owns an arena of [`State`]s and a current-state
//! pointer.  Each state may carry an action, a [`BehaviorTree`] and a nested
//! machine of its own.  Machines are assembled with
//! [`StateMachineBuilder`][crate::builder::StateMachineBuilder].
//!
//! # Step algorithm
//!
//! 1. **Settle** – scan the current state's transitions in ascending priority
//!    order (declaration order breaks ties) and fire the first one whose
//!    predicate holds: reset the outgoing state's tree, enter the target and
//!    rescan from there.  Stop once a full scan fires nothing.  A
//!    [`CascadeGuard`] aborts the step if the cascade exceeds
//!    [`MachineConfig::max_cascade`] hops.
//! 2. **Nested** – step the settled state's nested machine, if any.
//! 3. **Action** – invoke the settled state's action, if any.
//! 4. **Tree** – tick the settled state's behavior tree, if any.
//!
//! # Entry and listeners
//!
//! Entering a state first re-wires its nested machine's listener to this
//! machine's listener and enters the nested initial state, then notifies this
//! machine's listener.  Entry is depth-first, so the outermost listener
//! observes every nested entry before the outer state's own.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tickflow_types::{Status, TickflowError};
use tracing::{debug, debug_span, field, trace, warn};

use crate::behavior_tree::BehaviorTree;
use crate::cascade_guard::CascadeGuard;

/// Transition predicate.  Shared because machine-wide transitions are copied
/// onto every state.
pub type Guard = Arc<dyn Fn() -> bool + Send + Sync>;
/// Per-step state action.
pub type StateAction = Box<dyn Fn() + Send + Sync>;
/// Callback invoked on every state entry, including nested entries.
pub type StateChangeListener = Arc<dyn Fn(&State) + Send + Sync>;

/// Default upper bound on transitions fired within one step.
pub const DEFAULT_MAX_CASCADE: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tunables for a [`StateMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Maximum number of transitions one [`StateMachine::step`] may fire
    /// before it fails with [`TickflowError::CascadeLimitExceeded`].
    #[serde(default = "default_max_cascade")]
    pub max_cascade: usize,
}

fn default_max_cascade() -> usize {
    DEFAULT_MAX_CASCADE
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            max_cascade: default_max_cascade(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StateId / Transition
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a state inside the machine that declared it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub(crate) usize);

impl StateId {
    /// Position of the state in declaration order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A directed edge: when `guard` holds, move to `target`.
///
/// Lower `priority` values are evaluated first and win ties.
pub struct Transition {
    pub(crate) guard: Guard,
    pub(crate) target: StateId,
    pub(crate) priority: i32,
}

impl Transition {
    pub fn target(&self) -> StateId {
        self.target
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Evaluate the transition's predicate.
    pub fn is_satisfied(&self) -> bool {
        (self.guard)()
    }
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("target", &self.target)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// A named unit of work.
///
/// The name is the state's identity within its machine.  Outgoing transitions
/// are attached by the builder and never change afterwards.
pub struct State {
    name: String,
    action: Option<StateAction>,
    tree: Option<BehaviorTree>,
    nested: Option<StateMachine>,
    pub(crate) transitions: Vec<Transition>,
}

impl State {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: None,
            tree: None,
            nested: None,
            transitions: Vec::new(),
        }
    }

    /// Attach an action invoked once per step while this state is current.
    pub fn with_action(mut self, action: impl Fn() + Send + Sync + 'static) -> Self {
        self.action = Some(Box::new(action));
        self
    }

    /// Attach a behavior tree ticked once per step while this state is current.
    pub fn with_tree(mut self, tree: BehaviorTree) -> Self {
        self.tree = Some(tree);
        self
    }

    /// Attach a nested machine, entered whenever this state is entered.
    pub fn with_nested(mut self, machine: StateMachine) -> Self {
        self.nested = Some(machine);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }

    pub fn tree(&self) -> Option<&BehaviorTree> {
        self.tree.as_ref()
    }

    pub fn nested(&self) -> Option<&StateMachine> {
        self.nested.as_ref()
    }

    /// Outgoing transitions in evaluation order.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// First transition whose predicate holds, as `(target, priority)`.
    fn firing_transition(&self) -> Option<(StateId, i32)> {
        self.transitions
            .iter()
            .find(|t| t.is_satisfied())
            .map(|t| (t.target, t.priority))
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("has_action", &self.action.is_some())
            .field("tree", &self.tree)
            .field("nested", &self.nested)
            .field("transitions", &self.transitions)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StateMachine
// ─────────────────────────────────────────────────────────────────────────────

/// A hierarchical state machine.  See the [module docs](self) for the step
/// and entry algorithms.
pub struct StateMachine {
    states: Vec<State>,
    initial: Option<StateId>,
    current: Option<StateId>,
    listener: Option<StateChangeListener>,
    config: MachineConfig,
}

impl StateMachine {
    /// Assemble a machine from validated parts.  Transition targets must all
    /// index into `states`.
    pub(crate) fn from_parts(
        states: Vec<State>,
        initial: Option<StateId>,
        config: MachineConfig,
    ) -> Self {
        Self {
            states,
            initial,
            current: None,
            listener: None,
            config,
        }
    }

    /// All states in declaration order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id.0)
    }

    /// Resolve a state name to its handle.
    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.states
            .iter()
            .position(|s| s.name == name)
            .map(StateId)
    }

    pub fn config(&self) -> MachineConfig {
        self.config
    }

    /// The current state, or `None` while uninitialised.
    pub fn current_state(&self) -> Option<&State> {
        self.current.map(|id| &self.states[id.0])
    }

    pub fn current_state_id(&self) -> Option<StateId> {
        self.current
    }

    pub fn state_change_listener(&self) -> Option<&StateChangeListener> {
        self.listener.as_ref()
    }

    /// Install `listener` in this machine's listener slot.
    ///
    /// The nested machine of the current state (recursively) is re-wired to
    /// the same callback so nested entries keep reaching it.
    pub fn set_state_change_listener(
        &mut self,
        listener: impl Fn(&State) + Send + Sync + 'static,
    ) {
        self.install_listener(Some(Arc::new(listener)));
    }

    /// Install an already shared listener.
    pub fn set_shared_listener(&mut self, listener: StateChangeListener) {
        self.install_listener(Some(listener));
    }

    pub fn clear_state_change_listener(&mut self) {
        self.install_listener(None);
    }

    fn install_listener(&mut self, listener: Option<StateChangeListener>) {
        if let Some(id) = self.current
            && let Some(nested) = self.states[id.0].nested.as_mut()
        {
            nested.install_listener(listener.clone());
        }
        self.listener = listener;
    }

    /// Force the current state to `id` and enter it.
    ///
    /// # Errors
    ///
    /// Returns [`TickflowError::UnknownState`] if `id` does not belong to
    /// this machine.
    pub fn set_initial_state(&mut self, id: StateId) -> Result<(), TickflowError> {
        if id.0 >= self.states.len() {
            return Err(TickflowError::UnknownState(format!("#{}", id.0)));
        }
        self.current = Some(id);
        self.enter(id);
        Ok(())
    }

    /// Enter the initial state if no state is current yet.
    ///
    /// Picks the state marked with
    /// [`initial_state`][crate::builder::StateMachineBuilder::initial_state],
    /// or the first declared state.  No-op when a state is already current.
    pub fn enter_initial_state(&mut self) {
        if self.current.is_some() {
            return;
        }
        let Some(id) = self.initial.or_else(|| (!self.states.is_empty()).then_some(StateId(0)))
        else {
            return;
        };
        self.current = Some(id);
        self.enter(id);
    }

    /// Run one control cycle.
    ///
    /// Returns the status of the settled state's behavior tree, or `None`
    /// when the machine is uninitialised or the state owns no tree.
    ///
    /// # Errors
    ///
    /// Returns [`TickflowError::CascadeLimitExceeded`] when transition
    /// resolution fires more than `max_cascade` transitions without settling
    /// (the machine stays in the last state it entered), and propagates the
    /// same error from nested machines.
    pub fn step(&mut self) -> Result<Option<Status>, TickflowError> {
        let Some(mut current) = self.current else {
            return Ok(None);
        };

        let span = debug_span!(
            "step",
            from = %self.states[current.0].name,
            settled = field::Empty,
            hops = field::Empty
        );
        let _entered = span.enter();

        let mut guard = CascadeGuard::new(self.config.max_cascade);
        while let Some((target, priority)) = self.states[current.0].firing_transition() {
            if guard.record(&self.states[current.0].name, &self.states[target.0].name) {
                warn!(
                    limit = self.config.max_cascade,
                    path = %guard.path().join(" -> "),
                    "transition cascade did not settle"
                );
                return Err(guard.into_error());
            }

            debug!(
                from = %self.states[current.0].name,
                to = %self.states[target.0].name,
                priority,
                "transitioning"
            );
            // The outgoing state's tree is reset, never ticked one more time.
            if let Some(tree) = self.states[current.0].tree.as_mut() {
                tree.reset();
            }
            self.current = Some(target);
            self.enter(target);
            current = target;
        }
        span.record("settled", field::display(&self.states[current.0].name));
        span.record("hops", guard.hops());

        let state = &mut self.states[current.0];
        if let Some(nested) = state.nested.as_mut() {
            nested.step()?;
        }
        if let Some(action) = &state.action {
            action();
        }
        Ok(state.tree.as_mut().map(BehaviorTree::tick))
    }

    fn enter(&mut self, id: StateId) {
        let listener = self.listener.clone();
        let state = &mut self.states[id.0];
        trace!(state = %state.name, "entering state");

        if let Some(nested) = state.nested.as_mut() {
            // Reaches already-active grandchildren when the nested machine is
            // re-entered.
            nested.install_listener(listener.clone());
            nested.enter_initial_state();
        }
        if let Some(listener) = &listener {
            listener(&*state);
        }
    }

    /// Names of the current state and of every nested current state below
    /// it, outermost first.
    pub fn active_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut machine = Some(self);
        while let Some(m) = machine {
            let Some(state) = m.current_state() else {
                break;
            };
            path.push(state.name());
            machine = state.nested();
        }
        path
    }

    /// `true` if a state called `name` is current here or in any active
    /// nested machine.
    pub fn is_active(&self, name: &str) -> bool {
        self.active_path().contains(&name)
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("states", &self.states)
            .field("current", &self.current)
            .field("has_listener", &self.listener.is_some())
            .field("config", &self.config)
            .finish()
    }
}

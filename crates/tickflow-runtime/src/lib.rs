//! `tickflow-runtime` – behavior trees driven by hierarchical state machines.
//!
//! A pull-based, single-threaded control engine.  An external driver calls
//! [`StateMachine::step`] once per control cycle; the machine settles its
//! transitions, steps the nested machine of the settled state, runs that
//! state's action and ticks its [`BehaviorTree`].  Nothing here spawns work
//! or blocks: `Running` is a return value and resumption is simply the next
//! call.
//!
//! # Modules
//!
//! - [`behavior_tree`] – [`BehaviorNode`] and [`BehaviorTree`]: resumable
//!   Condition / Perform / Leaf / Sequence / Selector / Conditional /
//!   RepeatUntil nodes.
//! - [`state_machine`] – [`State`], [`Transition`] and [`StateMachine`]:
//!   priority-ordered, cascading transition resolution and depth-first entry
//!   of nested machines.
//! - [`builder`] – [`StateMachineBuilder`]: declares states, per-state and
//!   machine-wide ("any") transitions.
//! - [`cascade_guard`] – [`CascadeGuard`]: bounds the transitions one step may
//!   fire.
//! - [`history`] – [`StateHistory`]: a short breadcrumb trail of entered
//!   states, fed by a state-change listener.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console / JSON
//!   / OTLP tracing setup for drivers.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! use tickflow_runtime::{BehaviorNode, BehaviorTree, State, StateMachineBuilder};
//! use tickflow_types::Status;
//!
//! let hungry = Arc::new(AtomicBool::new(true));
//! let h = Arc::clone(&hungry);
//!
//! let mut b = StateMachineBuilder::new();
//! let eat = b.state(State::new("Eat").with_tree(BehaviorTree::new(
//!     BehaviorNode::perform(move || h.store(false, Ordering::SeqCst)),
//! )));
//! let work = b.state(State::new("Work"));
//! let flag = Arc::clone(&hungry);
//! b.on(eat, move || !flag.load(Ordering::SeqCst)).to(work);
//!
//! let mut machine = b.build().unwrap();
//! machine.enter_initial_state();
//!
//! assert_eq!(machine.step().unwrap(), Some(Status::Success));
//! machine.step().unwrap();
//! assert_eq!(machine.active_path(), vec!["Work"]);
//! ```

pub mod behavior_tree;
pub mod builder;
pub mod cascade_guard;
pub mod history;
pub mod state_machine;
pub mod telemetry;

pub use behavior_tree::{BehaviorNode, BehaviorTree};
pub use builder::{StateMachineBuilder, TransitionBuilder};
pub use cascade_guard::CascadeGuard;
pub use history::{StateHistory, history_listener};
pub use state_machine::{
    MachineConfig, State, StateChangeListener, StateId, StateMachine, Transition,
};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use tickflow_types::{Status, TickflowError};

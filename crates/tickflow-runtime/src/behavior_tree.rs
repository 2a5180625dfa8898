//! Behavior Tree Engine.
//!
//! A resumable behavior tree: every node remembers its last [`Status`] and
//! composites remember which child is in progress, so a `Running` result lets
//! the next tick pick up exactly where the previous one stopped instead of
//! restarting the hierarchy.
//!
//! # Nodes
//!
//! | Node            | Kind      | Description                                                        |
//! |-----------------|-----------|--------------------------------------------------------------------|
//! | `Condition`     | leaf      | `Success` if the predicate holds, else `Failure`.                  |
//! | `Perform`       | leaf      | Runs a side-effect closure, always `Success`.                      |
//! | `Leaf`          | leaf      | Runs a closure and reports whatever [`Status`] it returns.         |
//! | `Sequence`      | composite | Succeeds only if every child succeeds, in order.                   |
//! | `Selector`      | composite | Succeeds on the first child success; fails if all fail.            |
//! | `Conditional`   | decorator | Ticks its child only while a guard holds.                          |
//! | `RepeatUntil`   | decorator | Re-runs its child until a stop predicate holds.                    |
//!
//! `Kill` is never reinterpreted: every composite and decorator hands it to
//! its parent unchanged.
//!
//! # Example
//!
//! ```rust
//! use tickflow_runtime::behavior_tree::{BehaviorNode, BehaviorTree};
//! use tickflow_types::Status;
//!
//! let mut tree = BehaviorTree::new(BehaviorNode::sequence(vec![
//!     BehaviorNode::condition(|| true).with_label("ready?"),
//!     BehaviorNode::leaf(|| Status::Running).with_label("walk"),
//! ]));
//!
//! assert_eq!(tree.tick(), Status::Running);
//! assert_eq!(tree.root().resume_index(), Some(1));
//!
//! tree.reset();
//! assert_eq!(tree.root().resume_index(), Some(0));
//! ```

use tickflow_types::Status;
use tracing::{Span, field, instrument, trace, warn};

/// Predicate closure used by `Condition`, `Conditional` and `RepeatUntil`.
pub type Predicate = Box<dyn Fn() -> bool + Send + Sync>;
/// Side-effect closure used by `Perform`.
pub type Action = Box<dyn Fn() + Send + Sync>;
/// Status-returning closure used by `Leaf`.
pub type Task = Box<dyn Fn() -> Status + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// NodeKind
// ─────────────────────────────────────────────────────────────────────────────

enum NodeKind {
    Condition(Predicate),
    Perform(Action),
    Leaf(Task),
    Sequence {
        children: Vec<BehaviorNode>,
        index: usize,
    },
    Selector {
        children: Vec<BehaviorNode>,
        index: usize,
    },
    Conditional {
        guard: Predicate,
        child: Box<BehaviorNode>,
    },
    RepeatUntil {
        stop: Predicate,
        child: Box<BehaviorNode>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// BehaviorNode
// ─────────────────────────────────────────────────────────────────────────────

/// A node in a behavior tree.
///
/// Build trees with the associated constructors, then tick the root through a
/// [`BehaviorTree`].  Display tooling reads [`label`][Self::label],
/// [`status`][Self::status] and [`children`][Self::children].
pub struct BehaviorNode {
    label: Option<String>,
    status: Status,
    kind: NodeKind,
}

impl BehaviorNode {
    fn from_kind(kind: NodeKind) -> Self {
        Self {
            label: None,
            status: Status::Idle,
            kind,
        }
    }

    /// Construct a `Condition` leaf.
    pub fn condition(predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self::from_kind(NodeKind::Condition(Box::new(predicate)))
    }

    /// Construct a `Perform` leaf.
    ///
    /// `action` runs exactly once per tick and must return; the node is
    /// `Running` only while the action executes.
    pub fn perform(action: impl Fn() + Send + Sync + 'static) -> Self {
        Self::from_kind(NodeKind::Perform(Box::new(action)))
    }

    /// Construct a general `Leaf` whose status is whatever `task` returns.
    ///
    /// This is the leaf to use when an action needs several ticks
    /// (`Running`) or must abort the tree (`Kill`).
    pub fn leaf(task: impl Fn() -> Status + Send + Sync + 'static) -> Self {
        Self::from_kind(NodeKind::Leaf(Box::new(task)))
    }

    /// Construct a `Sequence` composite.
    pub fn sequence(children: Vec<BehaviorNode>) -> Self {
        Self::from_kind(NodeKind::Sequence { children, index: 0 })
    }

    /// Construct a `Selector` composite.
    pub fn selector(children: Vec<BehaviorNode>) -> Self {
        Self::from_kind(NodeKind::Selector { children, index: 0 })
    }

    /// Construct a `Conditional` decorator around `child`.
    pub fn conditional(
        guard: impl Fn() -> bool + Send + Sync + 'static,
        child: BehaviorNode,
    ) -> Self {
        Self::from_kind(NodeKind::Conditional {
            guard: Box::new(guard),
            child: Box::new(child),
        })
        .with_label("Conditional")
    }

    /// Construct a `RepeatUntil` decorator around `child`.
    pub fn repeat_until(
        stop: impl Fn() -> bool + Send + Sync + 'static,
        child: BehaviorNode,
    ) -> Self {
        Self::from_kind(NodeKind::RepeatUntil {
            stop: Box::new(stop),
            child: Box::new(child),
        })
        .with_label("RepeatUntil")
    }

    /// Attach a display label, replacing any previous one.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Display label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Status produced by the most recent tick (`Idle` after a reset).
    pub fn status(&self) -> Status {
        self.status
    }

    /// Child nodes in declared order.  Decorators expose their single child;
    /// leaves return an empty slice.
    pub fn children(&self) -> &[BehaviorNode] {
        match &self.kind {
            NodeKind::Sequence { children, .. } | NodeKind::Selector { children, .. } => {
                children.as_slice()
            }
            NodeKind::Conditional { child, .. } | NodeKind::RepeatUntil { child, .. } => {
                std::slice::from_ref(child.as_ref())
            }
            NodeKind::Condition(_) | NodeKind::Perform(_) | NodeKind::Leaf(_) => &[],
        }
    }

    /// Index of the child a composite will resume from.  `None` for leaves
    /// and decorators.
    pub fn resume_index(&self) -> Option<usize> {
        match &self.kind {
            NodeKind::Sequence { index, .. } | NodeKind::Selector { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Name of the node variant, e.g. `"Sequence"`.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Condition(_) => "Condition",
            NodeKind::Perform(_) => "Perform",
            NodeKind::Leaf(_) => "Leaf",
            NodeKind::Sequence { .. } => "Sequence",
            NodeKind::Selector { .. } => "Selector",
            NodeKind::Conditional { .. } => "Conditional",
            NodeKind::RepeatUntil { .. } => "RepeatUntil",
        }
    }

    /// `true` for nodes without children.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Condition(_) | NodeKind::Perform(_) | NodeKind::Leaf(_)
        )
    }

    /// Tick this node once and return the resulting [`Status`].
    pub fn tick(&mut self) -> Status {
        let status = match &mut self.kind {
            NodeKind::Condition(predicate) => {
                if predicate() {
                    Status::Success
                } else {
                    Status::Failure
                }
            }

            NodeKind::Perform(action) => {
                self.status = Status::Running;
                action();
                Status::Success
            }

            NodeKind::Leaf(task) => task(),

            NodeKind::Sequence { children, index } => {
                self.status = Status::Running;
                tick_sequence(children, index)
            }

            NodeKind::Selector { children, index } => {
                self.status = Status::Running;
                tick_selector(children, index)
            }

            NodeKind::Conditional { guard, child } => {
                if guard() {
                    child.tick()
                } else {
                    child.reset();
                    Status::Failure
                }
            }

            NodeKind::RepeatUntil { stop, child } => {
                if stop() {
                    child.reset();
                    Status::Success
                } else {
                    match child.tick() {
                        Status::Success | Status::Failure => {
                            child.reset();
                            Status::Running
                        }
                        Status::Kill => Status::Kill,
                        Status::Running | Status::Idle => Status::Running,
                    }
                }
            }
        };

        self.status = status;
        trace!(
            node = self.kind_name(),
            label = self.label.as_deref().unwrap_or(""),
            %status,
            "tick"
        );
        status
    }

    /// Return this node and every descendant to `Idle`, and every composite
    /// resumption index to `0`.
    pub fn reset(&mut self) {
        self.status = Status::Idle;
        match &mut self.kind {
            NodeKind::Sequence { children, index } | NodeKind::Selector { children, index } => {
                *index = 0;
                for child in children {
                    child.reset();
                }
            }
            NodeKind::Conditional { child, .. } | NodeKind::RepeatUntil { child, .. } => {
                child.reset();
            }
            NodeKind::Condition(_) | NodeKind::Perform(_) | NodeKind::Leaf(_) => {}
        }
    }
}

impl std::fmt::Debug for BehaviorNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorNode")
            .field("kind", &self.kind_name())
            .field("label", &self.label)
            .field("status", &self.status)
            .field("resume_index", &self.resume_index())
            .field("children", &self.children())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Composite helpers
// ─────────────────────────────────────────────────────────────────────────────

fn tick_sequence(children: &mut [BehaviorNode], index: &mut usize) -> Status {
    while *index < children.len() {
        match children[*index].tick() {
            Status::Success => *index += 1,
            // Resume this child on the next tick.
            Status::Running | Status::Idle => return Status::Running,
            status @ (Status::Failure | Status::Kill) => {
                reset_from(children, *index + 1);
                *index = 0;
                return status;
            }
        }
    }
    *index = 0;
    Status::Success
}

fn tick_selector(children: &mut [BehaviorNode], index: &mut usize) -> Status {
    while *index < children.len() {
        match children[*index].tick() {
            Status::Failure => *index += 1,
            Status::Running | Status::Idle => return Status::Running,
            status @ (Status::Success | Status::Kill) => {
                reset_from(children, *index + 1);
                *index = 0;
                return status;
            }
        }
    }
    *index = 0;
    Status::Failure
}

fn reset_from(children: &mut [BehaviorNode], from: usize) {
    for child in children.iter_mut().skip(from) {
        child.reset();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BehaviorTree
// ─────────────────────────────────────────────────────────────────────────────

/// Exclusive owner of a root [`BehaviorNode`] and, transitively, of every
/// node below it.
#[derive(Debug)]
pub struct BehaviorTree {
    root: BehaviorNode,
}

impl BehaviorTree {
    pub fn new(root: BehaviorNode) -> Self {
        Self { root }
    }

    /// Run one evaluation pass from the root.
    #[instrument(
        level = "debug",
        name = "tree_tick",
        skip_all,
        fields(
            root = self.root.label().unwrap_or(self.root.kind_name()),
            status = field::Empty
        )
    )]
    pub fn tick(&mut self) -> Status {
        let status = self.root.tick();
        Span::current().record("status", field::display(status));
        if status.is_kill() {
            warn!(
                root = self.root.label().unwrap_or(self.root.kind_name()),
                "behavior tree reported Kill"
            );
        }
        status
    }

    /// Cascade `Idle` and resumption-index reset through every node.
    pub fn reset(&mut self) {
        self.root.reset();
    }

    /// Read-only access to the root for display and debugging.
    pub fn root(&self) -> &BehaviorNode {
        &self.root
    }

    /// Status of the root after the most recent tick.
    pub fn status(&self) -> Status {
        self.root.status()
    }
}

impl From<BehaviorNode> for BehaviorTree {
    fn from(root: BehaviorNode) -> Self {
        Self::new(root)
    }
}

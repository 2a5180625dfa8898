//! End-to-end scenarios driven only through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tickflow_runtime::{BehaviorNode, BehaviorTree, State, StateMachine, StateMachineBuilder};
use tickflow_types::Status;

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&State) + Send + Sync + 'static) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    (log, move |s: &State| sink.lock().unwrap().push(s.name().to_string()))
}

fn current(machine: &StateMachine) -> Option<&str> {
    machine.current_state().map(State::name)
}

#[test]
fn sequence_of_true_conditions_succeeds_first_tick() {
    let mut tree = BehaviorTree::new(BehaviorNode::sequence(vec![
        BehaviorNode::condition(|| true),
        BehaviorNode::condition(|| true),
    ]));
    assert_eq!(tree.tick(), Status::Success);
    assert_eq!(tree.root().resume_index(), Some(0));
}

#[test]
fn repeat_until_holds_sequence_at_second_child() {
    let evaluations = Arc::new(AtomicUsize::new(0));
    let e = Arc::clone(&evaluations);
    let mut tree = BehaviorTree::new(BehaviorNode::sequence(vec![
        BehaviorNode::condition(|| true),
        BehaviorNode::repeat_until(
            move || e.fetch_add(1, Ordering::SeqCst) >= 3,
            BehaviorNode::perform(|| {}),
        ),
    ]));

    for tick in 1..=3 {
        assert_eq!(tree.tick(), Status::Running, "tick {tick}");
        assert_eq!(tree.root().resume_index(), Some(1), "tick {tick}");
    }
    assert_eq!(tree.tick(), Status::Success);
    assert_eq!(tree.root().resume_index(), Some(0));
}

#[test]
fn selector_success_then_reset_idles_children() {
    let mut tree = BehaviorTree::new(BehaviorNode::selector(vec![
        BehaviorNode::condition(|| false),
        BehaviorNode::condition(|| true),
    ]));
    assert_eq!(tree.tick(), Status::Success);

    tree.reset();
    assert!(
        tree.root()
            .children()
            .iter()
            .all(|child| child.status() == Status::Idle)
    );
}

#[test]
fn lower_priority_transition_wins() {
    let mut b = StateMachineBuilder::new();
    let a = b.state(State::new("A"));
    let target_b = b.state(State::new("B"));
    let c = b.state(State::new("C"));
    b.on(a, || true).with_priority(0).to(target_b);
    b.on(a, || true).with_priority(1).to(c);
    let mut machine = b.build().unwrap();
    machine.set_initial_state(a).unwrap();

    machine.step().unwrap();
    assert_eq!(current(&machine), Some("B"));
}

#[test]
fn any_transition_reaches_error_state_without_self_loop() {
    let build = || {
        let mut b = StateMachineBuilder::new();
        let a = b.state(State::new("A"));
        let other = b.state(State::new("B"));
        let error = b.state(State::new("ErrorState"));
        b.any(|| true).to(error);
        (b.build().unwrap(), a, other, error)
    };

    let (mut machine, a, _, _) = build();
    machine.set_initial_state(a).unwrap();
    machine.step().unwrap();
    assert_eq!(current(&machine), Some("ErrorState"));

    let (mut machine, _, other, _) = build();
    machine.set_initial_state(other).unwrap();
    machine.step().unwrap();
    assert_eq!(current(&machine), Some("ErrorState"));

    let (mut machine, _, _, error) = build();
    let (log, listener) = recorder();
    machine.set_state_change_listener(listener);
    machine.set_initial_state(error).unwrap();
    machine.step().unwrap();
    assert_eq!(current(&machine), Some("ErrorState"));
    // Only the forced entry; no self-loop re-entry.
    assert_eq!(*log.lock().unwrap(), vec!["ErrorState"]);
}

#[test]
fn nested_initial_state_entry_reaches_both_listeners() {
    let mut inner = StateMachineBuilder::new();
    inner.state(State::new("X1"));
    let inner = inner.build().unwrap();

    let mut outer = StateMachineBuilder::new();
    let x = outer.state(State::new("X").with_nested(inner));
    let mut machine = outer.build().unwrap();
    let (log, listener) = recorder();
    machine.set_state_change_listener(listener);
    machine.set_initial_state(x).unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["X1", "X"]);
    let nested = machine.current_state().and_then(State::nested).unwrap();
    assert_eq!(current(nested), Some("X1"));
    assert!(nested.state_change_listener().is_some());
    assert_eq!(machine.active_path(), vec!["X", "X1"]);
}

#[test]
fn cascade_runs_only_final_state_tree() {
    let ticks = Arc::new(Mutex::new(Vec::new()));
    let tree_for = |name: &'static str| {
        let ticks = Arc::clone(&ticks);
        BehaviorTree::new(BehaviorNode::perform(move || ticks.lock().unwrap().push(name)))
    };

    let mut b = StateMachineBuilder::new();
    let a = b.state(State::new("A").with_tree(tree_for("A")));
    let mid = b.state(State::new("B").with_tree(tree_for("B")));
    let c = b.state(State::new("C").with_tree(tree_for("C")));
    b.on(a, || true).to(mid);
    b.on(mid, || true).to(c);
    let mut machine = b.build().unwrap();
    machine.set_initial_state(a).unwrap();
    let (log, listener) = recorder();
    machine.set_state_change_listener(listener);

    assert_eq!(machine.step().unwrap(), Some(Status::Success));
    assert_eq!(*log.lock().unwrap(), vec!["B", "C"]);
    assert_eq!(*ticks.lock().unwrap(), vec!["C"]);
}

//! Demo worker – a self-contained machine over a simulated world.
//!
//! ```text
//! Gather ──(bag full)──▶ Process ──(empty, tired)──▶ Rest ──(rested)──▶ Gather
//!   │  └─ nested: Search ⇄ Collect                └──(empty)──────────▶ Gather
//!   └──(energy 0)──▶ Exhausted (tree emits Kill)
//! any ──(goal reached)──▶ Done
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tickflow_runtime::{
    BehaviorNode, BehaviorTree, MachineConfig, State, StateMachine, StateMachineBuilder,
};
use tickflow_types::{Status, TickflowError};
use tracing::info;

pub const BAG_CAPACITY: u32 = 3;
pub const GOODS_GOAL: u32 = 9;
pub const MAX_ENERGY: u32 = 20;
pub const REST_THRESHOLD: u32 = 8;
const REST_GAIN: u32 = 3;

/// Shared counters the demo's predicates and actions read and write.
#[derive(Debug)]
pub struct World {
    found: AtomicBool,
    scans: AtomicU32,
    raw: AtomicU32,
    goods: AtomicU32,
    energy: AtomicU32,
}

impl World {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            found: AtomicBool::new(false),
            scans: AtomicU32::new(0),
            raw: AtomicU32::new(0),
            goods: AtomicU32::new(0),
            energy: AtomicU32::new(MAX_ENERGY),
        })
    }

    pub fn raw(&self) -> u32 {
        self.raw.load(Ordering::SeqCst)
    }

    pub fn goods(&self) -> u32 {
        self.goods.load(Ordering::SeqCst)
    }

    pub fn energy(&self) -> u32 {
        self.energy.load(Ordering::SeqCst)
    }

    fn found(&self) -> bool {
        self.found.load(Ordering::SeqCst)
    }

    /// Every second scan turns something up.
    fn scan(&self) -> Status {
        let scans = self.scans.fetch_add(1, Ordering::SeqCst) + 1;
        if scans % 2 == 0 {
            self.found.store(true, Ordering::SeqCst);
            Status::Success
        } else {
            Status::Running
        }
    }

    fn pick_up(&self) {
        self.raw.fetch_add(1, Ordering::SeqCst);
        self.found.store(false, Ordering::SeqCst);
    }

    fn process_one(&self) {
        let taken = self
            .raw
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| r.checked_sub(1))
            .is_ok();
        if taken {
            self.goods.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn spend_energy(&self) {
        // Saturating: the closure never returns `None`.
        let _ = self
            .energy
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |e| Some(e.saturating_sub(1)));
    }

    fn rest(&self) -> Status {
        let next = (self.energy() + REST_GAIN).min(MAX_ENERGY);
        self.energy.store(next, Ordering::SeqCst);
        if next >= MAX_ENERGY {
            Status::Success
        } else {
            Status::Running
        }
    }

    pub fn snapshot(&self) -> String {
        format!(
            "raw={} goods={} energy={}",
            self.raw(),
            self.goods(),
            self.energy()
        )
    }
}

/// Build the worker machine over `world`.
pub fn build_worker(
    world: &Arc<World>,
    config: MachineConfig,
) -> Result<StateMachine, TickflowError> {
    let mut b = StateMachineBuilder::new();
    b.with_config(config);

    let w = Arc::clone(world);
    let gather = b.state(
        State::new("Gather")
            .with_nested(build_gather(world, config)?)
            .with_action(move || w.spend_energy()),
    );
    let process = b.state(State::new("Process").with_tree(process_tree(world)));
    let rest = b.state(State::new("Rest").with_tree(rest_tree(world)));
    let done = b.state(State::new("Done").with_action(|| info!("goal reached")));
    let exhausted = b.state(State::new("Exhausted").with_tree(BehaviorTree::new(
        BehaviorNode::leaf(|| Status::Kill).with_label("collapse"),
    )));

    let w = Arc::clone(world);
    b.on(gather, move || w.energy() == 0)
        .with_priority(-1)
        .to(exhausted);
    let w = Arc::clone(world);
    b.on(gather, move || w.raw() >= BAG_CAPACITY).to(process);

    let w = Arc::clone(world);
    b.on(process, move || w.raw() == 0 && w.energy() < REST_THRESHOLD)
        .to(rest);
    let w = Arc::clone(world);
    b.on(process, move || w.raw() == 0).with_priority(1).to(gather);

    let w = Arc::clone(world);
    b.on(rest, move || w.energy() >= MAX_ENERGY).to(gather);

    let w = Arc::clone(world);
    b.any(move || w.goods() >= GOODS_GOAL)
        .with_priority(-2)
        .to(done);

    b.build()
}

fn build_gather(world: &Arc<World>, config: MachineConfig) -> Result<StateMachine, TickflowError> {
    let mut b = StateMachineBuilder::new();
    b.with_config(config);

    let w = Arc::clone(world);
    let search = b.state(State::new("Search").with_tree(BehaviorTree::new(
        BehaviorNode::leaf(move || w.scan()).with_label("scan"),
    )));

    let (w1, w2) = (Arc::clone(world), Arc::clone(world));
    let collect = b.state(State::new("Collect").with_tree(BehaviorTree::new(
        BehaviorNode::sequence(vec![
            BehaviorNode::condition(move || w1.found()).with_label("found?"),
            BehaviorNode::perform(move || w2.pick_up()).with_label("pick up"),
        ])
        .with_label("collect"),
    )));

    let w = Arc::clone(world);
    b.on(search, move || w.found()).to(collect);
    let w = Arc::clone(world);
    b.on(collect, move || !w.found()).to(search);

    b.build()
}

fn process_tree(world: &Arc<World>) -> BehaviorTree {
    let (w1, w2) = (Arc::clone(world), Arc::clone(world));
    BehaviorTree::new(
        BehaviorNode::repeat_until(
            move || w1.raw() == 0,
            BehaviorNode::perform(move || w2.process_one()).with_label("process one"),
        )
        .with_label("process all"),
    )
}

fn rest_tree(world: &Arc<World>) -> BehaviorTree {
    let w = Arc::clone(world);
    BehaviorTree::new(BehaviorNode::leaf(move || w.rest()).with_label("recover"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_until_done(machine: &mut StateMachine, limit: usize) -> usize {
        for step in 1..=limit {
            machine.step().expect("settles");
            if machine.is_active("Done") {
                return step;
            }
        }
        panic!("worker did not finish within {limit} steps");
    }

    #[test]
    fn worker_starts_in_gather_search() {
        let world = World::new();
        let mut machine = build_worker(&world, MachineConfig::default()).unwrap();
        machine.enter_initial_state();
        assert_eq!(machine.active_path(), vec!["Gather", "Search"]);
    }

    #[test]
    fn worker_fills_bag_then_processes() {
        let world = World::new();
        let mut machine = build_worker(&world, MachineConfig::default()).unwrap();
        machine.enter_initial_state();

        // Three steps per item: two scans and a pick-up.
        for _ in 0..(3 * BAG_CAPACITY) {
            machine.step().unwrap();
        }
        assert_eq!(world.raw(), BAG_CAPACITY);

        assert_eq!(machine.step().unwrap(), Some(Status::Running));
        assert!(machine.is_active("Process"));
        assert_eq!(world.goods(), 1);
    }

    #[test]
    fn worker_rests_and_reaches_goal() {
        let world = World::new();
        let mut machine = build_worker(&world, MachineConfig::default()).unwrap();
        let visited = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&visited);
        machine.set_state_change_listener(move |s| sink.lock().unwrap().push(s.name().to_string()));
        machine.enter_initial_state();

        let steps = run_until_done(&mut machine, 100);
        assert!(steps <= 60, "took {steps} steps");
        assert!(world.goods() >= GOODS_GOAL);
        assert!(visited.lock().unwrap().iter().any(|s| s == "Rest"));
    }

    #[test]
    fn exhausted_worker_reports_kill() {
        let world = World::new();
        let mut machine = build_worker(&world, MachineConfig::default()).unwrap();
        machine.enter_initial_state();
        world.energy.store(0, Ordering::SeqCst);

        assert_eq!(machine.step().unwrap(), Some(Status::Kill));
        assert_eq!(machine.active_path(), vec!["Exhausted"]);
    }
}

//! Span coverage: what an OTLP exporter receives while a machine runs.

use std::fmt;
use std::sync::{Arc, Mutex};

use tickflow_runtime::{BehaviorNode, BehaviorTree, State, StateMachineBuilder};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Records span names and every `settled` value.
#[derive(Clone, Default)]
struct Capture {
    spans: Arc<Mutex<Vec<String>>>,
    settled: Arc<Mutex<Vec<String>>>,
}

struct SettledVisitor<'a>(&'a Mutex<Vec<String>>);

impl Visit for SettledVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "settled" {
            self.0.lock().unwrap().push(format!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for Capture {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        self.spans.lock().unwrap().push(attrs.metadata().name().to_string());
    }

    fn on_record(&self, _id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
        values.record(&mut SettledVisitor(&self.settled));
    }
}

#[test]
fn step_and_tree_tick_open_spans() {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());

    let mut inner = StateMachineBuilder::new();
    let tree = BehaviorTree::new(BehaviorNode::condition(|| true));
    inner.state(State::new("Inner").with_tree(tree));
    let inner = inner.build().unwrap();

    let mut outer = StateMachineBuilder::new();
    let start = outer.state(State::new("Start"));
    let work = outer.state(State::new("Work").with_nested(inner));
    outer.on(start, || true).to(work);
    let mut machine = outer.build().unwrap();
    machine.enter_initial_state();

    tracing::subscriber::with_default(subscriber, || {
        machine.step().unwrap();
    });

    let spans = capture.spans.lock().unwrap();
    assert_eq!(*spans, vec!["step", "step", "tree_tick"]);
    let settled = capture.settled.lock().unwrap();
    assert_eq!(*settled, vec!["Work", "Inner"]);
}

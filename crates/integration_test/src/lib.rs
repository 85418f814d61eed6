//! Shared fixtures for fathom integration tests.
//!
//! The operators here are the minimal inhabitants of the node protocol the
//! scenario tests need: constants, unary and binary arithmetic over
//! upstream nodes, deterministic failures and switchable ones.

#![allow(missing_docs)]
#![allow(clippy::must_use_candidate)]

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use fathom::{ComputeResult, ErrorKind, ErrorState, Graph, Node};

/// A node that always yields `value`.
pub fn constant(name: &str, value: f64) -> Arc<Node<f64>> {
    Node::constant(name, value)
}

/// A node yielding twice its upstream's value.
pub fn doubler(name: &str, upstream: &Arc<Node<f64>>) -> Arc<Node<f64>> {
    let upstream = upstream.clone();
    Node::new(name, move |level| {
        match ComputeResult::from(upstream.compute(level).get()) {
            ComputeResult::Value(value) => ComputeResult::Value(value * 2.0),
            error => error,
        }
    })
}

/// A node yielding the sum of two upstream values.
pub fn adder(
    name: &str,
    left: &Arc<Node<f64>>,
    right: &Arc<Node<f64>>,
) -> Arc<Node<f64>> {
    let left = left.clone();
    let right = right.clone();

    Node::new(name, move |level| {
        let left = match ComputeResult::from(left.compute(level).get()) {
            ComputeResult::Value(value) => value,
            error => return error,
        };
        let right = match ComputeResult::from(right.compute(level).get()) {
            ComputeResult::Value(value) => value,
            error => return error,
        };

        ComputeResult::Value(left + right)
    })
}

/// A node that always fails with the given error kind.
///
/// The error is produced sourceless; the node adopts itself as the source.
pub fn failing(name: &str, kind: ErrorKind) -> Arc<Node<f64>> {
    let message = format!("simulated {kind} in {name}");
    Node::new(name, move |_| {
        ComputeResult::Error(ErrorState::new(kind, message.clone()))
    })
}

/// A node that fails while its flag is raised and succeeds afterwards.
pub struct Flaky {
    pub node: Arc<Node<f64>>,
    pub fail: Arc<AtomicBool>,
}

pub fn flaky(name: &str, value: f64) -> Flaky {
    let fail = Arc::new(AtomicBool::new(true));
    let flag = fail.clone();
    let message = format!("simulated failure in {name}");

    let node = Node::new(name, move |_| {
        if flag.load(Ordering::SeqCst) {
            ComputeResult::Error(ErrorState::computation(message.clone()))
        } else {
            ComputeResult::Value(value)
        }
    });

    Flaky { node, fail }
}

/// A constant node that counts its operator invocations.
pub fn counting(
    name: &str,
    value: f64,
) -> (Arc<Node<f64>>, Arc<AtomicUsize>) {
    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = invocations.clone();

    let node = Node::new(name, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        ComputeResult::Value(value)
    });

    (node, invocations)
}

/// Member names, sorted for stable assertions.
pub fn sorted_names(graph: &Graph<f64>) -> Vec<String> {
    let mut names: Vec<_> = graph
        .get_nodes()
        .iter()
        .map(|node| node.name().to_owned())
        .collect();
    names.sort();
    names
}

/// Builds the diamond `source -> {left, right} -> sink` used by several
/// scenarios and returns `(graph, sink)`.
pub fn diamond(source: Arc<Node<f64>>) -> (Graph<f64>, Arc<Node<f64>>) {
    let graph = Graph::new();

    let left = doubler("left", &source);
    let right = doubler("right", &source);
    let sink = adder("sink", &left, &right);

    for node in [&source, &left, &right, &sink] {
        graph.add_node(node.clone());
    }
    graph.connect(&source, &left).unwrap();
    graph.connect(&source, &right).unwrap();
    graph.connect(&left, &sink).unwrap();
    graph.connect(&right, &sink).unwrap();

    (graph, sink)
}

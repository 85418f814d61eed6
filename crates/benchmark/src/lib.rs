//! Shared builders for the fathom benchmarks.

#![allow(missing_docs)]

use std::sync::Arc;

use fathom::{ComputeResult, Graph, Node, WorkerPool};

/// A node whose workload scales with the requested precision level.
#[must_use]
pub fn workload_node(name: &str, size: u64) -> Arc<Node<f64>> {
    Node::new(name, move |level| {
        let iterations = size << level;
        let mut accumulator = 0.0;

        for i in 0..iterations {
            let t = i as f64 / iterations as f64;
            accumulator += (t * std::f64::consts::PI).sin()
                * (t * std::f64::consts::PI).cos();
        }

        ComputeResult::Value(accumulator)
    })
}

/// A linear chain of workload nodes sharing one worker pool.
#[must_use]
pub fn chain_graph(
    length: usize,
    work: u64,
    pool: &Arc<WorkerPool>,
) -> Graph<f64> {
    let graph = Graph::new();
    graph.set_thread_pool(pool.clone());

    let mut previous: Option<Arc<Node<f64>>> = None;
    for i in 0..length {
        let node = workload_node(&format!("node-{i}"), work);
        graph.add_node(node.clone());
        if let Some(ref prev) = previous {
            graph.connect(prev, &node).unwrap();
        }
        previous = Some(node);
    }

    graph
}

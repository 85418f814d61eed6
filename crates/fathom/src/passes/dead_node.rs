//! Dead-node elimination.

use std::sync::Arc;

use fxhash::FxHashSet;
use tracing::debug;

use crate::{element::Element, graph::Graph, passes::OptimizationPass};

/// Removes every node that cannot reach an output node.
///
/// Reachability is computed in the reversed-edge view starting from the
/// graph's output nodes (members with no outgoing edges); whatever is not
/// marked feeds nothing observable and is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeadNodeElimination;

impl<T: Element> OptimizationPass<T> for DeadNodeElimination {
    fn name(&self) -> &str { "dead-node-elimination" }

    fn optimize(&mut self, graph: &Graph<T>) {
        let mut reachable: FxHashSet<Arc<str>> = FxHashSet::default();
        let mut stack = graph.get_output_nodes();

        while let Some(node) = stack.pop() {
            if !reachable.insert(node.name_arc()) {
                continue;
            }
            for edge in graph.get_incoming_edges(&node) {
                stack.push(edge.from().clone());
            }
        }

        let mut removed = 0usize;
        for node in graph.get_nodes() {
            if !reachable.contains(node.name()) {
                graph.remove_node(&node);
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "eliminated dead nodes");
        }
    }
}

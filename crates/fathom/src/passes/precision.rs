//! Backward precision-demand propagation.

use std::collections::VecDeque;

use fxhash::FxHashMap;
use tracing::debug;

use crate::{
    element::Element,
    graph::Graph,
    node::Node,
    passes::OptimizationPass,
    store::PrecisionLevel,
};

/// Propagates precision demands from output nodes back to their
/// dependencies.
///
/// Output nodes demand their current levels. Walking edges backwards, a
/// dependency's requirement is its dependent's requirement adjusted by
/// one step against an error-history proxy: a dependency with a recorded
/// error is demanded one level finer, a clean one is relaxed one level
/// coarser. The maximum requirement per node wins, and final levels are
/// clamped into each node's precision window.
#[derive(Debug)]
pub struct PrecisionPropagation {
    error_threshold: f64,
}

impl Default for PrecisionPropagation {
    fn default() -> Self { Self::new(1e-3) }
}

impl PrecisionPropagation {
    /// Creates a pass comparing the error-history proxy against
    /// `error_threshold`.
    #[must_use]
    pub fn new(error_threshold: f64) -> Self { Self { error_threshold } }

    fn required_level<T: Element>(
        &self,
        graph: &Graph<T>,
        dependency: &Node<T>,
        demanded: PrecisionLevel,
    ) -> PrecisionLevel {
        // recorded errors stand in for an error-rate history
        let history = if graph.node_error(dependency.name()).is_some() {
            1.0
        } else {
            0.0
        };

        if history > self.error_threshold {
            demanded
                .saturating_add(1)
                .min(dependency.max_precision_level())
        } else if history < self.error_threshold / 2.0 {
            demanded
                .saturating_sub(1)
                .max(dependency.min_precision_level())
        } else {
            demanded
        }
    }
}

impl<T: Element> OptimizationPass<T> for PrecisionPropagation {
    fn name(&self) -> &str { "precision-propagation" }

    fn optimize(&mut self, graph: &Graph<T>) {
        let mut demands: FxHashMap<std::sync::Arc<str>, PrecisionLevel> =
            FxHashMap::default();
        let mut queue = VecDeque::new();

        for output in graph.get_output_nodes() {
            demands
                .insert(output.name_arc(), output.current_precision_level());
            queue.push_back(output);
        }

        while let Some(node) = queue.pop_front() {
            let demanded = demands[node.name()];

            for edge in graph.get_incoming_edges(&node) {
                let dependency = edge.from();
                let required =
                    self.required_level(graph, dependency, demanded);

                let superseded = demands
                    .get(dependency.name())
                    .is_none_or(|&existing| required > existing);

                if superseded {
                    demands.insert(dependency.name_arc(), required);
                    queue.push_back(dependency.clone());
                }
            }
        }

        debug!(nodes = demands.len(), "applying propagated precision demands");

        for (name, level) in demands {
            if let Some(node) = graph.node(&name) {
                node.adjust_precision(level);
            }
        }
    }
}

//! Memory- and activity-driven precision compression.

use std::sync::Arc;

use fxhash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::{
    element::Element,
    graph::Graph,
    node::Node,
    passes::OptimizationPass,
    store::PrecisionLevel,
};

/// Assumed memory budget per node, in bytes.
const NODE_MEMORY_BUDGET: u64 = 1 << 20;

/// Trades precision for memory on cold nodes and spends freed headroom on
/// hot ones.
///
/// Per-node memory is estimated as `2^current_level * size_of::<T>()`
/// against a fixed per-node budget; activity is each node's compute count
/// normalized by the graph's maximum. When usage crosses the memory
/// threshold (or on the first invocation), nodes whose activity falls
/// below `activity_threshold * average` step down one level and merge
/// their stores, and at least one node is compressed every time. If headroom
/// remains, nodes at twice the average activity with more than one
/// dependent step up a level while the delta fits. Finally, parallel
/// sibling paths sharing a downstream endpoint are evened out to the
/// clamped mean of their levels.
#[derive(Debug)]
pub struct CompressionPass {
    memory_threshold: f64,
    activity_threshold: f64,
    compressed_once: bool,
}

impl Default for CompressionPass {
    fn default() -> Self { Self::new(0.8, 0.2) }
}

impl CompressionPass {
    /// Creates a pass triggering at `memory_threshold` usage and treating
    /// nodes below `activity_threshold * average` activity as cold.
    #[must_use]
    pub fn new(memory_threshold: f64, activity_threshold: f64) -> Self {
        Self { memory_threshold, activity_threshold, compressed_once: false }
    }
}

impl<T: Element> OptimizationPass<T> for CompressionPass {
    fn name(&self) -> &str { "compression" }

    fn optimize(&mut self, graph: &Graph<T>) {
        let nodes = graph.get_nodes();
        if nodes.len() < 2 {
            return;
        }

        let used: u64 =
            nodes.iter().map(|node| node_memory::<T>(node)).sum();
        let total = nodes.len() as u64 * NODE_MEMORY_BUDGET;
        let usage_ratio = used as f64 / total as f64;

        let counts: Vec<u64> =
            nodes.iter().map(|node| node.compute_count()).collect();
        let max_count = counts.iter().copied().max().unwrap_or(0).max(1);
        let rates: Vec<f64> =
            counts.iter().map(|c| *c as f64 / max_count as f64).collect();
        let average = rates.iter().sum::<f64>() / rates.len() as f64;

        if usage_ratio > self.memory_threshold || !self.compressed_once {
            self.compress_cold_nodes(&nodes, &rates, average);
            self.compressed_once = true;
        }

        if usage_ratio < self.memory_threshold {
            expand_hot_nodes(
                graph,
                &nodes,
                &rates,
                average,
                total.saturating_sub(used),
            );
        }

        balance_parallel_paths(graph);
    }
}

impl CompressionPass {
    fn compress_cold_nodes<T: Element>(
        &self,
        nodes: &[Arc<Node<T>>],
        rates: &[f64],
        average: f64,
    ) {
        let mut compressed = 0usize;

        for (node, rate) in nodes.iter().zip(rates) {
            if *rate < self.activity_threshold * average && step_down(node) {
                compressed += 1;
            }
        }

        // at least one node gets compressed per invocation
        if compressed == 0 {
            let mut by_rate: Vec<_> = nodes.iter().zip(rates).collect();
            by_rate.sort_by(|a, b| a.1.total_cmp(b.1));

            let stepped = by_rate.iter().any(|&(node, _)| step_down(node));
            if !stepped {
                if let Some((node, _)) = by_rate.first() {
                    node.merge_updates();
                }
            }
            compressed = 1;
        }

        debug!(compressed, "compressed cold nodes");
    }
}

fn step_down<T: Element>(node: &Arc<Node<T>>) -> bool {
    let current = node.current_precision_level();
    if current <= node.min_precision_level() {
        return false;
    }

    node.adjust_precision(current - 1);
    node.merge_updates();
    true
}

fn expand_hot_nodes<T: Element>(
    graph: &Graph<T>,
    nodes: &[Arc<Node<T>>],
    rates: &[f64],
    average: f64,
    mut available: u64,
) {
    let mut hot: Vec<_> = nodes
        .iter()
        .zip(rates)
        .filter(|(node, rate)| {
            **rate > average * 2.0
                && graph.get_outgoing_edges(node).len() > 1
        })
        .collect();
    hot.sort_by(|a, b| b.1.total_cmp(a.1));

    for (node, _) in hot {
        let current = node.current_precision_level();
        if current >= node.max_precision_level() {
            continue;
        }

        let delta = memory_at::<T>(current + 1) - memory_at::<T>(current);
        if delta <= available {
            node.adjust_precision(current + 1);
            available -= delta;
        }
    }
}

/// Sets each group of sibling paths that reconverge on the same endpoint
/// to the clamped mean of their current levels.
fn balance_parallel_paths<T: Element>(graph: &Graph<T>) {
    for node in graph.get_nodes() {
        let outgoing = graph.get_outgoing_edges(&node);
        if outgoing.len() < 2 {
            continue;
        }

        let mut groups: FxHashMap<Arc<str>, Vec<Arc<Node<T>>>> =
            FxHashMap::default();
        for edge in &outgoing {
            for endpoint in path_endpoints(graph, edge.to()) {
                groups
                    .entry(endpoint.name_arc())
                    .or_default()
                    .push(edge.to().clone());
            }
        }

        for members in groups.values() {
            balance_group(members);
        }
    }
}

fn path_endpoints<T: Element>(
    graph: &Graph<T>,
    start: &Arc<Node<T>>,
) -> Vec<Arc<Node<T>>> {
    let mut visited: FxHashSet<Arc<str>> = FxHashSet::default();
    let mut endpoints = Vec::new();
    let mut stack = vec![start.clone()];

    while let Some(node) = stack.pop() {
        if !visited.insert(node.name_arc()) {
            continue;
        }

        let outgoing = graph.get_outgoing_edges(&node);
        if outgoing.is_empty() {
            endpoints.push(node);
        } else {
            stack.extend(outgoing.iter().map(|edge| edge.to().clone()));
        }
    }

    endpoints
}

fn balance_group<T: Element>(members: &[Arc<Node<T>>]) {
    if members.is_empty() {
        return;
    }

    let total: u32 = members
        .iter()
        .map(|node| u32::from(node.current_precision_level()))
        .sum();
    let floor = members
        .iter()
        .map(|node| node.min_precision_level())
        .max()
        .expect("group is non-empty");
    let ceiling = members
        .iter()
        .map(|node| node.max_precision_level())
        .min()
        .expect("group is non-empty");

    if floor > ceiling {
        return;
    }

    let mean = (total / members.len() as u32) as PrecisionLevel;
    let target = mean.clamp(floor, ceiling);

    for node in members {
        node.adjust_precision(target);
    }
}

fn memory_at<T>(level: PrecisionLevel) -> u64 {
    (1u64 << level) * std::mem::size_of::<T>() as u64
}

fn node_memory<T: Element>(node: &Arc<Node<T>>) -> u64 {
    memory_at::<T>(node.current_precision_level())
}

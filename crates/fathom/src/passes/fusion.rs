//! Linear-chain fusion.

use std::sync::Arc;

use fxhash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::{
    element::Element,
    graph::Graph,
    node::{Node, Operator},
    passes::OptimizationPass,
    result::ComputeResult,
    store::PrecisionLevel,
};

/// Replaces maximal linear chains with single fused nodes.
///
/// A chain `n1 -> n2 -> ... -> nk` qualifies when every link's upstream
/// has exactly one outgoing edge and its downstream exactly one incoming
/// edge. For `k >= 2` the chain becomes one node whose operator invokes
/// the original nodes in order and yields the last value; the head's
/// inputs and the tail's outputs are reconnected to the fused node and the
/// originals leave the graph. The fused precision window is the
/// intersection of the component windows; chains with an empty
/// intersection are left alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeFusion;

struct DegreeInfo {
    incoming: usize,
    outgoing: usize,
    successor: Option<Arc<str>>,
    predecessor: Option<Arc<str>>,
}

struct FusedChain<T: Element> {
    chain: Vec<Arc<Node<T>>>,
}

impl<T: Element> Operator<T> for FusedChain<T> {
    fn evaluate(&self, level: PrecisionLevel) -> ComputeResult<T> {
        let mut last = None;

        for node in &self.chain {
            match ComputeResult::from(node.compute(level).get()) {
                ComputeResult::Value(value) => last = Some(value),
                error @ ComputeResult::Error(_) => return error,
            }
        }

        ComputeResult::Value(last.expect("fused chains are non-empty"))
    }
}

impl<T: Element> OptimizationPass<T> for NodeFusion {
    fn name(&self) -> &str { "node-fusion" }

    fn optimize(&mut self, graph: &Graph<T>) {
        for chain in find_chains(graph) {
            fuse(graph, &chain);
        }
    }
}

fn degrees<T: Element>(
    graph: &Graph<T>,
) -> FxHashMap<Arc<str>, DegreeInfo> {
    graph
        .get_nodes()
        .into_iter()
        .map(|node| {
            let incoming = graph.get_incoming_edges(&node);
            let outgoing = graph.get_outgoing_edges(&node);

            let info = DegreeInfo {
                incoming: incoming.len(),
                outgoing: outgoing.len(),
                successor: (outgoing.len() == 1)
                    .then(|| outgoing[0].to().name_arc()),
                predecessor: (incoming.len() == 1)
                    .then(|| incoming[0].from().name_arc()),
            };

            (node.name_arc(), info)
        })
        .collect()
}

/// True if the edge `from -> to` may sit inside one fused chain.
fn linkable(
    info: &FxHashMap<Arc<str>, DegreeInfo>,
    from: &str,
    to: &str,
) -> bool {
    info.get(from).is_some_and(|f| f.outgoing == 1)
        && info.get(to).is_some_and(|t| t.incoming == 1)
}

fn find_chains<T: Element>(graph: &Graph<T>) -> Vec<Vec<Arc<Node<T>>>> {
    let info = degrees(graph);
    let mut claimed: FxHashSet<Arc<str>> = FxHashSet::default();
    let mut chains = Vec::new();

    for node in graph.get_nodes() {
        let name = node.name_arc();
        if claimed.contains(&name) {
            continue;
        }

        // a chain starts where it cannot be extended backwards
        let continues_backward = info[&name]
            .predecessor
            .as_ref()
            .is_some_and(|pred| linkable(&info, pred, &name));
        if continues_backward {
            continue;
        }

        let mut chain = vec![node];
        let mut current = name;

        while let Some(next) = info[&current].successor.clone() {
            if !linkable(&info, &current, &next) || claimed.contains(&next) {
                break;
            }
            let Some(next_node) = graph.node(&next) else { break };
            chain.push(next_node);
            current = next;
        }

        if chain.len() >= 2 {
            for member in &chain {
                claimed.insert(member.name_arc());
            }
            chains.push(chain);
        }
    }

    chains
}

fn fuse<T: Element>(graph: &Graph<T>, chain: &[Arc<Node<T>>]) {
    let min_level = chain
        .iter()
        .map(|node| node.min_precision_level())
        .max()
        .expect("chains are non-empty");
    let max_level = chain
        .iter()
        .map(|node| node.max_precision_level())
        .min()
        .expect("chains are non-empty");

    if min_level > max_level {
        debug!("skipping fusion of a chain with an empty precision window");
        return;
    }

    let depth = chain
        .iter()
        .map(|node| node.store().max_depth())
        .min()
        .expect("chains are non-empty");
    let threshold = chain[0].store().compression_threshold();

    let fused_name = chain
        .iter()
        .map(|node| node.name())
        .collect::<Vec<_>>()
        .join("+");

    let fused = Node::with_store(
        fused_name.as_str(),
        FusedChain { chain: chain.to_vec() },
        depth,
        threshold,
    );
    let _ = fused.set_precision_range(min_level, max_level);

    let head = chain.first().expect("chains are non-empty");
    let tail = chain.last().expect("chains are non-empty");

    graph.add_node(fused.clone());

    for edge in graph.get_incoming_edges(head) {
        let _ = graph.connect(edge.from(), &fused);
    }
    for edge in graph.get_outgoing_edges(tail) {
        let _ = graph.connect(&fused, edge.to());
    }

    for node in chain {
        graph.remove_node(node);
    }

    debug!(fused = %fused_name, components = chain.len(), "fused chain");
}

//! The computation graph: membership, edges, error table and execution.

mod executor;

use std::sync::Arc;

use dashmap::DashMap;
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::{
    cache::{CachePolicy, GraphCache},
    element::Element,
    error::ErrorState,
    node::Node,
    passes::OptimizationPass,
    pool::WorkerPool,
    result::ComputeResult,
};

/// A directed edge between two member nodes.
///
/// Edges carry no payload; values flow through the executor's scheduling.
/// Immutable after construction.
#[derive(Debug)]
pub struct Edge<T: Element> {
    from: Arc<Node<T>>,
    to: Arc<Node<T>>,
}

impl<T: Element> Clone for Edge<T> {
    fn clone(&self) -> Self {
        Self { from: self.from.clone(), to: self.to.clone() }
    }
}

impl<T: Element> Edge<T> {
    /// Creates an edge from `from` to `to`.
    pub fn new(from: Arc<Node<T>>, to: Arc<Node<T>>) -> Self {
        Self { from, to }
    }

    /// The upstream endpoint.
    #[must_use]
    pub fn from(&self) -> &Arc<Node<T>> { &self.from }

    /// The downstream endpoint.
    #[must_use]
    pub fn to(&self) -> &Arc<Node<T>> { &self.to }
}

pub(crate) struct Topology<T: Element> {
    nodes: FxHashMap<Arc<str>, Arc<Node<T>>>,
    outgoing: FxHashMap<Arc<str>, Vec<Arc<str>>>,
    incoming: FxHashMap<Arc<str>, Vec<Arc<str>>>,
}

impl<T: Element> Topology<T> {
    fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            outgoing: FxHashMap::default(),
            incoming: FxHashMap::default(),
        }
    }

    pub(crate) fn node(&self, name: &str) -> Option<&Arc<Node<T>>> {
        self.nodes.get(name)
    }

    pub(crate) fn node_names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.nodes.keys()
    }

    pub(crate) fn successors(&self, name: &str) -> &[Arc<str>] {
        self.outgoing.get(name).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn predecessors(&self, name: &str) -> &[Arc<str>] {
        self.incoming.get(name).map_or(&[], Vec::as_slice)
    }

    fn has_edge(&self, from: &str, to: &str) -> bool {
        self.successors(from).iter().any(|s| s.as_ref() == to)
    }

    /// DFS along outgoing edges; true if `goal` is reachable from `start`.
    fn reaches(&self, start: &str, goal: &str) -> bool {
        let mut visited = FxHashSet::default();
        let mut stack = vec![start];

        while let Some(current) = stack.pop() {
            if current == goal {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(
                self.successors(current).iter().map(|s| s.as_ref()),
            );
        }

        false
    }
}

pub(crate) struct GraphCore<T: Element> {
    topology: RwLock<Topology<T>>,
    errors: DashMap<Arc<str>, ErrorState>,
    cache: GraphCache<T>,
    pool: RwLock<Option<Arc<WorkerPool>>>,
    passes: Mutex<Vec<Box<dyn OptimizationPass<T>>>>,
}

impl<T: Element> GraphCore<T> {
    pub(crate) fn lookup_error(&self, name: &str) -> Option<ErrorState> {
        self.errors.get(name).map(|entry| entry.value().clone())
    }

    /// Records the first error to land on `name` during a run.
    pub(crate) fn record_error(&self, name: &Arc<str>, error: ErrorState) {
        self.errors.entry(name.clone()).or_insert(error);
    }

    /// Records an error under its source node if that node is a member,
    /// else under `fallback` if that is; otherwise drops it, keeping the
    /// error table restricted to member names.
    pub(crate) fn record_member_error(
        &self,
        fallback: &Arc<str>,
        error: &ErrorState,
    ) {
        let key = {
            let topology = self.topology.read();
            error
                .source_node()
                .and_then(|source| {
                    topology.nodes.get_key_value(source).map(|(k, _)| k.clone())
                })
                .or_else(|| {
                    topology
                        .nodes
                        .get_key_value(fallback.as_ref())
                        .map(|(k, _)| k.clone())
                })
        };

        if let Some(key) = key {
            self.errors.entry(key).or_insert_with(|| error.clone());
        }
    }

    pub(crate) fn cache(&self) -> &GraphCache<T> { &self.cache }
}

/// A directed acyclic computation graph over one element type.
///
/// The graph owns its node and edge sets (keyed by node name), the value
/// cache, a worker pool, an ordered list of optimization passes and a
/// per-run error table. Handles are cheap to clone; all clones share the
/// same graph.
///
/// # Invariants
///
/// - The edge relation is acyclic; inserts that would close a cycle are
///   rejected atomically with a `Validation` error.
/// - Every edge endpoint is a member node.
/// - Removing a node removes its incident edges and error-table entry.
/// - The error table only holds names of current members.
pub struct Graph<T: Element> {
    core: Arc<GraphCore<T>>,
}

impl<T: Element> Clone for Graph<T> {
    fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

impl<T: Element> Default for Graph<T> {
    fn default() -> Self { Self::new() }
}

impl<T: Element> Graph<T> {
    /// Creates an empty graph with an unbounded cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: Arc::new(GraphCore {
                topology: RwLock::new(Topology::new()),
                errors: DashMap::new(),
                cache: GraphCache::default(),
                pool: RwLock::new(None),
                passes: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Creates an empty graph whose cache is governed by `policy`.
    #[must_use]
    pub fn with_cache_policy(policy: Box<dyn CachePolicy<T>>) -> Self {
        let graph = Self::new();
        graph.core.cache.set_policy(Some(policy));
        graph
    }

    /// Adds a node, wiring its graph back-reference and registering the
    /// internal callback that feeds compute errors into the error table.
    ///
    /// Adding a node under an already-present name replaces the previous
    /// node while keeping the name's edges.
    pub fn add_node(&self, node: Arc<Node<T>>) {
        let name = node.name_arc();

        {
            let mut topology = self.core.topology.write();
            if let Some(previous) =
                topology.nodes.insert(name.clone(), node.clone())
            {
                if !Arc::ptr_eq(&previous, &node) {
                    previous.detach_graph();
                }
            }
            topology.outgoing.entry(name.clone()).or_default();
            topology.incoming.entry(name.clone()).or_default();
        }

        node.attach_graph(Arc::downgrade(&self.core));

        let weak = Arc::downgrade(&self.core);
        let callback_name = name;
        node.add_completion_callback(move |result| {
            if let ComputeResult::Error(error) = result {
                if let Some(core) = weak.upgrade() {
                    core.record_member_error(&callback_name, error);
                }
            }
        });
    }

    /// Removes a node (by name), its incident edges and its error-table
    /// entry, and clears its graph back-reference.
    pub fn remove_node(&self, node: &Node<T>) {
        let name = node.name();

        let removed = {
            let mut topology = self.core.topology.write();
            let Some(removed) = topology.nodes.remove(name) else { return };

            let successors =
                topology.outgoing.remove(name).unwrap_or_default();
            for successor in successors {
                if let Some(list) =
                    topology.incoming.get_mut(successor.as_ref())
                {
                    list.retain(|n| n.as_ref() != name);
                }
            }

            let predecessors =
                topology.incoming.remove(name).unwrap_or_default();
            for predecessor in predecessors {
                if let Some(list) =
                    topology.outgoing.get_mut(predecessor.as_ref())
                {
                    list.retain(|n| n.as_ref() != name);
                }
            }

            removed
        };

        removed.detach_graph();
        self.core.errors.remove(name);
    }

    /// Inserts a directed edge.
    ///
    /// # Errors
    ///
    /// `Validation` if either endpoint is not a member, or if the edge
    /// would close a cycle; a rejected insert leaves the graph unchanged.
    /// Re-inserting an existing edge is a no-op.
    pub fn add_edge(&self, edge: &Edge<T>) -> Result<(), ErrorState> {
        let from = edge.from().name_arc();
        let to = edge.to().name_arc();

        let mut topology = self.core.topology.write();

        if !topology.nodes.contains_key(from.as_ref())
            || !topology.nodes.contains_key(to.as_ref())
        {
            return Err(ErrorState::validation(
                "both edge endpoints must be members of the graph",
            ));
        }

        if topology.has_edge(&from, &to) {
            return Ok(());
        }

        if topology.reaches(&to, &from) {
            return Err(ErrorState::validation(format!(
                "edge {from} -> {to} would create a cycle",
            )));
        }

        topology
            .outgoing
            .get_mut(from.as_ref())
            .expect("members have adjacency entries")
            .push(to.clone());
        topology
            .incoming
            .get_mut(to.as_ref())
            .expect("members have adjacency entries")
            .push(from);

        Ok(())
    }

    /// Inserts an edge from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Graph::add_edge`].
    pub fn connect(
        &self,
        from: &Arc<Node<T>>,
        to: &Arc<Node<T>>,
    ) -> Result<(), ErrorState> {
        self.add_edge(&Edge::new(from.clone(), to.clone()))
    }

    /// All member nodes, in no particular order.
    #[must_use]
    pub fn get_nodes(&self) -> Vec<Arc<Node<T>>> {
        self.core.topology.read().nodes.values().cloned().collect()
    }

    /// Looks a member up by name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<Arc<Node<T>>> {
        self.core.topology.read().node(name).cloned()
    }

    /// The edges pointing at `node`.
    #[must_use]
    pub fn get_incoming_edges(&self, node: &Node<T>) -> Vec<Edge<T>> {
        let topology = self.core.topology.read();
        let Some(to) = topology.node(node.name()).cloned() else {
            return Vec::new();
        };

        topology
            .predecessors(node.name())
            .iter()
            .filter_map(|name| topology.node(name).cloned())
            .map(|from| Edge::new(from, to.clone()))
            .collect()
    }

    /// The edges leaving `node`.
    #[must_use]
    pub fn get_outgoing_edges(&self, node: &Node<T>) -> Vec<Edge<T>> {
        let topology = self.core.topology.read();
        let Some(from) = topology.node(node.name()).cloned() else {
            return Vec::new();
        };

        topology
            .successors(node.name())
            .iter()
            .filter_map(|name| topology.node(name).cloned())
            .map(|to| Edge::new(from.clone(), to))
            .collect()
    }

    /// The graph's result sinks: members with no outgoing edges.
    #[must_use]
    pub fn get_output_nodes(&self) -> Vec<Arc<Node<T>>> {
        let topology = self.core.topology.read();
        topology
            .nodes
            .iter()
            .filter(|(name, _)| topology.successors(name).is_empty())
            .map(|(_, node)| node.clone())
            .collect()
    }

    /// Number of member nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.core.topology.read().nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.core.topology.read().outgoing.values().map(Vec::len).sum()
    }

    /// True if the graph has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.node_count() == 0 }

    /// Replaces the cache's eviction policy, resetting its contents.
    pub fn set_cache_policy(&self, policy: Box<dyn CachePolicy<T>>) {
        self.core.cache.set_policy(Some(policy));
    }

    /// The graph's value cache.
    #[must_use]
    pub fn cache(&self) -> &GraphCache<T> { self.core.cache() }

    /// The graph's worker pool, creating a default-width one on first
    /// use.
    #[must_use]
    pub fn thread_pool(&self) -> Arc<WorkerPool> {
        if let Some(pool) = self.core.pool.read().as_ref() {
            return pool.clone();
        }

        let mut slot = self.core.pool.write();
        slot.get_or_insert_with(|| Arc::new(WorkerPool::new())).clone()
    }

    /// Replaces the worker pool the executor dispatches onto.
    pub fn set_thread_pool(&self, pool: Arc<WorkerPool>) {
        *self.core.pool.write() = Some(pool);
    }

    /// Appends an optimization pass; passes run in registration order.
    pub fn add_optimization_pass(
        &self,
        pass: Box<dyn OptimizationPass<T>>,
    ) {
        self.core.passes.lock().push(pass);
    }

    /// Runs the registered optimization passes in order.
    ///
    /// Passes must not call back into `optimize`.
    pub fn optimize(&self) {
        let mut passes = self.core.passes.lock();
        for pass in passes.iter_mut() {
            debug!(pass = pass.name(), "running optimization pass");
            pass.optimize(self);
        }
    }

    /// The first error recorded for `name` during the current or most
    /// recent execution.
    #[must_use]
    pub fn node_error(&self, name: &str) -> Option<ErrorState> {
        self.core.lookup_error(name)
    }

    /// Removes every node, edge, error and cached value.
    pub fn clear(&self) {
        let mut topology = self.core.topology.write();
        for node in topology.nodes.values() {
            node.detach_graph();
        }
        topology.nodes.clear();
        topology.outgoing.clear();
        topology.incoming.clear();
        drop(topology);

        self.core.errors.clear();
        self.core.cache.clear();
    }

    pub(crate) fn core(&self) -> &Arc<GraphCore<T>> { &self.core }
}

impl<T: Element> std::fmt::Debug for Graph<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test;

//! Parallel, dependency-respecting graph execution.
//!
//! `execute` snapshots the topology into a plan and drives it with a
//! counter protocol: every node carries the number of predecessors still
//! outstanding, a finishing node decrements its successors' counters, and
//! a counter reaching zero dispatches that node onto the worker pool.
//! Workers never block on other nodes, so any pool width makes progress.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crossbeam_utils::CachePadded;
use fxhash::FxHashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{
    element::Element,
    error::ErrorState,
    graph::{Graph, GraphCore},
    node::Node,
    pool::WorkerPool,
    result::ComputeResult,
    store::PrecisionLevel,
    task::{Completer, Task},
};

struct PlanEntry<T: Element> {
    node: Arc<Node<T>>,
    name: Arc<str>,
    level: PrecisionLevel,
    predecessors: Vec<Arc<str>>,
    successors: Vec<usize>,
}

struct ExecContext<T: Element> {
    core: Arc<GraphCore<T>>,
    pool: Arc<WorkerPool>,
    plan: Vec<PlanEntry<T>>,
    pending: Vec<CachePadded<AtomicUsize>>,
    remaining: AtomicUsize,
    completer: Mutex<Option<Completer<()>>>,
}

impl<T: Element> Graph<T> {
    /// Executes the graph: optimization passes, then every node in
    /// dependency order, in parallel across independent branches.
    ///
    /// The returned task resolves as void once every node has completed
    /// and errors have been propagated along outgoing edges to a fixed
    /// point; per-node failures are surfaced through
    /// [`Graph::node_error`] and completion callbacks, never through the
    /// task itself. The error table is cleared at the start of each run.
    pub fn execute(&self) -> Task<()> {
        self.optimize();
        self.core().errors.clear();

        let plan = self.build_plan();
        if plan.is_empty() {
            return Task::ready(());
        }

        let pending: Vec<_> = plan
            .iter()
            .map(|entry| CachePadded::new(AtomicUsize::new(entry.predecessors.len())))
            .collect();

        let (task, completer) = Task::pending();
        let context = Arc::new(ExecContext {
            core: self.core().clone(),
            pool: self.thread_pool(),
            remaining: AtomicUsize::new(plan.len()),
            plan,
            pending,
            completer: Mutex::new(Some(completer)),
        });

        debug!(nodes = context.plan.len(), "executing graph");

        let roots: Vec<_> = context
            .plan
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.predecessors.is_empty())
            .map(|(index, _)| index)
            .collect();

        for index in roots {
            dispatch(&context, index);
        }

        task
    }

    fn build_plan(&self) -> Vec<PlanEntry<T>> {
        let topology = self.core().topology.read();

        let names: Vec<Arc<str>> = topology.node_names().cloned().collect();
        let index_of: FxHashMap<Arc<str>, usize> = names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), index))
            .collect();

        names
            .iter()
            .map(|name| {
                let node = topology
                    .node(name)
                    .expect("planned names are members")
                    .clone();

                PlanEntry {
                    level: node.current_precision_level(),
                    name: name.clone(),
                    predecessors: topology.predecessors(name).to_vec(),
                    successors: topology
                        .successors(name)
                        .iter()
                        .map(|successor| index_of[successor])
                        .collect(),
                    node,
                }
            })
            .collect()
    }
}

fn dispatch<T: Element>(context: &Arc<ExecContext<T>>, index: usize) {
    let job_context = context.clone();
    let submitted =
        context.pool.submit(move || run_node(&job_context, index));

    if let Err(error) = submitted {
        let entry = &context.plan[index];
        context.core.record_error(&entry.name, error);
        complete_node(context, index);
    }
}

fn run_node<T: Element>(context: &Arc<ExecContext<T>>, index: usize) {
    let entry = &context.plan[index];

    if let Some(error) = upstream_error(&context.core, entry) {
        trace!(node = %entry.name, "poisoned by upstream error");
        context.core.record_error(&entry.name, error);
    } else {
        let result =
            ComputeResult::from(entry.node.compute(entry.level).get());

        match result {
            ComputeResult::Value(value) => {
                let cache = context.core.cache();
                if cache.get(&value).is_none() {
                    cache.store(value);
                }
            }
            ComputeResult::Error(error) => {
                trace!(node = %entry.name, %error, "node failed");
                context.core.record_member_error(&entry.name, &error);
            }
        }
    }

    complete_node(context, index);
}

fn complete_node<T: Element>(context: &Arc<ExecContext<T>>, index: usize) {
    for &successor in &context.plan[index].successors {
        if context.pending[successor].fetch_sub(1, Ordering::AcqRel) == 1 {
            dispatch(context, successor);
        }
    }

    if context.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
        finish(context);
    }
}

fn finish<T: Element>(context: &Arc<ExecContext<T>>) {
    propagate_errors(context);

    if let Some(completer) = context.completer.lock().take() {
        completer.complete(());
    }
}

/// Spreads recorded errors along outgoing edges until a full pass over
/// the plan changes nothing.
fn propagate_errors<T: Element>(context: &Arc<ExecContext<T>>) {
    loop {
        let mut changed = false;

        for entry in &context.plan {
            if context.core.lookup_error(&entry.name).is_some() {
                continue;
            }

            if let Some(error) = upstream_error(&context.core, entry) {
                context.core.record_error(&entry.name, error);
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }
}

/// Synthesizes the error a node inherits from its predecessors: the first
/// erroring predecessor's error, extended with every other erroring
/// predecessor's name and finally this node's own, so a diamond sink
/// records both branches.
fn upstream_error<T: Element>(
    core: &GraphCore<T>,
    entry: &PlanEntry<T>,
) -> Option<ErrorState> {
    let mut merged: Option<ErrorState> = None;

    for predecessor in &entry.predecessors {
        let Some(error) = core.lookup_error(predecessor) else { continue };

        match merged {
            Some(ref mut accumulated) => {
                if !accumulated.mentions(predecessor) {
                    accumulated.push_propagation(predecessor.as_ref());
                }
            }
            None => {
                let mut error = error;
                if !error.mentions(predecessor) {
                    error.push_propagation(predecessor.as_ref());
                }
                merged = Some(error);
            }
        }
    }

    merged.map(|mut error| {
        error.push_propagation(entry.name.as_ref());
        error
    })
}

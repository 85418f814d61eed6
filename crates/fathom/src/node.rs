//! Computation nodes and the operator seam user code implements.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Weak},
};

use parking_lot::{Mutex, RwLock};

use crate::{
    cache::NodeCache,
    element::Element,
    error::ErrorState,
    graph::GraphCore,
    result::ComputeResult,
    store::{FractalStore, PrecisionLevel},
    task::Task,
};

/// Computations per node between automatic merges of its store.
const MERGE_INTERVAL: u64 = 10;

/// The computation a node performs on a store miss.
///
/// Implementations may hold whatever state they need (constants, captured
/// upstream nodes, model weights) and are invoked with the requested
/// precision level. An operator must not call `compute` on its own node.
///
/// Any `Fn(PrecisionLevel) -> ComputeResult<T> + Send + Sync + 'static`
/// closure is an operator.
pub trait Operator<T: Element>: Send + Sync + 'static {
    /// Produces the node's value at the requested precision level.
    fn evaluate(&self, level: PrecisionLevel) -> ComputeResult<T>;
}

impl<T, F> Operator<T> for F
where
    T: Element,
    F: Fn(PrecisionLevel) -> ComputeResult<T> + Send + Sync + 'static,
{
    fn evaluate(&self, level: PrecisionLevel) -> ComputeResult<T> {
        self(level)
    }
}

/// A completion callback, invoked with each computed outcome.
pub type CompletionCallback<T> = Box<dyn Fn(&ComputeResult<T>) + Send>;

struct NodeState<T> {
    current_level: PrecisionLevel,
    min_level: PrecisionLevel,
    max_level: PrecisionLevel,
    callbacks: Vec<CompletionCallback<T>>,
    compute_count: u64,
}

/// A named vertex of a computation graph.
///
/// A node owns its [`FractalStore`], its operator, a precision window
/// `[min, max]` within the store's depth, an ordered list of completion
/// callbacks and a cache-of-one holding the most recent outcome. Nodes are
/// shared via `Arc`; the enclosing graph is referenced weakly and only for
/// the node's membership interval.
///
/// # Compute semantics
///
/// [`Node::compute`] resolves eagerly on the calling thread and returns an
/// already-fulfilled [`Task`]; parallelism comes from the graph executor
/// dispatching nodes onto its worker pool. Per call, under the node mutex:
///
/// 1. an error recorded for this node in the parent graph's error table is
///    replayed as-is;
/// 2. a level above the window's maximum yields a `Precision` error;
/// 3. the store is consulted at the requested level, and a hit resolves
///    without touching the operator;
/// 4. on a miss the operator runs; panics become `Computation` errors,
///    sourceless errors adopt this node as their source, foreign errors
///    get this node appended to their propagation path, and values are
///    stored at the level;
/// 5. completion callbacks observe every computed outcome, value or
///    error, in insertion order; every tenth computation merges the store.
pub struct Node<T: Element> {
    name: Arc<str>,
    operator: Box<dyn Operator<T>>,
    store: FractalStore<T>,
    state: Mutex<NodeState<T>>,
    graph: RwLock<Weak<GraphCore<T>>>,
    last: NodeCache<ComputeResult<T>>,
}

impl<T: Element> Node<T> {
    /// Creates a node with the default store depth and compression
    /// threshold.
    pub fn new(
        name: impl Into<Arc<str>>,
        operator: impl Operator<T>,
    ) -> Arc<Self> {
        Self::with_store(
            name,
            operator,
            FractalStore::<T>::DEFAULT_MAX_DEPTH,
            FractalStore::<T>::DEFAULT_COMPRESSION_THRESHOLD,
        )
    }

    /// Creates a node with an explicit store depth (capped at 63) and
    /// compression threshold.
    ///
    /// The precision window starts as `[0, max_depth]` with the current
    /// level at 0.
    pub fn with_store(
        name: impl Into<Arc<str>>,
        operator: impl Operator<T>,
        max_depth: PrecisionLevel,
        compression_threshold: f64,
    ) -> Arc<Self> {
        let store = FractalStore::new(max_depth, compression_threshold);
        let max_level = store.max_depth();

        Arc::new(Self {
            name: name.into(),
            operator: Box::new(operator),
            store,
            state: Mutex::new(NodeState {
                current_level: 0,
                min_level: 0,
                max_level,
                callbacks: Vec::new(),
                compute_count: 0,
            }),
            graph: RwLock::new(Weak::new()),
            last: NodeCache::default(),
        })
    }

    /// Creates a node that always produces `value`.
    pub fn constant(name: impl Into<Arc<str>>, value: T) -> Arc<Self> {
        Self::new(name, move |_| ComputeResult::Value(value.clone()))
    }

    /// The node's name.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    pub(crate) fn name_arc(&self) -> Arc<str> { self.name.clone() }

    /// The level the node last computed at (or was adjusted to).
    #[must_use]
    pub fn current_precision_level(&self) -> PrecisionLevel {
        self.state.lock().current_level
    }

    /// The lower bound of the precision window.
    #[must_use]
    pub fn min_precision_level(&self) -> PrecisionLevel {
        self.state.lock().min_level
    }

    /// The upper bound of the precision window.
    #[must_use]
    pub fn max_precision_level(&self) -> PrecisionLevel {
        self.state.lock().max_level
    }

    /// Narrows or widens the precision window.
    ///
    /// # Errors
    ///
    /// `Validation` if `max_level` exceeds the store's depth or
    /// `min_level > max_level`.
    pub fn set_precision_range(
        &self,
        min_level: PrecisionLevel,
        max_level: PrecisionLevel,
    ) -> Result<(), ErrorState> {
        if max_level > self.store.max_depth() {
            return Err(ErrorState::validation(
                "maximum precision level exceeds storage depth",
            ));
        }
        if min_level > max_level {
            return Err(ErrorState::validation(
                "minimum precision level cannot exceed the maximum",
            ));
        }

        let mut state = self.state.lock();
        state.min_level = min_level;
        state.max_level = max_level;
        Ok(())
    }

    /// Moves the current level to `target`, clamped silently into the
    /// precision window.
    pub fn adjust_precision(&self, target: PrecisionLevel) {
        let mut state = self.state.lock();
        state.current_level = target.clamp(state.min_level, state.max_level);
    }

    /// Merges the store's pending writes and compresses it.
    pub fn merge_updates(&self) { self.store.merge_all(); }

    /// Registers a completion callback, appended after any existing ones.
    ///
    /// Callbacks run briefly, under the node mutex, and must not reenter
    /// `compute`.
    pub fn add_completion_callback(
        &self,
        callback: impl Fn(&ComputeResult<T>) + Send + 'static,
    ) {
        self.state.lock().callbacks.push(Box::new(callback));
    }

    /// Computes the node's value at `level`.
    ///
    /// Resolves eagerly; the returned task is already fulfilled. See the
    /// type-level documentation for the per-call state machine.
    pub fn compute(&self, level: PrecisionLevel) -> Task<ComputeResult<T>> {
        let mut state = self.state.lock();
        let result = self.compute_locked(&mut state, level);
        drop(state);

        self.last.store(result.clone());
        Task::ready(result)
    }

    fn compute_locked(
        &self,
        state: &mut NodeState<T>,
        level: PrecisionLevel,
    ) -> ComputeResult<T> {
        if let Some(graph) = self.graph.read().upgrade() {
            if let Some(error) = graph.lookup_error(&self.name) {
                return ComputeResult::Error(error);
            }
        }

        if level > state.max_level {
            let error = ErrorState::precision(format!(
                "requested precision level {level} exceeds the supported maximum {}",
                state.max_level,
            ))
            .with_source(self.name.as_ref());

            let result = ComputeResult::Error(error);
            fire_callbacks(state, &result);
            return result;
        }

        state.current_level = level;

        if let Some(value) = self.store.get(level) {
            return ComputeResult::Value(value);
        }

        let outcome =
            catch_unwind(AssertUnwindSafe(|| self.operator.evaluate(level)));

        match outcome {
            Ok(ComputeResult::Value(value)) => {
                self.store.store(value.clone(), level);

                let result = ComputeResult::Value(value);
                fire_callbacks(state, &result);

                state.compute_count += 1;
                if state.compute_count % MERGE_INTERVAL == 0 {
                    self.store.merge_all();
                }

                result
            }
            Ok(ComputeResult::Error(mut error)) => {
                if error.source_node().is_none() {
                    error.set_source(self.name.as_ref());
                } else if error.source_node() != Some(self.name.as_ref()) {
                    error.push_propagation(self.name.as_ref());
                }

                let result = ComputeResult::Error(error);
                fire_callbacks(state, &result);
                result
            }
            Err(payload) => {
                let result = ComputeResult::Error(
                    ErrorState::from_panic(payload.as_ref())
                        .with_source(self.name.as_ref()),
                );
                fire_callbacks(state, &result);
                result
            }
        }
    }

    /// Reads the store at `level` without computing.
    #[must_use]
    pub fn value_at(&self, level: PrecisionLevel) -> Option<T> {
        self.store.get(level)
    }

    /// The node's value store.
    #[must_use]
    pub fn store(&self) -> &FractalStore<T> { &self.store }

    /// How many times the operator has produced a value.
    #[must_use]
    pub fn compute_count(&self) -> u64 { self.state.lock().compute_count }

    /// The most recent compute outcome, if any.
    #[must_use]
    pub fn last_result(&self) -> Option<ComputeResult<T>> { self.last.get() }

    pub(crate) fn attach_graph(&self, graph: Weak<GraphCore<T>>) {
        *self.graph.write() = graph;
    }

    pub(crate) fn detach_graph(&self) {
        *self.graph.write() = Weak::new();
    }
}

impl<T: Element> std::fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("current_level", &state.current_level)
            .field("window", &(state.min_level, state.max_level))
            .field("compute_count", &state.compute_count)
            .finish_non_exhaustive()
    }
}

fn fire_callbacks<T: Element>(
    state: &NodeState<T>,
    result: &ComputeResult<T>,
) {
    for callback in &state.callbacks {
        callback(result);
    }
}

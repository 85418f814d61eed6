//! # Fathom - precision-aware DAG computation engine
//!
//! Fathom executes directed acyclic graphs of computation nodes whose
//! results are expensive, reusable and meaningful at several levels of
//! numeric precision - image pipelines, signal chains, matrix chains,
//! small neural graphs.
//!
//! ## Key pieces
//!
//! - **Graph executor**: schedules nodes honoring dependencies, rejects
//!   cycles at edge insertion, runs independent branches in parallel on a
//!   worker pool and propagates errors along edges.
//! - **Fractal value stores**: each node stores its result at multiple
//!   precision levels, merging repeated writes and compressing adjacent
//!   levels that agree within a tolerance.
//! - **Pluggable caches**: LRU, LFU and a precision-aware policy behind a
//!   shared cache protocol.
//! - **Optimization passes**: dead-node elimination, linear-chain fusion,
//!   memory/activity compression and backward precision propagation,
//!   applied in registration order before every execution.
//!
//! ## Quick start
//!
//! ```
//! use fathom::{ComputeResult, Graph, Node};
//!
//! let graph: Graph<f64> = Graph::new();
//!
//! let source = Node::constant("source", 2.0);
//! let doubled = {
//!     let upstream = source.clone();
//!     Node::new("doubled", move |level| {
//!         match ComputeResult::from(upstream.compute(level).get()) {
//!             ComputeResult::Value(value) => ComputeResult::Value(value * 2.0),
//!             error => error,
//!         }
//!     })
//! };
//!
//! graph.add_node(source.clone());
//! graph.add_node(doubled.clone());
//! graph.connect(&source, &doubled).unwrap();
//!
//! graph.execute().get().unwrap();
//!
//! assert_eq!(doubled.last_result(), Some(ComputeResult::Value(4.0)));
//! assert!(graph.node_error("doubled").is_none());
//! ```
//!
//! ## Error model
//!
//! Failures never cross component boundaries as panics; they travel as
//! [`ErrorState`] values inside [`ComputeResult`], accumulate a
//! propagation path node by node, and land in the graph's per-run error
//! table, queryable through [`Graph::node_error`].

#![warn(missing_docs)]

pub mod cache;
pub mod element;
pub mod error;
pub mod graph;
pub mod node;
pub mod passes;
pub mod pool;
pub mod result;
pub mod serialize;
pub mod store;
pub mod task;

pub use cache::{
    CacheKey, CachePolicy, FractalPolicy, GraphCache, LfuPolicy, LruPolicy,
    NodeCache,
};
pub use element::Element;
pub use error::{ErrorKind, ErrorState};
pub use graph::{Edge, Graph};
pub use node::{CompletionCallback, Node, Operator};
pub use passes::{
    CompressionPass, DeadNodeElimination, NodeFusion, OptimizationPass,
    PrecisionPropagation,
};
pub use pool::WorkerPool;
pub use result::ComputeResult;
pub use serialize::{EdgeRecord, GraphManifest, NodeRecord};
pub use store::{FractalStore, PrecisionLevel, MAX_DEPTH};
pub use task::{Completer, Task};

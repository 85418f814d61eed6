//! Graph-rewriting optimization passes.
//!
//! Passes are registered on a graph in execution order and run at the
//! start of every [`Graph::execute`] (or explicitly via
//! [`Graph::optimize`]). A pass may add and remove nodes and edges freely
//! but must preserve acyclicity.
//!
//! [`Graph::execute`]: crate::graph::Graph::execute
//! [`Graph::optimize`]: crate::graph::Graph::optimize

mod compression;
mod dead_node;
mod fusion;
mod precision;

pub use compression::CompressionPass;
pub use dead_node::DeadNodeElimination;
pub use fusion::NodeFusion;
pub use precision::PrecisionPropagation;

use crate::{element::Element, graph::Graph};

/// A graph rewrite applied before execution.
pub trait OptimizationPass<T: Element>: Send {
    /// The pass's name, for logs and diagnostics.
    fn name(&self) -> &str;

    /// Rewrites the graph in place.
    fn optimize(&mut self, graph: &Graph<T>);
}

//! Error model shared by every component of the engine.
//!
//! Errors are carried as values inside [`ComputeResult`] rather than being
//! thrown across component boundaries. The node that produces an error is
//! recorded as its source; every node that subsequently observes the error
//! appends its own name to the propagation path.
//!
//! [`ComputeResult`]: crate::result::ComputeResult

/// Classifies the failure modes of the engine.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    thiserror::Error,
)]
pub enum ErrorKind {
    /// The node's operator failed or panicked.
    #[error("computation error")]
    Computation,

    /// A precision level outside a node's window was requested.
    #[error("precision error")]
    Precision,

    /// An upstream dependency produced an error.
    #[error("dependency error")]
    Dependency,

    /// A resource was unavailable: pool shut down, empty cache on victim
    /// selection, abandoned task.
    #[error("resource error")]
    Resource,

    /// A computation exceeded its time budget.
    ///
    /// Reserved: the engine never raises this on its own, but operators may,
    /// and the propagation machinery treats it like any other error.
    #[error("timeout error")]
    Timeout,

    /// A graph or precision-range invariant was violated.
    #[error("validation error")]
    Validation,
}

/// An error together with the context it accumulated while traveling
/// through the graph.
///
/// The `source_node` is the node that produced the error; the
/// `propagation_path` lists, in traversal order, every node that observed
/// the error afterwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ErrorState {
    kind: ErrorKind,
    message: String,
    source_node: Option<String>,
    propagation_path: Vec<String>,
}

impl ErrorState {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source_node: None,
            propagation_path: Vec::new(),
        }
    }

    /// Creates a [`ErrorKind::Computation`] error.
    pub fn computation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Computation, message)
    }

    /// Creates a [`ErrorKind::Precision`] error.
    pub fn precision(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Precision, message)
    }

    /// Creates a [`ErrorKind::Dependency`] error.
    pub fn dependency(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Dependency, message)
    }

    /// Creates a [`ErrorKind::Resource`] error.
    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resource, message)
    }

    /// Creates a [`ErrorKind::Timeout`] error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Creates a [`ErrorKind::Validation`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Sets the source node, consuming and returning the error.
    #[must_use]
    pub fn with_source(mut self, node_name: impl Into<String>) -> Self {
        self.source_node = Some(node_name.into());
        self
    }

    /// Sets the source node in place.
    pub fn set_source(&mut self, node_name: impl Into<String>) {
        self.source_node = Some(node_name.into());
    }

    /// Appends a node to the propagation path.
    pub fn push_propagation(&mut self, node_name: impl Into<String>) {
        self.propagation_path.push(node_name.into());
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind { self.kind }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str { &self.message }

    /// Returns the name of the node that produced the error, if recorded.
    #[must_use]
    pub fn source_node(&self) -> Option<&str> { self.source_node.as_deref() }

    /// Returns the nodes the error has transited after its source, in
    /// traversal order.
    #[must_use]
    pub fn propagation_path(&self) -> &[String] { &self.propagation_path }

    /// Converts a caught panic payload into a `Computation` error.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "computation panicked".to_owned());

        Self::computation(message)
    }

    pub(crate) fn path_contains(&self, node_name: &str) -> bool {
        self.propagation_path.iter().any(|n| n == node_name)
    }

    /// True if either the source or the propagation path mentions the node.
    pub(crate) fn mentions(&self, node_name: &str) -> bool {
        self.source_node.as_deref() == Some(node_name)
            || self.path_contains(node_name)
    }
}

#[cfg(test)]
mod test;

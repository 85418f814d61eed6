//! The outcome of a node computation: a value or an error.

use enum_as_inner::EnumAsInner;

use crate::error::ErrorState;

/// The result of computing a node: either an element value or the error
/// state that prevented one.
///
/// Unlike `Result`, both arms travel through the same channels (tasks,
/// callbacks, the graph error table), so the error arm carries full
/// propagation context rather than a bare failure.
#[derive(Debug, Clone, PartialEq, EnumAsInner)]
pub enum ComputeResult<T> {
    /// The computation produced a value.
    Value(T),
    /// The computation failed, or replayed an upstream failure.
    Error(ErrorState),
}

impl<T> ComputeResult<T> {
    /// Converts into a plain `Result`, discarding nothing.
    pub fn ok(self) -> Result<T, ErrorState> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Error(error) => Err(error),
        }
    }

    /// True if this result carries an error.
    #[must_use]
    pub const fn has_error(&self) -> bool { matches!(self, Self::Error(_)) }
}

/// Collapses a task-level failure into the compute-level error channel.
///
/// Task failures (abandonment, worker panics) and compute failures are the
/// same thing to a consumer awaiting a node's result.
impl<T> From<Result<ComputeResult<T>, ErrorState>> for ComputeResult<T> {
    fn from(result: Result<ComputeResult<T>, ErrorState>) -> Self {
        match result {
            Ok(inner) => inner,
            Err(error) => Self::Error(error),
        }
    }
}

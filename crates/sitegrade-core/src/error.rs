//! Error types for the grading and road planning core.

use thiserror::Error;

/// Errors raised by core operations.
///
/// An unreachable pathfinding goal is not an error; see
/// [`PathOutcome`](crate::pathfinding::PathOutcome).
#[derive(Debug, Error)]
pub enum GradingError {
    /// Caller input failed validation (empty grid, bad geometry, out-of-range point).
    #[error("validation error: {0}")]
    Validation(String),

    /// A required collaborator was not supplied at construction.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(&'static str),

    /// A node id that does not exist in the navigation graph.
    #[error("unknown graph node {0}")]
    UnknownNode(usize),

    /// Soil key not known to the soil-properties source.
    #[error("unknown soil type '{0}'")]
    UnknownSoil(String),
}

impl GradingError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

//! Error types for compaction simulations.

use sim_lattice::LatticeError;
use thiserror::Error;

use crate::observer::Snapshot;

/// Errors that can occur while building or loading a sample.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompactionError {
    /// Lattice query or construction failed.
    #[error(transparent)]
    Lattice(#[from] LatticeError),

    /// A sample or loading parameter is out of range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The equilibrium system could not be solved.
    #[error("singular stiffness matrix ({dimension} unknowns)")]
    SingularSystem {
        /// Number of unknowns in the system.
        dimension: usize,
    },

    /// A loading iteration failed to solve; the run cannot continue.
    #[error("solve failed at iteration {iteration}")]
    SolveFailed {
        /// Iteration whose solve failed.
        iteration: u64,
        /// Displacement and compaction state when the solve failed.
        snapshot: Box<Snapshot>,
    },
}

impl CompactionError {
    /// Create an invalid parameter error.
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result type for compaction operations.
pub type Result<T> = std::result::Result<T, CompactionError>;

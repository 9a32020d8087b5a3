//! Error types for lattice geometry and threshold generation.

use thiserror::Error;

/// Errors that can occur when querying or building a lattice.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum LatticeError {
    /// A node index outside `[0, node_count)` was queried.
    #[error("illegal node index {index}: index has to be lower than {node_count}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of nodes in the lattice.
        node_count: usize,
    },

    /// The lattice is too small to have an interior.
    #[error("lattice needs at least 3 lines and 3 columns, got {lines}x{cols}")]
    InvalidDimensions {
        /// Requested number of node rows.
        lines: usize,
        /// Requested number of nodes on a long row.
        cols: usize,
    },

    /// A construction parameter is out of its valid range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The threshold distribution could not be built.
    #[error("invalid threshold distribution: {0}")]
    InvalidDistribution(String),
}

impl LatticeError {
    /// Create an out-of-range index error.
    #[must_use]
    pub const fn index_out_of_range(index: usize, node_count: usize) -> Self {
        Self::IndexOutOfRange { index, node_count }
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result type for lattice operations.
pub type Result<T> = std::result::Result<T, LatticeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LatticeError::index_out_of_range(12, 8);
        assert_eq!(
            err.to_string(),
            "illegal node index 12: index has to be lower than 8"
        );

        let err = LatticeError::invalid_parameter("thickness0", "must be non-negative");
        assert!(err.to_string().contains("thickness0"));
    }
}

//! ## Custom Errors for the M-Tree
//!
//! This module defines custom errors that are used internally by the crate.

use std::error::Error;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Represents errors specific to invalid operations or parameters on an M-Tree.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MTreeError {
    /// Occurs when a coordinate axis outside a point's dimensionality is
    /// requested.
    InvalidAxis {
        /// The requested coordinate axis.
        axis: usize,
        /// The point's number of dimensions.
        dims: usize,
    },
    /// Occurs when a tree is created with a node capacity too small to split.
    InvalidCapacity {
        /// The capacity value that was provided.
        capacity: usize,
    },
    /// Occurs when a point's dimension does not match the dimension of the tree.
    DimensionMismatch {
        /// The dimension the tree expects.
        expected: usize,
        /// The dimension of the offending point.
        actual: usize,
    },
}

impl fmt::Display for MTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MTreeError::InvalidAxis { axis, dims } => {
                write!(
                    f,
                    "Axis {axis} is out of range for a point with {dims} dimensions"
                )
            }
            MTreeError::InvalidCapacity { capacity } => {
                write!(
                    f,
                    "A node capacity of {capacity} is too small; nodes must hold at least three entries"
                )
            }
            MTreeError::DimensionMismatch { expected, actual } => {
                write!(
                    f,
                    "Dimension mismatch: tree stores {expected}-dimensional points, got {actual}"
                )
            }
        }
    }
}

impl Error for MTreeError {}

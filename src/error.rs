//! Error types for lu3d

use std::collections::TryReserveError;

use thiserror::Error;

/// Result type alias using lu3d's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the ancestor factorization stage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Scratch, panel, or communicator-array allocation failed
    #[error("Allocation failure: could not reserve {size} elements for {what}")]
    AllocationFailure {
        /// What was being allocated
        what: &'static str,
        /// Requested element count
        size: usize,
    },

    /// Diagonal factorization hit a pivot below the threshold
    ///
    /// The pipeline reports this through [`crate::algorithm::FactorStatus`];
    /// it only surfaces as an `Err` when a caller converts a status into a
    /// hard failure.
    #[error("Singular pivot at global column {column}")]
    SingularPivot {
        /// Global column (0-based) of the first tiny pivot
        column: usize,
    },

    /// A collective operation failed; the process group has been aborted
    #[error("Communication failure in {op}: {reason}")]
    CommunicationFailure {
        /// The collective that failed
        op: &'static str,
        /// Description of the failure
        reason: String,
    },

    /// Topology or ownership metadata is inconsistent with the grid
    #[error("Invalid topology for node {node}: {reason}")]
    InvalidTopology {
        /// Offending supernode (or position) identifier
        node: usize,
        /// Description of the inconsistency
        reason: String,
    },

    /// Buffer length mismatch
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },
}

/// Numeric status kinds reported to callers that want an integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorKind {
    /// No error
    Success = 0,
    /// See [`Error::AllocationFailure`]
    AllocationFailure = 1,
    /// See [`Error::SingularPivot`]
    SingularPivot = 2,
    /// See [`Error::CommunicationFailure`]
    CommunicationFailure = 3,
    /// See [`Error::InvalidTopology`]
    InvalidTopology = 4,
    /// Argument or shape validation failure
    InvalidArgument = 5,
}

impl ErrorKind {
    /// Integer code for this kind (0 = success)
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AllocationFailure { .. } => ErrorKind::AllocationFailure,
            Self::SingularPivot { .. } => ErrorKind::SingularPivot,
            Self::CommunicationFailure { .. } => ErrorKind::CommunicationFailure,
            Self::InvalidTopology { .. } => ErrorKind::InvalidTopology,
            Self::ShapeMismatch { .. } | Self::InvalidArgument { .. } => {
                ErrorKind::InvalidArgument
            }
        }
    }

    /// Integer code of this error's kind
    pub fn code(&self) -> i32 {
        self.kind().code()
    }

    /// Whether the enclosing process group must be considered failed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AllocationFailure { .. } | Self::CommunicationFailure { .. }
        )
    }

    /// Create a communication failure
    pub fn comm(op: &'static str, reason: impl Into<String>) -> Self {
        Self::CommunicationFailure {
            op,
            reason: reason.into(),
        }
    }

    /// Create an invalid topology error
    pub fn topology(node: usize, reason: impl Into<String>) -> Self {
        Self::InvalidTopology {
            node,
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}

/// Allocate a zero-filled vector, reporting failure instead of aborting.
pub(crate) fn try_zeroed<T: Clone + Default>(what: &'static str, len: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    reserve_exact(&mut v, what, len)?;
    v.resize(len, T::default());
    Ok(v)
}

/// `Vec::try_reserve_exact` mapped onto [`Error::AllocationFailure`].
pub(crate) fn reserve_exact<T>(
    v: &mut Vec<T>,
    what: &'static str,
    additional: usize,
) -> Result<()> {
    v.try_reserve_exact(additional)
        .map_err(|_: TryReserveError| Error::AllocationFailure {
            what,
            size: additional,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorKind::Success.code(), 0);
        assert_eq!(Error::SingularPivot { column: 3 }.code(), 2);
        assert_eq!(Error::comm("reduce", "x").code(), 3);
        assert_eq!(Error::topology(1, "x").code(), 4);
        assert_eq!(Error::shape_mismatch(&[1], &[2]).code(), 5);
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::comm("bcast", "peer gone").is_fatal());
        assert!(
            Error::AllocationFailure {
                what: "scratch",
                size: 1
            }
            .is_fatal()
        );
        assert!(!Error::SingularPivot { column: 0 }.is_fatal());
        assert!(!Error::topology(0, "bad owner").is_fatal());
    }

    #[test]
    fn test_try_zeroed() {
        let v: Vec<f64> = try_zeroed("test", 4).unwrap();
        assert_eq!(v, vec![0.0; 4]);
        let huge: Result<Vec<f64>> = try_zeroed("test", usize::MAX / 2);
        assert!(matches!(huge, Err(Error::AllocationFailure { .. })));
    }
}

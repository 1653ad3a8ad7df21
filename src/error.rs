//! Error types for the linear fitting core.
//!
//! Every fallible operation returns a [`LinFitError`] through the [`Result`]
//! alias defined here; no panics cross the library boundary for expected
//! failure modes.

use thiserror::Error;

use crate::solver::FitMode;

/// Errors that can occur while building, decomposing or solving a linear
/// system.
#[derive(Debug, Error)]
pub enum LinFitError {
    /// The requested dimensions do not form a well-posed least-squares
    /// problem.
    #[error("invalid system shape: {rows} equations x {cols} unknowns (need rows >= cols >= 1)")]
    InvalidShape {
        /// Number of equations (design-matrix rows).
        rows: usize,
        /// Number of unknowns (design-matrix columns).
        cols: usize,
    },

    /// A supplied buffer does not match the declared system dimensions.
    #[error("{name} has length {got}, expected {expected}")]
    DimensionMismatch {
        /// Which buffer disagrees.
        name: &'static str,
        expected: usize,
        got: usize,
    },

    /// A column index is outside the system's unknown count.
    #[error("column index {index} out of range for {cols} unknowns")]
    ColumnOutOfRange { index: usize, cols: usize },

    /// A design-matrix column has zero Euclidean norm, so the fit is
    /// structurally singular. Retrying cannot succeed; the column set itself
    /// is degenerate.
    #[error("design-matrix column {column} has zero norm")]
    ZeroNormColumn { column: usize },

    /// An operation that needs a factorization ran before `decompose`.
    #[error("system is not decomposed; call decompose() first")]
    NotDecomposed,

    /// An operation requires a factorization backend the system was not
    /// built with.
    #[error("operation requires the {required:?} backend, but this system uses {actual:?}")]
    ModeMismatch {
        /// Backend the operation needs.
        required: FitMode,
        /// Backend the system was constructed with.
        actual: FitMode,
    },

    /// The factorization itself failed.
    #[error("decomposition failed: {reason}")]
    DecompositionFailed { reason: &'static str },
}

/// A specialized `Result` type for linear-fit operations.
pub type Result<T> = std::result::Result<T, LinFitError>;

impl LinFitError {
    /// Returns `true` if the error reports a singular or otherwise
    /// unfactorizable design matrix.
    pub fn is_singular(&self) -> bool {
        matches!(
            self,
            LinFitError::ZeroNormColumn { .. } | LinFitError::DecompositionFailed { .. }
        )
    }

    /// Returns `true` if the error reports caller misuse (bad shapes,
    /// indices, call ordering or backend choice) rather than a numerical
    /// problem with the data.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            LinFitError::InvalidShape { .. }
                | LinFitError::DimensionMismatch { .. }
                | LinFitError::ColumnOutOfRange { .. }
                | LinFitError::NotDecomposed
                | LinFitError::ModeMismatch { .. }
        )
    }
}

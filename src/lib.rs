//! `spectral-linfit` library crate.
//!
//! Solves the linear (Beer-Lambert) term of a spectral fit: given a design
//! matrix built from reference cross-sections and polynomial terms, and a
//! measured signal vector, compute least-squares coefficients and their
//! uncertainty. The solver is decomposed once and reused for many right-hand
//! sides within one analysis run.
//!
//! Module map:
//!
//! - [`solver`] holds the [`solver::LinearSystem`] façade and its two
//!   factorization backends (SVD and column-pivoted QR)
//! - [`polyfit`] builds weighted polynomial fits on top of the solver
//! - [`error`] defines the library error type
//!
//! Spectral model assembly, file ingestion and result presentation belong to
//! the surrounding application, not to this crate.

pub mod error;
pub mod polyfit;
pub mod solver;

pub use error::{LinFitError, Result};
pub use polyfit::{PolyFit, fit_polynomial};
pub use solver::{FitMode, LinearSystem};

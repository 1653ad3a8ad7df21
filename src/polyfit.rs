//! Weighted polynomial fitting on top of the linear-system core.
//!
//! Builds the Vandermonde design matrix for a degree-N polynomial over the
//! sample abscissas, optionally applies per-observation weights, and drives
//! a QR-mode [`LinearSystem`] through decompose and solve. Covariance is
//! never requested here; callers that need uncertainties assemble the
//! system themselves.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{LinFitError, Result};
use crate::solver::{FitMode, LinearSystem};

/// A fitted polynomial, lowest-order coefficient first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolyFit {
    /// Polynomial degree.
    pub order: usize,
    /// `coefficients[i]` multiplies `tⁱ`; length is `order + 1`.
    pub coefficients: Vec<f64>,
}

impl PolyFit {
    /// Evaluate the polynomial at `t` (Horner scheme).
    pub fn evaluate(&self, t: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * t + c)
    }
}

/// Fit a degree-`order` polynomial to `observed` values sampled at the
/// abscissas `samples`.
///
/// When `sigma` holds per-observation standard deviations, both the
/// design-matrix rows and the targets are divided by it, making the solve a
/// weighted least-squares fit. Fewer samples than `order + 1` coefficients
/// is an [`LinFitError::InvalidShape`] error.
pub fn fit_polynomial(
    samples: &[f64],
    order: usize,
    sigma: Option<&[f64]>,
    observed: &[f64],
) -> Result<PolyFit> {
    let m = samples.len();
    let n = order + 1;
    if observed.len() != m {
        return Err(LinFitError::DimensionMismatch {
            name: "observed",
            expected: m,
            got: observed.len(),
        });
    }

    // Vandermonde matrix: column 0 is all ones, column i multiplies the
    // previous column by the sample abscissa.
    let mut a = DMatrix::zeros(m, n);
    for j in 0..m {
        a[(j, 0)] = 1.0;
    }
    for i in 1..n {
        for j in 0..m {
            a[(j, i)] = samples[j] * a[(j, i - 1)];
        }
    }

    let mut system = LinearSystem::from_matrix(&a, FitMode::Qr)?;
    system.set_weights(sigma)?;
    system.decompose()?;

    let mut b = DVector::from_column_slice(observed);
    if let Some(sigma) = sigma {
        // Length was validated by set_weights.
        for (bi, &s) in b.iter_mut().zip(sigma) {
            *bi /= s;
        }
    }
    let x = system.solve(&b)?;

    Ok(PolyFit {
        order,
        coefficients: x.iter().copied().collect(),
    })
}

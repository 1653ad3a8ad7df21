//! Column-pivoted QR factorization backend.
//!
//! nalgebra's `QR`/`ColPivQR` `solve` is meant for square systems and will
//! panic on a tall matrix, so the least-squares solve is assembled here from
//! the thin Q, the n×n triangular factor and the column permutation.

use nalgebra::linalg::{Cholesky, ColPivQR};
use nalgebra::{DMatrix, DVector, Dyn};

use crate::error::{LinFitError, Result};

/// Column-pivoted QR factorization `A · P = Q · R` of the normalized design
/// matrix.
pub(crate) struct QrFactors {
    qr: ColPivQR<f64, Dyn, Dyn>,
}

impl QrFactors {
    pub(crate) fn compute(a: &DMatrix<f64>) -> Self {
        Self {
            qr: a.clone().col_piv_qr(),
        }
    }

    /// Least-squares solve: `x = P · R⁻¹ · Qᵗ · b`.
    pub(crate) fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>> {
        let qtb = self.qr.q().tr_mul(b);
        let mut x = self.qr.r().solve_upper_triangular(&qtb).ok_or(
            LinFitError::DecompositionFailed {
                reason: "triangular factor has a zero pivot",
            },
        )?;
        self.qr.p().inv_permute_rows(&mut x);
        Ok(x)
    }
}

/// Inverse of the normal equations, `(AᵗA)⁻¹`, for an already normalized
/// design matrix. This doubles as the coefficient covariance.
///
/// The triangular factor of the pivoted QR is mathematically the Cholesky
/// factor of `AᵗA` (up to the permutation), but nalgebra does not expose it
/// in a reusable form, so the inverse comes from a fresh Cholesky
/// factorization instead.
pub(crate) fn normal_equations_inverse(a: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let ata = a.tr_mul(a);
    let chol = Cholesky::new(ata).ok_or(LinFitError::DecompositionFailed {
        reason: "normal-equations matrix is not positive definite",
    })?;
    Ok(chol.inverse())
}

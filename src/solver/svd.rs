//! SVD factorization backend.
//!
//! Factors the (already column-normalized) design matrix as
//! `A = U · diag(W) · Vᵗ` and implements the three operations that need the
//! factors directly:
//!
//! - least-squares solve by back-substitution
//! - coefficient covariance `V · diag(1/W²) · Vᵗ`
//! - the Moore-Penrose pseudoinverse, with small singular values truncated
//!
//! The solve path keeps near-zero singular values as they are: rank
//! truncation is a property of the pseudoinverse only. Only an exactly zero
//! singular value is skipped, which cannot occur for a matrix whose columns
//! were normalized to unit length.

use nalgebra::{DMatrix, DVector};

use crate::error::{LinFitError, Result};

/// Singular value decomposition of the normalized design matrix.
pub(crate) struct SvdFactors {
    /// Left singular vectors, m×n.
    u: DMatrix<f64>,
    /// Transposed right singular vectors, n×n.
    v_t: DMatrix<f64>,
    /// Singular values, sorted in descending order.
    w: DVector<f64>,
}

impl SvdFactors {
    /// Factorize an already column-normalized matrix.
    pub(crate) fn compute(a: &DMatrix<f64>) -> Result<Self> {
        // Iteration limit 0 lets the implicit-shift algorithm run to
        // convergence; nalgebra still reports failure through an Option.
        let svd = a.clone().try_svd(true, true, f64::EPSILON, 0).ok_or(
            LinFitError::DecompositionFailed {
                reason: "singular value decomposition did not converge",
            },
        )?;
        let Some(u) = svd.u else {
            return Err(LinFitError::DecompositionFailed {
                reason: "left singular vectors were not computed",
            });
        };
        let Some(v_t) = svd.v_t else {
            return Err(LinFitError::DecompositionFailed {
                reason: "right singular vectors were not computed",
            });
        };
        Ok(Self {
            u,
            v_t,
            w: svd.singular_values,
        })
    }

    /// Least-squares solve by back-substitution:
    /// `x = V · diag(1/W) · Uᵗ · b`.
    pub(crate) fn solve(&self, b: &DVector<f64>) -> DVector<f64> {
        let k = self.w.len();
        let mut tmp = DVector::zeros(k);
        for i in 0..k {
            if self.w[i] != 0.0 {
                tmp[i] = self.u.column(i).dot(b) / self.w[i];
            }
        }
        self.v_t.tr_mul(&tmp)
    }

    /// Covariance of the normalized system: `V · diag(1/W²) · Vᵗ`.
    ///
    /// Terms with a zero singular value contribute nothing.
    pub(crate) fn covariance(&self) -> DMatrix<f64> {
        let n = self.v_t.ncols();
        let k = self.w.len();
        let mut wti = DVector::zeros(k);
        for (i, &w) in self.w.iter().enumerate() {
            if w != 0.0 {
                wti[i] = 1.0 / (w * w);
            }
        }

        let mut cov = DMatrix::zeros(n, n);
        for j in 0..n {
            for i in 0..=j {
                let mut sum = 0.0;
                for l in 0..k {
                    sum += self.v_t[(l, i)] * self.v_t[(l, j)] * wti[l];
                }
                cov[(i, j)] = sum;
                cov[(j, i)] = sum;
            }
        }
        cov
    }

    /// Cutoff below which singular values count as zero, the classical
    /// `max(m, n) · w_max · ε` rule.
    fn tolerance(&self) -> f64 {
        let (m, n) = (self.u.nrows(), self.v_t.ncols());
        m.max(n) as f64 * self.w[0] * f64::EPSILON
    }

    /// Number of singular values strictly above the tolerance. Relies on
    /// the descending sort order of `w`.
    pub(crate) fn effective_rank(&self) -> usize {
        let tol = self.tolerance();
        self.w.iter().take_while(|&&w| w > tol).count()
    }

    /// Moore-Penrose pseudoinverse `V · diag(1/W) · Uᵗ`, shaped n×m.
    ///
    /// Singular values at or below the tolerance are discarded, so entries
    /// tied to them are implicitly zero through the truncated summation.
    pub(crate) fn pseudo_inverse(&self) -> DMatrix<f64> {
        let (m, n) = (self.u.nrows(), self.v_t.ncols());
        let rank = self.effective_rank();
        let mut pinv = DMatrix::zeros(n, m);
        for k in 0..rank {
            let wk = self.w[k];
            for j in 0..n {
                let v_jk = self.v_t[(k, j)];
                for i in 0..m {
                    pinv[(j, i)] += v_jk * self.u[(i, k)] / wk;
                }
            }
        }
        pinv
    }

    pub(crate) fn singular_values(&self) -> &[f64] {
        self.w.as_slice()
    }
}

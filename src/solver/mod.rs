//! Linear least-squares core.
//!
//! A [`LinearSystem`] holds an m×n design matrix (m equations, n unknowns,
//! `m >= n`) and solves
//!
//! ```text
//! minimize ‖A x − b‖²
//! ```
//!
//! repeatedly for different right-hand sides after a single, expensive
//! decomposition. Two factorization backends are supported:
//!
//! - [`FitMode::Svd`]: singular value decomposition, the only backend with
//!   a pseudoinverse path
//! - [`FitMode::Qr`]: column-pivoted QR, with covariance from a
//!   normal-equations Cholesky solve
//!
//! Columns built from heterogeneous physical quantities (absorption
//! cross-sections, polynomial terms) can differ by many orders of magnitude,
//! which makes the raw system ill-conditioned. Every column is therefore
//! rescaled to unit norm before factorization; solutions and covariances are
//! scaled back to the caller's units afterwards, and the recorded scale
//! factors stay readable through [`LinearSystem::norm`].

pub mod qr;
pub mod svd;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{LinFitError, Result};
use qr::QrFactors;
use svd::SvdFactors;

/// Factorization strategy for a [`LinearSystem`], chosen once at
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Singular value decomposition.
    Svd,
    /// Column-pivoted QR decomposition.
    Qr,
}

/// Backend-specific factorization artifacts. Exactly one variant is ever
/// live, matching the system's [`FitMode`].
enum Factors {
    Svd(SvdFactors),
    Qr(QrFactors),
}

/// A linear system of m equations in n unknowns.
pub struct LinearSystem {
    mode: FitMode,
    /// Design matrix. Column-normalized in place by [`LinearSystem::decompose`].
    a: DMatrix<f64>,
    /// Pre-normalization column norms; all zero until decomposition.
    norms: Vec<f64>,
    factors: Option<Factors>,
}

impl LinearSystem {
    /// Create a zero-filled system for `m` equations and `n` unknowns.
    ///
    /// Fails with [`LinFitError::InvalidShape`] unless `m >= n >= 1`: the
    /// thin-QR solve and the covariance recovery both assume a tall (or
    /// square) design matrix.
    pub fn new(m: usize, n: usize, mode: FitMode) -> Result<Self> {
        if n == 0 || m < n {
            return Err(LinFitError::InvalidShape { rows: m, cols: n });
        }
        Ok(Self {
            mode,
            a: DMatrix::zeros(m, n),
            norms: vec![0.0; n],
            factors: None,
        })
    }

    /// Create a system from an existing design matrix, taking dimensions
    /// from the matrix itself.
    pub fn from_matrix(a: &DMatrix<f64>, mode: FitMode) -> Result<Self> {
        let mut system = Self::new(a.nrows(), a.ncols(), mode)?;
        system.a.copy_from(a);
        Ok(system)
    }

    /// Number of equations (design-matrix rows).
    pub fn nrows(&self) -> usize {
        self.a.nrows()
    }

    /// Number of unknowns (design-matrix columns).
    pub fn ncols(&self) -> usize {
        self.a.ncols()
    }

    /// The factorization backend this system was built with.
    pub fn mode(&self) -> FitMode {
        self.mode
    }

    /// Overwrite one column of the design matrix, for callers that assemble
    /// the system one basis function at a time.
    ///
    /// Any existing factorization is invalidated; call
    /// [`LinearSystem::decompose`] again before solving.
    pub fn set_column(&mut self, index: usize, values: &[f64]) -> Result<()> {
        let (m, n) = (self.nrows(), self.ncols());
        if index >= n {
            return Err(LinFitError::ColumnOutOfRange { index, cols: n });
        }
        if values.len() != m {
            return Err(LinFitError::DimensionMismatch {
                name: "column values",
                expected: m,
                got: values.len(),
            });
        }
        self.a.column_mut(index).copy_from_slice(values);
        self.factors = None;
        Ok(())
    }

    /// Divide each equation by its observation standard deviation,
    /// implementing weighted least squares by row scaling.
    ///
    /// `None` leaves the system unweighted. Weighting must happen before
    /// decomposition; like column population it invalidates any existing
    /// factorization.
    pub fn set_weights(&mut self, sigma: Option<&[f64]>) -> Result<()> {
        let Some(sigma) = sigma else {
            return Ok(());
        };
        let m = self.nrows();
        if sigma.len() != m {
            return Err(LinFitError::DimensionMismatch {
                name: "sigma",
                expected: m,
                got: sigma.len(),
            });
        }
        for (i, &s) in sigma.iter().enumerate() {
            self.a.row_mut(i).unscale_mut(s);
        }
        self.factors = None;
        Ok(())
    }

    /// Rescale every column to unit norm, record the scale factors, and
    /// factorize with the chosen backend.
    ///
    /// A zero column norm means the design matrix is structurally singular
    /// and is reported as [`LinFitError::ZeroNormColumn`]. Decomposition
    /// consumes the populated matrix: to fit a different design matrix,
    /// repopulate every column and decompose again.
    pub fn decompose(&mut self) -> Result<()> {
        for j in 0..self.ncols() {
            let norm = self.a.column(j).norm();
            if norm == 0.0 {
                return Err(LinFitError::ZeroNormColumn { column: j });
            }
            self.a.column_mut(j).unscale_mut(norm);
            self.norms[j] = norm;
        }
        self.factors = Some(match self.mode {
            FitMode::Svd => Factors::Svd(SvdFactors::compute(&self.a)?),
            FitMode::Qr => Factors::Qr(QrFactors::compute(&self.a)),
        });
        Ok(())
    }

    fn factors(&self) -> Result<&Factors> {
        self.factors.as_ref().ok_or(LinFitError::NotDecomposed)
    }

    /// Solve `min ‖A x − b‖` against the stored factorization.
    ///
    /// The result is reported in the caller's original column units: the
    /// internal unit-norm rescaling is undone before returning. Solving
    /// never mutates the factorization, so many right-hand sides can be
    /// solved against a single decomposition.
    pub fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>> {
        if b.len() != self.nrows() {
            return Err(LinFitError::DimensionMismatch {
                name: "right-hand side",
                expected: self.nrows(),
                got: b.len(),
            });
        }
        let mut x = match self.factors()? {
            Factors::Svd(factors) => factors.solve(b),
            Factors::Qr(factors) => factors.solve(b)?,
        };
        for (xj, &norm) in x.iter_mut().zip(&self.norms) {
            *xj /= norm;
        }
        Ok(x)
    }

    /// Covariance matrix `(AᵗA)⁻¹` of the fitted coefficients, in the
    /// caller's original column units.
    ///
    /// This costs up to O(n³) on top of the factorization; solve-only
    /// callers simply never ask for it.
    pub fn covariance(&self) -> Result<DMatrix<f64>> {
        let mut cov = match self.factors()? {
            Factors::Svd(factors) => factors.covariance(),
            Factors::Qr(_) => qr::normal_equations_inverse(&self.a)?,
        };
        for j in 0..self.ncols() {
            for i in 0..self.ncols() {
                cov[(i, j)] /= self.norms[i] * self.norms[j];
            }
        }
        Ok(cov)
    }

    /// Per-coefficient variances: the diagonal of [`LinearSystem::covariance`].
    pub fn variances(&self) -> Result<DVector<f64>> {
        Ok(self.covariance()?.diagonal())
    }

    /// Moore-Penrose pseudoinverse of the column-normalized design matrix,
    /// shaped n×m.
    ///
    /// Only the SVD backend supports this; a QR-mode system reports
    /// [`LinFitError::ModeMismatch`]. Singular values below
    /// `max(m, n) · w_max · ε` are treated as zero. The pseudoinverse is of
    /// the *normalized* matrix; combine with [`LinearSystem::norms`] when
    /// original units are needed.
    pub fn pseudo_inverse(&self) -> Result<DMatrix<f64>> {
        match self.factors()? {
            Factors::Svd(factors) => Ok(factors.pseudo_inverse()),
            Factors::Qr(_) => Err(self.svd_only()),
        }
    }

    /// Singular values of the normalized design matrix, sorted in
    /// descending order. SVD backend only.
    pub fn singular_values(&self) -> Result<&[f64]> {
        match self.factors()? {
            Factors::Svd(factors) => Ok(factors.singular_values()),
            Factors::Qr(_) => Err(self.svd_only()),
        }
    }

    /// Number of singular values above the pseudoinverse cutoff. SVD
    /// backend only.
    pub fn effective_rank(&self) -> Result<usize> {
        match self.factors()? {
            Factors::Svd(factors) => Ok(factors.effective_rank()),
            Factors::Qr(_) => Err(self.svd_only()),
        }
    }

    fn svd_only(&self) -> LinFitError {
        LinFitError::ModeMismatch {
            required: FitMode::Svd,
            actual: self.mode,
        }
    }

    /// Normalization factor recorded for column `index` by
    /// [`LinearSystem::decompose`].
    ///
    /// # Panics
    /// Panics if `index >= ncols()`.
    pub fn norm(&self, index: usize) -> f64 {
        self.norms[index]
    }

    /// All recorded column norms (zero before decomposition).
    pub fn norms(&self) -> &[f64] {
        &self.norms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    fn random_system(m: usize, n: usize, seed: u64) -> (DMatrix<f64>, DVector<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let a = DMatrix::from_fn(m, n, |_, _| normal.sample(&mut rng));
        let b = DVector::from_fn(m, |_, _| normal.sample(&mut rng));
        (a, b)
    }

    fn decompose_and_solve(a: &DMatrix<f64>, b: &DVector<f64>, mode: FitMode) -> DVector<f64> {
        let mut system = LinearSystem::from_matrix(a, mode).unwrap();
        system.decompose().unwrap();
        system.solve(b).unwrap()
    }

    #[test]
    fn svd_and_qr_agree_with_normal_equations() {
        let (a, b) = random_system(20, 4, 42);

        // Independent reference: x = (A'A)^-1 A' b.
        let x_ref = (a.tr_mul(&a)).try_inverse().unwrap() * a.tr_mul(&b);

        let x_svd = decompose_and_solve(&a, &b, FitMode::Svd);
        let x_qr = decompose_and_solve(&a, &b, FitMode::Qr);

        for j in 0..4 {
            assert!((x_svd[j] - x_ref[j]).abs() < 1e-9, "svd vs ref at {j}");
            assert!((x_qr[j] - x_ref[j]).abs() < 1e-9, "qr vs ref at {j}");
            assert!((x_svd[j] - x_qr[j]).abs() < 1e-9, "svd vs qr at {j}");
        }
    }

    #[test]
    fn exact_right_hand_side_round_trips() {
        let a = DMatrix::from_row_slice(
            6,
            3,
            &[
                1.0, 0.5, 0.1, //
                1.0, 1.0, 1.0, //
                1.0, 2.0, 4.0, //
                1.0, 3.0, 9.0, //
                1.0, 4.0, 16.0, //
                1.0, 5.0, 25.0,
            ],
        );
        let x0 = DVector::from_row_slice(&[2.0, -1.0, 0.5]);
        let b = &a * &x0;

        for mode in [FitMode::Svd, FitMode::Qr] {
            let x = decompose_and_solve(&a, &b, mode);
            for j in 0..3 {
                assert!((x[j] - x0[j]).abs() < 1e-10, "{mode:?} at {j}: got {}", x[j]);
            }
        }
    }

    #[test]
    fn column_scaling_only_rescales_that_coefficient() {
        let (a, b) = random_system(12, 3, 7);
        let mut scaled = a.clone();
        let k = 1e4;
        scaled.column_mut(1).scale_mut(k);

        for mode in [FitMode::Svd, FitMode::Qr] {
            let x = decompose_and_solve(&a, &b, mode);
            let x_scaled = decompose_and_solve(&scaled, &b, mode);

            assert!((x_scaled[0] - x[0]).abs() < 1e-9);
            assert!((x_scaled[1] * k - x[1]).abs() < 1e-9);
            assert!((x_scaled[2] - x[2]).abs() < 1e-9);
        }
    }

    #[test]
    fn unit_weights_match_unweighted_solve() {
        let (a, b) = random_system(10, 3, 11);

        for mode in [FitMode::Svd, FitMode::Qr] {
            let x_plain = decompose_and_solve(&a, &b, mode);

            let mut weighted = LinearSystem::from_matrix(&a, mode).unwrap();
            weighted.set_weights(Some(&vec![1.0; 10])).unwrap();
            weighted.decompose().unwrap();
            let x_weighted = weighted.solve(&b).unwrap();

            for j in 0..3 {
                assert!((x_weighted[j] - x_plain[j]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn zero_column_is_rejected() {
        for mode in [FitMode::Svd, FitMode::Qr] {
            let mut system = LinearSystem::new(4, 2, mode).unwrap();
            system.set_column(0, &[1.0, 2.0, 3.0, 4.0]).unwrap();
            // column 1 stays all-zero
            let err = system.decompose().unwrap_err();
            assert!(matches!(err, LinFitError::ZeroNormColumn { column: 1 }));
            assert!(err.is_singular());
        }
    }

    #[test]
    fn covariance_matches_normal_equations_inverse() {
        // Columns of very different magnitude, so the test also exercises
        // the norm rescaling: the returned covariance must be in original
        // units regardless of internal normalization.
        let a = DMatrix::from_row_slice(
            5,
            2,
            &[
                1.0, 100.0, //
                1.0, 400.0, //
                1.0, 900.0, //
                1.0, 1600.0, //
                1.0, 2500.0,
            ],
        );
        let expected = (a.tr_mul(&a)).try_inverse().unwrap();

        for mode in [FitMode::Svd, FitMode::Qr] {
            let mut system = LinearSystem::from_matrix(&a, mode).unwrap();
            system.decompose().unwrap();

            let cov = system.covariance().unwrap();
            for i in 0..2 {
                for j in 0..2 {
                    let rel = (cov[(i, j)] - expected[(i, j)]).abs() / expected[(i, j)].abs();
                    assert!(rel < 1e-8, "{mode:?} cov[{i}][{j}]: {} vs {}", cov[(i, j)], expected[(i, j)]);
                }
            }

            let var = system.variances().unwrap();
            assert!((var[0] - cov[(0, 0)]).abs() < 1e-15);
            assert!((var[1] - cov[(1, 1)]).abs() < 1e-15);
        }
    }

    #[test]
    fn recorded_norms_match_column_norms() {
        let (a, _) = random_system(8, 3, 3);
        let mut system = LinearSystem::from_matrix(&a, FitMode::Qr).unwrap();
        assert_eq!(system.norms(), &[0.0, 0.0, 0.0]);

        system.decompose().unwrap();
        for j in 0..3 {
            assert!((system.norm(j) - a.column(j).norm()).abs() < 1e-12);
            assert!(system.norm(j) > 0.0);
        }
    }

    #[test]
    fn operations_before_decompose_are_rejected() {
        let system = LinearSystem::new(4, 2, FitMode::Svd).unwrap();
        let b = DVector::zeros(4);

        assert!(matches!(system.solve(&b), Err(LinFitError::NotDecomposed)));
        assert!(matches!(system.covariance(), Err(LinFitError::NotDecomposed)));
        assert!(matches!(system.pseudo_inverse(), Err(LinFitError::NotDecomposed)));
    }

    #[test]
    fn repopulating_a_column_invalidates_the_factorization() {
        let (a, b) = random_system(6, 2, 5);
        let mut system = LinearSystem::from_matrix(&a, FitMode::Qr).unwrap();
        system.decompose().unwrap();
        assert!(system.solve(&b).is_ok());

        system.set_column(0, &[1.0; 6]).unwrap();
        assert!(matches!(system.solve(&b), Err(LinFitError::NotDecomposed)));
    }

    #[test]
    fn svd_only_operations_report_mode_mismatch() {
        let (a, _) = random_system(6, 2, 9);
        let mut system = LinearSystem::from_matrix(&a, FitMode::Qr).unwrap();
        system.decompose().unwrap();

        let err = system.pseudo_inverse().unwrap_err();
        assert!(matches!(
            err,
            LinFitError::ModeMismatch {
                required: FitMode::Svd,
                actual: FitMode::Qr,
            }
        ));
        assert!(system.singular_values().is_err());
        assert!(system.effective_rank().is_err());
    }

    #[test]
    fn dimension_mismatches_are_reported() {
        let mut system = LinearSystem::new(4, 2, FitMode::Qr).unwrap();

        assert!(matches!(
            system.set_column(5, &[0.0; 4]),
            Err(LinFitError::ColumnOutOfRange { index: 5, cols: 2 })
        ));
        assert!(matches!(
            system.set_column(0, &[0.0; 3]),
            Err(LinFitError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            system.set_weights(Some(&[1.0; 3])),
            Err(LinFitError::DimensionMismatch { .. })
        ));

        system.set_column(0, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        system.set_column(1, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        system.decompose().unwrap();
        let short_b = DVector::zeros(3);
        assert!(matches!(
            system.solve(&short_b),
            Err(LinFitError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn degenerate_shapes_are_rejected_at_construction() {
        assert!(matches!(
            LinearSystem::new(2, 3, FitMode::Svd),
            Err(LinFitError::InvalidShape { rows: 2, cols: 3 })
        ));
        assert!(matches!(
            LinearSystem::new(4, 0, FitMode::Qr),
            Err(LinFitError::InvalidShape { .. })
        ));
    }

    #[test]
    fn pseudoinverse_satisfies_moore_penrose_identity() {
        // Rank-deficient by construction: column 2 duplicates column 0.
        let c0 = [1.0, 2.0, -1.0, 0.5];
        let c1 = [0.5, -1.0, 2.0, 1.0];
        let mut a = DMatrix::zeros(4, 3);
        a.column_mut(0).copy_from_slice(&c0);
        a.column_mut(1).copy_from_slice(&c1);
        a.column_mut(2).copy_from_slice(&c0);

        let mut system = LinearSystem::from_matrix(&a, FitMode::Svd).unwrap();
        system.decompose().unwrap();
        assert_eq!(system.effective_rank().unwrap(), 2);

        let pinv = system.pseudo_inverse().unwrap();
        assert_eq!((pinv.nrows(), pinv.ncols()), (3, 4));

        // The pseudoinverse is of the normalized matrix; rebuild it from the
        // recorded norms before checking A+ against A.
        let mut normalized = a.clone();
        for j in 0..3 {
            normalized.column_mut(j).unscale_mut(system.norm(j));
        }
        let round_trip = &normalized * &pinv * &normalized;
        for i in 0..4 {
            for j in 0..3 {
                assert!(
                    (round_trip[(i, j)] - normalized[(i, j)]).abs() < 1e-9,
                    "A pinv A != A at ({i}, {j})"
                );
            }
        }
    }
}

//! Iterative LSMR solver.
//!
//! Solves the least-squares problem `min ‖M x − b‖` through Golub–Kahan
//! bidiagonalization with two layered QR rotations (Fong & Saunders 2011).
//! The matrix view is the same one the direct backend consumes: the upper
//! triangle of the symmetric free block in column-compressed form;
//! products with `M` and `Mᵀ` coincide and are formed by a symmetric
//! sparse matrix-vector product.
//!
//! The iteration stops once the estimate of `‖Mᵀ r‖` has dropped below
//! `tolerance` relative to its initial value, or fails with
//! [`LinearSolverError::MaxIterationsReached`] when the iteration budget
//! (by default four times the system dimension) is exhausted.

use nalgebra::{DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::CscMatrix;

use crate::solver::{LinearSolver, LinearSolverError};

#[derive(Debug, Clone)]
struct LsmrWorkspace {
    u: DVector<f64>,
    v: DVector<f64>,
    h: DVector<f64>,
    hbar: DVector<f64>,
    av: DVector<f64>,
    x: DVector<f64>,
}

impl Default for LsmrWorkspace {
    fn default() -> Self {
        Self {
            u: DVector::zeros(0),
            v: DVector::zeros(0),
            h: DVector::zeros(0),
            hbar: DVector::zeros(0),
            av: DVector::zeros(0),
            x: DVector::zeros(0),
        }
    }
}

impl LsmrWorkspace {
    fn resize(&mut self, dimension: usize) {
        self.u.resize_vertically_mut(dimension, 0.0);
        self.v.resize_vertically_mut(dimension, 0.0);
        self.h.resize_vertically_mut(dimension, 0.0);
        self.hbar.resize_vertically_mut(dimension, 0.0);
        self.av.resize_vertically_mut(dimension, 0.0);
        self.x.resize_vertically_mut(dimension, 0.0);
    }
}

pub struct LsmrSolver {
    matrix: Option<CscMatrix<f64>>,
    tolerance: f64,
    max_iter: Option<usize>,
    workspace: LsmrWorkspace,
}

impl LsmrSolver {
    pub fn new() -> Self {
        Self {
            matrix: None,
            tolerance: 1e-10,
            max_iter: None,
            workspace: LsmrWorkspace::default(),
        }
    }

    /// Relative tolerance on the `‖Mᵀ r‖` estimate.
    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    /// Iteration budget. Defaults to four times the system dimension.
    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }
}

impl Default for LsmrSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearSolver for LsmrSolver {
    fn analyze_pattern(&mut self, _lhs: &CscMatrix<f64>) -> Result<(), LinearSolverError> {
        // No symbolic preparation is needed; the iteration only ever
        // multiplies by the matrix.
        Ok(())
    }

    fn set_matrix(&mut self, lhs: &CscMatrix<f64>) -> Result<(), LinearSolverError> {
        self.matrix = Some(lhs.clone());
        Ok(())
    }

    fn solve(
        &mut self,
        b: DVectorView<f64>,
        mut out: DVectorViewMut<f64>,
    ) -> Result<(), LinearSolverError> {
        let n = b.len();
        if n == 0 {
            return Ok(());
        }

        let matrix = self.matrix.as_ref().ok_or(LinearSolverError::NotFactorized)?;
        let max_iter = self.max_iter.unwrap_or(4 * n);

        self.workspace.resize(n);
        let LsmrWorkspace {
            u,
            v,
            h,
            hbar,
            av,
            x,
        } = &mut self.workspace;

        u.copy_from(&b);
        let mut beta = u.norm();
        if beta > 0.0 {
            *u /= beta;
        }

        sym_spmv(v, matrix, u);
        let mut alpha = v.norm();
        if alpha > 0.0 {
            *v /= alpha;
        }

        // ‖Mᵀ r‖ at x = 0; a zero right-hand side is already solved.
        let norm_ar0 = alpha * beta;
        if norm_ar0 == 0.0 {
            out.fill(0.0);
            return Ok(());
        }

        let mut zetabar = alpha * beta;
        let mut alphabar = alpha;
        let mut rho = 1.0;
        let mut rhobar = 1.0;
        let mut cbar = 1.0;
        let mut sbar = 0.0;

        h.copy_from(v);
        hbar.fill(0.0);
        x.fill(0.0);

        let mut iter = 0;
        loop {
            if iter >= max_iter {
                return Err(LinearSolverError::MaxIterationsReached { max_iter });
            }
            iter += 1;

            // Continue the bidiagonalization.
            sym_spmv(av, matrix, v);
            u.axpy(1.0, av, -alpha);
            beta = u.norm();

            if beta > 0.0 {
                *u /= beta;
                sym_spmv(av, matrix, u);
                v.axpy(1.0, av, -beta);
                alpha = v.norm();
                if alpha > 0.0 {
                    *v /= alpha;
                }
            }

            // Rotation eliminating the subdiagonal of the bidiagonal factor.
            let rhoold = rho;
            let (c, s, rho_new) = sym_ortho(alphabar, beta);
            rho = rho_new;
            let thetanew = s * alpha;
            alphabar = c * alpha;

            // Second rotation acting on the previous one.
            let rhobarold = rhobar;
            let thetabar = sbar * rho;
            let (cbar_new, sbar_new, rhobar_new) = sym_ortho(cbar * rho, thetanew);
            cbar = cbar_new;
            sbar = sbar_new;
            rhobar = rhobar_new;
            let zeta = cbar * zetabar;
            zetabar = -sbar * zetabar;

            hbar.axpy(1.0, h, -(thetabar * rho / (rhoold * rhobarold)));
            x.axpy(zeta / (rho * rhobar), hbar, 1.0);
            h.axpy(1.0, v, -(thetanew / rho));

            // |ζ̄| estimates ‖Mᵀ r‖ exactly in this recurrence.
            let norm_ar = zetabar.abs();
            if norm_ar <= self.tolerance * norm_ar0 {
                break;
            }
        }

        out.copy_from(x);
        Ok(())
    }
}

/// `y = M x` for the symmetric matrix whose upper triangle is stored
/// column-wise.
fn sym_spmv(y: &mut DVector<f64>, matrix: &CscMatrix<f64>, x: &DVector<f64>) {
    y.fill(0.0);
    let (col_offsets, row_indices, values) = matrix.csc_data();

    for col in 0..matrix.ncols() {
        for k in col_offsets[col]..col_offsets[col + 1] {
            let row = row_indices[k];
            let value = values[k];
            y[row] += value * x[col];
            if row != col {
                y[col] += value * x[row];
            }
        }
    }
}

/// Stable Givens rotation: returns `(c, s, r)` with
/// `[c s; s -c]ᵀ [a; b] = [r; 0]`.
fn sym_ortho(a: f64, b: f64) -> (f64, f64, f64) {
    if b == 0.0 {
        (if a == 0.0 { 1.0 } else { a.signum() }, 0.0, a.abs())
    } else if a == 0.0 {
        (0.0, b.signum(), b.abs())
    } else if b.abs() > a.abs() {
        let tau = a / b;
        let s = b.signum() / (1.0 + tau * tau).sqrt();
        let c = s * tau;
        (c, s, b / s)
    } else {
        let tau = b / a;
        let c = a.signum() / (1.0 + tau * tau).sqrt();
        let s = c * tau;
        (c, s, a / c)
    }
}

//! Direct sparse LDLᵀ solver backed by `faer`.
//!
//! Expects a symmetric positive-definite or quasi-definite matrix with
//! only the upper triangle stored. The symbolic analysis (ordering,
//! fill-in prediction) is computed once from the structural skeleton and
//! reused by every numeric refactorization.

use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::{Ldlt, SymbolicLdlt};
use faer::sparse::{SparseColMat, SymbolicSparseColMat};
use faer::Side;
use nalgebra::{DVectorView, DVectorViewMut};
use nalgebra_sparse::CscMatrix;

use crate::solver::{LinearSolver, LinearSolverError};

pub struct LdltSolver {
    symbolic: Option<SymbolicLdlt<usize>>,
    factorization: Option<Ldlt<usize, f64>>,
}

impl LdltSolver {
    pub fn new() -> Self {
        Self {
            symbolic: None,
            factorization: None,
        }
    }
}

impl Default for LdltSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Reinterprets the upper-triangle CSC storage as a faer column-major
/// sparse matrix. The arrays are valid CSC data by construction of the
/// assembly pattern.
fn to_faer(lhs: &CscMatrix<f64>) -> SparseColMat<usize, f64> {
    let (col_offsets, row_indices, values) = lhs.csc_data();
    unsafe {
        SparseColMat::new(
            SymbolicSparseColMat::new_unchecked(
                lhs.nrows(),
                lhs.ncols(),
                col_offsets.to_vec(),
                None,
                row_indices.to_vec(),
            ),
            values.to_vec(),
        )
    }
}

impl LinearSolver for LdltSolver {
    fn analyze_pattern(&mut self, lhs: &CscMatrix<f64>) -> Result<(), LinearSolverError> {
        if lhs.nrows() == 0 {
            return Ok(());
        }

        let csc = to_faer(lhs);
        let symbolic = SymbolicLdlt::try_new(csc.as_ref().symbolic(), Side::Upper)
            .map_err(|err| LinearSolverError::AnalysisFailed(format!("{err:?}")))?;
        self.symbolic = Some(symbolic);
        Ok(())
    }

    fn set_matrix(&mut self, lhs: &CscMatrix<f64>) -> Result<(), LinearSolverError> {
        if lhs.nrows() == 0 {
            return Ok(());
        }

        let symbolic = self
            .symbolic
            .as_ref()
            .ok_or(LinearSolverError::NotFactorized)?;

        let csc = to_faer(lhs);
        let factorization = Ldlt::try_new_with_symbolic(symbolic.clone(), csc.as_ref(), Side::Upper)
            .map_err(|err| LinearSolverError::SingularMatrix(format!("{err:?}")))?;
        self.factorization = Some(factorization);
        Ok(())
    }

    fn solve(
        &mut self,
        b: DVectorView<f64>,
        mut x: DVectorViewMut<f64>,
    ) -> Result<(), LinearSolverError> {
        let n = b.len();
        if n == 0 {
            return Ok(());
        }

        let factorization = self
            .factorization
            .as_ref()
            .ok_or(LinearSolverError::NotFactorized)?;

        let mut sol = faer::Mat::from_fn(n, 1, |i, _| b[i]);
        factorization.solve_in_place(sol.as_mut());

        for i in 0..n {
            x[i] = sol[(i, 0)];
        }
        Ok(())
    }
}

//! Sparse linear solver interface and backends.

use core::fmt;
use std::error::Error;
use std::str::FromStr;

use nalgebra::{DVectorView, DVectorViewMut};
use nalgebra_sparse::CscMatrix;

pub mod ldlt;
pub mod lsmr;

pub use ldlt::LdltSolver;
pub use lsmr::LsmrSolver;

/// A solver for the sparse symmetric system of the free block.
///
/// The matrix handed to all three operations is column-compressed and
/// stores only the upper triangle. `analyze_pattern` is called exactly
/// once with the structural skeleton; `set_matrix` is called with fresh
/// values in the same structure before every solve.
pub trait LinearSolver: Send {
    /// Called once with the structural skeleton of the matrix.
    fn analyze_pattern(&mut self, lhs: &CscMatrix<f64>) -> Result<(), LinearSolverError>;

    /// Called with fresh values in the structure given to
    /// [`analyze_pattern`](LinearSolver::analyze_pattern).
    fn set_matrix(&mut self, lhs: &CscMatrix<f64>) -> Result<(), LinearSolverError>;

    /// Solves `M x = b` in place of `x`.
    fn solve(&mut self, b: DVectorView<f64>, x: DVectorViewMut<f64>)
        -> Result<(), LinearSolverError>;
}

/// Selects a [`LinearSolver`] backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    /// Direct sparse LDLᵀ factorization.
    Ldlt,
    /// Iterative least-squares solver.
    Lsmr,
}

impl SolverKind {
    pub fn name(&self) -> &'static str {
        match self {
            SolverKind::Ldlt => "ldlt",
            SolverKind::Lsmr => "lsmr",
        }
    }

    pub(crate) fn instantiate(&self) -> Box<dyn LinearSolver> {
        match self {
            SolverKind::Ldlt => Box::new(LdltSolver::new()),
            SolverKind::Lsmr => Box::new(LsmrSolver::new()),
        }
    }
}

impl Default for SolverKind {
    fn default() -> Self {
        SolverKind::Ldlt
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SolverKind {
    type Err = UnknownSolverError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "ldlt" => Ok(SolverKind::Ldlt),
            "lsmr" => Ok(SolverKind::Lsmr),
            _ => Err(UnknownSolverError {
                name: name.to_owned(),
            }),
        }
    }
}

/// Configuration error: a solver was requested by an unrecognized name.
#[derive(Debug, Clone)]
pub struct UnknownSolverError {
    name: String,
}

impl UnknownSolverError {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for UnknownSolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown linear solver `{}`, expected one of `ldlt`, `lsmr`",
            self.name
        )
    }
}

impl Error for UnknownSolverError {}

#[derive(Debug)]
#[non_exhaustive]
pub enum LinearSolverError {
    /// Symbolic analysis of the sparsity pattern failed.
    AnalysisFailed(String),
    /// The matrix is singular or otherwise not factorizable.
    SingularMatrix(String),
    /// `set_matrix` was called before `analyze_pattern`, or `solve` before
    /// `set_matrix`.
    NotFactorized,
    /// An iterative solver exhausted its iteration budget.
    MaxIterationsReached { max_iter: usize },
}

impl fmt::Display for LinearSolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinearSolverError::AnalysisFailed(detail) => {
                write!(f, "symbolic analysis failed: {}", detail)
            }
            LinearSolverError::SingularMatrix(detail) => {
                write!(f, "matrix could not be factorized: {}", detail)
            }
            LinearSolverError::NotFactorized => {
                write!(f, "solver used before the matrix was provided")
            }
            LinearSolverError::MaxIterationsReached { max_iter } => {
                write!(f, "maximum number of iterations ({}) reached", max_iter)
            }
        }
    }
}

impl Error for LinearSolverError {}

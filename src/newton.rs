//! Newton-type driving of the assembled system.

use core::fmt;

use log::debug;

use crate::element::ComputeOptions;
use crate::solver::{LinearSolverError, SolverKind};
use crate::system::System;

/// How element contributions are accumulated each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyMode {
    /// In element input order on the calling thread. Bitwise
    /// reproducible.
    Serial,
    /// On a worker pool over the element range; `num_threads <= 0`
    /// selects the pool size automatically. Reproducible only up to
    /// floating-point reduction order.
    Parallel { num_threads: i32 },
}

/// Options consumed by [`System::new`] and [`System::solve`].
///
/// `linear_solver` takes effect at construction; the remaining fields are
/// read on every solve.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Linear solver backend.
    pub linear_solver: SolverKind,
    /// Load factor applied to the degree-of-freedom targets.
    pub lambda: f64,
    /// Upper bound on the number of Newton iterations.
    pub maxiter: usize,
    /// Residual-norm stopping tolerance.
    pub rtol: f64,
    /// Correction-norm stopping tolerance.
    pub xtol: f64,
    /// Assembly mode used each iteration.
    pub assembly: AssemblyMode,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            linear_solver: SolverKind::Ldlt,
            lambda: 1.0,
            maxiter: 100,
            rtol: 1e-7,
            xtol: 1e-7,
            assembly: AssemblyMode::Serial,
        }
    }
}

/// Why the Newton iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoppingReason {
    NotSolved,
    ResidualBelowTol,
    StepBelowTol,
    IterationLimit,
}

impl StoppingReason {
    pub fn code(&self) -> i32 {
        match self {
            StoppingReason::NotSolved => -1,
            StoppingReason::ResidualBelowTol => 0,
            StoppingReason::StepBelowTol => 1,
            StoppingReason::IterationLimit => 2,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            StoppingReason::NotSolved => "Not solved",
            StoppingReason::ResidualBelowTol => "A solution was found, given rtol",
            StoppingReason::StepBelowTol => "A solution was found, given xtol",
            StoppingReason::IterationLimit => "The iteration limit was reached",
        }
    }
}

impl fmt::Display for StoppingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl System {
    /// Runs the Newton iteration until one of the stopping criteria of
    /// `options` is met.
    ///
    /// Each iteration assembles the system at the current state, compares
    /// the residual `rhs − λ·target` against `rtol`, solves the sparse
    /// linear system and applies the correction to the free degrees of
    /// freedom, comparing its norm against `xtol`. The final residual is
    /// written back to the free degrees of freedom on exit.
    ///
    /// Linear solver failures abort the iteration and are surfaced
    /// unchanged; the stopping reason remains
    /// [`StoppingReason::NotSolved`] in that case.
    pub fn solve(&mut self, options: &SolveOptions) -> Result<StoppingReason, LinearSolverError> {
        self.stopping_reason = StoppingReason::NotSolved;

        let num_free = self.num_free_dofs();
        for i in 0..num_free {
            self.target[i] = options.lambda * self.dofs[i].target();
        }

        let mut iteration = 0;
        let reason = loop {
            if iteration >= options.maxiter {
                break StoppingReason::IterationLimit;
            }

            let compute_options = ComputeOptions { iteration };
            match options.assembly {
                AssemblyMode::Serial => self.assemble(&compute_options),
                AssemblyMode::Parallel { num_threads } => {
                    self.assemble_parallel(&compute_options, num_threads)
                }
            }

            self.residual.copy_from(&self.rhs);
            self.residual -= &self.target;
            let rnorm = self.residual.norm();

            debug!("{:>4} {}", iteration, rnorm);

            if rnorm < options.rtol {
                break StoppingReason::ResidualBelowTol;
            }

            self.solver.set_matrix(&self.lhs)?;
            self.solver
                .solve((&self.residual).into(), (&mut self.x).into())?;

            for i in 0..num_free {
                self.deltas[i] -= self.x[i];
            }

            if self.x.norm() < options.xtol {
                break StoppingReason::StepBelowTol;
            }

            iteration += 1;
        };

        for i in 0..num_free {
            self.dof_residuals[i] = self.residual[i];
        }
        self.stopping_reason = reason;

        Ok(reason)
    }
}

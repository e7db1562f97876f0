//! The element contract.

use nalgebra::{DMatrix, DVector};

use crate::dof::{Dof, DofValues};

/// Options visible to element computations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeOptions {
    /// Zero-based index of the current Newton iteration, recorded by the
    /// driver before each assembly pass.
    pub iteration: usize,
}

/// A local contributor of a small dense matrix/vector pair over a subset of
/// degrees of freedom.
///
/// The order of the list returned by [`dofs`](Element::dofs) must be stable
/// for the lifetime of the element; the system queries it once at
/// construction and caches it. Changing the list afterwards leaves the
/// assembly in an inconsistent state.
///
/// [`compute`](Element::compute) returns the local left-hand side (a `k×k`
/// matrix, where `k` is the number of element degrees of freedom) and the
/// local right-hand side (length `k`). The left-hand side is interpreted
/// symmetrically: only its upper triangle is read during assembly.
///
/// Elements must be `Send + Sync` so that parallel assembly can evaluate
/// them from worker threads.
pub trait Element: Send + Sync {
    /// The degrees of freedom of this element, in local order.
    fn dofs(&self) -> Vec<Dof>;

    /// The local left-hand side and right-hand side at the current state.
    fn compute(&self, state: &DofValues, options: &ComputeOptions) -> (DMatrix<f64>, DVector<f64>);
}

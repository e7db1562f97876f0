//! The global equation system: indexing, sparsity analysis and storage.

use std::collections::{BTreeSet, HashMap, HashSet};

use nalgebra::DVector;
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CscMatrix;

use crate::assembly;
use crate::dof::{Dof, DofValues};
use crate::element::{ComputeOptions, Element};
use crate::newton::{SolveOptions, StoppingReason};
use crate::solver::{LinearSolver, LinearSolverError};

/// Pairing of an element-local degree of freedom position with its global
/// index. Per-element tables are sorted ascending by the global index, so
/// scatter loops can stop at the first fixed entry and visit the stored
/// upper triangle in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DofIndex {
    pub(crate) local: usize,
    pub(crate) global: usize,
}

/// The assembled equation system.
///
/// Construction reconciles the degrees of freedom of all elements into a
/// global ordering with the free block first, derives the sparsity pattern
/// of the left-hand side from the element incidence and sets up the linear
/// solver. The index tables and the structural arrays of the left-hand
/// side are immutable afterwards; assembly only rewrites values.
pub struct System {
    pub(crate) dofs: Vec<Dof>,
    pub(crate) dof_indices: HashMap<Dof, usize>,
    pub(crate) num_free: usize,

    pub(crate) elements: Vec<Box<dyn Element>>,
    pub(crate) index_tables: Vec<Vec<DofIndex>>,

    pub(crate) lhs: CscMatrix<f64>,
    pub(crate) rhs: DVector<f64>,
    pub(crate) x: DVector<f64>,
    pub(crate) target: DVector<f64>,
    pub(crate) residual: DVector<f64>,

    pub(crate) deltas: Vec<f64>,
    pub(crate) dof_residuals: Vec<f64>,

    pub(crate) stopping_reason: StoppingReason,
    pub(crate) solver: Box<dyn LinearSolver>,
}

impl System {
    /// Builds the system from the given elements.
    ///
    /// The element degree-of-freedom lists are queried exactly once and
    /// cached; the fixed flags are snapshotted at this point. The linear
    /// solver selected by `options.linear_solver` receives the structural
    /// skeleton through `analyze_pattern` before this function returns.
    pub fn new(
        elements: Vec<Box<dyn Element>>,
        options: &SolveOptions,
    ) -> Result<Self, LinearSolverError> {
        Self::with_solver(elements, options.linear_solver.instantiate())
    }

    /// Builds the system around a caller-supplied linear solver instead of
    /// one of the built-in backends.
    pub fn with_solver(
        elements: Vec<Box<dyn Element>>,
        mut solver: Box<dyn LinearSolver>,
    ) -> Result<Self, LinearSolverError> {
        // Query each dof list once; they may be non-trivial to compute.
        let element_dofs: Vec<Vec<Dof>> = elements.iter().map(|element| element.dofs()).collect();

        // Collect unique dofs in discovery order, free block first.
        let mut seen = HashSet::new();
        let mut free_dofs = Vec::new();
        let mut fixed_dofs = Vec::new();

        for dofs in &element_dofs {
            for dof in dofs {
                if !seen.insert(*dof) {
                    continue;
                }

                if dof.is_fixed() {
                    fixed_dofs.push(*dof);
                } else {
                    free_dofs.push(*dof);
                }
            }
        }

        let num_free = free_dofs.len();

        let mut dofs = free_dofs;
        dofs.extend(fixed_dofs);

        let dof_indices: HashMap<Dof, usize> = dofs
            .iter()
            .enumerate()
            .map(|(index, dof)| (*dof, index))
            .collect();

        // Per-element index tables, sorted by global index.
        let index_tables: Vec<Vec<DofIndex>> = element_dofs
            .iter()
            .map(|dofs| {
                let mut table: Vec<DofIndex> = dofs
                    .iter()
                    .enumerate()
                    .map(|(local, dof)| DofIndex {
                        local,
                        global: dof_indices[dof],
                    })
                    .collect();
                table.sort_unstable_by_key(|index| index.global);
                table
            })
            .collect();

        let lhs = build_lhs_skeleton(&index_tables, num_free);

        solver.analyze_pattern(&lhs)?;

        let num_dofs = dofs.len();

        Ok(Self {
            dofs,
            dof_indices,
            num_free,
            elements,
            index_tables,
            lhs,
            rhs: DVector::zeros(num_free),
            x: DVector::zeros(num_free),
            target: DVector::zeros(num_free),
            residual: DVector::zeros(num_free),
            deltas: vec![0.0; num_dofs],
            dof_residuals: vec![0.0; num_dofs],
            stopping_reason: StoppingReason::NotSolved,
            solver,
        })
    }

    /// The global degree-of-freedom vector, free block first.
    pub fn dofs(&self) -> &[Dof] {
        &self.dofs
    }

    pub fn num_dofs(&self) -> usize {
        self.dofs.len()
    }

    pub fn num_free_dofs(&self) -> usize {
        self.num_free
    }

    pub fn num_fixed_dofs(&self) -> usize {
        self.dofs.len() - self.num_free
    }

    /// The global index of the given degree of freedom.
    pub fn dof_index(&self, dof: &Dof) -> Option<usize> {
        self.dof_indices.get(dof).copied()
    }

    /// The left-hand side of the free block: column-compressed, upper
    /// triangle only.
    pub fn lhs(&self) -> &CscMatrix<f64> {
        &self.lhs
    }

    /// The assembled right-hand side over the free degrees of freedom.
    pub fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }

    /// The accumulated correction of the given degree of freedom.
    pub fn delta(&self, dof: &Dof) -> Option<f64> {
        self.dof_index(dof).map(|index| self.deltas[index])
    }

    /// The residual written back to the degree of freedom by the last
    /// solve.
    pub fn residual(&self, dof: &Dof) -> Option<f64> {
        self.dof_index(dof).map(|index| self.dof_residuals[index])
    }

    /// A read-only view of the current unknown values, as handed to
    /// element computations.
    pub fn dof_values(&self) -> DofValues<'_> {
        DofValues::new(&self.dofs, &self.dof_indices, &self.deltas)
    }

    pub fn stopping_reason(&self) -> StoppingReason {
        self.stopping_reason
    }

    pub fn stopping_reason_message(&self) -> &'static str {
        self.stopping_reason.message()
    }

    /// Assembles the left-hand side and right-hand side in element input
    /// order on the calling thread.
    ///
    /// Value slots and the right-hand side are zeroed in place first; the
    /// structure is preserved.
    pub fn assemble(&mut self, options: &ComputeOptions) {
        let state = DofValues::new(&self.dofs, &self.dof_indices, &self.deltas);
        assembly::assemble_serial(
            &self.elements,
            &self.index_tables,
            self.num_free,
            &state,
            options,
            &mut self.lhs,
            &mut self.rhs,
        );
    }

    /// Assembles with a worker pool over the element range.
    ///
    /// `num_threads <= 0` uses the global pool. Workers accumulate into
    /// thread-local value arrays aliasing the shared structure, which are
    /// joined by pointwise addition afterwards; the floating-point
    /// reduction order is unspecified, so results may differ from
    /// [`assemble`](System::assemble) by rounding. Use the serial variant
    /// when bitwise reproducibility matters.
    pub fn assemble_parallel(&mut self, options: &ComputeOptions, num_threads: i32) {
        let state = DofValues::new(&self.dofs, &self.dof_indices, &self.deltas);
        assembly::assemble_parallel(
            &self.elements,
            &self.index_tables,
            self.num_free,
            &state,
            options,
            &mut self.lhs,
            &mut self.rhs,
            num_threads,
        );
    }
}

/// Derives the column-wise nonzero structure of the free block from the
/// element index tables and materializes it as a zero-valued CSC matrix.
///
/// For every element-local pair whose global indices are both free, the
/// normalized `(row <= col)` coordinate becomes a structural entry. The
/// ordered set stores each entry exactly once, keyed by `(col, row)` so
/// that a single pass emits valid column-major offsets.
fn build_lhs_skeleton(index_tables: &[Vec<DofIndex>], num_free: usize) -> CscMatrix<f64> {
    let mut entries = BTreeSet::new();

    for table in index_tables {
        for (position, row_index) in table.iter().enumerate() {
            if row_index.global >= num_free {
                break;
            }

            for col_index in &table[position..] {
                if col_index.global >= num_free {
                    break;
                }

                entries.insert((col_index.global, row_index.global));
            }
        }
    }

    let mut col_offsets = Vec::with_capacity(num_free + 1);
    let mut row_indices = Vec::with_capacity(entries.len());

    col_offsets.push(0);
    for (col, row) in entries {
        while col + 1 > col_offsets.len() {
            // A new column begins; the while loop also fills the offsets
            // of consecutive empty columns.
            col_offsets.push(row_indices.len());
        }
        row_indices.push(row);
    }

    while col_offsets.len() < num_free + 1 {
        col_offsets.push(row_indices.len());
    }

    let nnz = row_indices.len();
    let pattern =
        SparsityPattern::try_from_offsets_and_indices(num_free, num_free, col_offsets, row_indices)
            .expect("pattern data must be valid by construction");
    CscMatrix::try_from_pattern_and_values(pattern, vec![0.0; nnz])
        .expect("value array length matches the pattern")
}

//! Accumulation of element contributions into the global system.

use std::cell::RefCell;

use itertools::izip;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use thread_local::ThreadLocal;

use crate::dof::DofValues;
use crate::element::{ComputeOptions, Element};
use crate::system::DofIndex;

/// Per-worker scratch aliasing the structure of the shared left-hand side
/// but owning fresh value storage.
struct Accumulator {
    lhs_values: Vec<f64>,
    rhs_values: DVector<f64>,
}

impl Accumulator {
    fn zeros(nnz: usize, num_free: usize) -> Self {
        Self {
            lhs_values: vec![0.0; nnz],
            rhs_values: DVector::zeros(num_free),
        }
    }
}

pub(crate) fn assemble_serial(
    elements: &[Box<dyn Element>],
    index_tables: &[Vec<DofIndex>],
    num_free: usize,
    state: &DofValues,
    options: &ComputeOptions,
    lhs: &mut CscMatrix<f64>,
    rhs: &mut DVector<f64>,
) {
    let (col_offsets, row_indices, lhs_values) = lhs.csc_data_mut();
    lhs_values.fill(0.0);
    rhs.fill(0.0);

    for (element, table) in izip!(elements, index_tables) {
        let (local_lhs, local_rhs) = element.compute(state, options);
        add_element(
            table,
            num_free,
            &local_lhs,
            &local_rhs,
            col_offsets,
            row_indices,
            lhs_values,
            rhs,
        );
    }
}

/// Parallel counterpart of [`assemble_serial`].
///
/// Element computations run on a worker pool; every worker lazily creates
/// a thread-local [`Accumulator`] and scatters into it, so the shared
/// arrays are never written concurrently. The accumulators are joined by
/// pointwise addition after the parallel region. The join order depends on
/// thread scheduling, so results are reproducible only up to
/// floating-point reduction order.
#[allow(clippy::too_many_arguments)]
pub(crate) fn assemble_parallel(
    elements: &[Box<dyn Element>],
    index_tables: &[Vec<DofIndex>],
    num_free: usize,
    state: &DofValues,
    options: &ComputeOptions,
    lhs: &mut CscMatrix<f64>,
    rhs: &mut DVector<f64>,
    num_threads: i32,
) {
    let (col_offsets, row_indices, lhs_values) = lhs.csc_data_mut();
    lhs_values.fill(0.0);
    rhs.fill(0.0);

    let nnz = lhs_values.len();
    let scratch: ThreadLocal<RefCell<Accumulator>> = ThreadLocal::new();

    let process = |i: usize| {
        let cell = scratch.get_or(|| RefCell::new(Accumulator::zeros(nnz, num_free)));
        let mut accumulator = cell.borrow_mut();

        let (local_lhs, local_rhs) = elements[i].compute(state, options);

        let Accumulator {
            lhs_values,
            rhs_values,
        } = &mut *accumulator;
        add_element(
            &index_tables[i],
            num_free,
            &local_lhs,
            &local_rhs,
            col_offsets,
            row_indices,
            lhs_values,
            rhs_values,
        );
    };

    if num_threads > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads as usize)
            .build()
            .expect("worker pool construction must succeed");
        pool.install(|| (0..elements.len()).into_par_iter().for_each(process));
    } else {
        (0..elements.len()).into_par_iter().for_each(process);
    }

    for cell in scratch.into_iter() {
        let accumulator = cell.into_inner();
        for (value, local) in lhs_values.iter_mut().zip(&accumulator.lhs_values) {
            *value += local;
        }
        *rhs += &accumulator.rhs_values;
    }
}

/// Scatters one element contribution through its sorted index table.
///
/// The table is sorted ascending by global index, so both loops stop at
/// the first entry outside the free block. Only the upper triangle of the
/// local left-hand side is read.
#[allow(clippy::too_many_arguments)]
fn add_element(
    table: &[DofIndex],
    num_free: usize,
    local_lhs: &DMatrix<f64>,
    local_rhs: &DVector<f64>,
    col_offsets: &[usize],
    row_indices: &[usize],
    lhs_values: &mut [f64],
    rhs: &mut DVector<f64>,
) {
    for (position, row_index) in table.iter().enumerate() {
        if row_index.global >= num_free {
            break;
        }

        rhs[row_index.global] += local_rhs[row_index.local];

        for col_index in &table[position..] {
            if col_index.global >= num_free {
                break;
            }

            add_to_column(
                col_offsets,
                row_indices,
                lhs_values,
                row_index.global,
                col_index.global,
                local_lhs[(row_index.local, col_index.local)],
            );
        }
    }
}

fn add_to_column(
    col_offsets: &[usize],
    row_indices: &[usize],
    values: &mut [f64],
    row: usize,
    col: usize,
    value: f64,
) {
    let column = col_offsets[col]..col_offsets[col + 1];
    let position = row_indices[column.clone()]
        .binary_search(&row)
        .expect("entry is structural by construction of the pattern");
    values[column.start + position] += value;
}

use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};

use gleipnir::element::{ComputeOptions, Element};
use gleipnir::newton::SolveOptions;
use gleipnir::system::System;

use super::{fixed_dof, free_dof, ConstantElement};

/// Splitmix-style generator; good enough for reproducible test data.
struct Rng(u64);

impl Rng {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn next_usize(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}

#[test]
fn two_elements_sharing_a_dof() {
    let a = free_dof(0, 0.0, 0.0);
    let b = free_dof(1, 0.0, 0.0);

    let e1 = ConstantElement::new(
        vec![a, b],
        DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]),
        DVector::from_column_slice(&[1.0, 2.0]),
    );
    let e2 = ConstantElement::new(
        vec![b],
        DMatrix::from_element(1, 1, 4.0),
        DVector::from_element(1, 5.0),
    );

    let elements: Vec<Box<dyn Element>> = vec![Box::new(e1), Box::new(e2)];
    let mut system = System::new(elements, &SolveOptions::default()).unwrap();
    system.assemble(&ComputeOptions::default());

    assert_eq!(system.lhs().nnz(), 3);

    // Stored upper triangle of the assembled left-hand side.
    let expected = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 0.0, 7.0]);
    assert_matrix_eq!(DMatrix::from(system.lhs()), expected, comp = abs, tol = 1e-14);

    let expected_rhs = DVector::from_column_slice(&[1.0, 7.0]);
    assert_matrix_eq!(system.rhs().clone(), expected_rhs, comp = abs, tol = 1e-14);
}

#[test]
fn fixed_dof_rows_and_columns_are_skipped() {
    let a = free_dof(0, 0.0, 0.0);
    let m = fixed_dof(1, 0.0);
    let b = free_dof(2, 0.0, 0.0);

    let element = ConstantElement::new(
        vec![a, m, b],
        DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 3.0, 2.0, 4.0, 5.0, 3.0, 5.0, 6.0]),
        DVector::from_column_slice(&[7.0, 8.0, 9.0]),
    );

    let elements: Vec<Box<dyn Element>> = vec![Box::new(element)];
    let mut system = System::new(elements, &SolveOptions::default()).unwrap();
    system.assemble(&ComputeOptions::default());

    let expected = DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 0.0, 6.0]);
    assert_matrix_eq!(DMatrix::from(system.lhs()), expected, comp = abs, tol = 1e-14);

    // The fixed row of the local vector does not reach the global one.
    let expected_rhs = DVector::from_column_slice(&[7.0, 9.0]);
    assert_matrix_eq!(system.rhs().clone(), expected_rhs, comp = abs, tol = 1e-14);
}

#[test]
fn reassembly_is_idempotent() {
    let mut system = random_system(50, 200);

    system.assemble(&ComputeOptions::default());
    let first_values = system.lhs().values().to_vec();
    let first_rhs = system.rhs().clone();

    for _ in 0..3 {
        system.assemble(&ComputeOptions::default());
        assert_eq!(system.lhs().values(), first_values.as_slice());
        assert_eq!(system.rhs(), &first_rhs);
    }
}

#[test]
fn serial_and_parallel_assembly_agree() {
    let mut system = random_system(50, 200);
    assert_eq!(system.num_free_dofs(), 200);

    system.assemble(&ComputeOptions::default());
    let serial_values = DVector::from_column_slice(system.lhs().values());
    let serial_rhs = system.rhs().clone();

    for num_threads in [0, 2, 4] {
        system.assemble_parallel(&ComputeOptions::default(), num_threads);
        let parallel_values = DVector::from_column_slice(system.lhs().values());

        let values_diff = (&parallel_values - &serial_values).norm() / serial_values.norm();
        let rhs_diff = (system.rhs() - &serial_rhs).norm() / serial_rhs.norm();

        assert!(values_diff < 1e-12, "lhs mismatch: {}", values_diff);
        assert!(rhs_diff < 1e-12, "rhs mismatch: {}", rhs_diff);
    }
}

#[test]
fn parallel_assembly_zeroes_previous_values() {
    let mut system = random_system(10, 40);

    system.assemble_parallel(&ComputeOptions::default(), 2);
    let first_values = system.lhs().values().to_vec();

    system.assemble_parallel(&ComputeOptions::default(), 2);
    let second_values = DVector::from_column_slice(system.lhs().values());
    let diff = (&second_values - DVector::from_column_slice(&first_values)).norm()
        / second_values.norm();
    assert!(diff < 1e-12);
}

/// A random symmetric problem: `num_elements` elements over
/// `num_dofs` free degrees of freedom, every one of which is covered.
fn random_system(num_elements: usize, num_dofs: usize) -> System {
    let per_element = num_dofs / num_elements;
    let mut rng = Rng(0x9e3779b97f4a7c15);

    let elements: Vec<Box<dyn Element>> = (0..num_elements)
        .map(|i| {
            // A contiguous run guarantees coverage of all unknowns; the
            // extra picks create overlap between elements.
            let mut objects: Vec<u64> =
                (0..per_element).map(|j| (i * per_element + j) as u64).collect();
            for _ in 0..3 {
                let pick = rng.next_usize(num_dofs) as u64;
                if !objects.contains(&pick) {
                    objects.push(pick);
                }
            }

            let k = objects.len();
            let dofs = objects
                .iter()
                .map(|&object| free_dof(object, 0.0, 0.0))
                .collect();

            let raw = DMatrix::from_fn(k, k, |_, _| rng.next_f64() - 0.5);
            let lhs = 0.5 * (&raw + raw.transpose());
            let rhs = DVector::from_fn(k, |_, _| rng.next_f64() - 0.5);

            Box::new(ConstantElement::new(dofs, lhs, rhs)) as Box<dyn Element>
        })
        .collect();

    System::new(elements, &SolveOptions::default()).unwrap()
}

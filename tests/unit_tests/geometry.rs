use nalgebra::{DMatrix, DVector, Vector3};

use gleipnir::element::Element;
use gleipnir::geometry::{Axis, Node, Point};
use gleipnir::newton::{SolveOptions, StoppingReason};
use gleipnir::system::System;

use super::LinearElement;

#[test]
fn node_dofs_have_stable_identities() {
    let node = Node::new(1.0, 2.0, 3.0);

    assert_eq!(node.dof(Axis::X), node.dof(Axis::X));
    assert_ne!(node.dof(Axis::X), node.dof(Axis::Y));

    let other = Node::new(1.0, 2.0, 3.0);
    assert_ne!(node.dof(Axis::X), other.dof(Axis::X));
}

#[test]
fn node_displacements_round_trip() {
    let mut node = Node::new(1.0, 1.0, 1.0);
    assert_eq!(node.displacements(), Vector3::zeros());

    node.set_displacements(Vector3::new(0.5, 0.0, -0.5));
    assert_eq!(node.act_location(), Vector3::new(1.5, 1.0, 0.5));
    assert_eq!(node.displacements(), Vector3::new(0.5, 0.0, -0.5));

    // Dof values follow the actual location.
    assert_eq!(node.dof(Axis::X).value(), 1.5);
    assert_eq!(node.dof(Axis::Z).value(), 0.5);
}

#[test]
fn fixed_axes_produce_fixed_dofs() {
    let mut node = Node::new(0.0, 0.0, 0.0);
    node.fix(Axis::Y);
    node.set_target(Axis::X, 2.0);

    assert!(!node.dof(Axis::X).is_fixed());
    assert!(node.dof(Axis::Y).is_fixed());
    assert_eq!(node.dof(Axis::X).target(), 2.0);

    let mut point = Point::new(1.0, 2.0, 3.0);
    point.fix_all();
    for axis in Axis::ALL {
        assert!(point.dof(axis).is_fixed());
    }
    assert_eq!(point.dof(Axis::Z).value(), 3.0);
}

#[test]
fn node_dofs_drive_a_small_system() {
    let mut node = Node::new(0.0, 0.0, 0.0);
    node.set_target(Axis::X, 1.0);
    let dof = node.dof(Axis::X);

    let element = LinearElement::new(
        vec![dof],
        DMatrix::from_element(1, 1, 2.0),
        DVector::from_element(1, 0.0),
    );

    let options = SolveOptions::default();
    let elements: Vec<Box<dyn Element>> = vec![Box::new(element)];
    let mut system = System::new(elements, &options).unwrap();
    let reason = system.solve(&options).unwrap();

    // 2δ reaches the target of 1.
    assert_eq!(reason, StoppingReason::ResidualBelowTol);
    assert!((system.delta(&dof).unwrap() - 0.5).abs() < 1e-10);

    node.set_displacements(Vector3::new(system.delta(&dof).unwrap(), 0.0, 0.0));
    assert!((node.act_location().x - 0.5).abs() < 1e-10);
}

//! Geometric containers of degrees of freedom.
//!
//! [`Point`] and [`Node`] are conveniences for clients: they allocate a
//! process-unique object id and mint per-axis [`Dof`]s from it. The solver
//! core itself never depends on them; elements are free to construct their
//! degrees of freedom in any other way.

use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra::Vector3;

use crate::dof::{Dof, DofId};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(0);

fn next_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Coordinate axis, doubling as the channel tag of the associated unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

/// A point with a single location.
#[derive(Debug, Clone)]
pub struct Point {
    object: u64,
    location: Vector3<f64>,
    target: Vector3<f64>,
    fixed: [bool; 3],
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            object: next_object_id(),
            location: Vector3::new(x, y, z),
            target: Vector3::zeros(),
            fixed: [false; 3],
        }
    }

    pub fn location(&self) -> Vector3<f64> {
        self.location
    }

    pub fn set_location(&mut self, value: Vector3<f64>) {
        self.location = value;
    }

    /// Marks the unknown of the given axis as a boundary condition.
    pub fn fix(&mut self, axis: Axis) {
        self.fixed[axis as usize] = true;
    }

    pub fn fix_all(&mut self) {
        self.fixed = [true; 3];
    }

    /// Sets the target of the assembled equation component for the axis.
    pub fn set_target(&mut self, axis: Axis, value: f64) {
        self.target[axis as usize] = value;
    }

    pub fn dof(&self, axis: Axis) -> Dof {
        let id = DofId::new(self.object, axis as u32);
        let i = axis as usize;
        if self.fixed[i] {
            Dof::fixed(id, self.location[i])
        } else {
            Dof::free(id, self.location[i], self.target[i])
        }
    }

    pub fn dofs(&self) -> [Dof; 3] {
        [self.dof(Axis::X), self.dof(Axis::Y), self.dof(Axis::Z)]
    }
}

/// A node with separate reference and actual locations.
#[derive(Debug, Clone)]
pub struct Node {
    object: u64,
    ref_location: Vector3<f64>,
    act_location: Vector3<f64>,
    target: Vector3<f64>,
    fixed: [bool; 3],
}

impl Node {
    /// Creates a node whose actual location coincides with its reference
    /// location.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        let location = Vector3::new(x, y, z);
        Self {
            object: next_object_id(),
            ref_location: location,
            act_location: location,
            target: Vector3::zeros(),
            fixed: [false; 3],
        }
    }

    pub fn ref_location(&self) -> Vector3<f64> {
        self.ref_location
    }

    pub fn set_ref_location(&mut self, value: Vector3<f64>) {
        self.ref_location = value;
    }

    pub fn act_location(&self) -> Vector3<f64> {
        self.act_location
    }

    pub fn set_act_location(&mut self, value: Vector3<f64>) {
        self.act_location = value;
    }

    pub fn displacements(&self) -> Vector3<f64> {
        self.act_location - self.ref_location
    }

    pub fn set_displacements(&mut self, value: Vector3<f64>) {
        self.act_location = self.ref_location + value;
    }

    /// Marks the unknown of the given axis as a boundary condition.
    pub fn fix(&mut self, axis: Axis) {
        self.fixed[axis as usize] = true;
    }

    pub fn fix_all(&mut self) {
        self.fixed = [true; 3];
    }

    /// Sets the target of the assembled equation component for the axis.
    pub fn set_target(&mut self, axis: Axis, value: f64) {
        self.target[axis as usize] = value;
    }

    pub fn dof(&self, axis: Axis) -> Dof {
        let id = DofId::new(self.object, axis as u32);
        let i = axis as usize;
        if self.fixed[i] {
            Dof::fixed(id, self.act_location[i])
        } else {
            Dof::free(id, self.act_location[i], self.target[i])
        }
    }

    pub fn dofs(&self) -> [Dof; 3] {
        [self.dof(Axis::X), self.dof(Axis::Y), self.dof(Axis::Z)]
    }
}

//! Degrees of freedom and their identity.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Value-based identity of a scalar unknown.
///
/// The identity combines the id of the owning object (a node, a point, or
/// anything else a client uses to mint unknowns) with a channel tag that
/// distinguishes the unknowns of one object (for instance the three
/// coordinate axes). Two elements that construct the same logical unknown
/// independently end up with structurally equal identities, which is what
/// allows the global assembly to merge them into a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DofId {
    object: u64,
    channel: u32,
}

impl DofId {
    pub fn new(object: u64, channel: u32) -> Self {
        Self { object, channel }
    }

    pub fn object(&self) -> u64 {
        self.object
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }
}

/// A scalar degree of freedom.
///
/// Carries the identity of the unknown, its reference value, the target
/// value its equation component should reach, and whether it is fixed.
/// Fixed degrees of freedom act as boundary conditions: they take part in
/// element computations but are excluded from the linear solve.
///
/// Equality and hashing are by [`DofId`] alone, so a `Dof` can be used as a
/// lookup key regardless of the numeric state it was created with.
#[derive(Debug, Clone, Copy)]
pub struct Dof {
    id: DofId,
    value: f64,
    target: f64,
    fixed: bool,
}

impl Dof {
    /// A free degree of freedom participating in the solve.
    pub fn free(id: DofId, value: f64, target: f64) -> Self {
        Self {
            id,
            value,
            target,
            fixed: false,
        }
    }

    /// A fixed degree of freedom whose value never changes.
    pub fn fixed(id: DofId, value: f64) -> Self {
        Self {
            id,
            value,
            target: 0.0,
            fixed: true,
        }
    }

    pub fn id(&self) -> DofId {
        self.id
    }

    /// The reference value of the unknown.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// The target for the assembled equation component of this unknown.
    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }
}

impl PartialEq for Dof {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Dof {}

impl Hash for Dof {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Read-only view of the unknown values currently held by a system.
///
/// Elements receive this view on every compute call and look up the state
/// of their degrees of freedom through it. The current value of an unknown
/// is its reference value plus the accumulated correction.
#[derive(Debug, Clone, Copy)]
pub struct DofValues<'a> {
    dofs: &'a [Dof],
    indices: &'a HashMap<Dof, usize>,
    deltas: &'a [f64],
}

impl<'a> DofValues<'a> {
    pub(crate) fn new(dofs: &'a [Dof], indices: &'a HashMap<Dof, usize>, deltas: &'a [f64]) -> Self {
        Self {
            dofs,
            indices,
            deltas,
        }
    }

    /// The current value of the unknown.
    ///
    /// # Panics
    ///
    /// Panics if the degree of freedom is not part of the system.
    pub fn value(&self, dof: &Dof) -> f64 {
        let index = self.indices[dof];
        self.dofs[index].value() + self.deltas[index]
    }

    /// The accumulated correction of the unknown.
    ///
    /// # Panics
    ///
    /// Panics if the degree of freedom is not part of the system.
    pub fn delta(&self, dof: &Dof) -> f64 {
        self.deltas[self.indices[dof]]
    }
}

//! Assembly and Newton-type solution of sparse nonlinear equation systems
//! built from element contributions.
//!
//! Client code supplies [`element::Element`] implementations, each owning a
//! set of scalar unknowns ([`dof::Dof`]) and producing a small dense
//! matrix/vector pair. [`system::System`] reconciles the unknowns into a
//! global ordering, derives the sparsity pattern of the global left-hand
//! side and drives a Newton iteration around a pluggable sparse solver.

pub mod dof;
pub mod element;
pub mod geometry;
pub mod newton;
pub mod solver;
pub mod system;

mod assembly;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

use thiserror::Error;

use crate::constraints::ConstraintHandle;
use crate::dynamics::BodyHandle;

/// Errors raised for structurally invalid input.
///
/// Stepping the simulation never fails; these only come out of constructors
/// and the world's registration calls.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    #[error("invalid world configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid convex hull: {0}")]
    InvalidConvex(String),
    #[error("invalid heightfield: {0}")]
    InvalidHeightfield(String),
    #[error("invalid trimesh: {0}")]
    InvalidTrimesh(String),
    #[error("unknown body {0:?}")]
    UnknownBody(BodyHandle),
    #[error("unknown constraint {0:?}")]
    UnknownConstraint(ConstraintHandle),
}

pub type Result<T> = std::result::Result<T, PhysicsError>;

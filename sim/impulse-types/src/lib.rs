//! Core types for the impulse rigid-body simulation.
//!
//! This crate provides the plain data shared by the simulation core and by
//! whatever scene owns it:
//!
//! - [`BodyId`], [`ShapeId`], [`SinkId`] - Stable handles into scene arenas
//! - [`Pose`] - Position and orientation of a body
//! - [`Material`] - Elasticity and friction coefficients
//! - [`MassProperties`] - Unit-mass inertia and center of mass of a shape
//! - [`SimulationConfig`] - Timestep, gravity, solver settings
//!
//! # Design Philosophy
//!
//! These types are **pure data**. They have no integration, no collision,
//! no contact response. Validation lives here so that malformed scenes are
//! rejected with a [`SimError`] when they are built, not halfway through a
//! tick.
//!
//! # Coordinate System
//!
//! - X: right
//! - Y: up
//! - Z: towards the viewer
//! - Right-handed
//!
//! # Example
//!
//! ```
//! use impulse_types::{Gravity, SimulationConfig};
//!
//! let config = SimulationConfig::realtime().gravity(Gravity::earth());
//! assert!(config.validate().is_ok());
//! assert!(config.gravity.acceleration.y < 0.0);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod config;
mod dynamics;
mod error;

pub use body::{BodyId, MassProperties, Material, Pose, ShapeId, SinkId};
pub use config::{CombineRule, SimulationConfig, SolverConfig, validate_timestep};
pub use dynamics::Gravity;
pub use error::SimError;

// Re-export math types for convenience
pub use nalgebra::{Matrix3, Matrix4, Point3, UnitQuaternion, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;

//! Real-time rigid-body physics core.
//!
//! This crate advances a set of rigid spheres through time: torque-free
//! integration with precession, swept collision detection that cannot tunnel,
//! and impulse resolution applied in time-of-impact order. It builds on
//! [`impulse_types`] for identifiers, poses, materials and configuration.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Stepper                               │
//! │  gravity → broad phase → narrow phase → sort → resolve      │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         World                                │
//! │  Contains: shapes, bodies, transform sinks, time            │
//! │  Provides: registration, gravity, advancement, diagnostics   │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Body                                │
//! │  Semi-implicit update, gyroscopic term, impulse application  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use impulse_core::{BodyDesc, Shape, Stepper, World};
//! use impulse_types::{Point3, SimulationConfig};
//!
//! let mut world = World::new(SimulationConfig::default());
//! let ball = world.add_shape(Shape::sphere(0.5)).unwrap();
//! let ground = world.add_shape(Shape::sphere(1000.0)).unwrap();
//!
//! world
//!     .add_body(BodyDesc::new(ground, Point3::new(0.0, -1000.0, 0.0)).fixed())
//!     .unwrap();
//! let id = world
//!     .add_body(BodyDesc::new(ball, Point3::new(0.0, 5.0, 0.0)).with_name("ball"))
//!     .unwrap();
//!
//! let mut stepper = Stepper::new();
//! let results = stepper.run_for(&mut world, 1.0).unwrap();
//! assert_eq!(results.len(), 60);
//!
//! let ball = world.body(id).unwrap();
//! assert!(ball.pose.position.y < 5.0);
//! ```
//!
//! # Continuous Collision
//!
//! Every contact carries the fraction of the tick at which the two spheres
//! first touch. The stepper advances all bodies to each contact in turn,
//! resolves it, and integrates the remainder of the tick afterwards, so a fast
//! body meets whatever lies along its path.
//!
//! ```
//! use impulse_core::{BodyDesc, Shape, Stepper, StepperConfig, World};
//! use impulse_types::{Point3, SimulationConfig, Vector3};
//!
//! let mut world = World::new(SimulationConfig::default().zero_gravity());
//! let sphere = world.add_shape(Shape::sphere(0.5)).unwrap();
//! let wall = world
//!     .add_body(BodyDesc::new(sphere, Point3::new(5.0, 0.0, 0.0)).fixed())
//!     .unwrap();
//! let bullet = world
//!     .add_body(
//!         BodyDesc::new(sphere, Point3::origin())
//!             .with_linear_velocity(Vector3::new(600.0, 0.0, 0.0)),
//!     )
//!     .unwrap();
//!
//! let mut stepper = Stepper::with_config(StepperConfig::zero_gravity());
//! let result = stepper.step(&mut world).unwrap();
//!
//! assert_eq!(result.contacts, 1);
//! assert!(world.body(bullet).unwrap().linear_velocity.x < 0.0);
//! assert!(world.body(wall).unwrap().is_static());
//! ```
//!
//! # Broad Phase
//!
//! Pair finding works on swept bounds and can be used on its own:
//!
//! ```
//! use impulse_core::Bounds;
//! use impulse_core::broad_phase::{BroadPhase, CollisionPair, SweepAndPrune};
//! use impulse_types::{Point3, Vector3};
//!
//! let half = Vector3::new(0.5, 0.5, 0.5);
//! let bounds = [
//!     Bounds::from_center(Point3::new(0.0, 0.0, 0.0), half),
//!     Bounds::from_center(Point3::new(0.8, 0.0, 0.0), half),
//!     Bounds::from_center(Point3::new(9.0, 0.0, 0.0), half),
//! ];
//!
//! let mut sap = SweepAndPrune::new();
//! let mut pairs = Vec::new();
//! sap.find_pairs(&bounds, &mut pairs);
//! assert_eq!(pairs, vec![CollisionPair::new(0, 1)]);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
)]

pub mod broad_phase;
pub mod contact;
pub mod math;
pub mod narrow_phase;
pub mod presentation;

mod body;
mod bounds;
mod shape;
mod stepper;
mod world;

pub use body::{Body, BodyDesc, MAX_ANGULAR_SPEED};
pub use bounds::Bounds;
pub use broad_phase::{
    Axis, BroadPhase, BroadPhaseAlgorithm, BroadPhaseConfig, BroadPhaseDetector, BruteForce,
    CollisionPair, SweepAndPrune,
};
pub use contact::{Contact, resolve, sort_contacts};
pub use narrow_phase::{MovingSphere, SweptHit};
pub use presentation::{TransformRecorder, TransformSink};
pub use shape::{Shape, ShapeType, Sphere};
pub use stepper::{StepResult, Stepper, StepperConfig};
pub use world::World;

// Re-export key types from impulse-types for convenience
pub use impulse_types::{
    BodyId, CombineRule, Gravity, MassProperties, Material, Pose, ShapeId, SimError,
    SimulationConfig, SinkId, SolverConfig,
};

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::cast_precision_loss
)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_ball_rests_on_ground() {
        let mut world = World::new(SimulationConfig::default());
        let ball = world.add_shape(Shape::sphere(0.5)).unwrap();
        let ground = world.add_shape(Shape::sphere(1000.0)).unwrap();

        world
            .add_body(BodyDesc::new(ground, Point3::new(0.0, -1000.0, 0.0)).fixed())
            .unwrap();
        let id = world
            .add_body(
                BodyDesc::new(ball, Point3::new(0.0, 2.0, 0.0))
                    .with_material(Material::new(0.0, 0.5)),
            )
            .unwrap();

        let mut stepper = Stepper::new();
        stepper.run_for(&mut world, 3.0).unwrap();

        let body = world.body(id).unwrap();
        // Never sinks meaningfully below the surface.
        assert!(body.pose.position.y > 0.4, "y = {}", body.pose.position.y);
        assert!(body.pose.position.y < 2.0);
        assert!(body.is_finite());
    }

    #[test]
    fn test_momentum_conservation() {
        let mut world = World::new(SimulationConfig::default().zero_gravity());
        let shape = world.add_shape(Shape::sphere(0.5)).unwrap();

        for i in 0..6 {
            let x = f64::from(i) * 1.5;
            let vx = if i % 2 == 0 { 3.0 } else { -2.0 };
            world
                .add_body(
                    BodyDesc::new(shape, Point3::new(x, 0.0, 0.0))
                        .with_mass(1.0 + f64::from(i))
                        .with_linear_velocity(Vector3::new(vx, 0.0, 0.0)),
                )
                .unwrap();
        }

        let initial = world.total_linear_momentum();
        let mut stepper = Stepper::with_config(StepperConfig::zero_gravity());
        stepper.run_for(&mut world, 2.0).unwrap();
        let final_momentum = world.total_linear_momentum();

        assert_relative_eq!(initial, final_momentum, epsilon = 1e-8);
    }

    #[test]
    fn test_time_advances() {
        let mut world = World::default();
        let mut stepper = Stepper::new();

        stepper.run_for(&mut world, 0.5).unwrap();

        assert_relative_eq!(world.time(), 0.5, epsilon = 1e-9);
        assert_eq!(world.step_count(), 30);
    }
}

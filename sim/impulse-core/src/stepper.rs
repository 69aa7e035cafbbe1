//! Simulation stepping and control flow.
//!
//! One tick runs in a fixed order:
//!
//! 1. Gravity, as an impulse `m·g·dt` on every movable body
//! 2. Broad phase over swept bounds
//! 3. Swept narrow phase on every pair with at least one movable body
//! 4. Contacts sorted by time of impact
//! 5. Contacts resolved in that order; before each one, the whole scene is
//!    advanced to its time of impact
//! 6. The scene is advanced through whatever is left of the tick
//!
//! Finally time advances and transforms are published to the sinks.
//!
//! # Example
//!
//! ```
//! use impulse_core::{BodyDesc, Shape, Stepper, World};
//! use impulse_types::SimulationConfig;
//! use nalgebra::Point3;
//!
//! let mut world = World::new(SimulationConfig::default());
//! let ball = world.add_shape(Shape::sphere(0.5)).unwrap();
//! let id = world.add_body(BodyDesc::new(ball, Point3::new(0.0, 10.0, 0.0))).unwrap();
//!
//! let mut stepper = Stepper::new();
//! for _ in 0..60 {
//!     stepper.step(&mut world).unwrap();
//! }
//!
//! // The body has fallen.
//! assert!(world.body(id).unwrap().pose.position.y < 10.0);
//! ```

use impulse_types::{SimError, SolverConfig, validate_timestep};
use tracing::{debug, trace, warn};

use crate::broad_phase::{
    BroadPhaseAlgorithm, BroadPhaseConfig, BroadPhaseDetector, CollisionPair,
};
use crate::contact::{self, Contact};
use crate::math;
use crate::narrow_phase;
use crate::world::World;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Upper bound on the result buffer `run_for` reserves up front.
const MAX_RESERVED_STEPS: f64 = 4096.0;

/// Summary of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepResult {
    /// Candidate pairs reported by the broad phase.
    pub pairs: usize,
    /// Contacts found by the narrow phase.
    pub contacts: usize,
    /// Contacts that received an impulse.
    pub resolved: usize,
    /// Simulation time after the tick.
    pub time: f64,
}

/// Configuration for the stepper.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepperConfig {
    /// Whether to apply gravity each step.
    pub apply_gravity: bool,
    /// Whether to detect and resolve contacts each step.
    pub enable_contacts: bool,
    /// Broad-phase algorithm.
    pub broad_phase: BroadPhaseAlgorithm,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            apply_gravity: true,
            enable_contacts: true,
            broad_phase: BroadPhaseAlgorithm::Auto,
        }
    }
}

impl StepperConfig {
    /// Create config without gravity.
    #[must_use]
    pub fn zero_gravity() -> Self {
        Self {
            apply_gravity: false,
            ..Default::default()
        }
    }

    /// Create config without contacts (free flight).
    #[must_use]
    pub fn no_contacts() -> Self {
        Self {
            enable_contacts: false,
            ..Default::default()
        }
    }

    /// Enable or disable contact resolution.
    #[must_use]
    pub fn with_contacts(mut self, enable: bool) -> Self {
        self.enable_contacts = enable;
        self
    }

    /// Choose the broad-phase algorithm.
    #[must_use]
    pub fn with_broad_phase(mut self, algorithm: BroadPhaseAlgorithm) -> Self {
        self.broad_phase = algorithm;
        self
    }
}

/// The step driver.
///
/// Owns the broad phase and the pair and contact buffers, which are reused
/// from tick to tick and grow with the number of candidate pairs.
#[derive(Debug, Clone)]
pub struct Stepper {
    config: StepperConfig,
    broad_phase: BroadPhaseDetector,
    pairs: Vec<CollisionPair>,
    contacts: Vec<Contact>,
}

impl Default for Stepper {
    fn default() -> Self {
        Self::new()
    }
}

impl Stepper {
    /// Create a new stepper with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StepperConfig::default())
    }

    /// Create a stepper with custom configuration.
    #[must_use]
    pub fn with_config(config: StepperConfig) -> Self {
        let broad_phase = BroadPhaseDetector::new(BroadPhaseConfig {
            algorithm: config.broad_phase,
            ..Default::default()
        });
        Self {
            config,
            broad_phase,
            pairs: Vec::new(),
            contacts: Vec::new(),
        }
    }

    /// Get the stepper configuration.
    #[must_use]
    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    /// Candidate pairs from the last tick.
    #[must_use]
    pub fn pairs(&self) -> &[CollisionPair] {
        &self.pairs
    }

    /// Contacts from the last tick, in resolution order.
    #[must_use]
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Execute one step of the world's configured timestep.
    ///
    /// # Errors
    ///
    /// See [`step_dt`](Self::step_dt).
    pub fn step(&mut self, world: &mut World) -> impulse_types::Result<StepResult> {
        let dt = world.timestep();
        self.step_dt(world, dt)
    }

    /// Execute one step of `dt` seconds, e.g. a measured frame time.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `dt` is not positive and finite
    /// - The world configuration is invalid
    /// - Any body state is non-finite before or after the step
    pub fn step_dt(&mut self, world: &mut World, dt: f64) -> impulse_types::Result<StepResult> {
        validate_timestep(dt)?;
        world.validate()?;

        // 1. Gravity
        if self.config.apply_gravity {
            world.apply_gravity(dt);
        }

        let resolved = if self.config.enable_contacts {
            let solver = world.config().solver.clone();
            // 2-4. Broad phase, narrow phase, ordering
            self.detect(world, dt, &solver);
            // 5-6. Ordered resolution, then the rest of the tick
            self.resolve_in_time_order(world, dt, &solver)
        } else {
            self.pairs.clear();
            self.contacts.clear();
            world.advance_bodies(dt);
            0
        };

        world.advance_time(dt);
        world.publish_transforms(dt);

        if let Err(err) = world.validate() {
            warn!(time = world.time(), error = %err, "simulation diverged");
            return Err(err);
        }

        let result = StepResult {
            pairs: self.pairs.len(),
            contacts: self.contacts.len(),
            resolved,
            time: world.time(),
        };
        debug!(
            step = world.step_count(),
            pairs = result.pairs,
            contacts = result.contacts,
            resolved = result.resolved,
            "step complete"
        );
        Ok(result)
    }

    /// Run for a specific duration of fixed steps.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `duration` is negative or not finite
    /// - The configured timestep is invalid
    /// - Any step fails
    pub fn run_for(
        &mut self,
        world: &mut World,
        duration: f64,
    ) -> impulse_types::Result<Vec<StepResult>> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(SimError::invalid_config(format!(
                "duration must be finite and non-negative, got {duration}"
            )));
        }
        let dt = world.timestep();
        validate_timestep(dt)?;

        let target_time = world.time() + duration;
        // Reservation is only a hint; long runs grow the buffer as they go.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let estimated_steps = (duration / dt).ceil().min(MAX_RESERVED_STEPS) as usize;
        let mut results = Vec::with_capacity(estimated_steps);

        // Half a step of slack so rounding does not add a step.
        while world.time() + 0.5 * dt < target_time {
            results.push(self.step_dt(world, dt)?);
        }

        Ok(results)
    }

    /// Fill the pair and contact buffers for this tick.
    fn detect(&mut self, world: &mut World, dt: f64, solver: &SolverConfig) {
        self.broad_phase.set_margin(solver.broad_phase_margin);
        let (shapes, bodies) = world.shapes_and_bodies_mut();
        self.broad_phase.find_pairs(bodies, shapes, dt, &mut self.pairs);

        self.contacts.clear();
        self.contacts.reserve(self.pairs.len());

        for pair in &self.pairs {
            let Some((a, b)) = math::pair_mut(bodies, pair.a.index(), pair.b.index()) else {
                continue;
            };
            if a.is_static() && b.is_static() {
                trace!(a = %pair.a, b = %pair.b, "skipping pair of immovable bodies");
                continue;
            }
            let (Some(shape_a), Some(shape_b)) =
                (shapes.get(a.shape.index()), shapes.get(b.shape.index()))
            else {
                continue;
            };

            if let Some(contact) =
                narrow_phase::intersect(a, shape_a, b, shape_b, dt, solver.velocity_epsilon)
            {
                self.contacts.push(contact);
            }
        }

        contact::sort_contacts(&mut self.contacts);
    }

    /// Resolve the sorted contacts, advancing the scene between them.
    ///
    /// Returns the number of contacts that received an impulse.
    fn resolve_in_time_order(&self, world: &mut World, dt: f64, solver: &SolverConfig) -> usize {
        let mut accumulated = 0.0;
        let mut resolved = 0;

        for contact in &self.contacts {
            let step = contact.time_of_impact - accumulated;
            world.advance_bodies(step);
            accumulated += step;

            let Some((a, b)) = math::pair_mut(
                world.bodies_mut(),
                contact.body_a.index(),
                contact.body_b.index(),
            ) else {
                continue;
            };
            // `detect` never produces these; contacts pushed in by hand still
            // only advance the scene.
            if a.is_static() && b.is_static() {
                continue;
            }

            if contact::resolve(contact, a, b, solver) {
                resolved += 1;
            }
        }

        let remaining = dt - accumulated;
        if remaining > 0.0 {
            world.advance_bodies(remaining);
        }

        resolved
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::cast_precision_loss
)]
mod tests {
    use super::*;
    use crate::body::BodyDesc;
    use crate::presentation::TransformRecorder;
    use crate::shape::Shape;
    use approx::assert_relative_eq;
    use impulse_types::{BodyId, Material, ShapeId, SimError, SimulationConfig};
    use nalgebra::{Point3, Vector3};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn world_with_unit_sphere(config: SimulationConfig) -> (World, ShapeId) {
        let mut world = World::new(config);
        let shape = world.add_shape(Shape::sphere(1.0)).unwrap();
        (world, shape)
    }

    fn setup_falling_body() -> (World, BodyId) {
        let (mut world, shape) = world_with_unit_sphere(SimulationConfig::default());
        let id = world
            .add_body(BodyDesc::new(shape, Point3::new(0.0, 10.0, 0.0)))
            .unwrap();
        (world, id)
    }

    #[test]
    fn test_single_step() {
        let (mut world, id) = setup_falling_body();
        let mut stepper = Stepper::new();

        let result = stepper.step(&mut world).expect("step should succeed");
        assert_eq!(result.contacts, 0);
        assert_relative_eq!(result.time, 1.0 / 60.0, epsilon = 1e-15);
        assert_eq!(world.step_count(), 1);

        let body = world.body(id).unwrap();
        assert_relative_eq!(body.linear_velocity.y, -10.0 / 60.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gravity_falling() {
        let (mut world, id) = setup_falling_body();
        let mut stepper = Stepper::new();

        for _ in 0..60 {
            stepper.step(&mut world).expect("step should succeed");
        }

        // Impulse then drift: y = 10 - g·dt²·(1 + 2 + ... + 60)
        let dt = 1.0 / 60.0;
        let expected = 10.0 - 10.0 * dt * dt * (60.0 * 61.0 / 2.0);
        let body = world.body(id).unwrap();
        assert_relative_eq!(body.pose.position.y, expected, epsilon = 1e-9);
        assert_relative_eq!(body.linear_velocity.y, -10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_gravity() {
        let (mut world, id) = setup_falling_body();
        let mut stepper = Stepper::with_config(StepperConfig::zero_gravity());

        stepper.run_for(&mut world, 1.0).unwrap();
        assert_eq!(world.body(id).unwrap().pose.position, Point3::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn test_head_on_collision_mid_step() {
        let (mut world, shape) = world_with_unit_sphere(SimulationConfig::default().zero_gravity());
        let elastic = Material::new(1.0, 0.0);
        let a = world
            .add_body(
                BodyDesc::new(shape, Point3::origin())
                    .with_material(elastic)
                    .with_linear_velocity(Vector3::new(2.0, 0.0, 0.0)),
            )
            .unwrap();
        let b = world
            .add_body(BodyDesc::new(shape, Point3::new(3.0, 0.0, 0.0)).with_material(elastic))
            .unwrap();

        let mut stepper = Stepper::new();
        let result = stepper.step_dt(&mut world, 1.0).unwrap();

        assert_eq!(result.pairs, 1);
        assert_eq!(result.contacts, 1);
        assert_eq!(result.resolved, 1);
        assert_relative_eq!(stepper.contacts()[0].time_of_impact, 0.5, epsilon = 1e-12);

        // A travels 1 m before impact and stops; B picks up the rest of the step.
        let (a, b) = (world.body(a).unwrap(), world.body(b).unwrap());
        assert_relative_eq!(a.pose.position.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(b.pose.position.x, 4.0, epsilon = 1e-12);
        assert_relative_eq!(a.linear_velocity.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(b.linear_velocity.x, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fast_sphere_does_not_tunnel() {
        let (mut world, shape) = world_with_unit_sphere(SimulationConfig::default().zero_gravity());
        world
            .add_body(BodyDesc::new(shape, Point3::origin()).fixed())
            .unwrap();
        let bullet = world
            .add_body(
                BodyDesc::new(shape, Point3::new(10.0, 0.0, 0.0))
                    .with_linear_velocity(Vector3::new(-600.0, 0.0, 0.0)),
            )
            .unwrap();

        let mut stepper = Stepper::new();
        let result = stepper.step(&mut world).unwrap();
        assert_eq!(result.resolved, 1);

        let bullet = world.body(bullet).unwrap();
        // Default materials combine to e = 0.25: bounces back at 150 m/s.
        assert_relative_eq!(bullet.linear_velocity.x, 150.0, epsilon = 1e-9);
        assert!(bullet.pose.position.x >= 2.0);
    }

    #[test]
    fn test_momentum_conserved_through_collision() {
        let (mut world, shape) = world_with_unit_sphere(SimulationConfig::default().zero_gravity());
        world
            .add_body(
                BodyDesc::new(shape, Point3::origin())
                    .with_mass(3.0)
                    .with_linear_velocity(Vector3::new(4.0, 0.5, 0.0)),
            )
            .unwrap();
        world
            .add_body(
                BodyDesc::new(shape, Point3::new(2.5, 0.3, 0.0))
                    .with_linear_velocity(Vector3::new(-1.0, 0.0, 0.0)),
            )
            .unwrap();
        let before = world.total_linear_momentum();

        let mut stepper = Stepper::new();
        let result = stepper.step_dt(&mut world, 0.25).unwrap();
        assert_eq!(result.resolved, 1);

        assert_relative_eq!(world.total_linear_momentum(), before, epsilon = 1e-9);
    }

    #[test]
    fn test_contacts_resolved_in_time_order() {
        let (mut world, shape) = world_with_unit_sphere(SimulationConfig::default().zero_gravity());
        // Late pair on the X axis: touches at t = 0.5.
        world
            .add_body(BodyDesc::new(shape, Point3::origin()).with_linear_velocity(Vector3::x() * 2.0))
            .unwrap();
        world.add_body(BodyDesc::new(shape, Point3::new(3.0, 0.0, 0.0))).unwrap();
        // Early pair far along Z: touches at t = 0.25.
        world
            .add_body(
                BodyDesc::new(shape, Point3::new(0.0, 0.0, 50.0))
                    .with_linear_velocity(Vector3::x() * 4.0),
            )
            .unwrap();
        world.add_body(BodyDesc::new(shape, Point3::new(3.0, 0.0, 50.0))).unwrap();

        let mut stepper = Stepper::new();
        let result = stepper.step_dt(&mut world, 1.0).unwrap();

        assert_eq!(result.contacts, 2);
        assert_eq!(result.resolved, 2);
        let order: Vec<_> = stepper.contacts().iter().map(|c| c.body_a).collect();
        assert_eq!(order, vec![BodyId::new(2), BodyId::new(0)]);
    }

    #[test]
    fn test_static_pairs_are_not_tested() {
        let (mut world, shape) = world_with_unit_sphere(SimulationConfig::default());
        world.add_body(BodyDesc::new(shape, Point3::origin()).fixed()).unwrap();
        world
            .add_body(BodyDesc::new(shape, Point3::new(0.5, 0.0, 0.0)).fixed())
            .unwrap();

        let mut stepper = Stepper::new();
        let result = stepper.step(&mut world).unwrap();

        assert_eq!(result.pairs, 1);
        assert_eq!(result.contacts, 0);
    }

    #[test]
    fn test_immovable_contact_only_advances() {
        let (mut world, shape) = world_with_unit_sphere(SimulationConfig::default());
        let a = world
            .add_body(
                BodyDesc::new(shape, Point3::origin())
                    .fixed()
                    .with_linear_velocity(Vector3::new(1.0, 0.0, 0.0)),
            )
            .unwrap();
        let b = world
            .add_body(BodyDesc::new(shape, Point3::new(1.5, 0.0, 0.0)).fixed())
            .unwrap();

        let mut stepper = Stepper::new();
        stepper.contacts.push(Contact {
            body_a: a,
            body_b: b,
            point_on_a_world: Point3::new(1.0, 0.0, 0.0),
            point_on_b_world: Point3::new(0.5, 0.0, 0.0),
            point_on_a_local: Point3::new(1.0, 0.0, 0.0),
            point_on_b_local: Point3::new(-1.0, 0.0, 0.0),
            normal: Vector3::x(),
            separation: -0.5,
            time_of_impact: 0.25,
        });

        let solver = SolverConfig::default();
        let resolved = stepper.resolve_in_time_order(&mut world, 0.5, &solver);

        assert_eq!(resolved, 0);
        // Velocity untouched, and the body covered the whole tick.
        let body = world.body(a).unwrap();
        assert_eq!(body.linear_velocity, Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(body.pose.position.x, 0.5, epsilon = 1e-12);
        assert_eq!(world.body(b).unwrap().pose.position.x, 1.5);
    }

    #[test]
    fn test_contacts_disabled() {
        let (mut world, shape) = world_with_unit_sphere(SimulationConfig::default().zero_gravity());
        let a = world
            .add_body(BodyDesc::new(shape, Point3::origin()).with_linear_velocity(Vector3::x() * 2.0))
            .unwrap();
        world.add_body(BodyDesc::new(shape, Point3::new(3.0, 0.0, 0.0))).unwrap();

        let mut stepper = Stepper::with_config(StepperConfig::no_contacts());
        let result = stepper.step_dt(&mut world, 1.0).unwrap();

        assert_eq!(result.contacts, 0);
        assert_relative_eq!(world.body(a).unwrap().pose.position.x, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_detect_divergence() {
        let (mut world, id) = setup_falling_body();
        world.body_mut(id).unwrap().pose.position.x = f64::NAN;

        let result = Stepper::new().step(&mut world);
        assert!(result.unwrap_err().is_diverged());
    }

    #[test]
    fn test_invalid_timestep() {
        let (mut world, _) = setup_falling_body();
        let mut stepper = Stepper::new();

        for dt in [0.0, -0.01, f64::NAN] {
            let err = stepper.step_dt(&mut world, dt).unwrap_err();
            assert!(matches!(err, SimError::InvalidTimestep(_)));
        }
        assert_eq!(world.step_count(), 0);
    }

    #[test]
    fn test_run_for_duration() {
        let (mut world, _) = setup_falling_body();
        let mut stepper = Stepper::new();

        let results = stepper.run_for(&mut world, 1.0).unwrap();
        assert_eq!(results.len(), 60);
        assert_relative_eq!(world.time(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_run_for_rejects_bad_durations() {
        let (mut world, _) = setup_falling_body();
        let mut stepper = Stepper::new();

        for duration in [f64::NAN, -1.0, f64::INFINITY, f64::NEG_INFINITY] {
            let err = stepper.run_for(&mut world, duration).unwrap_err();
            assert!(err.is_config_error(), "duration {duration} should be rejected");
        }
        assert_eq!(world.step_count(), 0);

        assert!(stepper.run_for(&mut world, 0.0).unwrap().is_empty());
        assert_eq!(world.step_count(), 0);
    }

    #[test]
    fn test_run_for_huge_duration_does_not_preallocate() {
        let (mut world, id) = setup_falling_body();
        // Fails on the first tick, so only the up-front reservation is at stake.
        world.body_mut(id).unwrap().linear_velocity.y = f64::NAN;

        let err = Stepper::new().run_for(&mut world, 1e20).unwrap_err();
        assert!(err.is_diverged());
        assert_eq!(world.step_count(), 0);
    }

    #[test]
    fn test_sinks_updated_once_per_tick() {
        let (mut world, shape) = world_with_unit_sphere(SimulationConfig::default());
        let recorder = Rc::new(RefCell::new(TransformRecorder::new()));
        let sink = world.add_sink(Rc::clone(&recorder));
        let id = world
            .add_body(BodyDesc::new(shape, Point3::new(0.0, 10.0, 0.0)).with_sink(sink))
            .unwrap();

        let mut stepper = Stepper::new();
        for _ in 0..3 {
            stepper.step(&mut world).unwrap();
        }

        let recorder = recorder.borrow();
        assert_eq!(recorder.updates(), 3);
        assert_eq!(recorder.transform().copied(), world.body_transform(id));
    }

    #[test]
    fn test_broad_phase_algorithms_agree() {
        let mut finals = Vec::new();
        for algorithm in [BroadPhaseAlgorithm::BruteForce, BroadPhaseAlgorithm::SweepAndPrune] {
            let config = SimulationConfig::default().zero_gravity();
            let (mut world, shape) = world_with_unit_sphere(config);
            for i in 0..40 {
                let x = (i % 8) as f64 * 2.5;
                let z = (i / 8) as f64 * 2.5;
                let vx = if i % 2 == 0 { 3.0 } else { -3.0 };
                world
                    .add_body(
                        BodyDesc::new(shape, Point3::new(x, 0.0, z))
                            .with_linear_velocity(Vector3::new(vx, 0.0, 0.0)),
                    )
                    .unwrap();
            }

            let config = StepperConfig::default().with_broad_phase(algorithm);
            let mut stepper = Stepper::with_config(config);
            let results = stepper.run_for(&mut world, 0.5).unwrap();
            assert!(results.iter().any(|r| r.resolved > 0));

            let positions: Vec<_> = world.bodies().iter().map(|b| b.pose.position).collect();
            finals.push(positions);
        }

        assert_eq!(finals[0], finals[1]);
    }
}

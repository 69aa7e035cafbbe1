//! Property-based tests for body integration and collision detection.
//!
//! Run with: cargo test -p impulse-core -- proptest

#![allow(clippy::unwrap_used, clippy::expect_used)]

use impulse_core::{
    Body, BodyDesc, BodyId, BroadPhaseConfig, BroadPhaseDetector, CollisionPair,
    MAX_ANGULAR_SPEED, Shape, ShapeId, SimulationConfig, SolverConfig, Stepper, StepperConfig,
    World, math, narrow_phase,
};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_point(range: f64) -> impl Strategy<Value = Point3<f64>> {
    prop::array::uniform3(-range..range).prop_map(|[x, y, z]| Point3::new(x, y, z))
}

fn arb_vector(range: f64) -> impl Strategy<Value = Vector3<f64>> {
    prop::array::uniform3(-range..range).prop_map(|[x, y, z]| Vector3::new(x, y, z))
}

fn arb_orientation() -> impl Strategy<Value = UnitQuaternion<f64>> {
    prop::array::uniform3(-3.1..3.1f64)
        .prop_map(|[roll, pitch, yaw]| UnitQuaternion::from_euler_angles(roll, pitch, yaw))
}

/// A dynamic sphere with arbitrary state.
fn arb_body() -> impl Strategy<Value = Body> {
    (
        0.1..5.0f64,
        arb_point(100.0),
        arb_orientation(),
        arb_vector(50.0),
        arb_vector(MAX_ANGULAR_SPEED / 2.0),
        0.1..10.0f64,
    )
        .prop_map(|(radius, position, orientation, v, w, mass)| {
            let shape = Shape::sphere(radius);
            let desc = BodyDesc::new(ShapeId::new(0), position)
                .with_orientation(orientation)
                .with_linear_velocity(v)
                .with_angular_velocity(w)
                .with_mass(mass);
            Body::new(BodyId::new(0), desc, &shape).unwrap()
        })
}

/// Sphere description for a random scene: (radius, position, velocity, fixed).
fn arb_scene_body() -> impl Strategy<Value = SceneBody> {
    (
        0.2..1.5f64,
        arb_point(8.0),
        arb_vector(40.0),
        prop::bool::weighted(0.2),
    )
}

type SceneBody = (f64, Point3<f64>, Vector3<f64>, bool);

fn scene_world(scene: &[SceneBody]) -> World {
    let mut world = World::new(SimulationConfig::default().zero_gravity());
    for &(radius, position, velocity, fixed) in scene {
        let shape = world.add_shape(Shape::sphere(radius)).unwrap();
        let mut desc = BodyDesc::new(shape, position).with_linear_velocity(velocity);
        if fixed {
            desc = desc.fixed();
        }
        world.add_body(desc).unwrap();
    }
    world
}

// =============================================================================
// Integration
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn proptest_orientation_stays_unit(
        mut body in arb_body(),
        steps in prop::collection::vec(-0.1..0.1f64, 1..200),
    ) {
        for dt in steps {
            body.update(dt);
            let norm = body.pose.rotation.quaternion().norm();
            prop_assert!((norm - 1.0).abs() < 1e-5, "norm = {}", norm);
        }
    }

    #[test]
    fn proptest_update_is_reversible(mut body in arb_body(), dt in -1.0..1.0f64) {
        let position = body.pose.position;
        let rotation = body.pose.rotation;

        body.update(dt);
        body.update(-dt);

        let drift = (body.pose.position - position).norm();
        prop_assert!(drift < 1e-9 * (1.0 + position.coords.norm()), "drift = {}", drift);
        prop_assert!(body.pose.rotation.angle_to(&rotation) < 1e-9);
    }

    #[test]
    fn proptest_static_body_ignores_impulses(
        position in arb_point(100.0),
        v in arb_vector(50.0),
        w in arb_vector(10.0),
        impulses in prop::collection::vec((arb_point(5.0), arb_vector(1e4)), 1..20),
    ) {
        let shape = Shape::sphere(1.0);
        let desc = BodyDesc::new(ShapeId::new(0), position)
            .with_linear_velocity(v)
            .with_angular_velocity(w)
            .fixed();
        let mut body = Body::new(BodyId::new(0), desc, &shape).unwrap();

        for (offset, impulse) in &impulses {
            body.apply_impulse(&(position + offset.coords), impulse);
            body.apply_impulse_linear(impulse);
            body.apply_impulse_angular(impulse);
        }

        prop_assert_eq!(body.linear_velocity, v);
        prop_assert_eq!(body.angular_velocity, w);
    }

    #[test]
    fn proptest_angular_speed_is_bounded(
        mut body in arb_body(),
        impulses in prop::collection::vec((arb_vector(2.0), arb_vector(1e3)), 1..30),
    ) {
        for (offset, impulse) in &impulses {
            body.apply_impulse_angular(impulse);
            prop_assert!(body.angular_velocity.norm() <= MAX_ANGULAR_SPEED + 1e-9);

            let point = body.center_of_mass_world() + offset;
            body.apply_impulse(&point, impulse);
            prop_assert!(body.angular_velocity.norm() <= MAX_ANGULAR_SPEED + 1e-9);
        }
    }
}

// =============================================================================
// Collision detection
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn proptest_narrow_phase_hits_are_broad_phase_pairs(
        scene in prop::collection::vec(arb_scene_body(), 2..24),
        dt in 0.001..0.1f64,
    ) {
        let world = scene_world(&scene);
        let solver = SolverConfig::default();

        let mut detector = BroadPhaseDetector::new(BroadPhaseConfig {
            margin: solver.broad_phase_margin,
            ..BroadPhaseConfig::default()
        });
        let mut pairs = Vec::new();
        detector.find_pairs(world.bodies(), world.shapes(), dt, &mut pairs);

        // Test every pair, not just the candidates.
        let mut bodies = world.bodies().to_vec();
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                let shape_a = *world.shape(bodies[i].shape).unwrap();
                let shape_b = *world.shape(bodies[j].shape).unwrap();
                let (a, b) = math::pair_mut(&mut bodies, i, j).unwrap();
                let hit = narrow_phase::intersect(
                    a,
                    &shape_a,
                    b,
                    &shape_b,
                    dt,
                    solver.velocity_epsilon,
                );
                if hit.is_some() {
                    prop_assert!(
                        pairs.contains(&CollisionPair::new(i, j)),
                        "({}, {}) hit but was pruned",
                        i,
                        j
                    );
                }
            }
        }
    }

    #[test]
    fn proptest_stepper_contacts_come_from_pairs(
        scene in prop::collection::vec(arb_scene_body(), 2..24),
        dt in 0.001..0.1f64,
    ) {
        let mut world = scene_world(&scene);
        let mut stepper = Stepper::with_config(StepperConfig::zero_gravity());
        let result = stepper.step_dt(&mut world, dt).unwrap();

        prop_assert_eq!(result.pairs, stepper.pairs().len());
        prop_assert_eq!(result.contacts, stepper.contacts().len());
        prop_assert!(result.contacts <= result.pairs);

        for contact in stepper.contacts() {
            let pair = CollisionPair::new(contact.body_a.index(), contact.body_b.index());
            prop_assert!(stepper.pairs().contains(&pair));
            prop_assert!(contact.time_of_impact >= 0.0 && contact.time_of_impact <= dt);
        }
    }

    #[test]
    fn proptest_contacts_sorted_by_time_of_impact(
        scene in prop::collection::vec(arb_scene_body(), 2..24),
    ) {
        let mut world = World::new(SimulationConfig::default().zero_gravity());
        let shape = world.add_shape(Shape::sphere(0.5)).unwrap();
        for (_, position, velocity, _) in scene {
            world
                .add_body(BodyDesc::new(shape, position).with_linear_velocity(velocity))
                .unwrap();
        }

        let mut stepper = Stepper::with_config(StepperConfig::zero_gravity());
        stepper.step(&mut world).unwrap();

        for window in stepper.contacts().windows(2) {
            prop_assert!(window[0].time_of_impact <= window[1].time_of_impact);
        }
    }
}

//! Contacts: ordering and impulse resolution.
//!
//! A [`Contact`] lives for one tick. The narrow phase produces it, the step
//! driver sorts all contacts by time of impact and resolves them one at a
//! time, advancing the whole scene to each contact's instant first.
//!
//! # Conventions
//!
//! - `normal` is a unit vector pointing from body A toward body B.
//! - Relative velocity is `vA - vB` at the contact points, so the bodies
//!   approach when its component along `normal` is positive.
//! - The normal impulse pushes A along `-normal` and B along `+normal`.

use std::cmp::Ordering;

use impulse_types::{BodyId, SolverConfig};
use nalgebra::{Point3, Vector3};

use crate::body::Body;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Collision between two bodies within the current tick.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Contact {
    /// First body.
    pub body_a: BodyId,
    /// Second body.
    pub body_b: BodyId,
    /// Contact point on A at the time of impact, world space.
    pub point_on_a_world: Point3<f64>,
    /// Contact point on B at the time of impact, world space.
    pub point_on_b_world: Point3<f64>,
    /// Contact point on A relative to its center of mass, body axes.
    pub point_on_a_local: Point3<f64>,
    /// Contact point on B relative to its center of mass, body axes.
    pub point_on_b_local: Point3<f64>,
    /// Unit normal from A toward B.
    pub normal: Vector3<f64>,
    /// Center distance minus summed radii at the time of impact.
    ///
    /// Negative when the bodies interpenetrate.
    pub separation: f64,
    /// Seconds from the start of the tick until first touch, in `[0, dt]`.
    pub time_of_impact: f64,
}

impl Contact {
    /// Total order: ascending time of impact, then body A, then body B.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        self.time_of_impact
            .total_cmp(&other.time_of_impact)
            .then_with(|| self.body_a.cmp(&other.body_a))
            .then_with(|| self.body_b.cmp(&other.body_b))
    }

    /// True when the bodies overlap at the time of impact.
    #[must_use]
    pub fn is_penetrating(&self) -> bool {
        self.separation < 0.0
    }
}

/// Sort contacts into resolution order (see [`Contact::compare`]).
pub fn sort_contacts(contacts: &mut [Contact]) {
    contacts.sort_by(Contact::compare);
}

/// Apply the collision response for `contact` to its two bodies.
///
/// Both bodies must already be advanced to the contact's time of impact.
/// The contact points are rebuilt from their body-space copies so they
/// follow any rotation since detection. Returns `true` if a normal impulse
/// was applied, `false` when the bodies were already separating or both
/// are immovable.
///
/// # Positional correction
///
/// With [`SolverConfig::position_correction`] set (the default), bodies
/// that overlap at the time of impact are also pushed apart along the gap
/// between their contact points, split by inverse mass. This is an
/// extension on top of the single impulse pass and runs once per contact;
/// it does not stabilise resting stacks. Turn it off with
/// [`SolverConfig::with_position_correction`] to get the pure impulse
/// response.
pub fn resolve(contact: &Contact, a: &mut Body, b: &mut Body, solver: &SolverConfig) -> bool {
    if a.is_static() && b.is_static() {
        return false;
    }

    let point_a = a.body_to_world(&contact.point_on_a_local);
    let point_b = b.body_to_world(&contact.point_on_b_local);
    let n = contact.normal;

    let elasticity = solver
        .restitution_combine
        .combine(a.material.elasticity, b.material.elasticity);
    let friction = solver
        .friction_combine
        .combine(a.material.friction, b.material.friction);

    let inv_inertia_a = a.inverse_inertia_world();
    let inv_inertia_b = b.inverse_inertia_world();
    let ra = point_a - a.center_of_mass_world();
    let rb = point_b - b.center_of_mass_world();
    let inv_mass_sum = a.inverse_mass + b.inverse_mass;

    // Rotational share of the effective mass along a direction.
    let angular_term = |dir: &Vector3<f64>| {
        let angular_a = (inv_inertia_a * ra.cross(dir)).cross(&ra);
        let angular_b = (inv_inertia_b * rb.cross(dir)).cross(&rb);
        (angular_a + angular_b).dot(dir)
    };

    let vab = a.point_velocity(&point_a) - b.point_velocity(&point_b);
    let approach = vab.dot(&n);

    let applied = approach > 0.0;
    if applied {
        // J = (1 + e) (vab · n) / (1/mA + 1/mB + angular terms)
        let j = (1.0 + elasticity) * approach / (inv_mass_sum + angular_term(&n));
        let impulse = n * j;
        a.apply_impulse(&point_a, &-impulse);
        b.apply_impulse(&point_b, &impulse);

        let vel_tangent = vab - n * approach;
        if let Some(tangent) = vel_tangent.try_normalize(f64::EPSILON) {
            let reduced_mass = 1.0 / (inv_mass_sum + angular_term(&tangent));
            let friction_impulse = vel_tangent * (reduced_mass * friction);
            a.apply_impulse(&point_a, &-friction_impulse);
            b.apply_impulse(&point_b, &friction_impulse);
        }

        tracing::trace!(
            a = %contact.body_a,
            b = %contact.body_b,
            toi = contact.time_of_impact,
            impulse = j,
            "resolved contact"
        );
    }

    if solver.position_correction {
        // Gap between the contact points; along -n while penetrating.
        let ds = point_b - point_a;
        if ds.dot(&n) < 0.0 {
            let ta = a.inverse_mass / inv_mass_sum;
            let tb = b.inverse_mass / inv_mass_sum;
            a.pose.position += ds * ta;
            b.pose.position -= ds * tb;
        }
    }

    applied
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::body::BodyDesc;
    use crate::shape::Shape;
    use approx::assert_relative_eq;
    use impulse_types::{CombineRule, Material, ShapeId};

    fn contact_with_toi(toi: f64, a: usize, b: usize) -> Contact {
        Contact {
            body_a: BodyId::new(a),
            body_b: BodyId::new(b),
            point_on_a_world: Point3::origin(),
            point_on_b_world: Point3::origin(),
            point_on_a_local: Point3::origin(),
            point_on_b_local: Point3::origin(),
            normal: Vector3::x(),
            separation: 0.0,
            time_of_impact: toi,
        }
    }

    fn ball(index: usize, x: f64, velocity: f64, material: Material) -> Body {
        let desc = BodyDesc::new(ShapeId::new(0), Point3::new(x, 0.0, 0.0))
            .with_linear_velocity(Vector3::new(velocity, 0.0, 0.0))
            .with_material(material);
        Body::new(BodyId::new(index), desc, &Shape::sphere(1.0)).unwrap()
    }

    /// Head-on contact along +X between unit spheres touching at x = 1.
    fn head_on(a: &Body, b: &Body) -> Contact {
        let point = Point3::new(1.0, 0.0, 0.0);
        Contact {
            body_a: a.id,
            body_b: b.id,
            point_on_a_world: point,
            point_on_b_world: point,
            point_on_a_local: a.world_to_body(&point),
            point_on_b_local: b.world_to_body(&point),
            normal: Vector3::x(),
            separation: 0.0,
            time_of_impact: 0.0,
        }
    }

    #[test]
    fn test_sort_by_time_of_impact() {
        let mut contacts = vec![
            contact_with_toi(0.7, 0, 1),
            contact_with_toi(0.1, 2, 3),
            contact_with_toi(0.4, 4, 5),
        ];
        sort_contacts(&mut contacts);

        let times: Vec<_> = contacts.iter().map(|c| c.time_of_impact).collect();
        assert_eq!(times, vec![0.1, 0.4, 0.7]);
    }

    #[test]
    fn test_ties_break_on_body_indices() {
        let mut contacts = vec![
            contact_with_toi(0.5, 3, 4),
            contact_with_toi(0.5, 1, 7),
            contact_with_toi(0.5, 1, 2),
        ];
        sort_contacts(&mut contacts);

        let keys: Vec<_> = contacts.iter().map(|c| (c.body_a.0, c.body_b.0)).collect();
        assert_eq!(keys, vec![(1, 2), (1, 7), (3, 4)]);
        assert_eq!(contacts[0].compare(&contacts[0]), Ordering::Equal);
    }

    #[test]
    fn test_elastic_head_on_swaps_velocities() {
        let elastic = Material::new(1.0, 0.0);
        let mut a = ball(0, 0.0, 2.0, elastic);
        let mut b = ball(1, 2.0, 0.0, elastic);
        let contact = head_on(&a, &b);

        assert!(resolve(&contact, &mut a, &mut b, &SolverConfig::default()));
        assert_relative_eq!(a.linear_velocity, Vector3::zeros(), epsilon = 1e-12);
        assert_relative_eq!(b.linear_velocity, Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-12);
        // No lever arm along the normal, so no spin.
        assert_relative_eq!(a.angular_velocity, Vector3::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn test_inelastic_head_on_conserves_momentum() {
        let clay = Material::new(0.0, 0.0);
        let mut a = ball(0, 0.0, 3.0, clay);
        let mut b = ball(1, 2.0, -1.0, clay);
        let before = a.linear_momentum() + b.linear_momentum();
        let contact = head_on(&a, &b);

        resolve(&contact, &mut a, &mut b, &SolverConfig::default());

        assert_relative_eq!(a.linear_velocity, b.linear_velocity, epsilon = 1e-12);
        assert_relative_eq!(
            a.linear_momentum() + b.linear_momentum(),
            before,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_separating_bodies_are_left_alone() {
        let mut a = ball(0, 0.0, -1.0, Material::default());
        let mut b = ball(1, 2.0, 1.0, Material::default());
        let contact = head_on(&a, &b);

        assert!(!resolve(&contact, &mut a, &mut b, &SolverConfig::default()));
        assert_eq!(a.linear_velocity, Vector3::new(-1.0, 0.0, 0.0));
        assert_eq!(b.linear_velocity, Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_static_body_bounces_mover() {
        let mut a = ball(0, 0.0, 4.0, Material::new(1.0, 0.0));
        let desc = BodyDesc::new(ShapeId::new(0), Point3::new(2.0, 0.0, 0.0))
            .fixed()
            .with_material(Material::new(0.5, 0.0));
        let mut wall = Body::new(BodyId::new(1), desc, &Shape::sphere(1.0)).unwrap();
        let contact = head_on(&a, &wall);

        let solver = SolverConfig::default().with_combine_rules(CombineRule::Max, CombineRule::Min);
        assert!(resolve(&contact, &mut a, &mut wall, &solver));

        assert_relative_eq!(a.linear_velocity, Vector3::new(-4.0, 0.0, 0.0), epsilon = 1e-12);
        assert_eq!(wall.linear_velocity, Vector3::zeros());
        assert_eq!(wall.pose.position, Point3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_friction_opposes_sliding() {
        let rough = Material::new(0.0, 1.0);
        let desc = BodyDesc::new(ShapeId::new(0), Point3::origin())
            .with_linear_velocity(Vector3::new(1.0, 3.0, 0.0))
            .with_material(rough);
        let mut a = Body::new(BodyId::new(0), desc, &Shape::sphere(1.0)).unwrap();
        let floor = BodyDesc::new(ShapeId::new(0), Point3::new(2.0, 0.0, 0.0))
            .fixed()
            .with_material(rough);
        let mut b = Body::new(BodyId::new(1), floor, &Shape::sphere(1.0)).unwrap();
        let contact = head_on(&a, &b);

        resolve(&contact, &mut a, &mut b, &SolverConfig::default());

        // Normal motion is stopped; sliding along +Y is slowed and spin is induced.
        assert_relative_eq!(a.linear_velocity.x, 0.0, epsilon = 1e-12);
        assert!(a.linear_velocity.y < 3.0);
        assert!(a.linear_velocity.y > 0.0);
        assert!(a.angular_velocity.z < 0.0);
    }

    #[test]
    fn test_position_correction_splits_by_inverse_mass() {
        let mut a = ball(0, 0.0, 0.0, Material::default());
        let mut b = ball(1, 1.5, 0.0, Material::default());
        // Overlap of 0.5 along X.
        let contact = Contact {
            body_a: a.id,
            body_b: b.id,
            point_on_a_world: Point3::new(1.0, 0.0, 0.0),
            point_on_b_world: Point3::new(0.5, 0.0, 0.0),
            point_on_a_local: Point3::new(1.0, 0.0, 0.0),
            point_on_b_local: Point3::new(-1.0, 0.0, 0.0),
            normal: Vector3::x(),
            separation: -0.5,
            time_of_impact: 0.0,
        };
        assert!(contact.is_penetrating());

        resolve(&contact, &mut a, &mut b, &SolverConfig::default());
        assert_relative_eq!(a.pose.position.x, -0.25, epsilon = 1e-12);
        assert_relative_eq!(b.pose.position.x, 1.75, epsilon = 1e-12);

        let mut a = ball(0, 0.0, 0.0, Material::default());
        let mut b = ball(1, 1.5, 0.0, Material::default());
        let solver = SolverConfig::default().with_position_correction(false);
        resolve(&contact, &mut a, &mut b, &solver);
        assert_eq!(a.pose.position.x, 0.0);
        assert_eq!(b.pose.position.x, 1.5);
    }
}

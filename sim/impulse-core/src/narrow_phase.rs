//! Exact swept intersection tests.
//!
//! Only sphere/sphere is implemented. The test is continuous: it finds the
//! first instant within the step at which the two spheres touch, assuming
//! both move at constant linear velocity, so fast spheres cannot pass
//! through each other between ticks.

use nalgebra::{Point3, Vector3};

use crate::body::Body;
use crate::contact::Contact;
use crate::shape::Shape;

/// Intersect the ray `start + t * dir` with a sphere.
///
/// Returns the entry and exit parameters `(t0, t1)` with `t0 <= t1`,
/// measured in units of `dir`, or `None` when the ray's line misses the
/// sphere. `dir` must not be zero; callers screen out negligible motion
/// first.
#[must_use]
pub fn ray_sphere(
    start: &Point3<f64>,
    dir: &Vector3<f64>,
    center: &Point3<f64>,
    radius: f64,
) -> Option<(f64, f64)> {
    let s = center - start;
    let a = dir.dot(dir);
    let b = s.dot(dir);
    let c = s.dot(&s) - radius * radius;

    let delta = b * b - a * c;
    if delta < 0.0 {
        return None;
    }

    let root = delta.sqrt();
    Some(((b - root) / a, (b + root) / a))
}

/// First touch between two moving spheres within a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweptHit {
    /// Seconds from the start of the step, in `[0, dt]`.
    pub time_of_impact: f64,
    /// Surface point of A facing B at the time of impact.
    pub point_on_a: Point3<f64>,
    /// Surface point of B facing A at the time of impact.
    pub point_on_b: Point3<f64>,
}

/// A sphere moving at constant velocity over one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingSphere {
    /// Sphere radius.
    pub radius: f64,
    /// Center at the start of the step.
    pub position: Point3<f64>,
    /// Constant linear velocity over the step.
    pub velocity: Vector3<f64>,
}

impl MovingSphere {
    /// Sphere of `body` described by its current state.
    #[must_use]
    pub fn of_body(body: &Body, radius: f64) -> Self {
        Self {
            radius,
            position: body.center_of_mass_world(),
            velocity: body.linear_velocity,
        }
    }

    fn at(&self, t: f64) -> Point3<f64> {
        self.position + self.velocity * t
    }
}

/// Swept sphere/sphere test over a step of length `dt`.
///
/// Works in A's frame relative to B: A's center travels along
/// `(vA - vB) * dt` toward a sphere of radius `rA + rB` around B. When that
/// displacement is shorter than `epsilon` the spheres are treated as
/// stationary and only hit if their centers are already within
/// `rA + rB + epsilon`, with a time of impact of zero.
#[must_use]
pub fn sphere_sphere_dynamic(
    a: &MovingSphere,
    b: &MovingSphere,
    dt: f64,
    epsilon: f64,
) -> Option<SweptHit> {
    let displacement = (a.velocity - b.velocity) * dt;
    let radius_sum = a.radius + b.radius;

    let (t0, t1) = if displacement.norm_squared() < epsilon * epsilon {
        let reach = radius_sum + epsilon;
        if (b.position - a.position).norm_squared() > reach * reach {
            return None;
        }
        (0.0, 0.0)
    } else {
        let (t0, t1) = ray_sphere(&a.position, &displacement, &b.position, radius_sum)?;
        // [0, 1] along the ray to [0, dt] in time.
        (t0 * dt, t1 * dt)
    };

    // Touching only in the past.
    if t1 < 0.0 {
        return None;
    }
    let time_of_impact = t0.max(0.0);
    if time_of_impact > dt {
        return None;
    }

    let center_a = a.at(time_of_impact);
    let center_b = b.at(time_of_impact);
    let n = contact_normal(&center_a, &center_b, &displacement);

    Some(SweptHit {
        time_of_impact,
        point_on_a: center_a + n * a.radius,
        point_on_b: center_b - n * b.radius,
    })
}

/// Unit vector from `from` toward `to`.
///
/// Coincident centers fall back to the direction of relative motion, then
/// to +Y.
fn contact_normal(from: &Point3<f64>, to: &Point3<f64>, motion: &Vector3<f64>) -> Vector3<f64> {
    (to - from)
        .try_normalize(f64::EPSILON)
        .or_else(|| motion.try_normalize(f64::EPSILON))
        .unwrap_or_else(Vector3::y)
}

/// Continuous collision test between two bodies over a step of length `dt`.
///
/// On a hit, both bodies are advanced to the time of impact to capture the
/// contact points in body space and the normal, then rewound. Their state
/// on return matches the state on entry up to rounding.
///
/// Returns `None` for shape combinations without a routine.
pub fn intersect(
    a: &mut Body,
    shape_a: &Shape,
    b: &mut Body,
    shape_b: &Shape,
    dt: f64,
    epsilon: f64,
) -> Option<Contact> {
    let sphere_a = shape_a.as_sphere()?;
    let sphere_b = shape_b.as_sphere()?;

    let hit = sphere_sphere_dynamic(
        &MovingSphere::of_body(a, sphere_a.radius),
        &MovingSphere::of_body(b, sphere_b.radius),
        dt,
        epsilon,
    )?;
    let toi = hit.time_of_impact;

    a.update(toi);
    b.update(toi);

    let point_on_a_local = a.world_to_body(&hit.point_on_a);
    let point_on_b_local = b.world_to_body(&hit.point_on_b);

    let center_a = a.center_of_mass_world();
    let center_b = b.center_of_mass_world();
    let normal = contact_normal(
        &center_a,
        &center_b,
        &(a.linear_velocity - b.linear_velocity),
    );
    let separation = (center_b - center_a).norm() - (sphere_a.radius + sphere_b.radius);

    a.update(-toi);
    b.update(-toi);

    Some(Contact {
        body_a: a.id,
        body_b: b.id,
        point_on_a_world: hit.point_on_a,
        point_on_b_world: hit.point_on_b,
        point_on_a_local,
        point_on_b_local,
        normal,
        separation,
        time_of_impact: toi,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::body::BodyDesc;
    use approx::assert_relative_eq;
    use impulse_types::{BodyId, ShapeId};

    const EPS: f64 = 0.001;

    fn moving(radius: f64, position: [f64; 3], velocity: [f64; 3]) -> MovingSphere {
        MovingSphere {
            radius,
            position: Point3::from(position),
            velocity: Vector3::from(velocity),
        }
    }

    fn unit_ball(index: usize, position: Point3<f64>, velocity: Vector3<f64>) -> Body {
        let desc = BodyDesc::new(ShapeId::new(0), position).with_linear_velocity(velocity);
        Body::new(BodyId::new(index), desc, &Shape::sphere(1.0)).unwrap()
    }

    #[test]
    fn test_ray_sphere_hit() {
        let (t0, t1) = ray_sphere(
            &Point3::origin(),
            &Vector3::new(1.0, 0.0, 0.0),
            &Point3::new(5.0, 0.0, 0.0),
            1.0,
        )
        .unwrap();
        assert_relative_eq!(t0, 4.0, epsilon = 1e-12);
        assert_relative_eq!(t1, 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_ray_sphere_scales_with_direction_length() {
        let (t0, t1) = ray_sphere(
            &Point3::origin(),
            &Vector3::new(2.0, 0.0, 0.0),
            &Point3::new(5.0, 0.0, 0.0),
            1.0,
        )
        .unwrap();
        assert_relative_eq!(t0, 2.0, epsilon = 1e-12);
        assert_relative_eq!(t1, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_ray_sphere_miss() {
        let result = ray_sphere(
            &Point3::origin(),
            &Vector3::new(1.0, 0.0, 0.0),
            &Point3::new(5.0, 3.0, 0.0),
            1.0,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_approaching_spheres_hit_at_half_step() {
        let a = moving(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]);
        let b = moving(1.0, [3.0, 0.0, 0.0], [-2.0, 0.0, 0.0]);
        let hit = sphere_sphere_dynamic(&a, &b, 1.0, EPS).unwrap();

        assert_relative_eq!(hit.time_of_impact, 0.5, epsilon = 1e-12);
        assert_relative_eq!(hit.point_on_a.coords, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(hit.point_on_b.coords, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_slow_approach_misses_this_step() {
        let a = moving(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]);
        let b = moving(1.0, [3.0, 0.0, 0.0], [-0.5, 0.0, 0.0]);
        assert!(sphere_sphere_dynamic(&a, &b, 1.0, EPS).is_none());
    }

    #[test]
    fn test_receding_spheres_miss() {
        let a = moving(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]);
        let b = moving(1.0, [3.0, 0.0, 0.0], [5.0, 0.0, 0.0]);
        assert!(sphere_sphere_dynamic(&a, &b, 1.0, EPS).is_none());
    }

    #[test]
    fn test_overlapping_spheres_hit_immediately() {
        let a = moving(1.0, [0.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let b = moving(1.0, [1.5, 0.0, 0.0], [0.0, 0.0, 0.0]);
        let hit = sphere_sphere_dynamic(&a, &b, 1.0, EPS).unwrap();
        assert_eq!(hit.time_of_impact, 0.0);
    }

    #[test]
    fn test_negligible_motion_uses_distance() {
        let still = moving(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]);

        let touching = moving(1.0, [2.0005, 0.0, 0.0], [0.0, 0.0, 0.0]);
        let hit = sphere_sphere_dynamic(&still, &touching, 1.0, EPS).unwrap();
        assert_eq!(hit.time_of_impact, 0.0);

        let apart = moving(1.0, [2.01, 0.0, 0.0], [0.0, 0.0, 0.0]);
        assert!(sphere_sphere_dynamic(&still, &apart, 1.0, EPS).is_none());
    }

    #[test]
    fn test_glancing_miss() {
        let a = moving(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]);
        let b = moving(1.0, [5.0, 2.5, 0.0], [-10.0, 0.0, 0.0]);
        assert!(sphere_sphere_dynamic(&a, &b, 1.0, EPS).is_none());
    }

    #[test]
    fn test_intersect_builds_contact_and_rewinds() {
        let mut a = unit_ball(0, Point3::origin(), Vector3::zeros());
        let mut b = unit_ball(1, Point3::new(3.0, 0.0, 0.0), Vector3::new(-2.0, 0.0, 0.0));
        b.angular_velocity = Vector3::new(0.0, 3.0, 0.0);
        let (pose_a, pose_b) = (a.pose, b.pose);
        let shape = Shape::sphere(1.0);

        let contact = intersect(&mut a, &shape, &mut b, &shape, 1.0, EPS).unwrap();

        assert_eq!(contact.body_a, BodyId::new(0));
        assert_eq!(contact.body_b, BodyId::new(1));
        assert_relative_eq!(contact.time_of_impact, 0.5, epsilon = 1e-12);
        assert_relative_eq!(contact.normal, Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(contact.separation, 0.0, epsilon = 1e-12);
        assert_relative_eq!(
            contact.point_on_a_local.coords,
            Vector3::new(1.0, 0.0, 0.0),
            epsilon = 1e-12
        );

        // Rewound to the pre-probe state.
        assert_relative_eq!(a.pose.position.coords, pose_a.position.coords, epsilon = 1e-12);
        assert_relative_eq!(b.pose.position.coords, pose_b.position.coords, epsilon = 1e-12);
        assert_relative_eq!(b.pose.rotation.coords, pose_b.rotation.coords, epsilon = 1e-12);
    }

    #[test]
    fn test_intersect_local_point_tracks_rotation() {
        let mut a = unit_ball(0, Point3::origin(), Vector3::zeros());
        let mut b = unit_ball(1, Point3::new(3.0, 0.0, 0.0), Vector3::new(-2.0, 0.0, 0.0));
        // B turns a quarter about Z by the time of impact.
        b.angular_velocity = Vector3::new(0.0, 0.0, std::f64::consts::PI);
        let shape = Shape::sphere(1.0);

        let contact = intersect(&mut a, &shape, &mut b, &shape, 1.0, EPS).unwrap();

        // The hit is on B's world -X side; a quarter turn about Z maps body +Y there.
        assert_relative_eq!(
            contact.point_on_b_local.coords,
            Vector3::new(0.0, 1.0, 0.0),
            epsilon = 1e-9
        );
    }
}

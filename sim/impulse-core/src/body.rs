//! Rigid bodies: per-object state, integration and impulse response.
//!
//! A [`Body`] holds its pose, velocities, inverse mass and surface material.
//! Its shape lives in the scene's shape arena and is referenced by
//! [`ShapeId`]; the unit-mass inertia and center of mass derived from that
//! shape are cached on the body when it is created, so integration and
//! impulse application never need the arena.
//!
//! An inverse mass of zero marks an immovable body. Every impulse entry
//! point checks for it, so such a body keeps its velocities forever while
//! still acting as an obstacle for collision detection.

use impulse_types::{
    BodyId, MassProperties, Material, Pose, ShapeId, SimError, SinkId, UnitQuaternion,
};
use nalgebra::{Matrix3, Point3, Vector3};

use crate::math;
use crate::shape::Shape;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Ceiling on angular speed after an angular impulse (rad/s).
///
/// A numerical safety valve against runaway spin, not a physical limit.
pub const MAX_ANGULAR_SPEED: f64 = 30.0;

/// Construction parameters for a [`Body`].
///
/// # Example
///
/// ```
/// use impulse_core::BodyDesc;
/// use impulse_types::{Material, ShapeId};
/// use nalgebra::{Point3, Vector3};
///
/// let desc = BodyDesc::new(ShapeId::new(0), Point3::new(0.0, 10.0, 0.0))
///     .with_mass(2.0)
///     .with_material(Material::new(0.8, 0.3))
///     .with_linear_velocity(Vector3::new(1.0, 0.0, 0.0))
///     .with_name("ball");
///
/// assert_eq!(desc.inverse_mass, 0.5);
/// assert!(desc.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyDesc {
    /// Shape handle.
    pub shape: ShapeId,
    /// Initial pose.
    pub pose: Pose,
    /// Initial linear velocity.
    pub linear_velocity: Vector3<f64>,
    /// Initial angular velocity.
    pub angular_velocity: Vector3<f64>,
    /// Inverse mass; zero for an immovable body.
    pub inverse_mass: f64,
    /// Surface coefficients.
    pub material: Material,
    /// Presentation sink receiving this body's transform.
    pub sink: Option<SinkId>,
    /// Optional name for lookup and debugging.
    pub name: Option<String>,
}

impl BodyDesc {
    /// A unit-mass body at rest at `position`.
    #[must_use]
    pub fn new(shape: ShapeId, position: Point3<f64>) -> Self {
        Self {
            shape,
            pose: Pose::from_position(position),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            inverse_mass: 1.0,
            material: Material::default(),
            sink: None,
            name: None,
        }
    }

    /// Set the orientation.
    #[must_use]
    pub fn with_orientation(mut self, orientation: UnitQuaternion<f64>) -> Self {
        self.pose.rotation = orientation;
        self
    }

    /// Set the inverse mass directly.
    #[must_use]
    pub fn with_inverse_mass(mut self, inverse_mass: f64) -> Self {
        self.inverse_mass = inverse_mass;
        self
    }

    /// Set the mass. A non-positive or infinite mass makes the body immovable.
    #[must_use]
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.inverse_mass = if mass > 0.0 && mass.is_finite() {
            1.0 / mass
        } else {
            0.0
        };
        self
    }

    /// Make the body immovable (infinite mass).
    #[must_use]
    pub fn fixed(mut self) -> Self {
        self.inverse_mass = 0.0;
        self
    }

    /// Set the surface material.
    #[must_use]
    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    /// Set the initial linear velocity.
    #[must_use]
    pub fn with_linear_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.linear_velocity = velocity;
        self
    }

    /// Set the initial angular velocity.
    #[must_use]
    pub fn with_angular_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.angular_velocity = velocity;
        self
    }

    /// Attach a presentation sink.
    #[must_use]
    pub fn with_sink(mut self, sink: SinkId) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the body name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Validate the description.
    ///
    /// # Errors
    ///
    /// Returns an error for a negative or non-finite inverse mass, a
    /// material outside `[0, 1]`, or non-finite initial state.
    pub fn validate(&self) -> impulse_types::Result<()> {
        if !self.inverse_mass.is_finite() || self.inverse_mass < 0.0 {
            return Err(SimError::invalid_mass(format!(
                "inverse mass must be finite and non-negative, got {}",
                self.inverse_mass
            )));
        }
        self.material.validate()?;
        if !self.pose.is_finite()
            || !self.linear_velocity.iter().all(|x| x.is_finite())
            || !self.angular_velocity.iter().all(|x| x.is_finite())
        {
            return Err(SimError::invalid_config("initial body state must be finite"));
        }
        Ok(())
    }
}

/// A rigid body in the simulation world.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Body {
    /// Handle of this body in its world.
    pub id: BodyId,
    /// Optional name for debugging.
    pub name: Option<String>,
    /// Position of the body origin and orientation.
    pub pose: Pose,
    /// Linear velocity of the center of mass (m/s).
    pub linear_velocity: Vector3<f64>,
    /// Angular velocity about the center of mass (rad/s, world frame).
    pub angular_velocity: Vector3<f64>,
    /// Inverse mass; zero for an immovable body.
    pub inverse_mass: f64,
    /// Elasticity and friction.
    pub material: Material,
    /// Shape handle.
    pub shape: ShapeId,
    /// Presentation sink handle.
    pub sink: Option<SinkId>,
    mass_props: MassProperties,
}

impl Body {
    /// Create a body from its description and the shape it references.
    ///
    /// # Errors
    ///
    /// Returns an error if the description is invalid or the shape is
    /// degenerate (zero radius, singular inertia).
    pub fn new(id: BodyId, desc: BodyDesc, shape: &Shape) -> impulse_types::Result<Self> {
        desc.validate()?;
        let mass_props = shape.mass_properties()?;

        Ok(Self {
            id,
            name: desc.name,
            pose: desc.pose,
            linear_velocity: desc.linear_velocity,
            angular_velocity: desc.angular_velocity,
            inverse_mass: desc.inverse_mass,
            material: desc.material,
            shape: desc.shape,
            sink: desc.sink,
            mass_props,
        })
    }

    /// Current pose.
    #[must_use]
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Cached unit-mass properties of the body's shape.
    #[must_use]
    pub fn mass_properties(&self) -> &MassProperties {
        &self.mass_props
    }

    /// True for an infinite-mass (immovable) body.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.inverse_mass == 0.0
    }

    /// Mass in kg, or `None` for an immovable body.
    #[must_use]
    pub fn mass(&self) -> Option<f64> {
        (!self.is_static()).then(|| 1.0 / self.inverse_mass)
    }

    /// Advance the body by `dt` seconds.
    ///
    /// Translates by the linear velocity, adds the torque-free precession
    /// term to the angular velocity, then rotates the body about its center
    /// of mass. A negative `dt` undoes a prior call with the same magnitude,
    /// which the narrowphase relies on to probe the time of impact.
    pub fn update(&mut self, dt: f64) {
        self.pose.position += self.linear_velocity * dt;

        // Angular velocity is about the center of mass, so the origin has to
        // be carried around it.
        let com = self.center_of_mass_world();
        let com_to_origin = self.pose.position - com;

        // α = I⁻¹ (ω × Iω); external torques arrive as impulses instead.
        let rotation = self.pose.rotation_matrix();
        let inertia = math::rotate_tensor(&rotation, &self.mass_props.inertia);
        let inverse_inertia = math::rotate_tensor(&rotation, &self.mass_props.inverse_inertia);
        let alpha =
            inverse_inertia * self.angular_velocity.cross(&(inertia * self.angular_velocity));
        self.angular_velocity += alpha * dt;

        let dq = math::incremental_rotation(&(self.angular_velocity * dt));
        self.pose.rotation = dq * self.pose.rotation;
        self.pose.rotation.renormalize();

        self.pose.position = com + dq * com_to_origin;
    }

    /// Center of mass in world space.
    #[must_use]
    pub fn center_of_mass_world(&self) -> Point3<f64> {
        self.pose
            .transform_point(&Point3::from(self.mass_props.center_of_mass))
    }

    /// Center of mass in body space.
    #[must_use]
    pub fn center_of_mass_body(&self) -> Point3<f64> {
        Point3::from(self.mass_props.center_of_mass)
    }

    /// Express a world point relative to the center of mass, in body axes.
    #[must_use]
    pub fn world_to_body(&self, world_point: &Point3<f64>) -> Point3<f64> {
        let offset = world_point - self.center_of_mass_world();
        Point3::from(self.pose.rotation.inverse() * offset)
    }

    /// Inverse of [`world_to_body`](Self::world_to_body).
    #[must_use]
    pub fn body_to_world(&self, body_point: &Point3<f64>) -> Point3<f64> {
        self.center_of_mass_world() + self.pose.rotation * body_point.coords
    }

    /// World-space inertia tensor scaled by mass: m·R·I·Rᵗ.
    ///
    /// Zero for an immovable body.
    #[must_use]
    pub fn inertia_world(&self) -> Matrix3<f64> {
        self.mass().map_or_else(Matrix3::zeros, |mass| {
            math::rotate_tensor(&self.pose.rotation_matrix(), &self.mass_props.inertia) * mass
        })
    }

    /// Inverse inertia tensor in body space: I⁻¹ · inverse mass.
    #[must_use]
    pub fn inverse_inertia_body(&self) -> Matrix3<f64> {
        self.mass_props.inverse_inertia * self.inverse_mass
    }

    /// Inverse inertia tensor in world space: R · body inverse · Rᵗ.
    #[must_use]
    pub fn inverse_inertia_world(&self) -> Matrix3<f64> {
        math::rotate_tensor(&self.pose.rotation_matrix(), &self.inverse_inertia_body())
    }

    /// Apply a linear impulse through the center of mass.
    pub fn apply_impulse_linear(&mut self, impulse: &Vector3<f64>) {
        if self.is_static() {
            return;
        }
        // dv = J / m
        self.linear_velocity += impulse * self.inverse_mass;
    }

    /// Apply an angular impulse (a change in angular momentum, world frame).
    ///
    /// The resulting angular speed is clamped to [`MAX_ANGULAR_SPEED`].
    pub fn apply_impulse_angular(&mut self, impulse: &Vector3<f64>) {
        if self.is_static() {
            return;
        }
        // dω = I⁻¹ · dL
        self.angular_velocity += self.inverse_inertia_world() * impulse;
        self.angular_velocity = math::clamp_magnitude(self.angular_velocity, MAX_ANGULAR_SPEED);
    }

    /// Apply an impulse at a world-space point.
    ///
    /// Produces the linear change plus the angular change from the torque
    /// impulse `r × J`, with `r` measured from the center of mass.
    pub fn apply_impulse(&mut self, point: &Point3<f64>, impulse: &Vector3<f64>) {
        if self.is_static() {
            return;
        }
        self.apply_impulse_linear(impulse);

        let r = point - self.center_of_mass_world();
        self.apply_impulse_angular(&r.cross(impulse));
    }

    /// Velocity of the material point currently at `world_point`.
    #[must_use]
    pub fn point_velocity(&self, world_point: &Point3<f64>) -> Vector3<f64> {
        let r = world_point - self.center_of_mass_world();
        self.linear_velocity + self.angular_velocity.cross(&r)
    }

    /// Translational plus rotational kinetic energy. Zero when immovable.
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        let Some(mass) = self.mass() else {
            return 0.0;
        };
        let linear = 0.5 * mass * self.linear_velocity.norm_squared();
        let angular = 0.5
            * self
                .angular_velocity
                .dot(&(self.inertia_world() * self.angular_velocity));
        linear + angular
    }

    /// Linear momentum m·v. Zero when immovable.
    #[must_use]
    pub fn linear_momentum(&self) -> Vector3<f64> {
        self.mass()
            .map_or_else(Vector3::zeros, |mass| self.linear_velocity * mass)
    }

    /// Check if the state contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.pose.is_finite()
            && self.linear_velocity.iter().all(|x| x.is_finite())
            && self.angular_velocity.iter().all(|x| x.is_finite())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sphere_body(position: Point3<f64>, radius: f64) -> Body {
        let shape = Shape::sphere(radius);
        Body::new(BodyId::new(0), BodyDesc::new(ShapeId::new(0), position), &shape).unwrap()
    }

    #[test]
    fn test_update_translates() {
        let mut body = sphere_body(Point3::origin(), 1.0);
        body.linear_velocity = Vector3::new(2.0, 0.0, -1.0);
        body.update(0.5);

        assert_relative_eq!(
            body.pose.position.coords,
            Vector3::new(1.0, 0.0, -0.5),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_update_rotates_about_center_of_mass() {
        let mut body = sphere_body(Point3::new(1.0, 2.0, 3.0), 1.0);
        body.angular_velocity = Vector3::new(0.0, 0.0, std::f64::consts::PI);
        body.update(0.5);

        // Half a second at π rad/s about Z: a quarter turn, no translation.
        assert_relative_eq!(body.pose.rotation.angle(), std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(
            body.pose.position.coords,
            Vector3::new(1.0, 2.0, 3.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_update_then_reverse_restores_pose() {
        let mut body = sphere_body(Point3::new(-3.0, 4.0, 0.5), 0.7);
        body.linear_velocity = Vector3::new(3.0, -2.0, 7.0);
        body.angular_velocity = Vector3::new(1.5, -4.0, 2.5);
        let before = body.pose;

        body.update(0.37);
        body.update(-0.37);

        assert_relative_eq!(body.pose.position.coords, before.position.coords, epsilon = 1e-10);
        assert_relative_eq!(body.pose.rotation.coords, before.rotation.coords, epsilon = 1e-10);
    }

    #[test]
    fn test_orientation_stays_unit() {
        let mut body = sphere_body(Point3::origin(), 1.0);
        body.angular_velocity = Vector3::new(7.0, -3.0, 11.0);

        for _ in 0..1000 {
            body.update(1.0 / 60.0);
            assert_relative_eq!(body.pose.rotation.coords.norm(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_sphere_has_no_precession() {
        let mut body = sphere_body(Point3::origin(), 2.0);
        let omega = Vector3::new(1.0, 2.0, 3.0);
        body.angular_velocity = omega;
        body.update(0.1);

        assert_relative_eq!(body.angular_velocity, omega, epsilon = 1e-12);
    }

    #[test]
    fn test_center_of_mass_transforms_round_trip() {
        let mut body = sphere_body(Point3::new(1.0, 0.0, 0.0), 1.0);
        body.pose.rotation = UnitQuaternion::from_euler_angles(0.4, -0.2, 1.3);

        assert_eq!(body.center_of_mass_world(), Point3::new(1.0, 0.0, 0.0));
        assert_eq!(body.center_of_mass_body(), Point3::origin());

        let world = Point3::new(2.0, 3.0, -1.0);
        let local = body.world_to_body(&world);
        assert_relative_eq!(body.body_to_world(&local).coords, world.coords, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_inertia() {
        let shape = Shape::sphere(1.0);
        let desc = BodyDesc::new(ShapeId::new(0), Point3::origin()).with_mass(2.0);
        let body = Body::new(BodyId::new(0), desc, &shape).unwrap();

        // (I⁻¹ for unit mass = 1 / 0.4) * (1 / 2)
        let expected = Matrix3::identity() * (1.0 / 0.4) * 0.5;
        assert_relative_eq!(body.inverse_inertia_body(), expected, epsilon = 1e-12);
        assert_relative_eq!(body.inverse_inertia_world(), expected, epsilon = 1e-12);
        assert_relative_eq!(
            body.inverse_inertia_world() * body.inertia_world(),
            Matrix3::identity(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_linear_impulse() {
        let shape = Shape::sphere(1.0);
        let desc = BodyDesc::new(ShapeId::new(0), Point3::origin()).with_mass(4.0);
        let mut body = Body::new(BodyId::new(0), desc, &shape).unwrap();

        body.apply_impulse_linear(&Vector3::new(8.0, 0.0, 0.0));
        assert_relative_eq!(body.linear_velocity, Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(body.linear_momentum(), Vector3::new(8.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(body.kinetic_energy(), 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_static_body_ignores_impulses() {
        let shape = Shape::sphere(1.0);
        let desc = BodyDesc::new(ShapeId::new(0), Point3::origin())
            .fixed()
            .with_linear_velocity(Vector3::new(0.0, 1.0, 0.0));
        let mut body = Body::new(BodyId::new(0), desc, &shape).unwrap();

        body.apply_impulse_linear(&Vector3::new(100.0, 0.0, 0.0));
        body.apply_impulse_angular(&Vector3::new(0.0, 100.0, 0.0));
        body.apply_impulse(&Point3::new(1.0, 0.0, 0.0), &Vector3::new(0.0, 0.0, 50.0));

        assert!(body.is_static());
        assert_eq!(body.mass(), None);
        assert_eq!(body.linear_velocity, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(body.angular_velocity, Vector3::zeros());
        assert_eq!(body.kinetic_energy(), 0.0);
    }

    #[test]
    fn test_angular_speed_is_clamped() {
        let mut body = sphere_body(Point3::origin(), 0.1);
        body.apply_impulse_angular(&Vector3::new(1000.0, -500.0, 250.0));

        assert_relative_eq!(body.angular_velocity.norm(), MAX_ANGULAR_SPEED, epsilon = 1e-9);
        // Direction is preserved.
        let direction = Vector3::new(1000.0, -500.0, 250.0).normalize();
        assert_relative_eq!(body.angular_velocity.normalize(), direction, epsilon = 1e-12);
    }

    #[test]
    fn test_off_center_impulse_spins() {
        let mut body = sphere_body(Point3::origin(), 1.0);
        // Push +Y at the +X surface: spin about +Z.
        body.apply_impulse(&Point3::new(1.0, 0.0, 0.0), &Vector3::new(0.0, 0.4, 0.0));

        assert_relative_eq!(body.linear_velocity, Vector3::new(0.0, 0.4, 0.0), epsilon = 1e-12);
        // dω = I⁻¹ (r × J) = (1 / 0.4) * (0, 0, 0.4)
        assert_relative_eq!(body.angular_velocity, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);

        let v = body.point_velocity(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(v, Vector3::new(0.0, 1.4, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_with_mass_edge_cases() {
        let id = ShapeId::new(0);
        assert_eq!(BodyDesc::new(id, Point3::origin()).with_mass(0.0).inverse_mass, 0.0);
        assert_eq!(
            BodyDesc::new(id, Point3::origin())
                .with_mass(f64::INFINITY)
                .inverse_mass,
            0.0
        );
    }

    #[test]
    fn test_invalid_descriptions_rejected() {
        let shape = Shape::sphere(1.0);
        let id = ShapeId::new(0);

        let negative = BodyDesc::new(id, Point3::origin()).with_inverse_mass(-1.0);
        assert!(Body::new(BodyId::new(0), negative, &shape).is_err());

        let bad_material =
            BodyDesc::new(id, Point3::origin()).with_material(Material::new(2.0, 0.5));
        assert!(Body::new(BodyId::new(0), bad_material, &shape).is_err());

        let nan_velocity =
            BodyDesc::new(id, Point3::origin()).with_linear_velocity(Vector3::new(f64::NAN, 0.0, 0.0));
        assert!(Body::new(BodyId::new(0), nan_velocity, &shape).is_err());

        let ok = BodyDesc::new(id, Point3::origin());
        assert!(Body::new(BodyId::new(0), ok, &Shape::sphere(0.0)).is_err());
    }
}

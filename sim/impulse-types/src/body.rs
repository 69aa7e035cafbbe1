//! Rigid body data types.
//!
//! Handles into the scene arenas, the pose of a body, its surface material
//! and the mass properties derived from its shape.

use nalgebra::{Matrix3, Point3, Rotation3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name(pub usize);

        impl $name {
            /// Create an ID from an arena index.
            #[must_use]
            pub const fn new(index: usize) -> Self {
                Self(index)
            }

            /// Get the arena index.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0
            }
        }

        impl From<usize> for $name {
            fn from(index: usize) -> Self {
                Self(index)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }
    };
}

arena_id!(
    /// Stable handle to a body in the scene's body arena.
    BodyId,
    "Body"
);

arena_id!(
    /// Stable handle to a shape in the scene's shape arena.
    ///
    /// Several bodies may share one shape.
    ShapeId,
    "Shape"
);

arena_id!(
    /// Stable handle to a presentation transform sink owned by the scene.
    SinkId,
    "Sink"
);

/// Position and orientation of a rigid body.
///
/// # Example
///
/// ```
/// use impulse_types::Pose;
/// use nalgebra::Point3;
///
/// let pose = Pose::from_position(Point3::new(1.0, 2.0, 3.0));
/// let world = pose.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert_eq!(world, Point3::new(2.0, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Position in world coordinates.
    pub position: Point3<f64>,
    /// Orientation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Create an identity pose (origin, no rotation).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from position only (identity rotation).
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from position and rotation.
    #[must_use]
    pub const fn from_position_rotation(
        position: Point3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Self { position, rotation }
    }

    /// Transform a point from local to world coordinates.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Transform a vector from local to world coordinates (rotation only).
    #[must_use]
    pub fn transform_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// Transform a point from world to local coordinates.
    #[must_use]
    pub fn inverse_transform_point(&self, world: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation.inverse() * (world - self.position))
    }

    /// Rotation part as a 3×3 rotation matrix.
    #[must_use]
    pub fn rotation_matrix(&self) -> Rotation3<f64> {
        self.rotation.to_rotation_matrix()
    }

    /// Check if the pose contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.rotation.coords.iter().all(|x| x.is_finite())
    }
}

/// Surface response coefficients of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Material {
    /// Coefficient of restitution in `[0, 1]`.
    pub elasticity: f64,
    /// Coefficient of friction in `[0, 1]`.
    pub friction: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            elasticity: 0.5,
            friction: 0.5,
        }
    }
}

impl Material {
    /// Create a material with the given coefficients.
    #[must_use]
    pub const fn new(elasticity: f64, friction: f64) -> Self {
        Self {
            elasticity,
            friction,
        }
    }

    /// A perfectly elastic, frictionless surface.
    #[must_use]
    pub const fn bouncy() -> Self {
        Self::new(1.0, 0.0)
    }

    /// Validate that both coefficients lie in `[0, 1]`.
    pub fn validate(&self) -> crate::Result<()> {
        if !(0.0..=1.0).contains(&self.elasticity) {
            return Err(crate::SimError::invalid_material(format!(
                "elasticity {} not in [0, 1]",
                self.elasticity
            )));
        }
        if !(0.0..=1.0).contains(&self.friction) {
            return Err(crate::SimError::invalid_material(format!(
                "friction {} not in [0, 1]",
                self.friction
            )));
        }
        Ok(())
    }
}

/// Mass properties of a shape, per unit mass.
///
/// The inertia tensor is expressed about the center of mass in body space
/// and normalised to unit mass; a body scales its inverse by its own inverse
/// mass. The inverse is computed once, so a singular tensor is rejected at
/// construction rather than discovered mid-tick.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// Center of mass offset from the body origin, in body space.
    pub center_of_mass: Vector3<f64>,
    /// Unit-mass inertia tensor about the center of mass (body space).
    pub inertia: Matrix3<f64>,
    /// Inverse of `inertia`.
    pub inverse_inertia: Matrix3<f64>,
}

impl MassProperties {
    /// Build mass properties from a center of mass and inertia tensor.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidMassProperties`](crate::SimError) if any
    /// entry is non-finite or the tensor cannot be inverted.
    pub fn new(center_of_mass: Vector3<f64>, inertia: Matrix3<f64>) -> crate::Result<Self> {
        if !center_of_mass.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_mass(
                "center of mass must be finite",
            ));
        }
        if !inertia.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_mass(
                "inertia tensor must be finite",
            ));
        }
        let inverse_inertia = inertia
            .try_inverse()
            .ok_or_else(|| crate::SimError::invalid_mass("inertia tensor is singular"))?;

        Ok(Self {
            center_of_mass,
            inertia,
            inverse_inertia,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ids() {
        let id = BodyId::new(42);
        assert_eq!(id.index(), 42);
        assert_eq!(id.to_string(), "Body(42)");

        let shape: ShapeId = 7.into();
        assert_eq!(shape.to_string(), "Shape(7)");
        assert_eq!(SinkId::new(1).index(), 1);
    }

    #[test]
    fn test_pose_rotation_round_trip() {
        let pose = Pose::from_position_rotation(
            Point3::new(1.0, 2.0, 3.0),
            UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3),
        );

        let local = Point3::new(0.5, -1.0, 2.0);
        let back = pose.inverse_transform_point(&pose.transform_point(&local));
        assert_relative_eq!(back.coords, local.coords, epsilon = 1e-12);
    }

    #[test]
    fn test_pose_transform_vector() {
        let pose = Pose::from_position_rotation(
            Point3::new(10.0, 0.0, 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
        );

        // Vectors ignore translation.
        let v = pose.transform_vector(&Vector3::x());
        assert_relative_eq!(v, Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(
            pose.rotation_matrix() * Vector3::x(),
            Vector3::y(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_pose_is_finite() {
        assert!(Pose::identity().is_finite());
        let pose = Pose::from_position(Point3::new(f64::NAN, 0.0, 0.0));
        assert!(!pose.is_finite());
    }

    #[test]
    fn test_material_validation() {
        assert!(Material::default().validate().is_ok());
        assert!(Material::bouncy().validate().is_ok());
        assert!(Material::new(1.5, 0.5).validate().is_err());
        assert!(Material::new(0.5, -0.1).validate().is_err());
        assert!(Material::new(f64::NAN, 0.5).validate().is_err());
    }

    #[test]
    fn test_mass_properties_inverse() {
        let inertia = Matrix3::from_diagonal(&Vector3::new(1.6, 0.5, 2.0));
        let props = MassProperties::new(Vector3::new(0.0, 0.1, 0.0), inertia).unwrap();
        assert_relative_eq!(props.inverse_inertia[(0, 0)], 1.0 / 1.6, epsilon = 1e-12);
        assert_relative_eq!(props.inverse_inertia[(1, 1)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(props.inverse_inertia[(2, 2)], 0.5, epsilon = 1e-12);
        assert_eq!(props.inverse_inertia[(0, 1)], 0.0);
    }

    #[test]
    fn test_singular_inertia_rejected() {
        assert!(MassProperties::new(Vector3::zeros(), Matrix3::zeros()).is_err());
        assert!(
            MassProperties::new(Vector3::new(f64::INFINITY, 0.0, 0.0), Matrix3::identity())
                .is_err()
        );
    }
}

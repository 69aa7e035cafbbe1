//! Collision shapes and their mass properties.
//!
//! [`Shape`] is a closed set of variants. Each variant answers the same
//! questions: its discriminant, its center of mass and unit-mass inertia
//! tensor in body space, and its bounds either locally or at a pose.
//! Only spheres exist today; adding a variant means adding an arm to each
//! `match` below and a narrowphase routine for the new pairs.

use impulse_types::{MassProperties, Pose, SimError};
use nalgebra::{Matrix3, Point3, Vector3};

use crate::bounds::Bounds;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Discriminant of a [`Shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShapeType {
    /// A solid sphere.
    Sphere,
}

/// A solid sphere centered on the body origin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sphere {
    /// Radius in meters.
    pub radius: f64,
}

impl Sphere {
    /// Create a sphere with the given radius.
    #[must_use]
    pub const fn new(radius: f64) -> Self {
        Self { radius }
    }
}

/// Collision shape attached to a body.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    /// Sphere variant.
    Sphere(Sphere),
}

impl Shape {
    /// Create a sphere shape.
    #[must_use]
    pub const fn sphere(radius: f64) -> Self {
        Self::Sphere(Sphere::new(radius))
    }

    /// Get the discriminant.
    #[must_use]
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Self::Sphere(_) => ShapeType::Sphere,
        }
    }

    /// Borrow the sphere payload, if this is a sphere.
    #[must_use]
    pub fn as_sphere(&self) -> Option<&Sphere> {
        match self {
            Self::Sphere(sphere) => Some(sphere),
        }
    }

    /// Center of mass in body space.
    #[must_use]
    pub fn center_of_mass(&self) -> Vector3<f64> {
        match self {
            Self::Sphere(_) => Vector3::zeros(),
        }
    }

    /// Unit-mass inertia tensor about the center of mass, in body space.
    #[must_use]
    pub fn inertia_tensor(&self) -> Matrix3<f64> {
        match self {
            Self::Sphere(sphere) => {
                Matrix3::from_diagonal_element(2.0 * sphere.radius * sphere.radius / 5.0)
            }
        }
    }

    /// Bounds in body space.
    #[must_use]
    pub fn local_bounds(&self) -> Bounds {
        match self {
            Self::Sphere(sphere) => {
                Bounds::from_center(Point3::origin(), Vector3::repeat(sphere.radius))
            }
        }
    }

    /// World-space bounds at the given pose.
    #[must_use]
    pub fn bounds(&self, pose: &Pose) -> Bounds {
        match self {
            // Rotation-invariant.
            Self::Sphere(sphere) => {
                Bounds::from_center(pose.position, Vector3::repeat(sphere.radius))
            }
        }
    }

    /// Radius of the smallest origin-centered sphere enclosing the shape.
    #[must_use]
    pub fn bounding_radius(&self) -> f64 {
        match self {
            Self::Sphere(sphere) => sphere.radius,
        }
    }

    /// Per-axis scale a unit presentation mesh needs to match this shape.
    #[must_use]
    pub fn presentation_scale(&self) -> Vector3<f64> {
        match self {
            Self::Sphere(sphere) => Vector3::repeat(sphere.radius),
        }
    }

    /// Check that the shape is non-degenerate.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidShape`] for a zero, negative or non-finite
    /// radius. Such shapes have a singular inertia tensor.
    pub fn validate(&self) -> impulse_types::Result<()> {
        match self {
            Self::Sphere(sphere) => {
                if !sphere.radius.is_finite() || sphere.radius <= 0.0 {
                    return Err(SimError::invalid_shape(format!(
                        "sphere radius must be positive and finite, got {}",
                        sphere.radius
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validate the shape and derive its mass properties.
    ///
    /// # Errors
    ///
    /// Returns an error if the shape is degenerate.
    pub fn mass_properties(&self) -> impulse_types::Result<MassProperties> {
        self.validate()?;
        MassProperties::new(self.center_of_mass(), self.inertia_tensor())
    }
}

impl From<Sphere> for Shape {
    fn from(sphere: Sphere) -> Self {
        Self::Sphere(sphere)
    }
}

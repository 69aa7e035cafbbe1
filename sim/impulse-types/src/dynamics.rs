//! External influences applied uniformly to every body each tick.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Gravity configuration.
///
/// The scene is Y-up: the default pulls along −Y.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gravity {
    /// Acceleration due to gravity (m/s²).
    pub acceleration: Vector3<f64>,
}

impl Default for Gravity {
    fn default() -> Self {
        Self::standard()
    }
}

impl Gravity {
    /// Game-standard gravity (10 m/s² in −Y direction).
    #[must_use]
    pub fn standard() -> Self {
        Self {
            acceleration: Vector3::new(0.0, -10.0, 0.0),
        }
    }

    /// Earth gravity (9.81 m/s² in −Y direction).
    #[must_use]
    pub fn earth() -> Self {
        Self {
            acceleration: Vector3::new(0.0, -9.81, 0.0),
        }
    }

    /// Zero gravity.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            acceleration: Vector3::zeros(),
        }
    }

    /// Custom gravity vector.
    #[must_use]
    pub fn custom(acceleration: Vector3<f64>) -> Self {
        Self { acceleration }
    }

    /// Impulse gravity delivers to a body of the given mass over `dt`.
    ///
    /// I = m·g·dt
    #[must_use]
    pub fn impulse_on_mass(&self, mass: f64, dt: f64) -> Vector3<f64> {
        self.acceleration * mass * dt
    }

    /// Check if gravity is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.acceleration == Vector3::zeros()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gravity_impulse() {
        let g = Gravity::standard();
        let impulse = g.impulse_on_mass(2.0, 0.5);
        assert_relative_eq!(impulse, Vector3::new(0.0, -10.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_gravity_presets() {
        assert_eq!(Gravity::default(), Gravity::standard());
        assert!(Gravity::zero().is_zero());
        assert!(!Gravity::earth().is_zero());
        assert_eq!(
            Gravity::custom(Vector3::new(0.0, 0.0, -1.0)).acceleration.z,
            -1.0
        );
    }
}

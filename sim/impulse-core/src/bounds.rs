//! Axis-aligned bounding boxes.
//!
//! A freshly created [`Bounds`] is *empty*: its corners are inverted to the
//! extremes (`mins = +∞`, `maxs = −∞`) so that the first expansion, by a
//! point or by another box, establishes the real extents.
//!
//! Overlap is inclusive: two boxes that merely touch on a face, edge or
//! corner are reported as overlapping. The broadphase only needs an
//! over-approximation, and treating contact as overlap never hides a pair.
//!
//! # Example
//!
//! ```
//! use impulse_core::Bounds;
//! use nalgebra::Point3;
//!
//! let mut bounds = Bounds::empty();
//! assert!(bounds.is_empty());
//!
//! bounds.expand_points(&[Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 3.0)]);
//! assert_eq!(bounds.width_y(), 2.0);
//! ```

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An axis-aligned box given by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounds {
    /// Minimum corner.
    pub mins: Point3<f64>,
    /// Maximum corner.
    pub maxs: Point3<f64>,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

impl Bounds {
    /// Create bounds from minimum and maximum corners.
    #[must_use]
    pub const fn new(mins: Point3<f64>, maxs: Point3<f64>) -> Self {
        Self { mins, maxs }
    }

    /// The empty (inverted) box.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            mins: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            maxs: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Create bounds centered at a point with the given half-extents.
    #[must_use]
    pub fn from_center(center: Point3<f64>, half_extents: Vector3<f64>) -> Self {
        Self {
            mins: center - half_extents,
            maxs: center + half_extents,
        }
    }

    /// Reset to the empty box.
    pub fn clear(&mut self) {
        *self = Self::empty();
    }

    /// True until the box has been expanded at least once.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mins.x > self.maxs.x || self.mins.y > self.maxs.y || self.mins.z > self.maxs.z
    }

    /// Check if this box overlaps another (touching counts).
    ///
    /// An empty box overlaps nothing.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.mins.x <= other.maxs.x
            && self.maxs.x >= other.mins.x
            && self.mins.y <= other.maxs.y
            && self.maxs.y >= other.mins.y
            && self.mins.z <= other.maxs.z
            && self.maxs.z >= other.mins.z
    }

    /// Check if a point lies inside or on the box.
    #[must_use]
    pub fn contains_point(&self, point: &Point3<f64>) -> bool {
        (self.mins.x..=self.maxs.x).contains(&point.x)
            && (self.mins.y..=self.maxs.y).contains(&point.y)
            && (self.mins.z..=self.maxs.z).contains(&point.z)
    }

    /// Grow the box to include a point.
    pub fn expand_point(&mut self, point: &Point3<f64>) {
        self.mins = self.mins.inf(point);
        self.maxs = self.maxs.sup(point);
    }

    /// Grow the box to include every point of a slice.
    pub fn expand_points(&mut self, points: &[Point3<f64>]) {
        for point in points {
            self.expand_point(point);
        }
    }

    /// Grow the box to include another box. Expanding by an empty box is a no-op.
    pub fn expand_bounds(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        self.expand_point(&other.mins);
        self.expand_point(&other.maxs);
    }

    /// Copy of this box grown by `margin` on all sides.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        let m = Vector3::repeat(margin);
        Self {
            mins: self.mins - m,
            maxs: self.maxs + m,
        }
    }

    /// Copy of this box shifted by `offset`.
    #[must_use]
    pub fn translated(&self, offset: &Vector3<f64>) -> Self {
        Self {
            mins: self.mins + offset,
            maxs: self.maxs + offset,
        }
    }

    /// Center point of the box.
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.mins, &self.maxs)
    }

    /// Extent along X.
    #[must_use]
    pub fn width_x(&self) -> f64 {
        self.maxs.x - self.mins.x
    }

    /// Extent along Y.
    #[must_use]
    pub fn width_y(&self) -> f64 {
        self.maxs.y - self.mins.y
    }

    /// Extent along Z.
    #[must_use]
    pub fn width_z(&self) -> f64 {
        self.maxs.z - self.mins.z
    }
}

//! Broad-phase pair pruning over swept bounds.
//!
//! Each body is enclosed in a box covering every pose it can reach during
//! the step: the union of its bounds at the start of the step and at
//! `position + velocity * dt`, grown by a small margin. Any two bodies that
//! meet during the step must have overlapping swept boxes, so a pair this
//! module drops can never collide. Reporting extra pairs is harmless; the
//! narrow phase filters them.
//!
//! Two algorithms implement [`BroadPhase`]:
//!
//! - [`BruteForce`] tests every pair, O(n²). Always correct and the
//!   reference the others are checked against.
//! - [`SweepAndPrune`] sorts intervals on the axis of largest spread and only
//!   tests pairs whose intervals overlap, then confirms on all three axes.
//!
//! [`BroadPhaseDetector`] picks one by body count.
//!
//! # Example
//!
//! ```
//! use impulse_core::Bounds;
//! use impulse_core::broad_phase::{BroadPhase, CollisionPair, SweepAndPrune};
//! use nalgebra::{Point3, Vector3};
//!
//! let bounds = vec![
//!     Bounds::from_center(Point3::new(0.0, 0.0, 0.0), Vector3::repeat(1.0)),
//!     Bounds::from_center(Point3::new(1.5, 0.0, 0.0), Vector3::repeat(1.0)),
//!     Bounds::from_center(Point3::new(9.0, 0.0, 0.0), Vector3::repeat(1.0)),
//! ];
//!
//! let mut pairs = Vec::new();
//! SweepAndPrune::new().find_pairs(&bounds, &mut pairs);
//!
//! assert_eq!(pairs, vec![CollisionPair::new(0, 1)]);
//! ```

use impulse_types::BodyId;
use nalgebra::Point3;

use crate::body::Body;
use crate::bounds::Bounds;
use crate::shape::Shape;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Two bodies that may collide this step. Always `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollisionPair {
    /// Lower-indexed body.
    pub a: BodyId,
    /// Higher-indexed body.
    pub b: BodyId,
}

impl CollisionPair {
    /// Create a pair from two distinct arena indices, in either order.
    #[must_use]
    pub fn new(i: usize, j: usize) -> Self {
        let (a, b) = if i <= j { (i, j) } else { (j, i) };
        Self {
            a: BodyId::new(a),
            b: BodyId::new(b),
        }
    }
}

/// Coordinate axis for sweep direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// X-axis.
    X,
    /// Y-axis (up).
    Y,
    /// Z-axis.
    Z,
}

impl Axis {
    /// Component of a point along this axis.
    #[must_use]
    pub fn of(self, point: &Point3<f64>) -> f64 {
        match self {
            Self::X => point.x,
            Self::Y => point.y,
            Self::Z => point.z,
        }
    }
}

/// Swept bounds of a body over a step of length `dt`, grown by `margin`.
#[must_use]
pub fn swept_bounds(body: &Body, shape: &Shape, dt: f64, margin: f64) -> Bounds {
    let start = shape.bounds(&body.pose);
    let mut bounds = start;
    bounds.expand_bounds(&start.translated(&(body.linear_velocity * dt)));
    bounds.expanded(margin)
}

/// A broad-phase algorithm over precomputed per-body bounds.
///
/// `bounds[i]` belongs to the body with arena index `i`. An empty box
/// takes no part in any pair.
pub trait BroadPhase {
    /// Replace the contents of `pairs` with every overlapping pair.
    ///
    /// Pairs come out sorted, so every implementation produces the same
    /// sequence for the same input.
    fn find_pairs(&mut self, bounds: &[Bounds], pairs: &mut Vec<CollisionPair>);
}

/// Simple O(n²) brute-force broad phase.
///
/// Checks every pair. Suitable for scenes with fewer than a few dozen
/// bodies, and the baseline for testing the faster algorithms.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForce;

impl BruteForce {
    /// Create a new brute-force broad phase.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl BroadPhase for BruteForce {
    fn find_pairs(&mut self, bounds: &[Bounds], pairs: &mut Vec<CollisionPair>) {
        pairs.clear();

        for (i, a) in bounds.iter().enumerate() {
            for (j, b) in bounds.iter().enumerate().skip(i + 1) {
                if a.intersects(b) {
                    pairs.push(CollisionPair::new(i, j));
                }
            }
        }
    }
}

/// An interval on the sweep axis.
#[derive(Debug, Clone, Copy)]
struct Interval {
    /// Index into the bounds slice.
    index: usize,
    min: f64,
    max: f64,
}

/// Sweep-and-Prune (Sort-and-Sweep) broad phase.
///
/// Projects each box onto the axis where box centers spread the most, sorts
/// by the lower endpoint and sweeps: once an interval starts past the current
/// one's end, no later interval can overlap it.
#[derive(Debug, Clone)]
pub struct SweepAndPrune {
    /// Sorted intervals, reused between calls.
    intervals: Vec<Interval>,
    sweep_axis: Axis,
}

impl Default for SweepAndPrune {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepAndPrune {
    /// Create a new sweep-and-prune broad phase.
    #[must_use]
    pub fn new() -> Self {
        Self {
            intervals: Vec::new(),
            sweep_axis: Axis::X,
        }
    }

    /// Axis used by the most recent sweep.
    #[must_use]
    pub fn sweep_axis(&self) -> Axis {
        self.sweep_axis
    }

    /// Pick the axis with the largest spread of box centers.
    fn choose_sweep_axis(bounds: &[Bounds]) -> Axis {
        let mut centers = Bounds::empty();
        for b in bounds.iter().filter(|b| !b.is_empty()) {
            centers.expand_point(&b.center());
        }
        if centers.is_empty() {
            return Axis::X;
        }

        let (x, y, z) = (centers.width_x(), centers.width_y(), centers.width_z());
        if x >= y && x >= z {
            Axis::X
        } else if y >= z {
            Axis::Y
        } else {
            Axis::Z
        }
    }
}

impl BroadPhase for SweepAndPrune {
    fn find_pairs(&mut self, bounds: &[Bounds], pairs: &mut Vec<CollisionPair>) {
        pairs.clear();
        self.sweep_axis = Self::choose_sweep_axis(bounds);

        let axis = self.sweep_axis;
        self.intervals.clear();
        self.intervals.extend(
            bounds
                .iter()
                .enumerate()
                .filter(|(_, b)| !b.is_empty())
                .map(|(index, b)| Interval {
                    index,
                    min: axis.of(&b.mins),
                    max: axis.of(&b.maxs),
                }),
        );

        // Nearly sorted from the previous step; the stable sort is adaptive.
        self.intervals.sort_by(|a, b| a.min.total_cmp(&b.min));

        for (k, current) in self.intervals.iter().enumerate() {
            for other in &self.intervals[k + 1..] {
                if other.min > current.max {
                    break;
                }
                // Confirm on all three axes, not just the sweep axis.
                if bounds[current.index].intersects(&bounds[other.index]) {
                    pairs.push(CollisionPair::new(current.index, other.index));
                }
            }
        }

        pairs.sort_unstable();
    }
}

/// Broad-phase algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BroadPhaseAlgorithm {
    /// Automatically choose based on body count.
    #[default]
    Auto,
    /// Always use brute force O(n²).
    BruteForce,
    /// Always use sweep-and-prune O(n log n).
    SweepAndPrune,
}

/// Configuration for broad-phase collision detection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BroadPhaseConfig {
    /// Algorithm to use.
    pub algorithm: BroadPhaseAlgorithm,
    /// Margin added to every swept box.
    pub margin: f64,
    /// Body count below which `Auto` uses brute force.
    pub brute_force_threshold: usize,
}

impl Default for BroadPhaseConfig {
    fn default() -> Self {
        Self {
            algorithm: BroadPhaseAlgorithm::Auto,
            margin: 0.01,
            brute_force_threshold: 32,
        }
    }
}

/// Swept-bounds computation plus algorithm selection.
///
/// Owns the per-body bounds buffer so repeated steps do not reallocate.
#[derive(Debug, Clone)]
pub struct BroadPhaseDetector {
    config: BroadPhaseConfig,
    sap: SweepAndPrune,
    brute: BruteForce,
    bounds: Vec<Bounds>,
}

impl Default for BroadPhaseDetector {
    fn default() -> Self {
        Self::new(BroadPhaseConfig::default())
    }
}

impl BroadPhaseDetector {
    /// Create a new broad-phase detector with the given configuration.
    #[must_use]
    pub fn new(config: BroadPhaseConfig) -> Self {
        Self {
            config,
            sap: SweepAndPrune::new(),
            brute: BruteForce::new(),
            bounds: Vec::new(),
        }
    }

    /// Find every body pair whose swept bounds overlap during `dt`.
    ///
    /// `bodies[i]` must have arena index `i`. A body whose shape handle does
    /// not resolve is left out.
    pub fn find_pairs(
        &mut self,
        bodies: &[Body],
        shapes: &[Shape],
        dt: f64,
        pairs: &mut Vec<CollisionPair>,
    ) {
        let margin = self.config.margin;
        self.bounds.clear();
        self.bounds.extend(bodies.iter().map(|body| {
            shapes
                .get(body.shape.index())
                .map_or_else(Bounds::empty, |shape| swept_bounds(body, shape, dt, margin))
        }));

        let use_brute = match self.config.algorithm {
            BroadPhaseAlgorithm::Auto => bodies.len() < self.config.brute_force_threshold,
            BroadPhaseAlgorithm::BruteForce => true,
            BroadPhaseAlgorithm::SweepAndPrune => false,
        };

        if use_brute {
            self.brute.find_pairs(&self.bounds, pairs);
        } else {
            self.sap.find_pairs(&self.bounds, pairs);
        }
    }

    /// Swept bounds computed by the last call to [`find_pairs`](Self::find_pairs).
    #[must_use]
    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    /// Get the current configuration.
    #[must_use]
    pub fn config(&self) -> &BroadPhaseConfig {
        &self.config
    }

    /// Replace the margin, keeping the algorithm choice.
    pub fn set_margin(&mut self, margin: f64) {
        self.config.margin = margin;
    }

    /// Update the configuration.
    pub fn set_config(&mut self, config: BroadPhaseConfig) {
        self.config = config;
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
    use impulse_types::ShapeId;
    use nalgebra::Vector3;

    fn unit_box(x: f64, y: f64, z: f64) -> Bounds {
        Bounds::from_center(Point3::new(x, y, z), Vector3::repeat(1.0))
    }

    fn sphere_body(index: usize, position: Point3<f64>, velocity: Vector3<f64>) -> Body {
        let desc = BodyDesc::new(ShapeId::new(0), position).with_linear_velocity(velocity);
        Body::new(BodyId::new(index), desc, &Shape::sphere(1.0)).unwrap()
    }

    #[test]
    fn test_pair_is_ordered() {
        let pair = CollisionPair::new(5, 2);
        assert_eq!(pair.a, BodyId::new(2));
        assert_eq!(pair.b, BodyId::new(5));
        assert_eq!(pair, CollisionPair::new(2, 5));
    }

    #[test]
    fn test_sweep_and_prune_finds_overlapping_boxes() {
        let bounds = vec![unit_box(0.0, 0.0, 0.0), unit_box(1.5, 0.0, 0.0)];
        let mut pairs = Vec::new();
        SweepAndPrune::new().find_pairs(&bounds, &mut pairs);

        assert_eq!(pairs, vec![CollisionPair::new(0, 1)]);
    }

    #[test]
    fn test_sweep_and_prune_no_overlap() {
        let bounds = vec![unit_box(0.0, 0.0, 0.0), unit_box(5.0, 0.0, 0.0)];
        let mut pairs = vec![CollisionPair::new(7, 8)];
        SweepAndPrune::new().find_pairs(&bounds, &mut pairs);

        assert!(pairs.is_empty(), "stale pairs should be cleared");
    }

    #[test]
    fn test_sweep_axis_follows_spread() {
        let bounds: Vec<_> = (0..5).map(|i| unit_box(0.0, f64::from(i) * 4.0, 0.0)).collect();
        let mut sap = SweepAndPrune::new();
        let mut pairs = Vec::new();
        sap.find_pairs(&bounds, &mut pairs);

        assert_eq!(sap.sweep_axis(), Axis::Y);
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_sweep_axis_overlap_is_confirmed_on_other_axes() {
        // Box 2 overlaps 0 and 1 on X but sits far above them.
        let bounds = vec![
            unit_box(0.0, 0.0, 0.0),
            unit_box(1.0, 0.0, 0.0),
            unit_box(1.5, 5.0, 0.0),
            unit_box(40.0, 0.0, 0.0),
        ];
        let mut sap = SweepAndPrune::new();
        let mut pairs = Vec::new();
        sap.find_pairs(&bounds, &mut pairs);

        assert_eq!(sap.sweep_axis(), Axis::X);
        assert_eq!(pairs, vec![CollisionPair::new(0, 1)]);
    }

    #[test]
    fn test_empty_bounds_are_skipped() {
        let bounds = vec![Bounds::empty(), unit_box(0.0, 0.0, 0.0), unit_box(0.5, 0.0, 0.0)];
        let mut sap_pairs = Vec::new();
        let mut brute_pairs = Vec::new();
        SweepAndPrune::new().find_pairs(&bounds, &mut sap_pairs);
        BruteForce::new().find_pairs(&bounds, &mut brute_pairs);

        assert_eq!(sap_pairs, vec![CollisionPair::new(1, 2)]);
        assert_eq!(sap_pairs, brute_pairs);
    }

    #[test]
    fn test_brute_force_matches_sap() {
        let bounds = vec![
            unit_box(0.0, 0.0, 0.0),
            unit_box(1.5, 0.0, 0.0),
            unit_box(0.0, 1.5, 0.0),
            unit_box(5.0, 0.0, 0.0),
            unit_box(6.0, 0.5, -0.5),
        ];

        let mut sap_pairs = Vec::new();
        let mut brute_pairs = Vec::new();
        SweepAndPrune::new().find_pairs(&bounds, &mut sap_pairs);
        BruteForce::new().find_pairs(&bounds, &mut brute_pairs);

        assert_eq!(sap_pairs, brute_pairs);
        assert_eq!(sap_pairs.len(), 4);
    }

    #[test]
    fn test_swept_bounds_cover_motion() {
        let body = sphere_body(0, Point3::origin(), Vector3::new(4.0, 0.0, -2.0));
        let bounds = swept_bounds(&body, &Shape::sphere(1.0), 0.5, 0.0);

        assert_eq!(bounds.mins, Point3::new(-1.0, -1.0, -2.0));
        assert_eq!(bounds.maxs, Point3::new(3.0, 1.0, 1.0));

        let grown = swept_bounds(&body, &Shape::sphere(1.0), 0.5, 0.25);
        assert_eq!(grown.mins.x, -1.25);
        assert_eq!(grown.maxs.x, 3.25);
    }

    #[test]
    fn test_fast_body_does_not_tunnel_past_broad_phase() {
        // Ten meters apart, but B covers the gap within the step.
        let shapes = vec![Shape::sphere(1.0)];
        let bodies = vec![
            sphere_body(0, Point3::origin(), Vector3::zeros()),
            sphere_body(1, Point3::new(10.0, 0.0, 0.0), Vector3::new(-600.0, 0.0, 0.0)),
        ];

        let mut detector = BroadPhaseDetector::default();
        let mut pairs = Vec::new();
        detector.find_pairs(&bodies, &shapes, 1.0 / 60.0, &mut pairs);

        assert_eq!(pairs, vec![CollisionPair::new(0, 1)]);
    }

    #[test]
    fn test_margin_expands_detection() {
        let shapes = vec![Shape::sphere(1.0)];
        let bodies = vec![
            sphere_body(0, Point3::origin(), Vector3::zeros()),
            sphere_body(1, Point3::new(2.1, 0.0, 0.0), Vector3::zeros()),
        ];
        let mut pairs = Vec::new();

        let mut tight = BroadPhaseDetector::new(BroadPhaseConfig {
            margin: 0.0,
            ..Default::default()
        });
        tight.find_pairs(&bodies, &shapes, 1.0 / 60.0, &mut pairs);
        assert!(pairs.is_empty());

        let mut loose = BroadPhaseDetector::default();
        loose.set_margin(0.2);
        loose.find_pairs(&bodies, &shapes, 1.0 / 60.0, &mut pairs);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn test_detector_algorithms_agree() {
        let shapes = vec![Shape::sphere(1.0)];
        let bodies: Vec<_> = (0..64)
            .map(|i| {
                let x = (i % 8) as f64 * 1.9;
                let z = (i / 8) as f64 * 2.5;
                sphere_body(i, Point3::new(x, 0.0, z), Vector3::new(0.0, 0.0, 3.0))
            })
            .collect();

        let mut results = Vec::new();
        for algorithm in [
            BroadPhaseAlgorithm::Auto,
            BroadPhaseAlgorithm::BruteForce,
            BroadPhaseAlgorithm::SweepAndPrune,
        ] {
            let mut detector = BroadPhaseDetector::new(BroadPhaseConfig {
                algorithm,
                ..Default::default()
            });
            let mut pairs = Vec::new();
            detector.find_pairs(&bodies, &shapes, 1.0 / 60.0, &mut pairs);
            assert_eq!(detector.bounds().len(), bodies.len());
            results.push(pairs);
        }

        assert!(!results[0].is_empty());
        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
    }

    #[test]
    fn test_unresolved_shape_is_left_out() {
        let shapes = vec![Shape::sphere(1.0)];
        let mut stray = sphere_body(1, Point3::new(0.5, 0.0, 0.0), Vector3::zeros());
        stray.shape = ShapeId::new(9);
        let bodies = vec![sphere_body(0, Point3::origin(), Vector3::zeros()), stray];

        let mut pairs = Vec::new();
        BroadPhaseDetector::default().find_pairs(&bodies, &shapes, 0.1, &mut pairs);
        assert!(pairs.is_empty());
    }
}

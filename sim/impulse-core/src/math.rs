//! Small numeric helpers on top of `nalgebra`.

use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};

/// Rotation produced by an angular displacement (axis scaled by angle).
///
/// A zero displacement yields the identity.
#[must_use]
pub fn incremental_rotation(angular_displacement: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_scaled_axis(*angular_displacement)
}

/// Express a body-space tensor in world space: R·T·Rᵗ.
#[must_use]
pub fn rotate_tensor(rotation: &Rotation3<f64>, tensor: &Matrix3<f64>) -> Matrix3<f64> {
    let r = rotation.matrix();
    r * tensor * r.transpose()
}

/// Rescale `v` to length `max` when it is longer than that.
#[must_use]
pub fn clamp_magnitude(v: Vector3<f64>, max: f64) -> Vector3<f64> {
    if v.norm_squared() > max * max {
        v.normalize() * max
    } else {
        v
    }
}

/// Translation × rotation × scale as one homogeneous matrix.
#[must_use]
pub fn compose_transform(
    position: &Point3<f64>,
    orientation: &UnitQuaternion<f64>,
    scale: &Vector3<f64>,
) -> Matrix4<f64> {
    Translation3::from(position.coords).to_homogeneous()
        * orientation.to_homogeneous()
        * Matrix4::new_nonuniform_scaling(scale)
}

/// Borrow two distinct elements of a slice mutably.
///
/// Returns `None` when `i == j` or either index is out of bounds.
pub fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> Option<(&mut T, &mut T)> {
    if i == j || i >= items.len() || j >= items.len() {
        return None;
    }
    if i < j {
        let (head, tail) = items.split_at_mut(j);
        Some((&mut head[i], &mut tail[0]))
    } else {
        let (head, tail) = items.split_at_mut(i);
        Some((&mut tail[0], &mut head[j]))
    }
}

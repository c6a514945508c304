use cgmath::{Deg, InnerSpace, Matrix4, One, Rotation3};

use crate::types::{Angles, Axis, Position, Quaternion, RotationOrder};

/// Rotation of `degrees` about a single principal axis.
pub fn rotation_about(axis: Axis, degrees: f64) -> Quaternion {
    match axis {
        Axis::X => Quaternion::from_angle_x(Deg(degrees)),
        Axis::Y => Quaternion::from_angle_y(Deg(degrees)),
        Axis::Z => Quaternion::from_angle_z(Deg(degrees)),
    }
}

/// Convert euler angles in DEGREES to a quaternion.
///
/// The order is walked left to right, accumulating `q = q * rotation_about(axis_i, angle_i)`
/// from identity. `angles[i]` belongs to the i-th axis of `order`.
pub fn euler_to_quat(angles: &Angles, order: &RotationOrder) -> Quaternion {
    order
        .axes()
        .iter()
        .zip(angles.iter())
        .fold(Quaternion::one(), |q, (&axis, &angle)| {
            q * rotation_about(axis, angle)
        })
}

/// Normalize `v`, or `None` if its magnitude is below `epsilon`.
pub(crate) fn try_normalize(v: Position, epsilon: f64) -> Option<Position> {
    let magnitude = v.magnitude();
    if magnitude < epsilon || !magnitude.is_finite() {
        None
    } else {
        Some(v / magnitude)
    }
}

/// Column-major `f32` copy of a model matrix, as expected by render backends.
pub fn to_f32_cols(m: &Matrix4<f64>) -> [f32; 16] {
    let cols: [[f64; 4]; 4] = (*m).into();
    let mut out = [0.0f32; 16];
    for (c, col) in cols.iter().enumerate() {
        for (r, value) in col.iter().enumerate() {
            out[c * 4 + r] = *value as f32;
        }
    }
    out
}

//! Unit and frame conversion between the external and internal conventions.
//!
//! | | External | Internal |
//! |---|---|---|
//! | Handedness | right-handed | left-handed |
//! | Axes | x fwd, y left, z up | x fwd, y right, z up |
//! | Length | metres | centimetres |
//! | Angle | radians | degrees |
//!
//! Every `*_external_to_internal` function has an exact `*_internal_to_external`
//! inverse.  None of them validate their input.

use crate::geometry::{Quaternion, Transform, Vec3};
use crate::msgs::{OdometrySample, Pose, Stamp, TwistMsg};
use crate::vehicle::JointAxis;

/// Centimetres per metre.
pub const DISTANCE_SCALE: f64 = 100.0;

const NANOS_PER_SEC: f64 = 1e9;

// ── Scalars ──────────────────────────────────────────────────────────────────

pub fn distance_external_to_internal(m: f64) -> f64 {
    m * DISTANCE_SCALE
}

pub fn distance_internal_to_external(cm: f64) -> f64 {
    cm / DISTANCE_SCALE
}

pub fn angle_external_to_internal(rad: f64) -> f64 {
    rad.to_degrees()
}

pub fn angle_internal_to_external(deg: f64) -> f64 {
    deg.to_radians()
}

// ── Vectors ──────────────────────────────────────────────────────────────────

/// Position or linear velocity: mirror Y, scale to centimetres.
pub fn vector_external_to_internal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, -v.y, v.z) * DISTANCE_SCALE
}

pub fn vector_internal_to_external(v: Vec3) -> Vec3 {
    Vec3::new(v.x, -v.y, v.z) / DISTANCE_SCALE
}

/// Rotation vector (angular velocity, Euler rates).  Mirroring Y flips the
/// sense of rotation about X and Z; values go to degrees.
pub fn rotation_external_to_internal(r: Vec3) -> Vec3 {
    Vec3::new(
        angle_external_to_internal(-r.x),
        angle_external_to_internal(r.y),
        angle_external_to_internal(-r.z),
    )
}

pub fn rotation_internal_to_external(r: Vec3) -> Vec3 {
    Vec3::new(
        angle_internal_to_external(-r.x),
        angle_internal_to_external(r.y),
        angle_internal_to_external(-r.z),
    )
}

/// Orientation quaternion under the Y mirror.  The map is its own inverse.
pub fn quat_external_to_internal(q: Quaternion) -> Quaternion {
    Quaternion::new(q.w, -q.x, q.y, -q.z)
}

pub fn quat_internal_to_external(q: Quaternion) -> Quaternion {
    Quaternion::new(q.w, -q.x, q.y, -q.z)
}

pub fn transform_external_to_internal(t: Transform) -> Transform {
    Transform::new(
        vector_external_to_internal(t.translation),
        quat_external_to_internal(t.rotation),
    )
}

pub fn transform_internal_to_external(t: Transform) -> Transform {
    Transform::new(
        vector_internal_to_external(t.translation),
        quat_internal_to_external(t.rotation),
    )
}

/// Joint scalar: metres → centimetres on a linear joint, radians → degrees on
/// a rotational one.  Rates convert the same way.
pub fn joint_external_to_internal(axis: JointAxis, value: f64) -> f64 {
    match axis {
        JointAxis::Linear => distance_external_to_internal(value),
        JointAxis::Rotational => angle_external_to_internal(value),
    }
}

pub fn joint_internal_to_external(axis: JointAxis, value: f64) -> f64 {
    match axis {
        JointAxis::Linear => distance_internal_to_external(value),
        JointAxis::Rotational => angle_internal_to_external(value),
    }
}

// ── Time ─────────────────────────────────────────────────────────────────────

/// Simulation seconds → `{sec, nanosec}`.
pub fn timestamp_seconds_to_external(t: f64) -> Stamp {
    let sec = t.floor();
    let mut nanosec = ((t - sec) * NANOS_PER_SEC).round();
    let mut sec = sec as i32;
    // Rounding can land exactly on the next second.
    if nanosec >= NANOS_PER_SEC {
        nanosec -= NANOS_PER_SEC;
        sec += 1;
    }
    Stamp {
        sec,
        nanosec: nanosec as u32,
    }
}

pub fn timestamp_external_to_seconds(stamp: Stamp) -> f64 {
    f64::from(stamp.sec) + f64::from(stamp.nanosec) / NANOS_PER_SEC
}

// ── Messages ─────────────────────────────────────────────────────────────────

/// Convert an internally-computed odometry sample into its published form.
/// Frame ids, stamp and covariance pass through unchanged.
pub fn odometry_internal_to_external(sample: &OdometrySample) -> OdometrySample {
    let mut out = sample.clone();
    out.pose.pose = Pose {
        position: vector_internal_to_external(sample.pose.pose.position),
        orientation: quat_internal_to_external(sample.pose.pose.orientation),
    };
    out.twist.twist = TwistMsg {
        linear: vector_internal_to_external(sample.twist.twist.linear),
        angular: rotation_internal_to_external(sample.twist.twist.angular),
    };
    out
}

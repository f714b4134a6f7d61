//! Wire-level message shapes exchanged with the transport layer.
//!
//! Field names follow the ROS 2 message definitions (`geometry_msgs/Twist`,
//! `sensor_msgs/JointState`, `nav_msgs/Odometry`,
//! `geometry_msgs/TransformStamped`) so that rosbridge JSON frames decode
//! straight into these structs.

use serde::{Deserialize, Serialize};

use crate::geometry::{Quaternion, Transform, Vec3};

/// Time stamp in the external `{sec, nanosec}` representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stamp {
    pub sec: i32,
    pub nanosec: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub stamp: Stamp,
    #[serde(default)]
    pub frame_id: String,
}

/// Velocity command: linear and angular 3-vectors.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TwistMsg {
    #[serde(default)]
    pub linear: Vec3,
    #[serde(default)]
    pub angular: Vec3,
}

/// Batch joint command with parallel name / position / velocity / effort
/// sequences.  Any of the value sequences may be empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JointStateMsg {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub name: Vec<String>,
    #[serde(default)]
    pub position: Vec<f64>,
    #[serde(default)]
    pub velocity: Vec<f64>,
    #[serde(default)]
    pub effort: Vec<f64>,
}

// ────────────────────────────────────────────────────────────────────────────
// Odometry
// ────────────────────────────────────────────────────────────────────────────

/// Row-major 6×6 covariance matrix, serialised as a flat 36-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Covariance6(pub [f64; 36]);

impl Covariance6 {
    pub const fn zeros() -> Self {
        Self([0.0; 36])
    }

    /// The six diagonal entries (flat indices 0, 7, 14, 21, 28, 35).
    pub fn diagonal(&self) -> [f64; 6] {
        std::array::from_fn(|i| self.0[i * 7])
    }
}

impl Default for Covariance6 {
    fn default() -> Self {
        Self::zeros()
    }
}

impl TryFrom<Vec<f64>> for Covariance6 {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        let len = values.len();
        let arr: [f64; 36] = values
            .try_into()
            .map_err(|_| format!("covariance must have 36 entries, got {len}"))?;
        Ok(Self(arr))
    }
}

impl From<Covariance6> for Vec<f64> {
    fn from(c: Covariance6) -> Self {
        c.0.to_vec()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quaternion,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseWithCovariance {
    pub pose: Pose,
    pub covariance: Covariance6,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TwistWithCovariance {
    pub twist: TwistMsg,
    pub covariance: Covariance6,
}

/// An odometry sample: pose and twist estimates with covariance.
///
/// The estimator produces samples in the internal convention;
/// [`crate::convert::odometry_internal_to_external`] yields the published
/// form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OdometrySample {
    pub header: Header,
    pub child_frame_id: String,
    pub pose: PoseWithCovariance,
    pub twist: TwistWithCovariance,
}

/// A transform between two named frames at a point in time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformStampedMsg {
    pub header: Header,
    pub child_frame_id: String,
    pub transform: Transform,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_state_missing_arrays_default_to_empty() {
        let msg: JointStateMsg =
            serde_json::from_str(r#"{"name":["wheel_left"],"position":[0.5]}"#).unwrap();
        assert_eq!(msg.name, vec!["wheel_left".to_string()]);
        assert!(msg.velocity.is_empty());
        assert!(msg.effort.is_empty());
    }

    #[test]
    fn covariance_serialises_flat() {
        let mut c = Covariance6::zeros();
        c.0[35] = 1e-3;
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.starts_with('['));
        let back: Covariance6 = serde_json::from_str(&json).unwrap();
        assert_eq!(back.diagonal()[5], 1e-3);
    }

    #[test]
    fn covariance_rejects_wrong_length() {
        let result: Result<Covariance6, _> = serde_json::from_str("[1.0, 2.0]");
        assert!(result.is_err());
    }

    #[test]
    fn twist_decodes_ros_field_layout() {
        let twist: TwistMsg = serde_json::from_str(
            r#"{"linear":{"x":1.0,"y":0.0,"z":0.0},"angular":{"x":0.0,"y":0.0,"z":0.5}}"#,
        )
        .unwrap();
        assert_eq!(twist.linear.x, 1.0);
        assert_eq!(twist.angular.z, 0.5);
    }
}

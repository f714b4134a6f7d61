//! `drivesim-types` – shared data model for the vehicle control-plane.
//!
//! # Modules
//!
//! - [`geometry`] – [`Vec3`], [`Quaternion`], [`Transform`].
//! - [`convert`] – external ↔ internal unit and frame conversion.
//! - [`msgs`] – transport message shapes (twist, joint state, odometry, TF).
//! - [`vehicle`] – joint metadata, control modes, vehicle handles and the
//!   scheduled command payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod convert;
pub mod geometry;
pub mod msgs;
pub mod vehicle;

pub use geometry::{Quaternion, Transform, Vec3};
pub use msgs::{
    Covariance6, Header, JointStateMsg, OdometrySample, Pose, PoseWithCovariance, Stamp,
    TransformStampedMsg, TwistMsg, TwistWithCovariance,
};
pub use vehicle::{
    CommandChannel, JointAxis, JointControlMode, JointSpec, JointTable, ScheduledCommand,
    VehicleCommand, VehicleHandle,
};

/// Envelope for every message carried over the in-process transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Fully resolved topic name, e.g. `"/rover/cmd_vel"`.
    pub topic: String,
    /// Publishing node, e.g. `"drivesim-cli::stdin"`.
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a fresh envelope stamped with the wall-clock time.
    pub fn new(topic: impl Into<String>, source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            topic: topic.into(),
            source: source.into(),
            payload,
        }
    }
}

/// Typed payloads routed over the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Twist(TwistMsg),
    JointState(JointStateMsg),
    Odometry(OdometrySample),
    Transform(TransformStampedMsg),
}

impl EventPayload {
    pub fn kind(&self) -> MessageKind {
        match self {
            EventPayload::Twist(_) => MessageKind::Twist,
            EventPayload::JointState(_) => MessageKind::JointState,
            EventPayload::Odometry(_) => MessageKind::Odometry,
            EventPayload::Transform(_) => MessageKind::Transform,
        }
    }
}

/// Message type a subscription is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Twist,
    JointState,
    Odometry,
    Transform,
}

impl MessageKind {
    /// ROS 2 type name used in rosbridge frames.
    pub fn ros_type(self) -> &'static str {
        match self {
            MessageKind::Twist => "geometry_msgs/msg/Twist",
            MessageKind::JointState => "sensor_msgs/msg/JointState",
            MessageKind::Odometry => "nav_msgs/msg/Odometry",
            MessageKind::Transform => "geometry_msgs/msg/TransformStamped",
        }
    }

    /// Inverse of [`MessageKind::ros_type`]; also accepts the short
    /// `pkg/Type` spelling.
    pub fn from_ros_type(name: &str) -> Option<Self> {
        match name {
            "geometry_msgs/msg/Twist" | "geometry_msgs/Twist" => Some(MessageKind::Twist),
            "sensor_msgs/msg/JointState" | "sensor_msgs/JointState" => {
                Some(MessageKind::JointState)
            }
            "nav_msgs/msg/Odometry" | "nav_msgs/Odometry" => Some(MessageKind::Odometry),
            "geometry_msgs/msg/TransformStamped" | "geometry_msgs/TransformStamped" => {
                Some(MessageKind::Transform)
            }
            _ => None,
        }
    }
}

/// Error type shared by every drivesim crate.
///
/// None of these are fatal: the dispatcher logs them at the callback
/// boundary and carries on.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DriveError {
    #[error("topic name is empty")]
    EmptyTopic,

    #[error("transport node '{node}' is not valid")]
    InvalidTransport { node: String },

    #[error("vehicle has no joint named '{0}'")]
    UnknownJoint(String),

    #[error("{0:?} control is not supported")]
    UnsupportedControlMode(JointControlMode),

    #[error(
        "position ({position}), velocity ({velocity}) or effort ({effort}) array must match the {names} joint names"
    )]
    JointArrayMismatch {
        names: usize,
        position: usize,
        velocity: usize,
        effort: usize,
    },

    #[error("joint '{joint}' must have a single DOF, has {linear} linear and {rotational} rotational")]
    DofViolation {
        joint: String,
        linear: u8,
        rotational: u8,
    },

    #[error("vehicle {0:?} does not exist")]
    VehicleNotFound(VehicleHandle),

    #[error("invalid noise model: {0}")]
    InvalidNoise(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("parse error: {0}")]
    Parsing(String),

    #[error("configuration error: {0}")]
    Config(String),
}

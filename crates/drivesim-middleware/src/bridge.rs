//! rosbridge-style JSON bridge.
//!
//! [`RosbridgeBridge`] ingests text frames of the form
//!
//! ```json
//! {"op": "publish", "topic": "/rover/cmd_vel", "type": "geometry_msgs/msg/Twist",
//!  "msg": {"linear": {"x": 0.5, "y": 0.0, "z": 0.0}, "angular": {"x": 0.0, "y": 0.0, "z": 0.2}}}
//! ```
//!
//! decodes the `msg` body into the matching typed message and publishes it on
//! the [`EventBus`].  Outbound events are encoded back into the same frame
//! shape by [`encode_event`].

use std::sync::Arc;

use drivesim_types::{DriveError, Event, EventPayload, MessageKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::bus::EventBus;

const SOURCE: &str = "drivesim-middleware::rosbridge";

/// One rosbridge protocol frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosbridgeFrame {
    pub op: String,
    pub topic: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub msg_type: Option<String>,
    #[serde(default)]
    pub msg: Value,
}

/// Decode a message body of the given kind.
///
/// # Errors
///
/// [`DriveError::Parsing`] if `msg` does not have the shape of `kind`.
pub fn decode(kind: MessageKind, msg: Value) -> Result<EventPayload, DriveError> {
    let parse_err = |e: serde_json::Error| DriveError::Parsing(format!("{}: {e}", kind.ros_type()));
    Ok(match kind {
        MessageKind::Twist => EventPayload::Twist(serde_json::from_value(msg).map_err(parse_err)?),
        MessageKind::JointState => {
            EventPayload::JointState(serde_json::from_value(msg).map_err(parse_err)?)
        }
        MessageKind::Odometry => {
            EventPayload::Odometry(serde_json::from_value(msg).map_err(parse_err)?)
        }
        MessageKind::Transform => {
            EventPayload::Transform(serde_json::from_value(msg).map_err(parse_err)?)
        }
    })
}

/// Parse a text frame into its absolute topic and typed payload.
pub fn decode_frame(text: &str) -> Result<(String, EventPayload), DriveError> {
    let frame: RosbridgeFrame =
        serde_json::from_str(text).map_err(|e| DriveError::Parsing(e.to_string()))?;
    if frame.op != "publish" {
        return Err(DriveError::Parsing(format!("unsupported op '{}'", frame.op)));
    }
    if frame.topic.trim().is_empty() {
        return Err(DriveError::EmptyTopic);
    }
    let type_name = frame
        .msg_type
        .as_deref()
        .ok_or_else(|| DriveError::Parsing("frame has no 'type'".to_string()))?;
    let kind = MessageKind::from_ros_type(type_name)
        .ok_or_else(|| DriveError::Parsing(format!("unsupported message type '{type_name}'")))?;

    let topic = if frame.topic.starts_with('/') {
        frame.topic
    } else {
        format!("/{}", frame.topic)
    };
    Ok((topic, decode(kind, frame.msg)?))
}

/// Encode `event` as a rosbridge publish frame.
pub fn encode_event(event: &Event) -> Result<String, DriveError> {
    let ser_err = |e: serde_json::Error| DriveError::Parsing(e.to_string());
    let msg = match &event.payload {
        EventPayload::Twist(m) => serde_json::to_value(m),
        EventPayload::JointState(m) => serde_json::to_value(m),
        EventPayload::Odometry(m) => serde_json::to_value(m),
        EventPayload::Transform(m) => serde_json::to_value(m),
    }
    .map_err(ser_err)?;
    let frame = RosbridgeFrame {
        op: "publish".to_string(),
        topic: event.topic.clone(),
        msg_type: Some(event.payload.kind().ros_type().to_string()),
        msg,
    };
    serde_json::to_string(&frame).map_err(ser_err)
}

/// Feeds decoded rosbridge frames onto the bus.
#[derive(Clone, Debug)]
pub struct RosbridgeBridge {
    bus: Arc<EventBus>,
}

impl RosbridgeBridge {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Decode one text frame and publish it.  Returns the number of
    /// subscribers that received it.
    pub fn ingest(&self, text: &str) -> Result<usize, DriveError> {
        let (topic, payload) = decode_frame(text)?;
        debug!(topic = %topic, kind = ?payload.kind(), "rosbridge frame ingested");
        self.bus.publish(Event::new(topic, SOURCE, payload))
    }
}

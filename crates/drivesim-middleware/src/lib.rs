//! `drivesim-middleware` – transport plumbing and command dispatch.
//!
//! # Modules
//!
//! - [`bus`] – in-process publish/subscribe event bus built on Tokio
//!   broadcast channels.
//! - [`node`] – namespaced transport node whose callbacks run on Tokio
//!   workers.
//! - [`bridge`] – rosbridge JSON frame decoding and encoding.
//! - [`command_queue`] – worker → simulation-thread hand-off.
//! - [`joints`] – joint batch mode inference and normalisation.
//! - [`dispatcher`] – subscribes command topics and schedules converted
//!   commands.

pub mod bridge;
pub mod bus;
pub mod command_queue;
pub mod dispatcher;
pub mod joints;
pub mod node;

pub use bridge::RosbridgeBridge;
pub use bus::{EventBus, TopicSubscriber};
pub use command_queue::{CommandReceiver, CommandSender, command_queue};
pub use dispatcher::CommandDispatcher;
pub use joints::{JointBatch, infer_control_mode, normalize_joint_batch};
pub use node::{SubscriptionId, TransportNode};

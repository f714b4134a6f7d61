//! Command dispatcher: transport callbacks → converted, scheduled commands.
//!
//! The dispatcher never touches a vehicle.  Every callback decodes and
//! converts its message on the worker thread, wraps the result in an
//! immutable [`ScheduledCommand`] bound to a generational [`VehicleHandle`],
//! and hands it to the simulation thread through the [`CommandSender`].
//!
//! Nothing here is fatal: bad configuration and bad input are logged with
//! `warn!` and the offending subscription, batch or joint is dropped.

use std::sync::Arc;

use drivesim_types::convert::{rotation_external_to_internal, vector_external_to_internal};
use drivesim_types::{
    DriveError, EventPayload, JointStateMsg, JointTable, MessageKind, ScheduledCommand, TwistMsg,
    VehicleCommand, VehicleHandle,
};
use tracing::{debug, warn};

use crate::command_queue::CommandSender;
use crate::joints::{JointBatch, normalize_joint_batch};
use crate::node::{SubscriptionId, TransportNode};

#[derive(Clone, Debug)]
pub struct CommandDispatcher {
    node: Option<Arc<TransportNode>>,
    vehicle: VehicleHandle,
    joints: Arc<JointTable>,
    commands: CommandSender,
}

impl CommandDispatcher {
    /// `node` may be `None`; every subscribe then fails with a warning.
    pub fn new(
        node: Option<Arc<TransportNode>>,
        vehicle: VehicleHandle,
        joints: Arc<JointTable>,
        commands: CommandSender,
    ) -> Self {
        Self {
            node,
            vehicle,
            joints,
            commands,
        }
    }

    pub fn vehicle(&self) -> VehicleHandle {
        self.vehicle
    }

    // ── Subscriptions ────────────────────────────────────────────────────────

    /// Subscribe the velocity channel on `topic`.
    ///
    /// Returns `None`, after logging a warning, when the topic is empty or the
    /// transport node is invalid.
    pub fn subscribe_velocity(&self, topic: &str) -> Option<SubscriptionId> {
        let this = self.clone();
        self.subscribe(topic, MessageKind::Twist, move |payload| {
            if let EventPayload::Twist(msg) = payload {
                let _ = this.on_velocity_message(&msg);
            }
        })
    }

    /// Subscribe the joint-state channel on `topic`.  Same failure modes as
    /// [`subscribe_velocity`](Self::subscribe_velocity).
    pub fn subscribe_joints(&self, topic: &str) -> Option<SubscriptionId> {
        let this = self.clone();
        self.subscribe(topic, MessageKind::JointState, move |payload| {
            if let EventPayload::JointState(msg) = payload {
                let _ = this.on_joint_message(&msg);
            }
        })
    }

    fn subscribe<F>(&self, topic: &str, kind: MessageKind, callback: F) -> Option<SubscriptionId>
    where
        F: Fn(EventPayload) + Send + Sync + 'static,
    {
        let result = match &self.node {
            _ if topic.trim().is_empty() => Err(DriveError::EmptyTopic),
            Some(node) => node.subscribe(topic, kind, callback),
            None => Err(DriveError::InvalidTransport {
                node: "<none>".to_string(),
            }),
        };
        match result {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(topic = %topic, kind = ?kind, error = %e, "Subscription not created");
                None
            }
        }
    }

    // ── Message handlers ─────────────────────────────────────────────────────

    /// Convert a twist and schedule one combined linear + angular write.
    pub fn on_velocity_message(&self, msg: &TwistMsg) -> Result<(), DriveError> {
        let command = VehicleCommand::Velocity {
            linear: vector_external_to_internal(msg.linear),
            angular: rotation_external_to_internal(msg.angular),
        };
        self.schedule(command)
    }

    /// Normalise a joint-state batch and schedule its atomic application.
    ///
    /// Rejected batches and skipped joints are logged here.  A batch that
    /// ends up with no targets schedules nothing.
    pub fn on_joint_message(&self, msg: &JointStateMsg) -> Result<JointBatch, DriveError> {
        let batch = match normalize_joint_batch(msg, &self.joints) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(vehicle = ?self.vehicle, joints = msg.name.len(), error = %e, "Joint batch discarded");
                return Err(e);
            }
        };

        for (joint, reason) in &batch.skipped {
            warn!(vehicle = ?self.vehicle, joint = %joint, error = %reason, "Joint skipped");
        }

        if batch.targets.is_empty() {
            debug!(vehicle = ?self.vehicle, "No joint targets left to schedule");
            return Ok(batch);
        }

        self.schedule(VehicleCommand::Joints {
            targets: batch.targets.clone(),
            mode: batch.mode,
        })?;
        Ok(batch)
    }

    fn schedule(&self, command: VehicleCommand) -> Result<(), DriveError> {
        self.commands
            .schedule(ScheduledCommand {
                vehicle: self.vehicle,
                command,
            })
            .inspect_err(|e| warn!(vehicle = ?self.vehicle, error = %e, "Command dropped"))
    }
}

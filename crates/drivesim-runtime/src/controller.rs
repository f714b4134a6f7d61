//! Per-vehicle controller: owns the dispatcher subscriptions and the
//! odometry estimator for one possessed vehicle.
//!
//! Possessing a vehicle subscribes its command topics and creates a fresh
//! estimator; unpossessing drops the subscriptions and stops publishing.
//! [`VehicleController::on_tick`] runs on the simulation thread after the
//! vehicles have been stepped.

use std::sync::Arc;

use drivesim_hal::VehicleArena;
use drivesim_middleware::{CommandDispatcher, CommandSender, SubscriptionId, TransportNode};
use drivesim_perception::OdomEstimator;
use drivesim_types::convert::{
    odometry_internal_to_external, timestamp_seconds_to_external, transform_internal_to_external,
};
use drivesim_types::{DriveError, EventPayload, Header, TransformStampedMsg, VehicleHandle};
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;

// ────────────────────────────────────────────────────────────────────────────
// Publish timer
// ────────────────────────────────────────────────────────────────────────────

/// Fixed-rate gate on simulation time.  A non-positive or non-finite
/// frequency fires on every tick.
#[derive(Debug, Clone, Copy)]
pub struct PublishTimer {
    period: f64,
    next_due: Option<f64>,
}

impl PublishTimer {
    pub fn new(frequency_hz: f64) -> Self {
        let period = if frequency_hz.is_finite() && frequency_hz > 0.0 {
            1.0 / frequency_hz
        } else {
            0.0
        };
        Self {
            period,
            next_due: None,
        }
    }

    /// `true` if a publish is due at `now`; advances the schedule when it is.
    pub fn poll(&mut self, now: f64) -> bool {
        const EPS: f64 = 1e-9;
        match self.next_due {
            Some(due) if now + EPS < due => false,
            Some(due) => {
                let next = due + self.period;
                // Skip missed slots instead of bursting.
                self.next_due = Some(if next <= now { now + self.period } else { next });
                true
            }
            None => {
                self.next_due = Some(now + self.period);
                true
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────────────────

struct Possessed {
    vehicle: VehicleHandle,
    subscriptions: Vec<SubscriptionId>,
    estimator: OdomEstimator,
    timer: PublishTimer,
}

pub struct VehicleController {
    node: Arc<TransportNode>,
    config: ControllerConfig,
    possessed: Option<Possessed>,
}

impl VehicleController {
    pub fn new(node: Arc<TransportNode>, config: ControllerConfig) -> Self {
        Self {
            node,
            config,
            possessed: None,
        }
    }

    pub fn node(&self) -> &Arc<TransportNode> {
        &self.node
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn vehicle(&self) -> Option<VehicleHandle> {
        self.possessed.as_ref().map(|p| p.vehicle)
    }

    pub fn is_possessed(&self) -> bool {
        self.possessed.is_some()
    }

    pub fn estimator(&self) -> Option<&OdomEstimator> {
        self.possessed.as_ref().map(|p| &p.estimator)
    }

    pub fn estimator_mut(&mut self) -> Option<&mut OdomEstimator> {
        self.possessed.as_mut().map(|p| &mut p.estimator)
    }

    /// Bind `vehicle`: subscribe both command topics and start a new
    /// estimator.  A previously possessed vehicle is released first.
    ///
    /// A subscription that cannot be created is logged and left out; the
    /// controller still possesses the vehicle.
    ///
    /// # Errors
    ///
    /// * [`DriveError::VehicleNotFound`] if `vehicle` is not alive.
    /// * [`DriveError::InvalidNoise`] from the odometry configuration.
    pub fn possess(
        &mut self,
        arena: &VehicleArena,
        vehicle: VehicleHandle,
        commands: CommandSender,
    ) -> Result<(), DriveError> {
        let target = arena.get(vehicle).ok_or(DriveError::VehicleNotFound(vehicle))?;
        let estimator = OdomEstimator::new(&self.config.odom)?;
        let joints = Arc::new(target.joints().clone());
        let name = target.name().to_string();

        self.unpossess();

        let dispatcher = CommandDispatcher::new(Some(self.node.clone()), vehicle, joints, commands);
        let subscriptions: Vec<_> = [
            dispatcher.subscribe_velocity(&self.config.cmd_vel_topic),
            dispatcher.subscribe_joints(&self.config.joints_cmd_topic),
        ]
        .into_iter()
        .flatten()
        .collect();

        info!(
            vehicle = %name,
            node = %self.node.name(),
            subscriptions = subscriptions.len(),
            "Vehicle possessed"
        );
        self.possessed = Some(Possessed {
            vehicle,
            subscriptions,
            estimator,
            timer: PublishTimer::new(self.config.odom.publication_frequency_hz),
        });
        Ok(())
    }

    /// Release the possessed vehicle.  Returns `false` if there was none.
    pub fn unpossess(&mut self) -> bool {
        let Some(possessed) = self.possessed.take() else {
            return false;
        };
        for id in possessed.subscriptions {
            self.node.unsubscribe(id);
        }
        debug!(node = %self.node.name(), handle = ?possessed.vehicle, "Vehicle released");
        true
    }

    /// Update odometry from the vehicle's true pose and publish when due.
    ///
    /// Returns the number of messages published.  Nothing is published until
    /// the estimator has been initialised.  A vehicle that has been destroyed
    /// is released silently.
    pub fn on_tick(&mut self, arena: &VehicleArena, sim_time: f64) -> usize {
        let Some(possessed) = self.possessed.as_mut() else {
            return 0;
        };
        let Some(vehicle) = arena.get(possessed.vehicle) else {
            debug!(handle = ?possessed.vehicle, "Possessed vehicle is gone");
            self.unpossess();
            return 0;
        };

        possessed
            .estimator
            .sensor_update(&vehicle.true_transform(), sim_time);
        if !possessed.estimator.is_initialized() {
            return 0;
        }

        if !self.config.publish_odom || !possessed.timer.poll(sim_time) {
            return 0;
        }
        if self.config.odom.topic.trim().is_empty() {
            return 0;
        }

        let mut published = 0;
        let sample = odometry_internal_to_external(possessed.estimator.sample());
        match self
            .node
            .publish(&self.config.odom.topic, EventPayload::Odometry(sample.clone()))
        {
            Ok(_) => published += 1,
            Err(e) => warn!(topic = %self.config.odom.topic, error = %e, "Odometry publish failed"),
        }

        if self.config.publish_odom_tf {
            let tf = TransformStampedMsg {
                header: Header {
                    stamp: timestamp_seconds_to_external(sim_time),
                    frame_id: sample.header.frame_id.clone(),
                },
                child_frame_id: sample.child_frame_id.clone(),
                transform: transform_internal_to_external(possessed.estimator.odom_tf()),
            };
            match self.node.publish(&self.config.tf_topic, EventPayload::Transform(tf)) {
                Ok(_) => published += 1,
                Err(e) => warn!(topic = %self.config.tf_topic, error = %e, "Odometry TF publish failed"),
            }
        }
        published
    }
}

impl Drop for VehicleController {
    fn drop(&mut self) {
        self.unpossess();
    }
}

//! [`SimVehicle`] – in-process kinematic stand-in for headless runs and tests.
//!
//! # Stepping
//!
//! | State | Update per `step(dt)` |
//! |---|---|
//! | Translation | `+= rotation.rotate(linear_velocity * dt)` |
//! | Rotation | yawed by `angular_velocity.z * dt` degrees |
//! | Position-mode joint | snaps to its target |
//! | Velocity-mode joint | integrates its target rate |
//!
//! Roll and pitch rates are recorded but not integrated.  There is no
//! dynamics, collision or ground contact.

use std::collections::HashMap;

use drivesim_types::{JointControlMode, JointTable, Quaternion, Transform, Vec3};
use tracing::trace;

use crate::vehicle::Vehicle;

pub struct SimVehicle {
    name: String,
    transform: Transform,
    linear: Vec3,
    angular: Vec3,
    joints: JointTable,
    joint_targets: HashMap<String, (JointControlMode, f64)>,
    joint_positions: HashMap<String, f64>,
}

impl SimVehicle {
    pub fn new(name: impl Into<String>, initial_pose: Transform, joints: JointTable) -> Self {
        Self {
            name: name.into(),
            transform: initial_pose,
            linear: Vec3::zero(),
            angular: Vec3::zero(),
            joints,
            joint_targets: HashMap::new(),
            joint_positions: HashMap::new(),
        }
    }

    /// Teleport the vehicle.
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    /// Latest target and mode for `joint`.
    pub fn joint_target(&self, joint: &str) -> Option<(JointControlMode, f64)> {
        self.joint_targets.get(joint).copied()
    }

    /// Integrated joint position (cm or deg), `0.0` if never driven.
    pub fn joint_position(&self, joint: &str) -> f64 {
        self.joint_positions.get(joint).copied().unwrap_or(0.0)
    }
}

impl Vehicle for SimVehicle {
    fn name(&self) -> &str {
        &self.name
    }

    fn true_transform(&self) -> Transform {
        self.transform
    }

    fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.linear = velocity;
    }

    fn set_angular_velocity(&mut self, velocity: Vec3) {
        self.angular = velocity;
    }

    fn linear_velocity(&self) -> Vec3 {
        self.linear
    }

    fn angular_velocity(&self) -> Vec3 {
        self.angular
    }

    fn joints(&self) -> &JointTable {
        &self.joints
    }

    fn set_joint_targets(&mut self, targets: &HashMap<String, f64>, mode: JointControlMode) {
        for (name, &value) in targets {
            self.joint_targets.insert(name.clone(), (mode, value));
        }
        trace!(vehicle = %self.name, count = targets.len(), mode = ?mode, "Joint targets set");
    }

    fn step(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let rotation = self.transform.rotation;
        self.transform.translation += rotation.rotate(self.linear * dt);
        let yaw = Quaternion::from_yaw((self.angular.z * dt).to_radians());
        self.transform.rotation = (rotation * yaw).normalized();

        for (name, &(mode, target)) in &self.joint_targets {
            let position = self.joint_positions.entry(name.clone()).or_insert(0.0);
            match mode {
                JointControlMode::Position => *position = target,
                JointControlMode::Velocity => *position += target * dt,
                JointControlMode::Effort => {}
            }
        }
    }
}

//! Simulation, vehicle and controller configuration.
//!
//! Every field has a serde default, so a TOML file only needs to name what
//! it changes.  Poses and offsets are in the external convention (metres,
//! radians); they are converted when a vehicle is spawned.

use drivesim_perception::OdomConfig;
use drivesim_types::{JointTable, Transform};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Fixed simulation step rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: f64,
    #[serde(default)]
    pub vehicles: Vec<VehicleConfig>,
}

fn default_tick_hz() -> f64 {
    60.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            vehicles: vec![VehicleConfig::default()],
        }
    }
}

impl SimulationConfig {
    /// Seconds per tick; falls back to the default rate for unusable values.
    pub fn tick_period(&self) -> f64 {
        if self.tick_hz.is_finite() && self.tick_hz > 0.0 {
            1.0 / self.tick_hz
        } else {
            1.0 / default_tick_hz()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleConfig {
    #[serde(default = "default_vehicle_name")]
    pub name: String,
    /// Topic namespace; empty uses the vehicle name.
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub initial_pose: Transform,
    #[serde(default)]
    pub joints: JointTable,
    #[serde(default)]
    pub controller: ControllerConfig,
}

fn default_vehicle_name() -> String {
    "rover".to_string()
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            name: default_vehicle_name(),
            namespace: String::new(),
            initial_pose: Transform::identity(),
            joints: JointTable::new(),
            controller: ControllerConfig::default(),
        }
    }
}

impl VehicleConfig {
    pub fn effective_namespace(&self) -> &str {
        if self.namespace.trim().is_empty() {
            &self.name
        } else {
            &self.namespace
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Velocity command topic; empty disables the channel.
    #[serde(default = "default_cmd_vel_topic")]
    pub cmd_vel_topic: String,
    /// Joint command topic; empty disables the channel.
    #[serde(default = "default_joints_cmd_topic")]
    pub joints_cmd_topic: String,
    #[serde(default = "default_true")]
    pub publish_odom: bool,
    #[serde(default)]
    pub publish_odom_tf: bool,
    #[serde(default = "default_tf_topic")]
    pub tf_topic: String,
    #[serde(default)]
    pub odom: OdomConfig,
}

fn default_cmd_vel_topic() -> String {
    "cmd_vel".to_string()
}

fn default_joints_cmd_topic() -> String {
    "joint_cmd".to_string()
}

fn default_tf_topic() -> String {
    "/tf".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cmd_vel_topic: default_cmd_vel_topic(),
            joints_cmd_topic: default_joints_cmd_topic(),
            publish_odom: true,
            publish_odom_tf: false,
            tf_topic: default_tf_topic(),
            odom: OdomConfig::default(),
        }
    }
}

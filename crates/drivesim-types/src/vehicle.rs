//! Vehicle-side data model: joint metadata, control modes, handles and the
//! immutable command payloads that cross from transport workers to the
//! simulation thread.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::DriveError;
use crate::geometry::Vec3;

/// How a batch of joint targets should be interpreted by the actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointControlMode {
    Position,
    Velocity,
    /// Recognised on the wire but never applied.
    Effort,
}

/// The single axis a joint moves along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointAxis {
    Linear,
    Rotational,
}

/// Static per-joint metadata.  Only single-DOF joints are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JointSpec {
    #[serde(default)]
    pub linear_dof: u8,
    #[serde(default)]
    pub rotational_dof: u8,
}

impl JointSpec {
    pub const fn linear() -> Self {
        Self {
            linear_dof: 1,
            rotational_dof: 0,
        }
    }

    pub const fn rotational() -> Self {
        Self {
            linear_dof: 0,
            rotational_dof: 1,
        }
    }

    /// Resolve the joint's axis.
    ///
    /// # Errors
    ///
    /// [`DriveError::DofViolation`] unless exactly one of the two DOF
    /// counters is `1` and the other is `0`.
    pub fn axis(&self, joint: &str) -> Result<JointAxis, DriveError> {
        match (self.linear_dof, self.rotational_dof) {
            (1, 0) => Ok(JointAxis::Linear),
            (0, 1) => Ok(JointAxis::Rotational),
            (linear, rotational) => Err(DriveError::DofViolation {
                joint: joint.to_string(),
                linear,
                rotational,
            }),
        }
    }
}

/// Name → [`JointSpec`] lookup owned by a vehicle.
///
/// Joint metadata never changes after spawn, so controllers hand an
/// `Arc<JointTable>` snapshot to transport callbacks instead of touching the
/// vehicle from a worker thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JointTable {
    joints: HashMap<String, JointSpec>,
}

impl JointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_joint(mut self, name: impl Into<String>, spec: JointSpec) -> Self {
        self.insert(name, spec);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: JointSpec) {
        self.joints.insert(name.into(), spec);
    }

    pub fn get(&self, name: &str) -> Option<JointSpec> {
        self.joints.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handles and scheduled commands
// ────────────────────────────────────────────────────────────────────────────

/// Generational reference to a vehicle slot.
///
/// A handle never owns the vehicle.  Once the slot is destroyed its
/// generation moves on and every outstanding handle stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleHandle {
    pub index: u32,
    pub generation: u32,
}

/// Independent command channels; each one is last-write-wins on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandChannel {
    Velocity,
    Joints,
}

/// An already-converted command, in internal units.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleCommand {
    /// Linear (cm/s) and angular (deg/s) velocity, always written together.
    Velocity { linear: Vec3, angular: Vec3 },
    /// Joint targets (cm, deg, or their rates) with the batch's control mode.
    Joints {
        targets: HashMap<String, f64>,
        mode: JointControlMode,
    },
}

impl VehicleCommand {
    pub fn channel(&self) -> CommandChannel {
        match self {
            VehicleCommand::Velocity { .. } => CommandChannel::Velocity,
            VehicleCommand::Joints { .. } => CommandChannel::Joints,
        }
    }
}

/// A command bound to its target vehicle, ready to hand to the simulation
/// thread.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledCommand {
    pub vehicle: VehicleHandle,
    pub command: VehicleCommand,
}

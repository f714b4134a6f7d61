//! The `Vehicle` trait the simulation layer exposes to the control-plane.
//!
//! Implementations live in the simulation layer and are owned by a
//! [`VehicleArena`][crate::arena::VehicleArena] on the simulation thread.
//! Everything here is in the internal convention (centimetres, degrees).

use std::collections::HashMap;

use drivesim_types::{JointControlMode, JointSpec, JointTable, Transform, Vec3};

pub trait Vehicle: Send {
    /// Stable identifier, e.g. `"rover"`.
    fn name(&self) -> &str;

    /// Authoritative world pose.
    fn true_transform(&self) -> Transform;

    /// Linear velocity in the vehicle frame, cm/s.
    fn set_linear_velocity(&mut self, velocity: Vec3);

    /// Angular velocity, deg/s about each axis.
    fn set_angular_velocity(&mut self, velocity: Vec3);

    fn linear_velocity(&self) -> Vec3;

    fn angular_velocity(&self) -> Vec3;

    /// Static joint metadata.
    fn joints(&self) -> &JointTable;

    fn joint_spec(&self, name: &str) -> Option<JointSpec> {
        self.joints().get(name)
    }

    /// Apply a batch of already-converted joint targets in one go.
    fn set_joint_targets(&mut self, targets: &HashMap<String, f64>, mode: JointControlMode);

    /// Advance internal state by `dt` seconds.  Vehicles driven by an
    /// external physics engine leave this as a no-op.
    fn step(&mut self, _dt: f64) {}
}

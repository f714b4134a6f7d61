//! Joint-state batch normalisation.
//!
//! A batch carries parallel `name` / `position` / `velocity` / `effort`
//! sequences.  The control mode comes from whichever value sequence matches
//! the name count, checked in that order, so position wins ties.  Each named
//! joint is then validated against the vehicle's [`JointTable`] and converted
//! to internal units.

use std::collections::HashMap;

use drivesim_types::convert::joint_external_to_internal;
use drivesim_types::{DriveError, JointControlMode, JointStateMsg, JointTable};

/// Infer the control mode of `msg`.
///
/// # Errors
///
/// * [`DriveError::UnsupportedControlMode`] when only the effort sequence
///   matches.
/// * [`DriveError::JointArrayMismatch`] when none does.
pub fn infer_control_mode(msg: &JointStateMsg) -> Result<JointControlMode, DriveError> {
    let names = msg.name.len();
    if names == msg.position.len() {
        Ok(JointControlMode::Position)
    } else if names == msg.velocity.len() {
        Ok(JointControlMode::Velocity)
    } else if names == msg.effort.len() {
        Err(DriveError::UnsupportedControlMode(JointControlMode::Effort))
    } else {
        Err(DriveError::JointArrayMismatch {
            names,
            position: msg.position.len(),
            velocity: msg.velocity.len(),
            effort: msg.effort.len(),
        })
    }
}

/// The accepted part of a joint batch plus everything that was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct JointBatch {
    pub mode: JointControlMode,
    /// Joint name → target in internal units.
    pub targets: HashMap<String, f64>,
    /// Joints dropped from the batch, with the reason, in message order.
    pub skipped: Vec<(String, DriveError)>,
}

/// Validate and convert `msg` against `joints`.
///
/// Unknown joints and joints that are not single-DOF are skipped and recorded
/// in [`JointBatch::skipped`]; the rest of the batch still applies.  A
/// repeated name keeps its last value.
pub fn normalize_joint_batch(
    msg: &JointStateMsg,
    joints: &JointTable,
) -> Result<JointBatch, DriveError> {
    let mode = infer_control_mode(msg)?;
    let values = match mode {
        JointControlMode::Position => &msg.position,
        JointControlMode::Velocity => &msg.velocity,
        JointControlMode::Effort => {
            return Err(DriveError::UnsupportedControlMode(JointControlMode::Effort));
        }
    };

    let mut targets = HashMap::with_capacity(msg.name.len());
    let mut skipped = Vec::new();

    for (name, &value) in msg.name.iter().zip(values) {
        let Some(spec) = joints.get(name) else {
            skipped.push((name.clone(), DriveError::UnknownJoint(name.clone())));
            continue;
        };
        match spec.axis(name) {
            Ok(axis) => {
                targets.insert(name.clone(), joint_external_to_internal(axis, value));
            }
            Err(e) => skipped.push((name.clone(), e)),
        }
    }

    Ok(JointBatch {
        mode,
        targets,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivesim_types::JointSpec;

    fn table() -> JointTable {
        JointTable::new()
            .with_joint("wheel_left", JointSpec::linear())
            .with_joint("arm_yaw", JointSpec::rotational())
            .with_joint("caster", JointSpec::default())
    }

    fn batch(names: &[&str], position: Vec<f64>, velocity: Vec<f64>, effort: Vec<f64>) -> JointStateMsg {
        JointStateMsg {
            name: names.iter().map(|s| s.to_string()).collect(),
            position,
            velocity,
            effort,
            ..Default::default()
        }
    }

    #[test]
    fn position_inferred_when_only_position_matches() {
        let msg = batch(&["a", "b"], vec![0.1, 0.2], vec![1.0], vec![]);
        assert_eq!(infer_control_mode(&msg), Ok(JointControlMode::Position));
    }

    #[test]
    fn position_wins_ties_with_velocity() {
        let msg = batch(&["a"], vec![0.1], vec![1.0], vec![2.0]);
        assert_eq!(infer_control_mode(&msg), Ok(JointControlMode::Position));
    }

    #[test]
    fn velocity_inferred_when_position_empty() {
        let msg = batch(&["a"], vec![], vec![1.0], vec![]);
        assert_eq!(infer_control_mode(&msg), Ok(JointControlMode::Velocity));
    }

    #[test]
    fn effort_only_is_unsupported() {
        let msg = batch(&["a"], vec![], vec![], vec![3.0]);
        assert_eq!(
            infer_control_mode(&msg),
            Err(DriveError::UnsupportedControlMode(JointControlMode::Effort))
        );
    }

    #[test]
    fn no_matching_array_rejects_whole_batch() {
        let msg = batch(&["wheel_left", "arm_yaw"], vec![0.5], vec![], vec![]);
        let err = normalize_joint_batch(&msg, &table()).unwrap_err();
        assert_eq!(
            err,
            DriveError::JointArrayMismatch {
                names: 2,
                position: 1,
                velocity: 0,
                effort: 0
            }
        );
    }

    #[test]
    fn linear_joint_position_converts_to_centimetres() {
        let msg = batch(&["wheel_left"], vec![0.5], vec![], vec![]);
        let out = normalize_joint_batch(&msg, &table()).unwrap();
        assert_eq!(out.mode, JointControlMode::Position);
        assert!((out.targets["wheel_left"] - 50.0).abs() < 1e-12);
        assert!(out.skipped.is_empty());
    }

    #[test]
    fn rotational_joint_velocity_converts_to_degrees() {
        let msg = batch(&["arm_yaw"], vec![], vec![std::f64::consts::PI], vec![]);
        let out = normalize_joint_batch(&msg, &table()).unwrap();
        assert_eq!(out.mode, JointControlMode::Velocity);
        assert!((out.targets["arm_yaw"] - 180.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_joint_is_skipped_with_one_error() {
        let msg = batch(&["gripper"], vec![], vec![1.0], vec![]);
        let out = normalize_joint_batch(&msg, &table()).unwrap();
        assert!(out.targets.is_empty());
        assert_eq!(
            out.skipped,
            vec![("gripper".to_string(), DriveError::UnknownJoint("gripper".into()))]
        );
    }

    #[test]
    fn dof_violation_skips_only_that_joint() {
        let msg = batch(&["caster", "wheel_left"], vec![1.0, 0.25], vec![], vec![]);
        let out = normalize_joint_batch(&msg, &table()).unwrap();
        assert_eq!(out.targets.len(), 1);
        assert!((out.targets["wheel_left"] - 25.0).abs() < 1e-12);
        assert_eq!(out.skipped.len(), 1);
        assert!(matches!(out.skipped[0].1, DriveError::DofViolation { .. }));
    }
}

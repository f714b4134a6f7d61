//! Hand-off queue from transport workers to the simulation thread.
//!
//! Workers hold a cloneable [`CommandSender`]; the simulation thread owns the
//! single [`CommandReceiver`] and drains it once per tick without blocking.

use std::collections::HashMap;

use drivesim_types::{CommandChannel, DriveError, ScheduledCommand, VehicleHandle};
use tokio::sync::mpsc;

/// Create a connected sender/receiver pair.
pub fn command_queue() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender { tx }, CommandReceiver { rx })
}

#[derive(Clone, Debug)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<ScheduledCommand>,
}

impl CommandSender {
    /// Queue `command` for the next tick.
    ///
    /// # Errors
    ///
    /// [`DriveError::Channel`] once the receiver has been dropped.
    pub fn schedule(&self, command: ScheduledCommand) -> Result<(), DriveError> {
        self.tx
            .send(command)
            .map_err(|_| DriveError::Channel("simulation thread is gone".to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<ScheduledCommand>,
}

impl CommandReceiver {
    /// Take everything currently queued, in submission order.
    pub fn drain(&mut self) -> Vec<ScheduledCommand> {
        let mut out = Vec::new();
        while let Ok(cmd) = self.rx.try_recv() {
            out.push(cmd);
        }
        out
    }

    /// Like [`drain`](Self::drain) but keeps only the latest command per
    /// vehicle and channel.  Survivors keep their relative submission order.
    pub fn drain_latest(&mut self) -> Vec<ScheduledCommand> {
        let all = self.drain();
        let mut last: HashMap<(VehicleHandle, CommandChannel), usize> = HashMap::new();
        for (idx, cmd) in all.iter().enumerate() {
            last.insert((cmd.vehicle, cmd.command.channel()), idx);
        }
        all.into_iter()
            .enumerate()
            .filter(|(idx, cmd)| last.get(&(cmd.vehicle, cmd.command.channel())) == Some(idx))
            .map(|(_, cmd)| cmd)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivesim_types::{JointControlMode, Vec3, VehicleCommand};

    fn velocity(vehicle: VehicleHandle, x: f64) -> ScheduledCommand {
        ScheduledCommand {
            vehicle,
            command: VehicleCommand::Velocity {
                linear: Vec3::new(x, 0.0, 0.0),
                angular: Vec3::zero(),
            },
        }
    }

    fn joints(vehicle: VehicleHandle) -> ScheduledCommand {
        ScheduledCommand {
            vehicle,
            command: VehicleCommand::Joints {
                targets: HashMap::from([("wheel_left".to_string(), 50.0)]),
                mode: JointControlMode::Position,
            },
        }
    }

    const A: VehicleHandle = VehicleHandle { index: 0, generation: 0 };
    const B: VehicleHandle = VehicleHandle { index: 1, generation: 0 };

    #[test]
    fn drain_preserves_submission_order() {
        let (tx, mut rx) = command_queue();
        tx.schedule(velocity(A, 1.0)).unwrap();
        tx.schedule(velocity(A, 2.0)).unwrap();
        let drained = rx.drain();
        assert_eq!(drained, vec![velocity(A, 1.0), velocity(A, 2.0)]);
        assert!(rx.is_empty());
    }

    #[test]
    fn drain_latest_is_last_write_wins_per_channel() {
        let (tx, mut rx) = command_queue();
        tx.schedule(velocity(A, 1.0)).unwrap();
        tx.schedule(joints(A)).unwrap();
        tx.schedule(velocity(B, 7.0)).unwrap();
        tx.schedule(velocity(A, 3.0)).unwrap();

        let drained = rx.drain_latest();
        assert_eq!(drained, vec![joints(A), velocity(B, 7.0), velocity(A, 3.0)]);
    }

    #[test]
    fn schedule_after_receiver_dropped_fails() {
        let (tx, rx) = command_queue();
        drop(rx);
        assert!(tx.is_closed());
        assert!(matches!(tx.schedule(velocity(A, 0.0)), Err(DriveError::Channel(_))));
    }
}

//! [`VehicleArena`] – generational vehicle registry and command applier.
//!
//! The arena owns every live vehicle on the simulation thread.  Callers refer
//! to vehicles only through [`VehicleHandle`]s; destroying a vehicle bumps
//! its slot's generation so stale handles resolve to nothing.  Applying a
//! command through a stale handle is a silent no-op.

use drivesim_types::{ScheduledCommand, VehicleCommand, VehicleHandle};
use tracing::{debug, trace};

use crate::vehicle::Vehicle;

struct Slot {
    generation: u32,
    vehicle: Option<Box<dyn Vehicle>>,
}

#[derive(Default)]
pub struct VehicleArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl VehicleArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `vehicle` and return its handle.  Freed slots are
    /// reused under a new generation.
    pub fn spawn(&mut self, vehicle: Box<dyn Vehicle>) -> VehicleHandle {
        debug!(vehicle = %vehicle.name(), "Vehicle spawned");
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.vehicle = Some(vehicle);
            return VehicleHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            vehicle: Some(vehicle),
        });
        VehicleHandle {
            index,
            generation: 0,
        }
    }

    /// Remove the vehicle behind `handle`.  Every outstanding copy of the
    /// handle stops resolving.
    pub fn destroy(&mut self, handle: VehicleHandle) -> Option<Box<dyn Vehicle>> {
        let slot = self.live_slot_mut(handle)?;
        let vehicle = slot.vehicle.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        if let Some(v) = &vehicle {
            debug!(vehicle = %v.name(), "Vehicle destroyed");
        }
        vehicle
    }

    pub fn is_alive(&self, handle: VehicleHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: VehicleHandle) -> Option<&(dyn Vehicle + 'static)> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.vehicle.as_deref())
    }

    pub fn get_mut(&mut self, handle: VehicleHandle) -> Option<&mut (dyn Vehicle + 'static)> {
        self.live_slot_mut(handle)?.vehicle.as_deref_mut()
    }

    /// Apply one scheduled command.  Returns `false` when the target vehicle
    /// no longer exists.
    pub fn apply(&mut self, scheduled: &ScheduledCommand) -> bool {
        let Some(vehicle) = self.get_mut(scheduled.vehicle) else {
            trace!(handle = ?scheduled.vehicle, "Command target gone, dropping");
            return false;
        };
        match &scheduled.command {
            VehicleCommand::Velocity { linear, angular } => {
                vehicle.set_linear_velocity(*linear);
                vehicle.set_angular_velocity(*angular);
            }
            VehicleCommand::Joints { targets, mode } => {
                vehicle.set_joint_targets(targets, *mode);
            }
        }
        true
    }

    /// Apply `commands` in order; returns how many reached a live vehicle.
    pub fn apply_all(&mut self, commands: &[ScheduledCommand]) -> usize {
        commands.iter().filter(|cmd| self.apply(cmd)).count()
    }

    /// Step every live vehicle by `dt` seconds.
    pub fn step_all(&mut self, dt: f64) {
        for vehicle in self.slots.iter_mut().filter_map(|s| s.vehicle.as_deref_mut()) {
            vehicle.step(dt);
        }
    }

    /// Handles of every live vehicle, in slot order.
    pub fn handles(&self) -> Vec<VehicleHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.vehicle.is_some())
            .map(|(index, slot)| VehicleHandle {
                index: index as u32,
                generation: slot.generation,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.vehicle.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_slot_mut(&mut self, handle: VehicleHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.vehicle.is_some())
    }
}

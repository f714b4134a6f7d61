//! The simulation thread's fixed-step loop.
//!
//! Each [`Simulation::tick`]:
//!
//! 1. drains the command queue, keeping the latest command per vehicle and
//!    channel;
//! 2. applies the survivors to live vehicles (stale handles are dropped);
//! 3. steps every vehicle;
//! 4. lets each controller update its estimator and publish.
//!
//! `Simulation` lives on exactly one thread.  Transport workers reach it
//! only through the command queue.

use std::sync::Arc;

use drivesim_hal::{SimVehicle, VehicleArena};
use drivesim_middleware::{
    CommandReceiver, CommandSender, EventBus, TransportNode, command_queue,
};
use drivesim_types::convert::transform_external_to_internal;
use drivesim_types::{DriveError, VehicleHandle};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::config::{SimulationConfig, VehicleConfig};
use crate::controller::VehicleController;

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub commands_applied: usize,
    /// Commands whose vehicle was gone by the time they ran.
    pub commands_dropped: usize,
    pub messages_published: usize,
}

pub struct Simulation {
    bus: Arc<EventBus>,
    runtime: Handle,
    arena: VehicleArena,
    controllers: Vec<VehicleController>,
    commands_tx: CommandSender,
    commands_rx: CommandReceiver,
    sim_time: f64,
    ticks: u64,
}

impl Simulation {
    /// An empty simulation whose transport callbacks run on `runtime`.
    pub fn new(bus: Arc<EventBus>, runtime: Handle) -> Self {
        let (commands_tx, commands_rx) = command_queue();
        Self {
            bus,
            runtime,
            arena: VehicleArena::new(),
            controllers: Vec::new(),
            commands_tx,
            commands_rx,
            sim_time: 0.0,
            ticks: 0,
        }
    }

    /// Build a simulation and spawn every configured vehicle.
    pub fn from_config(
        config: &SimulationConfig,
        bus: Arc<EventBus>,
        runtime: Handle,
    ) -> Result<Self, DriveError> {
        let mut sim = Self::new(bus, runtime);
        for vehicle in &config.vehicles {
            sim.spawn_vehicle(vehicle)?;
        }
        Ok(sim)
    }

    /// Spawn a [`SimVehicle`] and possess it with a fresh controller.
    pub fn spawn_vehicle(&mut self, config: &VehicleConfig) -> Result<VehicleHandle, DriveError> {
        let vehicle = SimVehicle::new(
            config.name.clone(),
            transform_external_to_internal(config.initial_pose),
            config.joints.clone(),
        );
        let handle = self.arena.spawn(Box::new(vehicle));

        let node = Arc::new(TransportNode::new(
            format!("{}_controller", config.name),
            config.effective_namespace(),
            self.bus.clone(),
            self.runtime.clone(),
        ));
        let mut controller = VehicleController::new(node, config.controller.clone());
        if let Err(e) = controller.possess(&self.arena, handle, self.commands_tx.clone()) {
            self.arena.destroy(handle);
            return Err(e);
        }
        self.controllers.push(controller);
        info!(vehicle = %config.name, namespace = %config.effective_namespace(), "Vehicle ready");
        Ok(handle)
    }

    /// Destroy a vehicle and its controller.  Commands already queued for it
    /// are dropped when they run.
    pub fn destroy_vehicle(&mut self, handle: VehicleHandle) -> bool {
        if self.arena.destroy(handle).is_none() {
            return false;
        }
        self.controllers.retain_mut(|c| {
            if c.vehicle() != Some(handle) {
                return true;
            }
            c.unpossess();
            c.node().shutdown();
            false
        });
        true
    }

    /// Advance the world by `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> TickReport {
        let latest = self.commands_rx.drain_latest();
        let applied = self.arena.apply_all(&latest);

        self.arena.step_all(dt);
        self.sim_time += dt;
        self.ticks += 1;

        let published = self
            .controllers
            .iter_mut()
            .map(|c| c.on_tick(&self.arena, self.sim_time))
            .sum();

        let report = TickReport {
            commands_applied: applied,
            commands_dropped: latest.len() - applied,
            messages_published: published,
        };
        if report.commands_dropped > 0 {
            debug!(
                tick = self.ticks,
                dropped = report.commands_dropped,
                "Commands for destroyed vehicles dropped"
            );
        }
        report
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn arena(&self) -> &VehicleArena {
        &self.arena
    }

    pub fn controllers(&self) -> &[VehicleController] {
        &self.controllers
    }

    /// A sender onto this simulation's command queue.
    pub fn command_sender(&self) -> CommandSender {
        self.commands_tx.clone()
    }

    /// Release every vehicle and shut every transport node down.
    pub fn shutdown(&mut self) {
        for controller in &mut self.controllers {
            controller.unpossess();
            controller.node().shutdown();
        }
        self.controllers.clear();
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use drivesim_middleware::RosbridgeBridge;
    use drivesim_perception::OdomConfig;
    use drivesim_types::{EventPayload, JointSpec, JointTable, Vec3};

    use crate::config::ControllerConfig;

    fn rover() -> VehicleConfig {
        VehicleConfig {
            joints: JointTable::new().with_joint("wheel_left", JointSpec::linear()),
            controller: ControllerConfig {
                odom: OdomConfig {
                    with_noise: false,
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Tick until a command sent from a worker has landed, or give up.
    async fn tick_until(sim: &mut Simulation, dt: f64, mut done: impl FnMut(&Simulation) -> bool) -> bool {
        for _ in 0..200 {
            sim.tick(dt);
            if done(sim) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn twist_over_the_wire_moves_the_vehicle() -> Result<(), Box<dyn std::error::Error>> {
        let bus = Arc::new(EventBus::default());
        let mut sim = Simulation::new(bus.clone(), Handle::current());
        let handle = sim.spawn_vehicle(&rover())?;
        let mut odom_rx = bus.subscribe_topic("/rover/odom");

        let bridge = RosbridgeBridge::new(bus.clone());
        bridge.ingest(
            r#"{"op":"publish","topic":"/rover/cmd_vel","type":"geometry_msgs/msg/Twist",
                "msg":{"linear":{"x":1.0,"y":0.0,"z":0.0},"angular":{"x":0.0,"y":0.0,"z":0.0}}}"#,
        )?;

        let moving = tick_until(&mut sim, 1.0 / 60.0, |s| {
            s.arena()
                .get(handle)
                .is_some_and(|v| v.linear_velocity().approx_eq(Vec3::new(100.0, 0.0, 0.0), 1e-9))
        })
        .await;
        assert!(moving, "velocity command never applied");

        let event = tokio::time::timeout(Duration::from_secs(1), odom_rx.recv())
            .await?
            .ok_or("no odometry")?;
        assert!(matches!(event.payload, EventPayload::Odometry(_)));
        Ok(())
    }

    #[tokio::test]
    async fn commands_for_a_destroyed_vehicle_are_dropped() -> Result<(), Box<dyn std::error::Error>> {
        let bus = Arc::new(EventBus::default());
        let mut sim = Simulation::new(bus, Handle::current());
        let handle = sim.spawn_vehicle(&rover())?;

        sim.command_sender().schedule(drivesim_types::ScheduledCommand {
            vehicle: handle,
            command: drivesim_types::VehicleCommand::Velocity {
                linear: Vec3::new(10.0, 0.0, 0.0),
                angular: Vec3::zero(),
            },
        })?;
        assert!(sim.destroy_vehicle(handle));
        assert!(sim.controllers().is_empty());

        let report = sim.tick(0.1);
        assert_eq!(report.commands_applied, 0);
        assert_eq!(report.commands_dropped, 1);
        assert!(!sim.destroy_vehicle(handle));
        Ok(())
    }

    #[tokio::test]
    async fn latest_velocity_wins_within_a_tick() -> Result<(), Box<dyn std::error::Error>> {
        let bus = Arc::new(EventBus::default());
        let mut sim = Simulation::new(bus, Handle::current());
        let handle = sim.spawn_vehicle(&rover())?;
        let tx = sim.command_sender();
        for x in [10.0, 20.0, 30.0] {
            tx.schedule(drivesim_types::ScheduledCommand {
                vehicle: handle,
                command: drivesim_types::VehicleCommand::Velocity {
                    linear: Vec3::new(x, 0.0, 0.0),
                    angular: Vec3::zero(),
                },
            })?;
        }
        let report = sim.tick(1.0);
        assert_eq!(report.commands_applied, 1);
        let vehicle = sim.arena().get(handle).ok_or("vehicle")?;
        assert!(vehicle.true_transform().translation.approx_eq(Vec3::new(30.0, 0.0, 0.0), 1e-9));
        Ok(())
    }

    #[tokio::test]
    async fn from_config_spawns_every_vehicle() -> Result<(), Box<dyn std::error::Error>> {
        let config = SimulationConfig {
            tick_hz: 30.0,
            vehicles: vec![
                rover(),
                VehicleConfig {
                    name: "cart".into(),
                    ..rover()
                },
            ],
        };
        let sim = Simulation::from_config(&config, Arc::new(EventBus::default()), Handle::current())?;
        assert_eq!(sim.arena().len(), 2);
        assert_eq!(sim.controllers().len(), 2);
        assert!(sim.controllers().iter().all(|c| c.is_possessed()));
        Ok(())
    }

    #[tokio::test]
    async fn sim_time_advances_per_tick() {
        let mut sim = Simulation::new(Arc::new(EventBus::default()), Handle::current());
        for _ in 0..4 {
            sim.tick(0.25);
        }
        assert_eq!(sim.ticks(), 4);
        assert!((sim.sim_time() - 1.0).abs() < 1e-12);
    }
}

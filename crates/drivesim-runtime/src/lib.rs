//! `drivesim-runtime` – the simulation thread.
//!
//! Owns the vehicle arena, one controller per possessed vehicle, and the
//! fixed-step tick that turns queued commands into motion and motion into
//! published odometry.
//!
//! # Modules
//!
//! - [`config`] – [`SimulationConfig`], per-vehicle and per-controller
//!   settings with serde defaults.
//! - [`controller`] – [`VehicleController`]: possession, command topic
//!   subscriptions, and the odometry publish timer.
//! - [`sim_loop`] – [`Simulation`]: drain → apply → step → estimate →
//!   publish, once per tick.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with an optional OTLP span exporter.

pub mod config;
pub mod controller;
pub mod sim_loop;
pub mod telemetry;

pub use config::{ControllerConfig, SimulationConfig, VehicleConfig};
pub use controller::{PublishTimer, VehicleController};
pub use sim_loop::{Simulation, TickReport};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};

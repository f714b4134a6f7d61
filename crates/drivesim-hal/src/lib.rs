//! `drivesim-hal` – the vehicle boundary.
//!
//! - [`vehicle`] – the [`Vehicle`] trait the control-plane talks to.
//! - [`sim`] – [`SimVehicle`], a kinematic stand-in.
//! - [`arena`] – [`VehicleArena`], generational ownership and command
//!   application on the simulation thread.

pub mod arena;
pub mod sim;
pub mod vehicle;

pub use arena::VehicleArena;
pub use sim::SimVehicle;
pub use vehicle::Vehicle;

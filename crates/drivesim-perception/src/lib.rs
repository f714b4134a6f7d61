//! `drivesim-perception` – odometry estimation.
//!
//! # Modules
//!
//! - [`odometry`] – [`OdomEstimator`]: noisy dead-reckoning pose/twist
//!   integrator with a fixed covariance, plus its [`OdomConfig`].
//! - [`noise`] – seeded Gaussian generators.

pub mod noise;
pub mod odometry;

pub use noise::{GaussianNoise, NoiseModel};
pub use odometry::{MIN_DELTA_TIME, OdomConfig, OdomEstimator, OdomSource, odom_covariance};

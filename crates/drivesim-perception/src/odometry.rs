//! Dead-reckoning odometry estimator with injected Gaussian noise.
//!
//! The estimator tracks the vehicle's true pose relative to an odometry
//! origin and integrates noisy increments on top of its own previous
//! estimate, so noise accumulates like it does on a real wheel encoder.
//! All state is in the internal convention (cm, deg); convert the published
//! [`OdometrySample`] with
//! [`odometry_internal_to_external`][drivesim_types::convert::odometry_internal_to_external].
//!
//! # Configuration
//!
//! | Field | Default |
//! |---|---|
//! | `topic` | `"odom"` |
//! | `frame_id` | `"odom"` |
//! | `child_frame_id` | `"base_footprint"` |
//! | `publication_frequency_hz` | `30.0` |
//! | `source` | [`OdomSource::Encoder`] |
//! | `with_noise` | `true` |
//! | `noise_mean_pos` / `noise_variance_pos` | `0.0` / `0.01` (cm) |
//! | `noise_mean_rot` / `noise_variance_rot` | `0.0` / `0.05` (deg) |
//! | `seed` | none (OS entropy) |
//! | `root_offset` | identity (metres, radians) |
//! | `manual_update` | `false` |

use drivesim_types::convert::{timestamp_seconds_to_external, transform_external_to_internal};
use drivesim_types::{
    Covariance6, DriveError, OdometrySample, Pose, Quaternion, Transform, TwistMsg, Vec3,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::noise::{GaussianNoise, NoiseModel};

/// Updates with a smaller step than this are ignored.
pub const MIN_DELTA_TIME: f64 = 1e-9;

/// Offset between the position and rotation generator seeds.
const ROTATION_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Where the odometry frame is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OdomSource {
    /// Odometry origin is the vehicle's pose at initialisation.
    #[default]
    Encoder,
    /// Odometry origin is the world origin.
    World,
}

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdomConfig {
    /// Publish topic; empty disables publishing.
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_frame_id")]
    pub frame_id: String,
    #[serde(default = "default_child_frame_id")]
    pub child_frame_id: String,
    #[serde(default = "default_publication_frequency_hz")]
    pub publication_frequency_hz: f64,
    #[serde(default)]
    pub source: OdomSource,
    #[serde(default = "default_with_noise")]
    pub with_noise: bool,
    #[serde(default)]
    pub noise_mean_pos: f64,
    /// Passed to the position generator as its standard deviation.
    #[serde(default = "default_noise_variance_pos")]
    pub noise_variance_pos: f64,
    #[serde(default)]
    pub noise_mean_rot: f64,
    /// Passed to the yaw generator as its standard deviation.
    #[serde(default = "default_noise_variance_rot")]
    pub noise_variance_rot: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Offset of the published pose from the tracked one, external
    /// convention.
    #[serde(default)]
    pub root_offset: Transform,
    /// When set, [`OdomEstimator::sensor_update`] does nothing and the owner
    /// drives [`OdomEstimator::update`] directly.
    #[serde(default)]
    pub manual_update: bool,
}

fn default_topic() -> String {
    "odom".to_string()
}

fn default_frame_id() -> String {
    "odom".to_string()
}

fn default_child_frame_id() -> String {
    "base_footprint".to_string()
}

fn default_publication_frequency_hz() -> f64 {
    30.0
}

fn default_with_noise() -> bool {
    true
}

fn default_noise_variance_pos() -> f64 {
    0.01
}

fn default_noise_variance_rot() -> f64 {
    0.05
}

impl Default for OdomConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            frame_id: default_frame_id(),
            child_frame_id: default_child_frame_id(),
            publication_frequency_hz: default_publication_frequency_hz(),
            source: OdomSource::default(),
            with_noise: default_with_noise(),
            noise_mean_pos: 0.0,
            noise_variance_pos: default_noise_variance_pos(),
            noise_mean_rot: 0.0,
            noise_variance_rot: default_noise_variance_rot(),
            seed: None,
            root_offset: Transform::identity(),
            manual_update: false,
        }
    }
}

impl OdomConfig {
    pub fn noise_model(&self) -> NoiseModel {
        NoiseModel {
            enabled: self.with_noise,
            mean_pos: self.noise_mean_pos,
            variance_pos: self.noise_variance_pos,
            mean_rot: self.noise_mean_rot,
            variance_rot: self.noise_variance_rot,
        }
    }
}

/// The fixed covariance used for both pose and twist.
pub fn odom_covariance() -> Covariance6 {
    let mut c = Covariance6::zeros();
    c.0[0] = 1e-5;
    c.0[7] = 1e-5;
    c.0[14] = 1e12;
    c.0[21] = 1e12;
    c.0[28] = 1e12;
    c.0[35] = 1e-3;
    c
}

// ────────────────────────────────────────────────────────────────────────────
// Estimator
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Tracked {
    initial: Transform,
    previous: Transform,
    previous_noisy: Transform,
}

#[derive(Debug, Clone)]
pub struct OdomEstimator {
    source: OdomSource,
    noise: NoiseModel,
    root_offset: Transform,
    manual_update: bool,
    frame_id: String,
    child_frame_id: String,
    position_noise: GaussianNoise,
    rotation_noise: GaussianNoise,
    tracked: Option<Tracked>,
    last_updated_time: f64,
    sample: OdometrySample,
}

impl OdomEstimator {
    /// # Errors
    ///
    /// [`DriveError::InvalidNoise`] if either noise pair is unusable.
    pub fn new(config: &OdomConfig) -> Result<Self, DriveError> {
        let noise = config.noise_model();
        let position_noise = GaussianNoise::new(noise.mean_pos, noise.variance_pos, config.seed)?;
        let rotation_noise = GaussianNoise::new(
            noise.mean_rot,
            noise.variance_rot,
            config.seed.map(|s| s ^ ROTATION_SEED_SALT),
        )?;
        let mut sample = OdometrySample::default();
        sample.header.frame_id = config.frame_id.clone();
        sample.child_frame_id = config.child_frame_id.clone();
        sample.pose.covariance = odom_covariance();
        sample.twist.covariance = odom_covariance();

        Ok(Self {
            source: config.source,
            noise,
            root_offset: transform_external_to_internal(config.root_offset),
            manual_update: config.manual_update,
            frame_id: config.frame_id.clone(),
            child_frame_id: config.child_frame_id.clone(),
            position_noise,
            rotation_noise,
            tracked: None,
            last_updated_time: 0.0,
            sample,
        })
    }

    pub fn set_frame_ids(&mut self, frame_id: impl Into<String>, child_frame_id: impl Into<String>) {
        self.frame_id = frame_id.into();
        self.child_frame_id = child_frame_id.into();
        self.sample.header.frame_id = self.frame_id.clone();
        self.sample.child_frame_id = self.child_frame_id.clone();
    }

    pub fn is_initialized(&self) -> bool {
        self.tracked.is_some()
    }

    /// The latest sample, internal convention.
    pub fn sample(&self) -> &OdometrySample {
        &self.sample
    }

    pub fn last_updated_time(&self) -> f64 {
        self.last_updated_time
    }

    /// Odometry origin; `None` before the first update.
    pub fn initial_transform(&self) -> Option<Transform> {
        self.tracked.map(|t| t.initial)
    }

    /// The published pose as an `frame_id → child_frame_id` transform.
    pub fn odom_tf(&self) -> Transform {
        Transform::new(
            self.sample.pose.pose.position,
            self.sample.pose.pose.orientation,
        )
    }

    /// Forget the odometry origin; the next update re-initialises.
    pub fn reset(&mut self) {
        self.tracked = None;
    }

    /// Anchor the odometry frame and reseed the generators.
    pub fn initialize(&mut self, true_pose: &Transform, now: f64) {
        let initial = match self.source {
            OdomSource::Encoder => *true_pose,
            OdomSource::World => Transform::identity(),
        };
        self.position_noise.reseed();
        self.rotation_noise.reseed();
        self.tracked = Some(Tracked {
            initial,
            previous: initial,
            previous_noisy: initial,
        });

        self.sample.header.frame_id = self.frame_id.clone();
        self.sample.header.stamp = timestamp_seconds_to_external(now);
        self.sample.child_frame_id = self.child_frame_id.clone();
        self.sample.pose.pose = Pose {
            position: initial.translation,
            orientation: initial.rotation,
        };
        self.sample.twist.twist = TwistMsg::default();
        self.sample.pose.covariance = odom_covariance();
        self.sample.twist.covariance = odom_covariance();
        self.last_updated_time = now;
        debug!(source = ?self.source, frame_id = %self.frame_id, "Odometry initialised");
    }

    /// Advance by `delta_time` seconds given the current true pose.
    ///
    /// Initialises on the first call.  A `delta_time` below
    /// [`MIN_DELTA_TIME`] leaves all state and the last sample untouched.
    pub fn update(&mut self, true_pose: &Transform, now: f64, delta_time: f64) {
        if self.tracked.is_none() {
            self.initialize(true_pose, now);
        }
        if delta_time < MIN_DELTA_TIME {
            trace!(delta_time, "Odometry update skipped");
            return;
        }
        let Some(tracked) = self.tracked.as_mut() else {
            return;
        };

        let prev_noisy_pos = tracked.previous_noisy.translation;
        let prev_noisy_rot = tracked.previous_noisy.rotation;

        // Position relative to the odometry origin, then drift on top of the
        // previous noisy estimate.
        let pos = tracked
            .initial
            .rotation
            .unrotate(true_pose.translation - tracked.initial.translation);
        let prev_pos = tracked.previous.translation;
        tracked.previous.translation = pos;
        let mut noisy_pos = prev_noisy_pos + (pos - prev_pos);
        if self.noise.enabled {
            let nx = self.position_noise.sample();
            let ny = self.position_noise.sample();
            noisy_pos += Vec3::new(nx, ny, 0.0);
        }

        // Rotation relative to the origin; yaw noise only.
        let rot = true_pose.rotation * tracked.initial.rotation.inverse();
        let prev_rot = tracked.previous.rotation;
        tracked.previous.rotation = rot;
        let yaw_noise_deg = if self.noise.enabled {
            self.rotation_noise.sample()
        } else {
            0.0
        };
        let noise_rot = Quaternion::from_yaw(yaw_noise_deg.to_radians());
        let noisy_rot = (noise_rot * prev_noisy_rot * prev_rot.inverse() * rot).normalized();

        tracked.previous_noisy = Transform::new(noisy_pos, noisy_rot);

        let twist_linear = noisy_rot.unrotate(noisy_pos - prev_noisy_pos) / delta_time;
        let step_euler = (noisy_rot * prev_noisy_rot.inverse()).normalized().to_euler();
        let twist_angular = Vec3::new(
            step_euler.x.to_degrees(),
            step_euler.y.to_degrees(),
            step_euler.z.to_degrees(),
        ) / delta_time;

        self.sample.header.stamp = timestamp_seconds_to_external(now);
        self.sample.pose.pose = Pose {
            position: noisy_pos + self.root_offset.translation,
            orientation: noisy_rot * self.root_offset.rotation,
        };
        self.sample.twist.twist = TwistMsg {
            linear: twist_linear,
            angular: twist_angular,
        };
    }

    /// Periodic update: derive `delta_time` from the last update time.
    ///
    /// Does nothing when `manual_update` is configured.  The first call only
    /// initialises.
    pub fn sensor_update(&mut self, true_pose: &Transform, now: f64) {
        if self.manual_update {
            return;
        }
        if self.tracked.is_none() {
            self.initialize(true_pose, now);
        }
        let delta_time = now - self.last_updated_time;
        self.update(true_pose, now, delta_time);
        if delta_time >= MIN_DELTA_TIME {
            self.last_updated_time = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn quiet() -> OdomConfig {
        OdomConfig {
            with_noise: false,
            ..Default::default()
        }
    }

    fn noisy(seed: u64) -> OdomConfig {
        OdomConfig {
            with_noise: true,
            noise_variance_pos: 1.0,
            noise_variance_rot: 0.5,
            seed: Some(seed),
            ..Default::default()
        }
    }

    fn pose(x: f64, y: f64, yaw_deg: f64) -> Transform {
        Transform::new(
            Vec3::new(x, y, 0.0),
            Quaternion::from_yaw(yaw_deg.to_radians()),
        )
    }

    #[test]
    fn covariance_is_fixed() {
        for config in [noisy(1), quiet()] {
            let mut est = OdomEstimator::new(&config).unwrap();
            est.update(&pose(0.0, 0.0, 0.0), 0.0, 0.0);
            for i in 1..20 {
                est.update(&pose(i as f64, 0.0, i as f64), i as f64 * 0.1, 0.1);
                let d = est.sample().pose.covariance.diagonal();
                assert_eq!(d, [1e-5, 1e-5, 1e12, 1e12, 1e12, 1e-3]);
                assert_eq!(est.sample().twist.covariance, est.sample().pose.covariance);
            }
        }
    }

    #[test]
    fn fresh_estimator_already_carries_fixed_covariance() {
        let config = OdomConfig {
            manual_update: true,
            ..quiet()
        };
        let mut est = OdomEstimator::new(&config).unwrap();
        est.sensor_update(&pose(10.0, 0.0, 0.0), 0.5);
        assert!(!est.is_initialized());
        assert_eq!(est.sample().pose.covariance, odom_covariance());
        assert_eq!(est.sample().twist.covariance, odom_covariance());
    }

    #[test]
    fn stationary_without_noise_has_zero_twist() {
        let start = pose(120.0, -40.0, 30.0);
        let mut est = OdomEstimator::new(&quiet()).unwrap();
        for i in 0..10 {
            est.update(&start, i as f64 * 0.1, 0.1);
        }
        let s = est.sample();
        assert!(s.pose.pose.position.approx_eq(Vec3::zero(), 1e-9));
        assert!(s.pose.pose.orientation.approx_eq(Quaternion::identity(), 1e-9));
        assert!(s.twist.twist.linear.approx_eq(Vec3::zero(), 1e-9));
        assert!(s.twist.twist.angular.approx_eq(Vec3::zero(), 1e-9));
    }

    #[test]
    fn tiny_delta_time_changes_nothing() {
        let mut est = OdomEstimator::new(&noisy(3)).unwrap();
        est.update(&pose(0.0, 0.0, 0.0), 0.0, 0.0);
        est.update(&pose(10.0, 0.0, 0.0), 0.1, 0.1);
        let before = est.sample().clone();
        let tracked_before = est.tracked.map(|t| (t.previous, t.previous_noisy));

        est.update(&pose(50.0, 5.0, 20.0), 0.2, 1e-10);
        assert_eq!(est.sample(), &before);
        assert_eq!(est.tracked.map(|t| (t.previous, t.previous_noisy)), tracked_before);
    }

    #[test]
    fn encoder_source_measures_from_initial_pose() {
        let mut est = OdomEstimator::new(&quiet()).unwrap();
        // Start at (100, 0) facing +90°; drive 50 cm along the heading.
        est.update(&pose(100.0, 0.0, 90.0), 0.0, 0.0);
        est.update(&pose(100.0, 50.0, 90.0), 0.5, 0.5);

        let s = est.sample();
        assert!(s.pose.pose.position.approx_eq(Vec3::new(50.0, 0.0, 0.0), 1e-9), "{:?}", s.pose.pose.position);
        assert!(s.twist.twist.linear.approx_eq(Vec3::new(100.0, 0.0, 0.0), 1e-9));
    }

    #[test]
    fn world_source_measures_from_origin() {
        let config = OdomConfig {
            source: OdomSource::World,
            ..quiet()
        };
        let mut est = OdomEstimator::new(&config).unwrap();
        est.update(&pose(100.0, 0.0, 90.0), 0.0, 0.0);
        assert_eq!(est.initial_transform(), Some(Transform::identity()));

        est.update(&pose(100.0, 50.0, 90.0), 0.5, 0.5);
        assert!(est.sample().pose.pose.position.approx_eq(Vec3::new(100.0, 50.0, 0.0), 1e-9));

        est.update(&pose(100.0, 100.0, 90.0), 1.0, 0.5);
        let s = est.sample();
        assert!(s.pose.pose.position.approx_eq(Vec3::new(100.0, 100.0, 0.0), 1e-9));
        assert!((s.pose.pose.orientation.yaw() - FRAC_PI_2).abs() < 1e-9);
        // Twist is expressed in the vehicle frame.
        assert!(s.twist.twist.linear.approx_eq(Vec3::new(100.0, 0.0, 0.0), 1e-9));
    }

    #[test]
    fn yaw_rate_shows_up_in_angular_twist() {
        let mut est = OdomEstimator::new(&quiet()).unwrap();
        est.update(&pose(0.0, 0.0, 0.0), 0.0, 0.0);
        est.update(&pose(0.0, 0.0, 10.0), 0.5, 0.5);
        let w = est.sample().twist.twist.angular;
        assert!(w.approx_eq(Vec3::new(0.0, 0.0, 20.0), 1e-9), "{w:?}");
    }

    #[test]
    fn root_offset_only_affects_published_pose() {
        let config = OdomConfig {
            root_offset: Transform::new(Vec3::new(0.1, 0.0, 0.2), Quaternion::identity()),
            ..quiet()
        };
        let mut est = OdomEstimator::new(&config).unwrap();
        est.update(&pose(0.0, 0.0, 0.0), 0.0, 0.0);
        est.update(&pose(30.0, 0.0, 0.0), 0.1, 0.1);
        est.update(&pose(60.0, 0.0, 0.0), 0.2, 0.1);

        let s = est.sample();
        assert!(s.pose.pose.position.approx_eq(Vec3::new(70.0, 0.0, 20.0), 1e-9));
        // Tracked estimate carries no offset, so velocity stays clean.
        assert!(s.twist.twist.linear.approx_eq(Vec3::new(300.0, 0.0, 0.0), 1e-9));
        assert!(est.odom_tf().translation.approx_eq(Vec3::new(70.0, 0.0, 20.0), 1e-9));
    }

    #[test]
    fn same_seed_same_trajectory() {
        let run = |seed| {
            let mut est = OdomEstimator::new(&noisy(seed)).unwrap();
            est.update(&pose(0.0, 0.0, 0.0), 0.0, 0.0);
            for i in 1..50 {
                est.update(&pose(i as f64 * 5.0, 0.0, 0.0), i as f64 * 0.1, 0.1);
            }
            est.sample().pose.pose
        };
        assert_eq!(run(11), run(11));
        assert_ne!(run(11), run(12));
    }

    #[test]
    fn noise_stays_planar_and_bounded() {
        let mut est = OdomEstimator::new(&noisy(5)).unwrap();
        let still = pose(0.0, 0.0, 0.0);
        est.update(&still, 0.0, 0.0);
        let steps = 400;
        for i in 1..=steps {
            est.update(&still, i as f64 * 0.1, 0.1);
        }
        let p = est.sample().pose.pose;
        assert_eq!(p.position.z, 0.0);
        // Random walk with σ = 1 cm per axis per step: 6σ·√n is a loose bound.
        let bound = 6.0 * (steps as f64).sqrt();
        assert!(p.position.x.abs() < bound && p.position.y.abs() < bound, "{p:?}");
        let e = p.orientation.to_euler();
        assert!(e.x.abs() < 1e-9 && e.y.abs() < 1e-9, "non-yaw rotation noise: {e:?}");
    }

    #[test]
    fn sensor_update_derives_delta_time() {
        let mut est = OdomEstimator::new(&quiet()).unwrap();
        est.sensor_update(&pose(0.0, 0.0, 0.0), 1.0);
        assert!(est.is_initialized());
        assert_eq!(est.last_updated_time(), 1.0);

        est.sensor_update(&pose(25.0, 0.0, 0.0), 1.25);
        assert_eq!(est.last_updated_time(), 1.25);
        assert!(est.sample().twist.twist.linear.approx_eq(Vec3::new(100.0, 0.0, 0.0), 1e-9));
        assert_eq!(est.sample().header.stamp.sec, 1);
        assert_eq!(est.sample().header.stamp.nanosec, 250_000_000);
    }

    #[test]
    fn manual_update_ignores_sensor_update() {
        let config = OdomConfig {
            manual_update: true,
            ..quiet()
        };
        let mut est = OdomEstimator::new(&config).unwrap();
        est.sensor_update(&pose(0.0, 0.0, 0.0), 1.0);
        assert!(!est.is_initialized());
    }

    #[test]
    fn reset_reanchors_on_next_update() {
        let mut est = OdomEstimator::new(&quiet()).unwrap();
        est.update(&pose(0.0, 0.0, 0.0), 0.0, 0.0);
        est.update(&pose(40.0, 0.0, 0.0), 0.1, 0.1);
        est.reset();
        est.update(&pose(40.0, 0.0, 0.0), 0.2, 0.1);
        assert_eq!(est.initial_transform(), Some(pose(40.0, 0.0, 0.0)));
        assert!(est.sample().pose.pose.position.approx_eq(Vec3::zero(), 1e-9));
    }

    #[test]
    fn frame_ids_are_applied_to_sample() {
        let mut est = OdomEstimator::new(&quiet()).unwrap();
        est.set_frame_ids("rover/odom", "rover/base_link");
        assert_eq!(est.sample().header.frame_id, "rover/odom");
        assert_eq!(est.sample().child_frame_id, "rover/base_link");
        est.update(&pose(0.0, 0.0, 0.0), 0.0, 0.0);
        assert_eq!(est.sample().child_frame_id, "rover/base_link");
    }

    #[test]
    fn config_fields_default_individually() {
        let config: OdomConfig = toml::from_str(
            r#"
            source = "world"
            seed = 9
            [root_offset.translation]
            x = 0.1
            y = 0.0
            z = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(config.source, OdomSource::World);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.topic, "odom");
        assert_eq!(config.child_frame_id, "base_footprint");
        assert_eq!(config.publication_frequency_hz, 30.0);
        assert_eq!(config.root_offset.rotation, Quaternion::identity());
        assert!(config.with_noise);
    }

    #[test]
    fn invalid_noise_is_rejected_at_construction() {
        let config = OdomConfig {
            noise_variance_pos: -1.0,
            ..Default::default()
        };
        assert!(matches!(OdomEstimator::new(&config), Err(DriveError::InvalidNoise(_))));
    }
}

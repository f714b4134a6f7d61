//! Configuration vault – reads/writes `~/.drivesim/config.toml`.
//!
//! The file is a [`SimulationConfig`] in TOML.  Missing fields take their
//! serde defaults, so a file that only sets `tick_hz` is valid.

use std::fs;
use std::path::{Path, PathBuf};

use drivesim_runtime::SimulationConfig;
use drivesim_types::DriveError;

/// Return the path to `~/.drivesim/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".drivesim").join("config.toml")
}

/// Load the config from `path` as written.  Returns `None` if the file does
/// not exist.
pub fn load_from(path: &Path) -> Result<Option<SimulationConfig>, DriveError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| DriveError::Config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| DriveError::Config(format!("failed to parse {}: {e}", path.display())))
}

/// Load `path`, writing the default configuration there first if it is
/// missing, then apply environment overrides.  Returns the config and
/// whether the file was freshly created.
pub fn load_or_init(path: &Path) -> Result<(SimulationConfig, bool), DriveError> {
    let (mut cfg, created) = match load_from(path)? {
        Some(cfg) => (cfg, false),
        None => {
            let cfg = SimulationConfig::default();
            save_to(&cfg, path)?;
            (cfg, true)
        }
    };
    apply_env_overrides(&mut cfg);
    Ok((cfg, created))
}

/// Apply `DRIVESIM_*` environment variable overrides to `cfg`.
///
/// | Variable | Effect |
/// |---|---|
/// | `DRIVESIM_TICK_HZ` | `tick_hz` |
/// | `DRIVESIM_ODOM_HZ` | every vehicle's `publication_frequency_hz` |
/// | `DRIVESIM_NOISE` | every vehicle's `with_noise` (`true`/`false`, `1`/`0`) |
/// | `DRIVESIM_SEED` | every vehicle's noise `seed` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut SimulationConfig) {
    if let Some(hz) = env_parse::<f64>("DRIVESIM_TICK_HZ") {
        cfg.tick_hz = hz;
    }
    let odom_hz = env_parse::<f64>("DRIVESIM_ODOM_HZ");
    let noise = std::env::var("DRIVESIM_NOISE").ok().and_then(|v| parse_flag(&v));
    let seed = env_parse::<u64>("DRIVESIM_SEED");

    for vehicle in &mut cfg.vehicles {
        let odom = &mut vehicle.controller.odom;
        if let Some(hz) = odom_hz {
            odom.publication_frequency_hz = hz;
        }
        if let Some(on) = noise {
            odom.with_noise = on;
        }
        if seed.is_some() {
            odom.seed = seed;
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &SimulationConfig, path: &Path) -> Result<(), DriveError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            DriveError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| DriveError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| DriveError::Config(format!("failed to write {}: {e}", path.display())))
}

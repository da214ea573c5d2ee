use crate::filter::{DEFAULT_LANDMARK_FACTOR, DEFAULT_POSE_FACTOR};
use crate::scheduler::DETECTOR_FRAME_INTERVAL_MS;
use crate::types::PhysiologicalProfile;
use serde::Serialize;
use std::env;
use std::str::FromStr;

pub const DEFAULT_SESSION_SECONDS: u32 = 60;
pub const DEFAULT_TICK_MS: u64 = 16;
pub const DEFAULT_HISTORY_LEN: usize = 10;

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RehabConfig {
    /// Exercise duration in seconds
    pub session_seconds: u32,
    /// Animation tick period of the controller loop
    pub tick_ms: u64,
    /// Minimum spacing between processed detector frames
    pub detector_interval_ms: f64,
    pub pose_smoothing: f64,
    pub landmark_smoothing: f64,
    pub profile: PhysiologicalProfile,
    /// Seed for the synthetic generator; entropy when unset
    pub seed: Option<u64>,
    /// Score history entries kept per exercise
    pub history_len: usize,
}

impl Default for RehabConfig {
    fn default() -> Self {
        Self {
            session_seconds: DEFAULT_SESSION_SECONDS,
            tick_ms: DEFAULT_TICK_MS,
            detector_interval_ms: DETECTOR_FRAME_INTERVAL_MS,
            pose_smoothing: DEFAULT_POSE_FACTOR,
            landmark_smoothing: DEFAULT_LANDMARK_FACTOR,
            profile: PhysiologicalProfile::Healthy,
            seed: None,
            history_len: DEFAULT_HISTORY_LEN,
        }
    }
}

impl RehabConfig {
    /// Load configuration from environment variables (and `.env`, if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Missing keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let profile = match lookup("OCULO_PROFILE") {
            Some(raw) => raw.parse().map_err(ConfigError::InvalidValue)?,
            None => defaults.profile,
        };

        let config = Self {
            session_seconds: parse_or(&lookup, "OCULO_SESSION_SECONDS", defaults.session_seconds)?,
            tick_ms: parse_or(&lookup, "OCULO_TICK_MS", defaults.tick_ms)?,
            detector_interval_ms: parse_or(
                &lookup,
                "OCULO_DETECTOR_INTERVAL_MS",
                defaults.detector_interval_ms,
            )?,
            pose_smoothing: parse_or(&lookup, "OCULO_POSE_SMOOTHING", defaults.pose_smoothing)?,
            landmark_smoothing: parse_or(
                &lookup,
                "OCULO_LANDMARK_SMOOTHING",
                defaults.landmark_smoothing,
            )?,
            profile,
            seed: match lookup("OCULO_SEED") {
                Some(raw) => Some(parse_value("OCULO_SEED", &raw)?),
                None => None,
            },
            history_len: parse_or(&lookup, "OCULO_HISTORY_LEN", defaults.history_len)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, factor) in [
            ("OCULO_POSE_SMOOTHING", self.pose_smoothing),
            ("OCULO_LANDMARK_SMOOTHING", self.landmark_smoothing),
        ] {
            if !(factor > 0.0 && factor <= 1.0) {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be in (0, 1], got {}",
                    name, factor
                )));
            }
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "OCULO_TICK_MS must be at least 1".to_string(),
            ));
        }
        if self.detector_interval_ms.is_nan() || self.detector_interval_ms < 0.0 {
            return Err(ConfigError::InvalidValue(
                "OCULO_DETECTOR_INTERVAL_MS must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{} has invalid value '{}'", key, raw)))
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

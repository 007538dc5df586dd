//! Runtime configuration read from the environment.
//!
//! # Responsibility
//! - Resolve database path, logging and gate mode for entry points.
//!
//! # Invariants
//! - Unset variables fall back to defaults; malformed ones are errors.

use crate::logging::default_log_level;
use crate::repo::parcel_repo::GateMode;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DB_PATH_VAR: &str = "PARCEL_DB_PATH";
pub const LOG_LEVEL_VAR: &str = "PARCEL_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "PARCEL_LOG_DIR";
pub const GATE_MODE_VAR: &str = "PARCEL_GATE_MODE";

const DEFAULT_DB_PATH: &str = "tracker.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidGateMode(String),
    Empty(&'static str),
    RelativeLogDir(PathBuf),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidGateMode(value) => write!(
                f,
                "{GATE_MODE_VAR} must be check_then_act or transactional, got `{value}`"
            ),
            Self::Empty(var) => write!(f, "{var} is set but empty"),
            Self::RelativeLogDir(path) => write!(
                f,
                "{LOG_DIR_VAR} must be an absolute path, got `{}`",
                path.display()
            ),
        }
    }
}

impl Error for ConfigError {}

/// Settings consumed by the tracker entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// File logging stays off when `None`.
    pub log_dir: Option<PathBuf>,
    pub gate_mode: GateMode,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_level: default_log_level().to_string(),
            log_dir: None,
            gate_mode: GateMode::default(),
        }
    }
}

impl TrackerConfig {
    /// Reads `PARCEL_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = non_empty(&lookup, DB_PATH_VAR)? {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = non_empty(&lookup, LOG_LEVEL_VAR)? {
            config.log_level = level;
        }
        if let Some(dir) = non_empty(&lookup, LOG_DIR_VAR)? {
            let dir = PathBuf::from(dir);
            if !dir.is_absolute() {
                return Err(ConfigError::RelativeLogDir(dir));
            }
            config.log_dir = Some(dir);
        }
        if let Some(mode) = non_empty(&lookup, GATE_MODE_VAR)? {
            config.gate_mode = parse_gate_mode(&mode)?;
        }

        Ok(config)
    }
}

fn non_empty(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<String>, ConfigError> {
    match lookup(var) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::Empty(var)),
        Some(value) => Ok(Some(value.trim().to_string())),
        None => Ok(None),
    }
}

fn parse_gate_mode(value: &str) -> Result<GateMode, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "check_then_act" => Ok(GateMode::CheckThenAct),
        "transactional" => Ok(GateMode::Transactional),
        _ => Err(ConfigError::InvalidGateMode(value.to_string())),
    }
}

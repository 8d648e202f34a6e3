// src/config.rs

use crate::constants::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DB_FILE_NAME: &str = "coderecall.db";
pub const DEFAULT_USER_ID: &str = "local";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainerConfig {
    /// Where the database lives. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
    pub user_id: String,
    pub scheduler: SchedulerConfig,
    pub stats: StatsConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            data_dir: None,
            user_id: DEFAULT_USER_ID.to_string(),
            scheduler: SchedulerConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Seed stability in days for a first review, indexed Again..Easy.
    pub initial_stability: [f64; 4],
    pub baseline_difficulty: f64,
    pub initial_ease_factor: f64,
    pub max_stability_days: f64,
    /// Attempts for a review that keeps losing optimistic-version races.
    pub conflict_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            initial_stability: INITIAL_STABILITY,
            baseline_difficulty: DIFFICULTY_BASELINE,
            initial_ease_factor: EASE_FACTOR_DEFAULT,
            max_stability_days: STABILITY_MAX,
            conflict_retries: CONFLICT_RETRY_ATTEMPTS,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .initial_stability
            .iter()
            .any(|s| !s.is_finite() || *s <= 0.0 || *s > STABILITY_MAX)
        {
            return Err(ConfigError::Invalid(format!(
                "scheduler.initial_stability entries must be within (0, {}]",
                STABILITY_MAX
            )));
        }
        if !(DIFFICULTY_MIN..=DIFFICULTY_MAX).contains(&self.baseline_difficulty) {
            return Err(ConfigError::Invalid(format!(
                "scheduler.baseline_difficulty must be within [{}, {}]",
                DIFFICULTY_MIN, DIFFICULTY_MAX
            )));
        }
        if self.initial_ease_factor.is_nan() || self.initial_ease_factor < EASE_FACTOR_MIN {
            return Err(ConfigError::Invalid(format!(
                "scheduler.initial_ease_factor must be at least {}",
                EASE_FACTOR_MIN
            )));
        }
        // due dates are computed from this, so it must stay well inside chrono's range
        if !(STABILITY_MIN..=STABILITY_MAX).contains(&self.max_stability_days) {
            return Err(ConfigError::Invalid(format!(
                "scheduler.max_stability_days must be within [{}, {}]",
                STABILITY_MIN, STABILITY_MAX
            )));
        }
        if self.conflict_retries == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.conflict_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatsConfig {
    /// Offset of the user's local day boundary from UTC.
    pub utc_offset_minutes: i32,
    /// Average only the most recent N reviews.
    pub recent_reviews: Option<usize>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        StatsConfig {
            utc_offset_minutes: 0,
            recent_reviews: None,
        }
    }
}

impl TrainerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: TrainerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_id.trim().is_empty() {
            return Err(ConfigError::Invalid("user_id must not be empty".to_string()));
        }
        if self.stats.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Invalid(
                "stats.utc_offset_minutes must be within a day".to_string(),
            ));
        }
        self.scheduler.validate()
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|d| d.join("coderecall"))
                .ok_or_else(|| ConfigError::Invalid("no platform data directory".to_string())),
        }
    }

    pub fn db_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join(DB_FILE_NAME))
    }

    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("coderecall").join("config.toml"))
    }
}

//! Configuration module for the AquaTrack assimilation service.

use serde::Deserialize;
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Address to bind the server to
    pub bind_address: String,
    /// Shared admin key for recompute/pin endpoints. Empty disables them.
    pub admin_api_key: String,
    /// Reference temperature substituted for freshwater stages (°C)
    pub freshwater_temp_c: f64,
    /// Rolling window for event-triggered recomputes (days)
    pub recompute_window_days: i64,
    /// Anchor weight factor when a transfer selected the largest fish
    pub bias_largest: f64,
    /// Anchor weight factor when a transfer selected the smallest fish
    pub bias_smallest: f64,
    /// Minimum daily biomass gain before an observed FCR is recorded (kg)
    pub fcr_gain_floor_kg: f64,
    /// Scheduler worker slots
    pub max_concurrent_recomputes: usize,
    /// Per-job deadline before the scheduler re-enqueues (seconds)
    pub job_deadline_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env_var("DATABASE_URL")?,
            bind_address: env_var_or("BIND_ADDRESS", "0.0.0.0:8080"),
            admin_api_key: env_var_or("ADMIN_API_KEY", ""),
            freshwater_temp_c: env_parse("FRESHWATER_TEMP_C", 12.0)?,
            recompute_window_days: env_parse("RECOMPUTE_WINDOW_DAYS", 30)?,
            bias_largest: env_parse("BIAS_LARGEST", 0.88)?,
            bias_smallest: env_parse("BIAS_SMALLEST", 1.12)?,
            fcr_gain_floor_kg: env_parse("FCR_GAIN_FLOOR_KG", 1.0)?,
            max_concurrent_recomputes: env_parse("MAX_CONCURRENT_RECOMPUTES", 4)?,
            job_deadline_secs: env_parse("JOB_DEADLINE_SECS", 300)?,
        })
    }
}

fn env_var(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn env_var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

//! # fv-config
//!
//! Layered settings: built-in defaults, then an optional `fleet-vitals.toml`,
//! then `FLEET__*` environment variables (after loading `.env`).
//!
//! ```text
//! FLEET__STORE__BACKEND=sqlite
//! FLEET__STORE__DATABASE_URL=sqlite:fleet_vitals.db
//! FLEET__LOG__FORMAT=json
//! FLEET__REPORT__TODAY=2024-06-20
//! ```

use chrono::NaiveDate;
use config::{Config, Environment, File, FileFormat};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "fleet-vitals";
const ENV_PREFIX: &str = "FLEET";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// May carry credentials for networked backends; never logged.
    pub database_url: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive, e.g. `info,fv_engine=debug`
    pub filter: String,
    pub format: LogFormat,
}

#[derive(Debug, Deserialize)]
pub struct ReportSettings {
    /// Deadlines due within this many days are listed.
    pub horizon_days: i64,
    /// Pins the clock to a fixed date instead of today (UTC).
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub store: StoreSettings,
    pub log: LogSettings,
    pub report: ReportSettings,
    /// Populate an empty store with demo machines and deadline types.
    pub seed_demo: bool,
}

impl Settings {
    /// Loads `.env`, then the default config file (if present) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let settings = Self::builder()?
            .add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false))
            .add_source(environment(None))
            .build()?
            .try_deserialize::<Settings>()?;
        settings.validate()
    }

    /// Defaults overlaid with a TOML document. No environment lookup.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let settings = Self::builder()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize::<Settings>()?;
        settings.validate()
    }

    /// A TOML document overlaid with `FLEET__*` variables from `vars`.
    #[cfg(test)]
    fn layered(toml: &str, vars: config::Map<String, String>) -> Result<Self, ConfigError> {
        let settings = Self::builder()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .add_source(environment(Some(vars)))
            .build()?
            .try_deserialize::<Settings>()?;
        settings.validate()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("store.backend", "sqlite")?
            .set_default("store.database_url", "sqlite:fleet_vitals.db")?
            .set_default("log.filter", "info")?
            .set_default("log.format", "pretty")?
            .set_default("report.horizon_days", 30)?
            .set_default("seed_demo", false)?)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.report.horizon_days < 0 {
            return Err(ConfigError::Invalid(format!(
                "report.horizon_days must not be negative, got {}",
                self.report.horizon_days
            )));
        }
        tracing::debug!(backend = ?self.store.backend, "configuration loaded");
        Ok(self)
    }
}

/// `FLEET__STORE__BACKEND` maps to `store.backend`. `None` reads the process environment.
fn environment(vars: Option<config::Map<String, String>>) -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .source(vars)
}

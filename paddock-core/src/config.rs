//! Bot configuration: a TOML settings file plus secrets from the
//! environment.
//!
//! Settings live in the XDG config dir (`~/.config/paddock/config.toml` on
//! Linux) and are created with defaults on first run. Secrets (the Discord
//! token and the iRacing credentials) come only from the environment or a
//! `.env` file so they never land in a config file.

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load a .env file if one exists (errors ignored, the file is optional).
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Scheduled report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Channel the weekly standings report is posted to. Reports are
    /// disabled when unset.
    #[serde(default)]
    pub channel_id: Option<u64>,
    /// Cron expression (minute hour dom month dow) for the report.
    #[serde(default = "default_report_schedule")]
    pub schedule: String,
    /// Weeks in a season.
    #[serde(default = "default_season_weeks")]
    pub season_weeks: u8,
    /// Best-N weeks that count toward the championship.
    #[serde(default = "default_weeks_counted")]
    pub weeks_counted: u8,
}

fn default_report_schedule() -> String {
    "0 18 * * Mon".to_string()
}

fn default_season_weeks() -> u8 {
    12
}

fn default_weeks_counted() -> u8 {
    8
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            channel_id: None,
            schedule: default_report_schedule(),
            season_weeks: default_season_weeks(),
            weeks_counted: default_weeks_counted(),
        }
    }
}

/// Background job cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    /// Minutes between subsession cache-fill passes.
    #[serde(default = "default_cache_fill_minutes")]
    pub cache_fill_minutes: u64,
    /// Cron expression for the series metadata refresh.
    #[serde(default = "default_series_refresh_schedule")]
    pub series_refresh_schedule: String,
}

fn default_cache_fill_minutes() -> u64 {
    30
}

fn default_series_refresh_schedule() -> String {
    "30 4 * * *".to_string()
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            cache_fill_minutes: default_cache_fill_minutes(),
            series_refresh_schedule: default_series_refresh_schedule(),
        }
    }
}

/// Aggregation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSettings {
    /// Cumulative corners required before the corners-per-incident trend
    /// is rendered at all.
    #[serde(default = "default_min_cpi_corners")]
    pub min_cpi_corners: u64,
}

fn default_min_cpi_corners() -> u64 {
    2000
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            min_cpi_corners: default_min_cpi_corners(),
        }
    }
}

/// Quote curation toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for QuoteSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// One emoji -> role mapping on the designated roles message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionRole {
    pub message_id: u64,
    pub emoji: String,
    pub role_id: u64,
}

/// Everything that lives in config.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Role allowed to run admin commands; server managers always can.
    #[serde(default)]
    pub admin_role_id: Option<u64>,
    #[serde(default)]
    pub reports: ReportSettings,
    #[serde(default)]
    pub jobs: JobSettings,
    #[serde(default)]
    pub stats: StatsSettings,
    #[serde(default)]
    pub quotes: QuoteSettings,
    #[serde(default)]
    pub reaction_roles: Vec<ReactionRole>,
}

/// Loaded configuration: file-backed settings plus environment secrets.
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    discord_bot_token: Option<String>,
    iracing_email: Option<String>,
    iracing_password: Option<String>,
}

impl Config {
    /// Load settings from disk (creating a default file on first run) and
    /// secrets from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        load_dotenv();
        let settings = Settings::load()?;
        Ok(Self {
            settings,
            discord_bot_token: env::var("DISCORD_BOT_TOKEN").ok().filter(|v| !v.is_empty()),
            iracing_email: env::var("IRACING_EMAIL").ok().filter(|v| !v.is_empty()),
            iracing_password: env::var("IRACING_PASSWORD").ok().filter(|v| !v.is_empty()),
        })
    }

    pub fn discord_bot_token(&self) -> Option<&str> {
        self.discord_bot_token.as_deref()
    }

    /// iRacing credentials, present only when both halves are set.
    pub fn iracing_credentials(&self) -> Option<(&str, &str)> {
        match (self.iracing_email.as_deref(), self.iracing_password.as_deref()) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        }
    }

    #[cfg(any(test, feature = "test-helpers"))]
    pub fn for_tests(settings: Settings) -> Self {
        Self {
            settings,
            discord_bot_token: None,
            iracing_email: None,
            iracing_password: None,
        }
    }
}

impl Settings {
    /// Load settings from the default path, writing defaults on first run.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let settings = Self::default();
            settings.save()?;
            Ok(settings)
        }
    }

    /// Save settings to the default path.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        let dirs = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.join("paddock").join("config.toml"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No config directory found")]
    NoConfigDir,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

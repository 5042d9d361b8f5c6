// Copyright (c) 2022 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Configuration file handling.

use crate::errors::ServiceError;
use crate::host::ConfigEntry;
use config::Config;
use log::{error, info, warn};
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};
use url::Url;

/// Default configuration file.
pub const DEF_CONFIG_FILE: &str = "configuration.yaml";

pub const DEF_HIVE_URL: &str = "https://beekeeper-uk.hivehome.com/1.0";
pub const DEF_RACHIO_URL: &str = "https://api.rach.io/1/public";

const ENV_USER_CFG_FILENAME: &str = "INTG_USER_CFG_FILENAME";
const DEV_USER_CFG_FILENAME: &str = "entries.json";

/// Environment variable for the user configuration directory.
///
/// The integration entries created or updated at runtime are stored in this directory.
const ENV_CONFIG_HOME: &str = "INTG_CONFIG_HOME";

/// Environment variable to enable vendor API message tracing.
///
/// **Attention:** this setting is only for debugging and exposes all data, including credentials!
pub const ENV_VENDOR_MSG_TRACING: &str = "INTG_VENDOR_MSG_TRACING";

#[derive(Default, serde::Deserialize, serde::Serialize)]
pub struct Settings {
    pub http: WebServerSettings,
    /// Externally reachable base URL of this service, used for vendor webhook URLs.
    pub external_url: Option<Url>,
    pub setup_retry: RetrySettings,
    pub hive: HiveSettings,
    pub powerview: PowerviewSettings,
    pub rachio: RachioSettings,
    /// Configured integration entries.
    #[serde(default)]
    pub entries: Vec<ConfigEntry>,
}

#[derive(Clone, serde::Deserialize, serde::Serialize)]
pub struct WebServerSettings {
    pub interface: String,
    pub port: u16,
}

impl Default for WebServerSettings {
    fn default() -> Self {
        Self {
            interface: "0.0.0.0".to_string(),
            port: 8123,
        }
    }
}

impl WebServerSettings {
    /// Local base URL, used if no external URL is configured.
    pub fn local_url(&self) -> Option<Url> {
        let host = if self.interface == "0.0.0.0" {
            "localhost"
        } else {
            self.interface.as_str()
        };
        Url::parse(&format!("http://{host}:{}", self.port)).ok()
    }
}

/// Backoff settings for retrying an integration entry setup which reported "not ready".
#[serde_as]
#[derive(Clone, serde::Deserialize, serde::Serialize)]
pub struct RetrySettings {
    /// Max number of retries. 0 = unlimited.
    pub attempts: u32,
    #[serde_as(as = "DurationMilliSeconds")]
    #[serde(rename = "duration_ms")]
    pub duration: Duration,
    #[serde_as(as = "DurationMilliSeconds")]
    #[serde(rename = "duration_max_ms")]
    pub duration_max: Duration,
    pub backoff_factor: f32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 0,
            duration: Duration::from_secs(5),
            duration_max: Duration::from_secs(300),
            backoff_factor: 2.0,
        }
    }
}

impl RetrySettings {
    /// Calculate the next retry delay from the current one, capped at `duration_max`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next =
            Duration::from_millis((current.as_millis() as f32 * self.backoff_factor) as u64);
        if next > self.duration_max {
            self.duration_max
        } else {
            next
        }
    }
}

impl Display for RetrySettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Setup retry attempts={}, duration={:?}, max={:?}, backoff={}",
            self.attempts, self.duration, self.duration_max, self.backoff_factor
        )
    }
}

#[serde_as]
#[derive(Clone, serde::Deserialize, serde::Serialize)]
pub struct HiveSettings {
    pub url: Url,
    /// Alarm panel polling interval.
    #[serde_as(as = "DurationSeconds")]
    #[serde(rename = "scan_interval_sec")]
    pub scan_interval: Duration,
    #[serde_as(as = "DurationSeconds")]
    #[serde(rename = "request_timeout_sec")]
    pub request_timeout: Duration,
}

impl Default for HiveSettings {
    fn default() -> Self {
        Self {
            url: Url::parse(DEF_HIVE_URL).expect("invalid default Hive URL"),
            scan_interval: Duration::from_secs(15),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[serde_as]
#[derive(Clone, serde::Deserialize, serde::Serialize)]
pub struct PowerviewSettings {
    /// Hub-wide shade data refresh interval of the coordinator.
    #[serde_as(as = "DurationSeconds")]
    #[serde(rename = "scan_interval_sec")]
    pub scan_interval: Duration,
    /// Polling interval of hard-wired shades.
    #[serde_as(as = "DurationSeconds")]
    #[serde(rename = "poll_interval_sec")]
    pub poll_interval: Duration,
    #[serde_as(as = "DurationSeconds")]
    #[serde(rename = "request_timeout_sec")]
    pub request_timeout: Duration,
    /// Max time for the initial shade refresh during setup.
    #[serde_as(as = "DurationMilliSeconds")]
    #[serde(rename = "setup_refresh_timeout_ms")]
    pub setup_refresh_timeout: Duration,
}

impl Default for PowerviewSettings {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(60),
            poll_interval: Duration::from_secs(600),
            request_timeout: Duration::from_secs(10),
            setup_refresh_timeout: Duration::from_secs(1),
        }
    }
}

#[serde_as]
#[derive(Clone, serde::Deserialize, serde::Serialize)]
pub struct RachioSettings {
    pub url: Url,
    #[serde_as(as = "DurationSeconds")]
    #[serde(rename = "request_timeout_sec")]
    pub request_timeout: Duration,
    /// Optional cloud relay hosting public webhook URLs.
    pub cloud_relay: Option<Url>,
}

impl Default for RachioSettings {
    fn default() -> Self {
        Self {
            url: Url::parse(DEF_RACHIO_URL).expect("invalid default Rachio URL"),
            request_timeout: Duration::from_secs(10),
            cloud_relay: None,
        }
    }
}

/// Load the configuration settings.
///
/// The application provides default values which can be overriden in the following order:
/// 1. Configuration settings in the read-only yaml configuration file specified in `filename`
/// 2. Integration entries stored at runtime, see [`save_user_settings`]
/// 3. Environment variables with prefix `INTG_`, nested keys separated by `__`
///
/// If there's a configuration load error, the configuration will be reloaded without the user
/// provided configuration settings for auto-recovery with default values.
pub fn get_configuration(filename: Option<&str>) -> Result<Settings, config::ConfigError> {
    let user_config = user_settings_path();
    if !user_config.is_file() {
        info!("No user settings file found");
        return load_configuration(filename, None);
    }

    match load_configuration(filename, Some(user_config)) {
        Ok(cfg) => Ok(cfg),
        Err(e) => {
            error!("Error loading configuration, retrying without user configuration. Error: {e}");
            load_configuration(filename, None)
        }
    }
}

fn load_configuration(
    filename: Option<&str>,
    user_config: Option<PathBuf>,
) -> Result<Settings, config::ConfigError> {
    // default configuration
    let mut config = Config::builder().add_source(Config::try_from(&Settings::default())?);
    // read optional configuration file to override defaults
    if let Some(filename) = filename {
        config = config.add_source(config::File::with_name(filename));
    }

    // Overlay integration entries stored at runtime
    if let Some(user_config) = user_config {
        config = config.add_source(config::File::from(user_config));
    }

    // E.g. `INTG_HTTP__PORT=8080` would set the `http.port` key
    let config = config
        .add_source(
            config::Environment::with_prefix("INTG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings: Settings = config.try_deserialize()?;

    check_cfg_values(settings)
}

fn check_cfg_values(mut settings: Settings) -> Result<Settings, config::ConfigError> {
    if settings.setup_retry.backoff_factor < 1.0
        || settings.setup_retry.duration.as_millis() < 100
        || settings.setup_retry.duration_max < settings.setup_retry.duration
    {
        warn!("Invalid setup retry settings, using defaults.");
        settings.setup_retry = Default::default();
    }

    if settings.hive.scan_interval.as_secs() < 5 {
        warn!("Invalid Hive scan interval, using default.");
        settings.hive.scan_interval = HiveSettings::default().scan_interval;
    }

    if settings.powerview.scan_interval.as_secs() < 10
        || settings.powerview.poll_interval.as_secs() < 10
    {
        warn!("Invalid PowerView polling settings, using defaults.");
        let defaults = PowerviewSettings::default();
        settings.powerview.scan_interval = defaults.scan_interval;
        settings.powerview.poll_interval = defaults.poll_interval;
    }

    if let Some(url) = settings.external_url.as_ref() {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(config::ConfigError::Message(format!(
                "invalid scheme in external_url: {}. Valid: [http, https]",
                url.scheme()
            )));
        }
    }

    let mut ids = HashSet::new();
    for entry in &settings.entries {
        if !ids.insert(entry.entry_id.as_str()) {
            return Err(config::ConfigError::Message(format!(
                "duplicate integration entry id: {}",
                entry.entry_id
            )));
        }
    }

    Ok(settings)
}

/// Wrapper to add the `entries` root property to make it compatible with the main configuration
/// file.
#[derive(serde::Serialize)]
struct UserSettingsWrapper<'a> {
    entries: &'a [ConfigEntry],
}

/// Store the integration entries, including data generated during setup like webhook ids.
pub fn save_user_settings(entries: &[ConfigEntry]) -> Result<(), ServiceError> {
    let cfg = UserSettingsWrapper { entries };
    fs::write(user_settings_path(), serde_json::to_string_pretty(&cfg)?).map_err(|e| {
        let msg = format!("Error saving user configuration: {e}");
        error!("{msg}");
        ServiceError::InternalServerError(msg)
    })?;
    Ok(())
}

/// Get user configuration file path.
///
/// The configuration file is located in the configuration directory specified in the env variable
/// `INTG_CONFIG_HOME`. If not set, the current directory is used.
fn user_settings_path() -> PathBuf {
    let file = env::var(ENV_USER_CFG_FILENAME).unwrap_or(DEV_USER_CFG_FILENAME.into());
    Path::new(&env::var(ENV_CONFIG_HOME).unwrap_or_default()).join(file)
}

use std::env::{self, current_exe};
use std::path::{Path, PathBuf};
use std::str;
use directories_next::ProjectDirs;
use log::{debug, info, warn};
use serde_json;
use tokio::fs;

use crate::config::types::MonitorConfig;
use crate::error::ConfigError;

/// Env var naming an explicit config file.
pub const CONFIG_ENV: &str = "OPENTRACKER_CONFIG";

// creates a path to <exe>.json in the same directory as the executable
// this could be useful for usb sticks
fn get_portable_config_path() -> Option<PathBuf> {
    match current_exe() {
        Ok(mut path) => {
            if !path.set_extension("json") {
                warn!("current exe has no filename: {}", path.to_string_lossy());
                return None
            }

            Some(path)
        },
        Err(err) => {
            warn!("failed to get current exe path: {:?}", err);
            None
        },
    }
}

// creates a path to opentracker-monitor.json in an os dependent standard directory, such as
// ~/.config on linux.
fn get_local_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "opentracker", "opentracker-monitor").map(|dirs| {
        dirs.config_dir().join("opentracker-monitor.json")
    })
}

pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    if let Some(path) = get_portable_config_path() {
        match std::fs::metadata(&path) {
            Ok(attr) if attr.is_file() => return Ok(path),
            Ok(_) => {},
            Err(err) => {
                debug!("No portable config at {} ({})", path.to_string_lossy(), err);
            },
        }
    }

    match get_local_config_path() {
        None => Err(ConfigError::NoConfigPath),
        Some(path) => Ok(path),
    }
}

pub async fn read_config_file(path: &Path) -> Result<MonitorConfig, ConfigError> {
    info!("Reading config file {}", path.to_string_lossy());
    let content = fs::read(path).await?;

    if content.is_empty() {
        return Ok(MonitorConfig::default());
    }

    let content = str::from_utf8(&content)?;
    let config: MonitorConfig = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Loads the config from the first location found. A missing file means defaults.
pub async fn load_config() -> Result<MonitorConfig, ConfigError> {
    let path = match get_config_path() {
        Ok(path) => path,
        Err(ConfigError::NoConfigPath) => {
            warn!("Could not determine a config path, using defaults");
            return Ok(MonitorConfig::default());
        },
        Err(err) => return Err(err),
    };

    match read_config_file(&path).await {
        Err(err) if err.is_file_not_found_error() => {
            info!("Config file not found, using defaults");
            Ok(MonitorConfig::default())
        },
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        env::temp_dir().join(format!("opentracker-{}-{}.json", name, nanos))
    }

    #[tokio::test]
    async fn reads_partial_config() {
        let path = temp_path("partial");
        std::fs::write(&path, r#"{ "rescanIntervalMs": 4000 }"#).unwrap();

        let config = read_config_file(&path).await.unwrap();
        assert_eq!(config.rescan_interval_ms, 4000);
        assert_eq!(config.telemetry_interval_ms, 50);

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn empty_file_means_defaults() {
        let path = temp_path("empty");
        std::fs::write(&path, "").unwrap();

        assert_eq!(read_config_file(&path).await.unwrap(), MonitorConfig::default());

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_reported_as_not_found() {
        let err = read_config_file(&temp_path("missing")).await.unwrap_err();
        assert!(err.is_file_not_found_error());
    }

    #[tokio::test]
    async fn invalid_values_are_rejected() {
        let path = temp_path("invalid");
        std::fs::write(&path, r#"{ "telemetryIntervalMs": 0 }"#).unwrap();

        match read_config_file(&path).await {
            Err(ConfigError::Invalid { .. }) => {},
            other => panic!("expected invalid config, got {:?}", other),
        }

        std::fs::remove_file(&path).unwrap();
    }
}

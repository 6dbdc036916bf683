use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Timing parameters of the session. Every field may be left out of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorConfig {
    /// Cadence of the telemetry poller.
    pub telemetry_interval_ms: u64,
    /// The stat poller runs once per this many telemetry ticks.
    pub stat_every_ticks: u64,
    /// How often the link is checked for silent loss.
    pub liveness_interval_ms: u64,
    pub scan_timeout_ms: u64,
    pub rescan_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub event_channel_capacity: usize,
}

impl MonitorConfig {
    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_millis(self.rescan_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("telemetryIntervalMs", self.telemetry_interval_ms),
            ("statEveryTicks", self.stat_every_ticks),
            ("livenessIntervalMs", self.liveness_interval_ms),
            ("scanTimeoutMs", self.scan_timeout_ms),
            ("rescanIntervalMs", self.rescan_interval_ms),
            ("connectTimeoutMs", self.connect_timeout_ms),
            ("eventChannelCapacity", self.event_channel_capacity as u64),
        ];

        for (name, value) in required {
            if value == 0 {
                return Err(ConfigError::Invalid { message: format!("{} must be greater than 0", name) });
            }
        }

        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            telemetry_interval_ms: 50,
            stat_every_ticks: 200,
            liveness_interval_ms: 200,
            scan_timeout_ms: 2000,
            rescan_interval_ms: 8000,
            connect_timeout_ms: 10000,
            event_channel_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: MonitorConfig = serde_json::from_str(r#"{ "telemetryIntervalMs": 20 }"#).unwrap();
        assert_eq!(config.telemetry_interval(), Duration::from_millis(20));
        assert_eq!(config.stat_every_ticks, 200);
        assert_eq!(config.rescan_interval(), Duration::from_millis(8000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let config = MonitorConfig { liveness_interval_ms: 0, ..MonitorConfig::default() };
        match config.validate() {
            Err(ConfigError::Invalid { message }) => assert!(message.contains("livenessIntervalMs")),
            other => panic!("expected invalid config, got {:?}", other),
        }
    }
}

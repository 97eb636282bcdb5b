//! Station configuration
//!
//! Loaded from YAML; every key is optional and falls back to the defaults
//! below.
//!
//! ```yaml
//! serial_port: /dev/ttyACM0
//! baud_rate: 115200
//! protocol: v2
//! synthesis: fixed
//! data_dir: /var/lib/groundlink
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::protocol::{FrameLayout, ProtocolRevision, SynthesisPolicy};
use crate::{Result, TelemetryError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StationConfig {
    /// Serial device of the ground radio
    pub serial_port: String,
    pub baud_rate: u32,
    /// Frame layout revision the flight computer speaks
    pub protocol: ProtocolRevision,
    /// How fields missing from the frame are filled in
    pub synthesis: SynthesisPolicy,
    /// Simulated sample period when no link is available at startup
    pub fallback_interval_ms: u64,
    /// Simulated sample period after the link drops mid-run
    pub failover_interval_ms: u64,
    pub geocode_timeout_ms: u64,
    /// Queue depth per telemetry subscriber
    pub subscriber_capacity: usize,
    /// Queue depth of the station event channel
    pub event_capacity: usize,
    /// Directory holding `launch_<id>.json` records
    pub data_dir: PathBuf,
    /// Launch site used when a recording is started without one
    pub default_launch_site: String,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            protocol: ProtocolRevision::V2,
            synthesis: SynthesisPolicy::Random,
            fallback_interval_ms: 100,
            failover_interval_ms: 500,
            geocode_timeout_ms: 3_000,
            subscriber_capacity: 256,
            event_capacity: 64,
            data_dir: PathBuf::from("launch_data"),
            default_launch_site: "Naro Space Center".to_string(),
        }
    }
}

impl StationConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        // An empty document means all defaults
        let config: StationConfig = if yaml.trim().is_empty() {
            StationConfig::default()
        } else {
            serde_yaml_ng::from_str(yaml)
                .map_err(|e| TelemetryError::config_error(format!("invalid YAML: {}", e)))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        let config = Self::from_yaml_str(&yaml)?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Reject values the station cannot run with.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.serial_port.trim().is_empty(), "serial_port must not be empty"),
            (self.baud_rate == 0, "baud_rate must be positive"),
            (self.fallback_interval_ms == 0, "fallback_interval_ms must be positive"),
            (self.failover_interval_ms == 0, "failover_interval_ms must be positive"),
            (self.geocode_timeout_ms == 0, "geocode_timeout_ms must be positive"),
            (self.subscriber_capacity == 0, "subscriber_capacity must be positive"),
            (self.event_capacity == 0, "event_capacity must be positive"),
        ];
        if let Some((_, message)) = checks.iter().find(|(failed, _)| *failed) {
            return Err(TelemetryError::config_error(*message));
        }
        self.layout().validate()
    }

    pub fn layout(&self) -> &'static FrameLayout {
        self.protocol.layout()
    }

    pub fn fallback_interval(&self) -> Duration {
        Duration::from_millis(self.fallback_interval_ms)
    }

    pub fn failover_interval(&self) -> Duration {
        Duration::from_millis(self.failover_interval_ms)
    }

    pub fn geocode_timeout(&self) -> Duration {
        Duration::from_millis(self.geocode_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = StationConfig::from_yaml_str("").unwrap();
        assert_eq!(config, StationConfig::default());
        assert_eq!(config.layout().frame_len, 44);
        assert_eq!(config.failover_interval(), Duration::from_millis(500));
    }

    #[test]
    fn partial_document_overrides_only_named_keys() {
        let config = StationConfig::from_yaml_str(
            "serial_port: /dev/ttyACM0\nprotocol: v1\nsynthesis: fixed\n",
        )
        .unwrap();
        assert_eq!(config.serial_port, "/dev/ttyACM0");
        assert_eq!(config.protocol, ProtocolRevision::V1);
        assert_eq!(config.synthesis, SynthesisPolicy::Fixed);
        assert_eq!(config.layout().frame_len, 36);
        assert_eq!(config.baud_rate, 115_200);
    }

    #[test]
    fn zero_values_are_rejected() {
        let err = StationConfig::from_yaml_str("subscriber_capacity: 0").unwrap_err();
        assert!(matches!(err, TelemetryError::Config { .. }));
        assert!(err.to_string().contains("subscriber_capacity"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = StationConfig::from_yaml_str("baud: 9600").unwrap_err();
        assert!(matches!(err, TelemetryError::Config { .. }));
    }

    #[tokio::test]
    async fn load_reads_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("station.yaml");
        tokio::fs::write(&path, "baud_rate: 57600\ndata_dir: /tmp/launches\n").await?;

        let config = StationConfig::load(&path).await?;
        assert_eq!(config.baud_rate, 57_600);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/launches"));

        let missing = StationConfig::load(dir.path().join("nope.yaml")).await;
        assert!(matches!(missing, Err(TelemetryError::File { .. })));
        Ok(())
    }
}

//! Finalized launch records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TelemetrySample;

/// Landing position used when a session recorded no samples.
pub const DEFAULT_LANDING_COORDS: LandingCoords = LandingCoords { lat: 37.5665, lng: 126.9780 };

/// Operator assessment of a launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "lowercase")]
pub enum LaunchStatus {
    #[default]
    Success,
    Partial,
    Failed,
}

impl LaunchStatus {
    /// Next status in the operator toggle cycle.
    pub fn next(self) -> Self {
        match self {
            LaunchStatus::Success => LaunchStatus::Partial,
            LaunchStatus::Partial => LaunchStatus::Failed,
            LaunchStatus::Failed => LaunchStatus::Success,
        }
    }
}

/// Final position of the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct LandingCoords {
    pub lat: f64,
    pub lng: f64,
}

impl Default for LandingCoords {
    fn default() -> Self {
        DEFAULT_LANDING_COORDS
    }
}

/// The finalized artifact of one recording session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct LaunchRecord {
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    pub launch_site: String,
    /// Seconds between start and stop
    pub duration: f64,
    pub telemetry_data: Vec<TelemetrySample>,
    pub max_altitude: f32,
    pub max_speed: f32,
    #[serde(default)]
    pub status: LaunchStatus,
    #[serde(default)]
    pub landing_coords: LandingCoords,
}

impl LaunchRecord {
    /// Build a record from a finished buffer, deriving the summary fields.
    pub fn from_samples(
        id: String,
        name: String,
        date: DateTime<Utc>,
        launch_site: String,
        duration: f64,
        telemetry_data: Vec<TelemetrySample>,
    ) -> Self {
        let max_altitude = max_or_zero(telemetry_data.iter().map(|s| s.altitude));
        let max_speed = max_or_zero(telemetry_data.iter().map(|s| s.speed));
        let landing_coords = telemetry_data
            .last()
            .map(|s| LandingCoords { lat: s.latitude as f64, lng: s.longitude as f64 })
            .unwrap_or_default();

        Self {
            id,
            name,
            date,
            launch_site,
            duration: duration.max(0.0),
            telemetry_data,
            max_altitude,
            max_speed,
            status: LaunchStatus::default(),
            landing_coords,
        }
    }

    /// Summary view without the sample buffer.
    pub fn summary(&self) -> LaunchSummary {
        LaunchSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            date: self.date,
            launch_site: self.launch_site.clone(),
            duration: self.duration,
            max_altitude: self.max_altitude,
            max_speed: self.max_speed,
            status: self.status,
            landing_coords: self.landing_coords,
            sample_count: self.telemetry_data.len(),
        }
    }
}

/// Launch record metadata used for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct LaunchSummary {
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    pub launch_site: String,
    pub duration: f64,
    pub max_altitude: f32,
    pub max_speed: f32,
    pub status: LaunchStatus,
    pub landing_coords: LandingCoords,
    pub sample_count: usize,
}

// Max over an empty set is reported as zero, never -inf.
fn max_or_zero(values: impl Iterator<Item = f32>) -> f32 {
    values.fold(None, |acc: Option<f32>, v| Some(acc.map_or(v, |m| m.max(v)))).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(altitude: f32, speed: f32, lat: f32, lng: f32) -> TelemetrySample {
        TelemetrySample { altitude, speed, latitude: lat, longitude: lng, ..Default::default() }
    }

    #[test]
    fn empty_record_is_guarded() {
        let record = LaunchRecord::from_samples(
            "1".into(),
            "empty".into(),
            Utc::now(),
            "pad".into(),
            0.0,
            vec![],
        );
        assert_eq!(record.max_altitude, 0.0);
        assert_eq!(record.max_speed, 0.0);
        assert_eq!(record.landing_coords, DEFAULT_LANDING_COORDS);
        assert_eq!(record.status, LaunchStatus::Success);
    }

    #[test]
    fn maxima_and_landing_come_from_samples() {
        let record = LaunchRecord::from_samples(
            "2".into(),
            "flight".into(),
            Utc::now(),
            "pad".into(),
            12.5,
            vec![sample(-3.0, 1.0, 1.0, 2.0), sample(-1.0, 4.0, 3.0, 4.0)],
        );
        assert_eq!(record.max_altitude, -1.0);
        assert_eq!(record.max_speed, 4.0);
        assert_eq!(record.landing_coords, LandingCoords { lat: 3.0, lng: 4.0 });
        assert_eq!(record.summary().sample_count, 2);
    }

    #[test]
    fn negative_duration_is_clamped() {
        let record =
            LaunchRecord::from_samples("3".into(), "n".into(), Utc::now(), "p".into(), -1.0, vec![]);
        assert_eq!(record.duration, 0.0);
    }

    #[test]
    fn status_cycle_wraps() {
        assert_eq!(LaunchStatus::Success.next(), LaunchStatus::Partial);
        assert_eq!(LaunchStatus::Failed.next(), LaunchStatus::Success);
        assert_eq!(serde_json::to_string(&LaunchStatus::Partial).unwrap(), "\"partial\"");
    }
}

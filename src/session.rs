//! Recording session state machine
//!
//! The recorder is either `Idle` or `Recording` one [`RecordingSession`].
//! It is owned by the driver task and only touched from there, so the
//! single-active-session rule and the append order need no locking.
//!
//! | State | Event | Next | Effect |
//! |---|---|---|---|
//! | Idle | start | Recording | new session, fresh id |
//! | Recording | start | Recording | none |
//! | Recording | sample | Recording | append to buffer |
//! | Recording | stop | Idle | build [`LaunchRecord`] |
//! | Idle | stop | Idle | none |

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::types::{LaunchRecord, TelemetrySample};

/// Observable recorder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

/// Result of a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session was opened with this id
    Started(String),
    /// A session was already running; nothing changed
    AlreadyRecording(String),
}

impl StartOutcome {
    /// Id of the session that is active after the request.
    pub fn id(&self) -> &str {
        match self {
            StartOutcome::Started(id) | StartOutcome::AlreadyRecording(id) => id,
        }
    }
}

/// One in-progress capture.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    started: Instant,
    pub launch_site: String,
    pub buffer: Vec<TelemetrySample>,
}

/// Tracks the optional active session and turns it into a launch record.
#[derive(Debug, Default)]
pub struct SessionRecorder {
    active: Option<RecordingSession>,
    last_id: i64,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecorderState {
        if self.active.is_some() { RecorderState::Recording } else { RecorderState::Idle }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&RecordingSession> {
        self.active.as_ref()
    }

    /// Open a session unless one is already running.
    pub fn start(
        &mut self,
        launch_site: impl Into<String>,
        now: DateTime<Utc>,
        started: Instant,
    ) -> StartOutcome {
        if let Some(session) = &self.active {
            debug!(id = %session.id, "Start ignored, already recording");
            return StartOutcome::AlreadyRecording(session.id.clone());
        }

        // Millisecond ids, bumped so two starts in the same millisecond differ.
        let id_value = now.timestamp_millis().max(self.last_id + 1);
        self.last_id = id_value;
        let id = id_value.to_string();

        let launch_site = launch_site.into();
        info!(id = %id, launch_site = %launch_site, "Recording started");
        self.active = Some(RecordingSession {
            id: id.clone(),
            started_at: now,
            started,
            launch_site,
            buffer: Vec::new(),
        });
        StartOutcome::Started(id)
    }

    /// Append a sample to the active session, if any.
    pub fn record(&mut self, sample: &TelemetrySample) {
        if let Some(session) = &mut self.active {
            session.buffer.push(*sample);
        }
    }

    /// Replace the launch site of session `id` with a resolved address.
    ///
    /// Returns false when that session is no longer active.
    pub fn resolve_launch_site(&mut self, id: &str, address: String) -> bool {
        match &mut self.active {
            Some(session) if session.id == id => {
                debug!(id, address = %address, "Launch site resolved");
                session.launch_site = address;
                true
            }
            _ => false,
        }
    }

    /// Close the active session and build its record.
    ///
    /// `name` falls back to a date-based default when missing or blank.
    /// Returns `None` when idle.
    pub fn stop(&mut self, name: Option<String>, stopped: Instant) -> Option<LaunchRecord> {
        let session = self.active.take()?;

        let duration = stopped.saturating_duration_since(session.started).as_secs_f64();
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Launch {}", session.started_at.to_rfc3339()));

        let record = LaunchRecord::from_samples(
            session.id,
            name,
            session.started_at,
            session.launch_site,
            duration,
            session.buffer,
        );

        info!(
            id = %record.id,
            samples = record.telemetry_data.len(),
            duration = record.duration,
            max_altitude = record.max_altitude,
            "Recording stopped"
        );
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_at;
    use crate::types::DEFAULT_LANDING_COORDS;
    use std::time::Duration;

    #[test]
    fn start_twice_keeps_one_session() {
        let mut recorder = SessionRecorder::new();
        let now = Utc::now();
        let t = Instant::now();

        let first = recorder.start("pad 39A", now, t);
        let second = recorder.start("somewhere else", now, t);

        assert!(matches!(first, StartOutcome::Started(_)));
        assert_eq!(second, StartOutcome::AlreadyRecording(first.id().to_string()));
        assert_eq!(recorder.active().unwrap().launch_site, "pad 39A");
        assert_eq!(recorder.state(), RecorderState::Recording);
    }

    #[test]
    fn stop_while_idle_is_a_no_op() {
        let mut recorder = SessionRecorder::new();
        assert!(recorder.stop(Some("x".into()), Instant::now()).is_none());
        assert_eq!(recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn samples_outside_a_session_are_ignored() {
        let mut recorder = SessionRecorder::new();
        recorder.record(&sample_at(1.0, 1.0));
        let t = Instant::now();
        recorder.start("pad", Utc::now(), t);
        let record = recorder.stop(None, t).unwrap();
        assert!(record.telemetry_data.is_empty());
    }

    #[test]
    fn empty_session_produces_guarded_record() {
        let mut recorder = SessionRecorder::new();
        let t = Instant::now();
        recorder.start("pad", Utc::now(), t);
        let record = recorder.stop(Some("   ".into()), t).unwrap();

        assert!(record.duration >= 0.0);
        assert_eq!(record.max_altitude, 0.0);
        assert_eq!(record.max_speed, 0.0);
        assert!(record.max_altitude.is_finite());
        assert_eq!(record.landing_coords, DEFAULT_LANDING_COORDS);
        assert!(record.name.starts_with("Launch "));
    }

    #[test]
    fn record_keeps_arrival_order_and_maxima() {
        let mut recorder = SessionRecorder::new();
        let t = Instant::now();
        recorder.start("pad", Utc::now(), t);
        for (alt, speed) in [(10.0, 5.0), (50.0, 20.0), (30.0, 15.0)] {
            recorder.record(&sample_at(alt, speed));
        }
        let record = recorder.stop(Some("Test".into()), t + Duration::from_millis(2500)).unwrap();

        assert_eq!(record.name, "Test");
        assert_eq!(record.max_altitude, 50.0);
        assert_eq!(record.max_speed, 20.0);
        let altitudes: Vec<f32> = record.telemetry_data.iter().map(|s| s.altitude).collect();
        assert_eq!(altitudes, vec![10.0, 50.0, 30.0]);
        assert_eq!(record.duration, 2.5);
        assert!(!recorder.is_recording());
    }

    #[test]
    fn ids_are_monotonic_within_a_millisecond() {
        let mut recorder = SessionRecorder::new();
        let now = Utc::now();
        let t = Instant::now();
        let a = recorder.start("pad", now, t).id().to_string();
        recorder.stop(None, t);
        let b = recorder.start("pad", now, t).id().to_string();
        assert!(b.parse::<i64>().unwrap() > a.parse::<i64>().unwrap());
    }

    #[test]
    fn stale_geocode_results_are_dropped() {
        let mut recorder = SessionRecorder::new();
        let t = Instant::now();
        let id = recorder.start("1.0, 2.0", Utc::now(), t).id().to_string();
        assert!(!recorder.resolve_launch_site("other", "Nowhere".into()));
        assert!(recorder.resolve_launch_site(&id, "Goheung".into()));
        let record = recorder.stop(None, t).unwrap();
        assert_eq!(record.launch_site, "Goheung");
        assert!(!recorder.resolve_launch_site(&id, "Late".into()));
    }
}

//! JSON control channel messages
//!
//! Clients drive the station with small JSON messages tagged by `type`.
//! Older clients nest the payload under `data`, newer ones put it at the
//! top level; both shapes are accepted.
//!
//! ```json
//! {"type": "start_recording", "data": {"launchSite": "34.431, 127.535"}}
//! {"type": "update_launch_status", "recordingId": "1718000000000", "newStatus": "partial"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::connection::StationConnection;
use crate::types::{LaunchRecord, LaunchStatus, LaunchSummary, LinkCommand, TelemetrySample};
use crate::{Result, TelemetryError};

/// Request from a control client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    #[serde(rename_all = "camelCase")]
    StartRecording {
        #[serde(default)]
        launch_site: Option<String>,
    },
    StopRecording {
        #[serde(default)]
        name: Option<String>,
    },
    GetRecordings,
    #[serde(rename_all = "camelCase")]
    GetRecordingData { recording_id: String },
    #[serde(rename_all = "camelCase")]
    DeleteRecording { recording_id: String },
    #[serde(rename_all = "camelCase")]
    UpdateLaunchStatus { recording_id: String, new_status: LaunchStatus },
    /// Force parachute deployment
    Eject,
    /// Re-center the attitude reference
    Center,
}

impl ControlRequest {
    /// Parse a request, lifting a nested `data` object to the top level.
    pub fn parse(text: &str) -> Result<Self> {
        let mut value: Value = serde_json::from_str(text)?;
        if let Value::Object(map) = &mut value {
            if let Some(Value::Object(data)) = map.remove("data") {
                for (key, field) in data {
                    if key != "type" {
                        map.entry(key).or_insert(field);
                    }
                }
            }
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Reply to a control client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
    #[serde(rename_all = "camelCase")]
    RecordingStarted { recording_id: String },
    RecordingStopped { record: LaunchRecord },
    RecordingsList { records: Vec<LaunchSummary> },
    RecordingData { record: LaunchRecord },
    #[serde(rename_all = "camelCase")]
    RecordingDeleted { recording_id: String },
    #[serde(rename_all = "camelCase")]
    LaunchStatusUpdated { recording_id: String, new_status: LaunchStatus },
    CommandSent { command: LinkCommand },
    Error { message: String },
}

impl ControlResponse {
    pub fn error(message: impl Into<String>) -> Self {
        ControlResponse::Error { message: message.into() }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Outbound telemetry message, `{"type":"telemetry","data":{...}}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "telemetry")]
pub struct TelemetryMessage {
    pub data: TelemetrySample,
}

impl TelemetryMessage {
    pub fn new(sample: &TelemetrySample) -> Self {
        Self { data: *sample }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Handle one raw control message.
///
/// Returns the reply to send back, or `None` when the request has no reply
/// (stopping while idle). Failures become `error` replies.
pub async fn handle(station: &StationConnection, text: &str) -> Option<ControlResponse> {
    let request = match ControlRequest::parse(text) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Malformed control message");
            return Some(ControlResponse::error(format!("malformed request: {}", e)));
        }
    };

    match execute(station, request).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Control request failed");
            Some(ControlResponse::error(e.to_string()))
        }
    }
}

/// Run a parsed request against the station.
pub async fn execute(
    station: &StationConnection,
    request: ControlRequest,
) -> Result<Option<ControlResponse>> {
    let response = match request {
        ControlRequest::StartRecording { launch_site } => {
            let outcome = station.start_recording(launch_site).await?;
            ControlResponse::RecordingStarted { recording_id: outcome.id().to_string() }
        }
        ControlRequest::StopRecording { name } => match station.stop_recording(name).await? {
            Some(record) => ControlResponse::RecordingStopped { record },
            None => {
                debug!("Stop requested while idle");
                return Ok(None);
            }
        },
        ControlRequest::GetRecordings => {
            ControlResponse::RecordingsList { records: station.store().list().await? }
        }
        ControlRequest::GetRecordingData { recording_id } => {
            ControlResponse::RecordingData { record: station.store().load(&recording_id).await? }
        }
        ControlRequest::DeleteRecording { recording_id } => {
            station.store().delete(&recording_id).await?;
            ControlResponse::RecordingDeleted { recording_id }
        }
        ControlRequest::UpdateLaunchStatus { recording_id, new_status } => {
            let record = station.store().update_status(&recording_id, new_status).await?;
            ControlResponse::LaunchStatusUpdated { recording_id, new_status: record.status }
        }
        ControlRequest::Eject => link_command(station, LinkCommand::Eject).await?,
        ControlRequest::Center => link_command(station, LinkCommand::Center).await?,
    };
    Ok(Some(response))
}

async fn link_command(
    station: &StationConnection,
    command: LinkCommand,
) -> Result<ControlResponse> {
    station.send_link_command(command).await.map_err(|e| match e {
        TelemetryError::Link { reason, source } => TelemetryError::Link {
            reason: format!("{:?} not delivered: {}", command, reason),
            source,
        },
        other => other,
    })?;
    Ok(ControlResponse::CommandSent { command })
}

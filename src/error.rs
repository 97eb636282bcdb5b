//! Error types for telemetry ingestion.
//!
//! This module provides the error type shared by every stage of the ground
//! station pipeline. All errors implement `std::error::Error` and carry
//! structured context for logging and recovery decisions.
//!
//! ## Error Categories
//!
//! - **Framing Errors**: misaligned or truncated candidate frames
//! - **Validation Errors**: checksum mismatches and undecodable fields
//! - **Transport Errors**: the serial link failed to open or dropped
//! - **Collaborator Errors**: geocoding and persistence failures
//! - **Configuration Errors**: invalid station settings
//!
//! Framing and validation errors never leave the ingestion path; they are
//! logged and the stream keeps going. Transport errors switch the station to
//! the simulated source.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use groundlink::TelemetryError;
//!
//! let error = TelemetryError::link_failed("serial port /dev/ttyUSB0 not found");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Telemetry link error: {reason}")]
    Link {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Framing error: {details}")]
    Frame { details: String },

    #[error("Checksum mismatch: computed {expected:#04x}, frame carries {found:#04x}")]
    Checksum { expected: u8, found: u8 },

    #[error("Failed to decode field '{field}': {details}")]
    Decode { field: &'static str, details: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Geocoding failed: {reason}")]
    Geocode { reason: String },

    #[error("Launch store error: {context}")]
    Store {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Launch record '{id}' not found")]
    RecordNotFound { id: String },

    #[error("Invalid launch record id '{id}'")]
    InvalidRecordId { id: String },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Station channel closed: {context}")]
    ChannelClosed { context: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Link { .. } => true,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::Geocode { .. } => true,
            TelemetryError::Store { .. } => true,
            TelemetryError::File { .. } => false,
            TelemetryError::Frame { .. } => false,
            TelemetryError::Checksum { .. } => false,
            TelemetryError::Decode { .. } => false,
            TelemetryError::RecordNotFound { .. } => false,
            TelemetryError::InvalidRecordId { .. } => false,
            TelemetryError::Config { .. } => false,
            TelemetryError::ChannelClosed { .. } => false,
            TelemetryError::Serialization(_) => false,
        }
    }

    /// Returns whether this error was raised while validating a single frame.
    ///
    /// Such errors drop one candidate packet and never interrupt the stream.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            TelemetryError::Frame { .. }
                | TelemetryError::Checksum { .. }
                | TelemetryError::Decode { .. }
        )
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Link { .. } => vec![
                "Check the serial cable and receiver power",
                "Verify the configured serial port path",
                "Confirm the baud rate matches the flight computer",
            ],
            TelemetryError::File { .. } => vec![
                "Check the file exists and is readable",
                "Check directory permissions",
                "Ensure sufficient disk space",
            ],
            TelemetryError::Frame { .. } | TelemetryError::Checksum { .. } => vec![
                "Check for radio interference or a noisy link",
                "Verify the firmware protocol revision matches the decoder",
            ],
            TelemetryError::Decode { .. } => vec![
                "Verify the firmware protocol revision matches the decoder",
                "Inspect the raw frame for sensor faults",
            ],
            TelemetryError::Timeout { .. } => {
                vec!["Increase the timeout duration", "Check network connectivity"]
            }
            TelemetryError::Geocode { .. } => vec![
                "Check network connectivity to the geocoding service",
                "The raw coordinates are used as the launch site",
            ],
            TelemetryError::Store { .. } => vec![
                "Check the launch data directory is writable",
                "Ensure sufficient disk space",
            ],
            TelemetryError::RecordNotFound { .. } => {
                vec!["Refresh the launch list", "Check the record id"]
            }
            TelemetryError::InvalidRecordId { .. } => {
                vec!["Record ids contain only letters, digits, '-' and '_'"]
            }
            TelemetryError::Config { .. } => {
                vec!["Check the configuration file", "Check command line overrides"]
            }
            TelemetryError::ChannelClosed { .. } => vec!["Restart the station"],
            TelemetryError::Serialization(_) => {
                vec!["Check the message is valid JSON", "Check field names and types"]
            }
        }
    }

    /// Helper constructor for link errors.
    pub fn link_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Link { reason: reason.into(), source: None }
    }

    /// Helper constructor for link errors with source.
    pub fn link_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Link { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TelemetryError::File { path, source }
    }

    /// Helper constructor for framing errors.
    pub fn frame_error(details: impl Into<String>) -> Self {
        TelemetryError::Frame { details: details.into() }
    }

    /// Helper constructor for field decode errors.
    pub fn decode_error(field: &'static str, details: impl Into<String>) -> Self {
        TelemetryError::Decode { field, details: details.into() }
    }

    /// Helper constructor for store errors with source.
    pub fn store_error_with_source(
        context: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Store { context: context.into(), source: Some(source) }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(details: impl Into<String>) -> Self {
        TelemetryError::Config { details: details.into() }
    }

    /// Helper constructor for closed station channels.
    pub fn channel_closed(context: impl Into<String>) -> Self {
        TelemetryError::ChannelClosed { context: context.into() }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::Link { reason: err.to_string(), source: Some(Box::new(err)) }
    }
}

impl From<tokio_serial::Error> for TelemetryError {
    fn from(err: tokio_serial::Error) -> Self {
        TelemetryError::Link { reason: err.description.clone(), source: Some(Box::new(err)) }
    }
}

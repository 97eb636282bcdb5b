//! Driver spawns and runs the station event loop
//!
//! One task owns the provider, the subscriber set and the session recorder.
//! Samples, operator commands and geocoding results are handled one at a
//! time in that task, so broadcast order and the single-session rule hold
//! without locks.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::Result;
use crate::fanout::Fanout;
use crate::geocode::{self, Geocoder};
use crate::provider::Provider;
use crate::session::{SessionRecorder, StartOutcome};
use crate::store::LaunchStore;
use crate::types::{LaunchRecord, LaunchSummary, LinkCommand, LinkStatus, TelemetrySample};

/// Consecutive provider errors tolerated before the loop gives up.
const MAX_ERRORS: u32 = 10;

/// Station lifecycle notifications for control clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StationEvent {
    #[serde(rename_all = "camelCase")]
    RecordingStarted { recording_id: String, launch_site: String },
    #[serde(rename_all = "camelCase")]
    LaunchSiteResolved { recording_id: String, launch_site: String },
    RecordingStopped { summary: LaunchSummary },
    #[serde(rename_all = "camelCase")]
    RecordSaved { recording_id: String },
    #[serde(rename_all = "camelCase")]
    PersistenceFailed { recording_id: String, reason: String },
    LinkStatusChanged { status: LinkStatus },
}

/// Requests from connection handles to the event loop.
#[derive(Debug)]
pub(crate) enum Command {
    Subscribe(mpsc::Sender<Arc<TelemetrySample>>),
    StartRecording { launch_site: Option<String>, reply: oneshot::Sender<StartOutcome> },
    StopRecording { name: Option<String>, reply: oneshot::Sender<Option<LaunchRecord>> },
    SendLinkCommand { command: LinkCommand, reply: oneshot::Sender<Result<()>> },
}

/// Collaborators and settings the event loop needs.
#[derive(Clone)]
pub struct DriverOptions {
    pub store: Arc<dyn LaunchStore>,
    pub geocoder: Arc<dyn Geocoder>,
    pub geocode_timeout: Duration,
    pub default_launch_site: String,
    pub event_capacity: usize,
}

/// Result of spawning the driver task
pub struct DriverChannels {
    pub(crate) commands: mpsc::UnboundedSender<Command>,
    /// Current link state
    pub link_status: watch::Receiver<LinkStatus>,
    /// Id of the active recording, if any
    pub recording: watch::Receiver<Option<String>>,
    /// Lifecycle notifications
    pub events: broadcast::Sender<StationEvent>,
    /// Nominal provider rate at spawn time
    pub source_hz: f64,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Driver spawns and manages the event loop task
pub struct Driver;

impl Driver {
    /// Spawn the event loop for the given provider
    pub fn spawn<P>(provider: P, options: DriverOptions) -> DriverChannels
    where
        P: Provider,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (link_tx, link_rx) = watch::channel(provider.link_status());
        let (recording_tx, recording_rx) = watch::channel(None);
        let (events_tx, _) = broadcast::channel(options.event_capacity.max(1));
        let (geocoded_tx, geocoded_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let source_hz = provider.source_hz();

        let event_loop = EventLoop {
            provider,
            options,
            fanout: Fanout::new(),
            recorder: SessionRecorder::new(),
            link_tx,
            recording_tx,
            events_tx: events_tx.clone(),
            geocoded_tx,
        };

        let cancel_loop = cancel.clone();
        tokio::spawn(async move {
            event_loop.run(command_rx, geocoded_rx, cancel_loop).await;
        });

        DriverChannels {
            commands: command_tx,
            link_status: link_rx,
            recording: recording_rx,
            events: events_tx,
            source_hz,
            cancel,
        }
    }
}

struct EventLoop<P> {
    provider: P,
    options: DriverOptions,
    fanout: Fanout,
    recorder: SessionRecorder,
    link_tx: watch::Sender<LinkStatus>,
    recording_tx: watch::Sender<Option<String>>,
    events_tx: broadcast::Sender<StationEvent>,
    /// Geocoding tasks report `(recording id, address)` here
    geocoded_tx: mpsc::Sender<(String, String)>,
}

impl<P: Provider> EventLoop<P> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut geocoded: mpsc::Receiver<(String, String)>,
        cancel: CancellationToken,
    ) {
        info!(link = ?self.provider.link_status(), "Station event loop started");
        let mut sample_count = 0u64;
        let mut error_count = 0u32;

        // Provider reads pause while this is armed; commands keep flowing.
        let backoff = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(backoff);
        let mut backing_off = false;

        loop {
            // Biased so a stop command is honoured before the next sample.
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Event loop cancelled");
                    break;
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("All connection handles dropped, shutting down");
                        break;
                    }
                },
                Some((id, address)) = geocoded.recv() => {
                    if self.recorder.resolve_launch_site(&id, address.clone()) {
                        self.publish(StationEvent::LaunchSiteResolved {
                            recording_id: id,
                            launch_site: address,
                        });
                    }
                }
                () = &mut backoff, if backing_off => {
                    trace!(attempt = error_count, "Backoff elapsed, reading again");
                    backing_off = false;
                }
                result = self.provider.next_sample(), if !backing_off => {
                    self.refresh_link_status();
                    match result {
                        Ok(Some(sample)) => {
                            sample_count += 1;
                            error_count = 0;
                            self.ingest(sample);
                        }
                        Ok(None) => {
                            info!(samples = sample_count, "Provider stream ended");
                            break;
                        }
                        Err(e) => {
                            error_count += 1;
                            error!(
                                error = %e,
                                attempt = error_count,
                                max = MAX_ERRORS,
                                "Provider error"
                            );

                            if error_count >= MAX_ERRORS {
                                error!("Too many provider errors, shutting down");
                                break;
                            }

                            // Exponential backoff: 100ms, 200ms, 400ms, ...
                            let delay = Duration::from_millis(50 * (1 << error_count.min(5)));
                            backoff.as_mut().reset(Instant::now() + delay);
                            backing_off = true;
                        }
                    }
                }
            }
        }

        self.shutdown().await;
        info!(samples = sample_count, "Event loop ended");
    }

    /// Broadcast first, then record, so both see samples in the same order.
    fn ingest(&mut self, sample: TelemetrySample) {
        let sample = Arc::new(sample);
        let delivered = self.fanout.broadcast(Arc::clone(&sample));
        self.recorder.record(&sample);
        trace!(
            timestamp = sample.timestamp,
            delivered,
            synthetic = sample.synthetic.any(),
            "Sample dispatched"
        );
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe(subscriber) => self.fanout.add(subscriber),
            Command::StartRecording { launch_site, reply } => {
                let outcome = self.start_recording(launch_site);
                let _ = reply.send(outcome);
            }
            Command::StopRecording { name, reply } => {
                let record = self.stop_recording(name);
                let _ = reply.send(record);
            }
            Command::SendLinkCommand { command, reply } => {
                let result = self.provider.send_command(command).await;
                if let Err(e) = &result {
                    warn!(command = ?command, error = %e, "Link command failed");
                }
                self.refresh_link_status();
                let _ = reply.send(result);
            }
        }
    }

    fn start_recording(&mut self, launch_site: Option<String>) -> StartOutcome {
        let launch_site = launch_site
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.options.default_launch_site.clone());

        let outcome = self.recorder.start(launch_site.clone(), Utc::now(), Instant::now());
        if let StartOutcome::AlreadyRecording(_) = outcome {
            return outcome;
        }
        let id = outcome.id().to_string();

        self.recording_tx.send_replace(Some(id.clone()));
        self.publish(StationEvent::RecordingStarted {
            recording_id: id.clone(),
            launch_site: launch_site.clone(),
        });

        // Resolved off the loop; the session buffers samples meanwhile.
        if geocode::parse_coordinates(&launch_site).is_some() {
            let geocoder = Arc::clone(&self.options.geocoder);
            let timeout = self.options.geocode_timeout;
            let tx = self.geocoded_tx.clone();
            tokio::spawn(async move {
                let resolved =
                    geocode::resolve_or_raw(geocoder, launch_site.clone(), timeout).await;
                if resolved != launch_site {
                    let _ = tx.send((id, resolved)).await;
                }
            });
        }

        outcome
    }

    fn stop_recording(&mut self, name: Option<String>) -> Option<LaunchRecord> {
        let record = self.recorder.stop(name, Instant::now())?;
        self.recording_tx.send_replace(None);
        self.publish(StationEvent::RecordingStopped { summary: record.summary() });

        // Persistence never holds up the loop.
        let store = Arc::clone(&self.options.store);
        let events = self.events_tx.clone();
        let to_save = record.clone();
        tokio::spawn(async move {
            let event = match store.save(&to_save).await {
                Ok(()) => StationEvent::RecordSaved { recording_id: to_save.id },
                Err(e) => {
                    warn!(id = %to_save.id, error = %e, "Failed to persist launch record");
                    StationEvent::PersistenceFailed {
                        recording_id: to_save.id,
                        reason: e.to_string(),
                    }
                }
            };
            let _ = events.send(event);
        });

        Some(record)
    }

    fn refresh_link_status(&mut self) {
        let status = self.provider.link_status();
        let changed = self.link_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
        if changed {
            info!(status = ?status, "Link status changed");
            self.publish(StationEvent::LinkStatusChanged { status });
        }
    }

    fn publish(&self, event: StationEvent) {
        // No receivers is fine
        let _ = self.events_tx.send(event);
    }

    /// Final bookkeeping once the loop exits.
    async fn shutdown(&mut self) {
        if let Some(record) = self.recorder.stop(None, Instant::now()) {
            warn!(id = %record.id, "Station stopping with an active recording, saving it");
            self.recording_tx.send_replace(None);
            if let Err(e) = self.options.store.save(&record).await {
                error!(id = %record.id, error = %e, "Failed to persist final launch record");
            }
        }
        self.link_tx.send_replace(LinkStatus::Disconnected);
    }
}

//! Handle to a running station

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_stream::wrappers::{ReceiverStream, WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::driver::{Command, DriverChannels, StationEvent};
use crate::session::StartOutcome;
use crate::store::LaunchStore;
use crate::stream::ThrottleExt;
use crate::types::{LaunchRecord, LinkCommand, LinkStatus, TelemetrySample, UpdateRate};
use crate::{Result, TelemetryError};


/// Connection to a running station
///
/// Cheap accessors read watch channels; recording and link commands are
/// round trips to the event loop. Dropping the connection stops the station.
pub struct StationConnection {
    commands: mpsc::UnboundedSender<Command>,
    link_status: watch::Receiver<LinkStatus>,
    recording: watch::Receiver<Option<String>>,
    events: broadcast::Sender<StationEvent>,
    store: Arc<dyn LaunchStore>,
    source_hz: f64,
    subscriber_capacity: usize,
    cancel: CancellationToken,
}

impl StationConnection {
    pub(crate) fn new(
        channels: DriverChannels,
        store: Arc<dyn LaunchStore>,
        subscriber_capacity: usize,
    ) -> Self {
        Self {
            commands: channels.commands,
            link_status: channels.link_status,
            recording: channels.recording,
            events: channels.events,
            store,
            source_hz: channels.source_hz,
            subscriber_capacity: subscriber_capacity.max(1),
            cancel: channels.cancel,
        }
    }

    /// Subscribe to decoded telemetry
    ///
    /// The stream yields samples validated after this call. A subscriber
    /// that falls more than the configured queue depth behind loses samples
    /// rather than slowing the station. Below the source rate, `rate`
    /// applies latest-wins throttling.
    pub fn subscribe(&self, rate: UpdateRate) -> BoxStream<'static, Arc<TelemetrySample>> {
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);
        if self.commands.send(Command::Subscribe(tx)).is_err() {
            debug!("Subscribe after station shutdown, stream ends immediately");
        }

        let samples = ReceiverStream::new(rx);
        match rate.throttle_interval(self.source_hz) {
            None => samples.boxed(),
            Some(interval) => samples.throttle(interval).boxed(),
        }
    }

    /// Current link state
    pub fn link_status(&self) -> LinkStatus {
        *self.link_status.borrow()
    }

    /// Link state changes as a stream, starting with the current state
    pub fn link_status_updates(&self) -> impl Stream<Item = LinkStatus> + Unpin + 'static {
        WatchStream::new(self.link_status.clone())
    }

    /// Station lifecycle notifications
    pub fn events(&self) -> broadcast::Receiver<StationEvent> {
        self.events.subscribe()
    }

    /// Start recording unless a session is already running
    ///
    /// `launch_site` may be raw `"lat, lon"` coordinates; they are geocoded
    /// in the background. `None` uses the configured default site.
    pub async fn start_recording(&self, launch_site: Option<String>) -> Result<StartOutcome> {
        self.request("start recording", |reply| Command::StartRecording { launch_site, reply })
            .await
    }

    /// Stop the active recording and return its record
    ///
    /// Returns `Ok(None)` when nothing was recording. The record is handed
    /// to the store in the background; watch [`events`](Self::events) for
    /// the outcome.
    pub async fn stop_recording(&self, name: Option<String>) -> Result<Option<LaunchRecord>> {
        self.request("stop recording", |reply| Command::StopRecording { name, reply }).await
    }

    /// Send an operator command down the serial link
    pub async fn send_link_command(&self, command: LinkCommand) -> Result<()> {
        self.request("send link command", |reply| Command::SendLinkCommand { command, reply })
            .await?
    }

    pub fn is_recording(&self) -> bool {
        self.recording.borrow().is_some()
    }

    /// Id of the active recording
    pub fn active_recording(&self) -> Option<String> {
        self.recording.borrow().clone()
    }

    /// Store that finished records are saved to
    pub fn store(&self) -> Arc<dyn LaunchStore> {
        Arc::clone(&self.store)
    }

    /// Nominal rate of the source the station started with
    pub fn source_hz(&self) -> f64 {
        self.source_hz
    }

    /// Stop the station; also happens on drop
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn request<T>(
        &self,
        what: &str,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| TelemetryError::channel_closed(format!("{}: station stopped", what)))?;
        rx.await.map_err(|_| TelemetryError::channel_closed(format!("{}: no reply", what)))
    }
}

impl Drop for StationConnection {
    fn drop(&mut self) {
        debug!("Dropping station connection");
        // Cancel tasks on drop for clean shutdown
        self.cancel.cancel();
    }
}

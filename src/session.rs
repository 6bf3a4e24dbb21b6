use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};

use crate::buffer::{BufferState, IngestOutcome, SampleBuffer};
use crate::config::AppConfig;
use crate::error::SourceError;
use crate::source::{spawn_fix_request, LocationProvider, SampleSource, Subscription};
use crate::types::{RawReading, SensorEvent, Snapshot};
use crate::utils::now_millis;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub ingested: u64,
    pub dropped: u64,
    pub evicted: u64,
}

/// Where the one-shot location request stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationStatus {
    Pending,
    Fixed,
    Denied,
    Failed,
}

/// One chart session: the buffer, the single source subscription feeding it,
/// and the outstanding location request.
///
/// All buffer mutation happens on the thread that calls `pump`.
pub struct ChartSession {
    buffer: SampleBuffer,
    events: Receiver<SensorEvent>,
    subscription: Option<Subscription>,
    location_task: Option<tokio::task::JoinHandle<()>>,
    location_status: LocationStatus,
    status_message: Option<String>,
    source_name: String,
    stats: SessionStats,
}

impl ChartSession {
    /// Subscribes to `source` once for the lifetime of the session and fires
    /// the location request on `runtime`.
    pub fn start(
        source: &mut dyn SampleSource,
        location: Arc<dyn LocationProvider>,
        config: &AppConfig,
        runtime: &tokio::runtime::Handle,
    ) -> Result<Self, SourceError> {
        let (sender, events) = bounded(config.channels.event_channel_capacity);
        let mut session = Self::detached(SampleBuffer::from_config(&config.buffer), events, source.name());

        session.subscription = Some(source.subscribe(sender.clone())?);
        session.request_location(
            runtime,
            location,
            Duration::from_millis(config.location.timeout_ms),
            sender,
        );

        info!(
            "Chart session started: source '{}', capacity {}",
            session.source_name,
            session.buffer.capacity()
        );
        Ok(session)
    }

    /// A session fed only through `events`, with no source attached yet.
    pub fn detached(buffer: SampleBuffer, events: Receiver<SensorEvent>, source_name: &str) -> Self {
        Self {
            buffer,
            events,
            subscription: None,
            location_task: None,
            location_status: LocationStatus::Pending,
            status_message: None,
            source_name: source_name.to_string(),
            stats: SessionStats::default(),
        }
    }

    fn request_location(
        &mut self,
        runtime: &tokio::runtime::Handle,
        provider: Arc<dyn LocationProvider>,
        timeout: Duration,
        sender: Sender<SensorEvent>,
    ) {
        self.location_status = LocationStatus::Pending;
        self.location_task = Some(spawn_fix_request(runtime, provider, timeout, sender));
    }

    /// Applies every event already queued without blocking. Returns how many
    /// events were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
            handled += 1;
        }
        handled
    }

    /// Waits up to `timeout` for the first event, then drains the rest.
    pub fn wait_and_pump(&mut self, timeout: Duration) -> usize {
        match self.events.recv_timeout(timeout) {
            Ok(event) => {
                self.apply(event);
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout) => 0,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("All senders gone for session '{}'", self.source_name);
                0
            }
        }
    }

    fn apply(&mut self, event: SensorEvent) {
        match event {
            SensorEvent::Gyro(reading) => self.ingest(&reading),
            SensorEvent::Location(fix) => {
                self.buffer.set_location(fix);
                self.location_status = LocationStatus::Fixed;
            }
            SensorEvent::LocationFailed(e) => {
                self.location_status = if e.is_permission_denied() {
                    LocationStatus::Denied
                } else {
                    LocationStatus::Failed
                };
                self.record_failure(e);
            }
            SensorEvent::Failed(e) => self.record_failure(e),
        }
    }

    fn ingest(&mut self, reading: &RawReading) {
        let timestamp = reading.timestamp.unwrap_or_else(now_millis);
        let was_empty = self.buffer.state() == BufferState::Empty;

        match self.buffer.ingest(reading, timestamp) {
            IngestOutcome::Dropped => self.stats.dropped += 1,
            IngestOutcome::Stored => self.stats.ingested += 1,
            IngestOutcome::Evicted(_) => {
                self.stats.ingested += 1;
                self.stats.evicted += 1;
            }
        }

        if was_empty && self.buffer.state() == BufferState::Populated {
            debug!("First sample stored for session '{}'", self.source_name);
        }
    }

    fn record_failure(&mut self, error: SourceError) {
        self.status_message = Some(if error.is_permission_denied() {
            format!(
                "{}. Permission to access the gyroscope and location sensors is required.",
                error
            )
        } else {
            error.to_string()
        });
        warn!("Session '{}': {}", self.source_name, error);
    }

    pub fn snapshot(&self) -> Snapshot {
        self.buffer.snapshot()
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn location_status(&self) -> LocationStatus {
        self.location_status
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    /// Releases the subscription and abandons a pending location request.
    /// Runs on drop as well; calling it twice is harmless.
    pub fn end(&mut self) {
        if let Some(task) = self.location_task.take() {
            task.abort();
        }
        if let Some(mut subscription) = self.subscription.take() {
            if let Err(e) = subscription.unsubscribe() {
                warn!("Ending session '{}': {}", self.source_name, e);
            }
            info!(
                "Chart session ended: {} stored, {} below noise floor",
                self.stats.ingested, self.stats.dropped
            );
        }
    }
}

impl Drop for ChartSession {
    fn drop(&mut self) {
        self.end();
    }
}

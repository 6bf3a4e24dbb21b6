pub mod location;
pub mod mqtt;
pub mod simulated;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{SendTimeoutError, Sender};
use log::{debug, error, info, warn};

use crate::config::{AppConfig, LocationKind, SourceConfig, SourceKind};
use crate::error::SourceError;
use crate::types::SensorEvent;

pub use location::{spawn_fix_request, ConfiguredLocation, LocationProvider, MqttLocation};
pub use mqtt::MqttSource;
pub use simulated::SimulatedSource;

/// How often worker threads wake up to look at their shutdown flag.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A stream of gyroscope readings.
///
/// `subscribe` is called once per chart session; the returned guard keeps the
/// stream alive until it is unsubscribed or dropped.
pub trait SampleSource {
    fn name(&self) -> &str;

    fn subscribe(&mut self, sender: Sender<SensorEvent>) -> Result<Subscription, SourceError>;
}

type CancelHook = Box<dyn FnOnce() + Send>;

/// Live registration against a source, backed by one worker thread.
pub struct Subscription {
    name: String,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    cancel: Option<CancelHook>,
}

impl Subscription {
    /// Runs `body` on a named worker thread. A body that fails has its error
    /// forwarded to the session as `SensorEvent::Failed`.
    pub fn spawn<F>(name: &str, sender: Sender<SensorEvent>, body: F) -> Result<Self, SourceError>
    where
        F: FnOnce(&AtomicBool, &Sender<SensorEvent>) -> Result<(), SourceError> + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_shutdown = Arc::clone(&shutdown);
        let worker_name = name.to_string();

        let handle = thread::Builder::new()
            .name(format!("source-{}", name))
            .spawn(move || {
                if let Err(e) = body(worker_shutdown.as_ref(), &sender) {
                    error!("Source '{}' failed: {}", worker_name, e);
                    if sender.try_send(SensorEvent::Failed(e)).is_err() {
                        debug!("Session no longer listening to '{}'", worker_name);
                    }
                }
            })
            .map_err(|e| SourceError::Worker(e.to_string()))?;

        info!("Subscribed to source '{}'", name);
        Ok(Self {
            name: name.to_string(),
            shutdown,
            handle: Some(handle),
            cancel: None,
        })
    }

    /// Extra teardown run before the worker is joined, e.g. closing a socket
    /// the worker is blocked on.
    pub fn with_cancel<F>(mut self, cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel = Some(Box::new(cancel));
        self
    }

    /// True while the worker thread is running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the worker and waits for it. Calling it again does nothing.
    pub fn unsubscribe(&mut self) -> Result<(), SourceError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }

        handle
            .join()
            .map_err(|_| SourceError::Worker(format!("source '{}' panicked", self.name)))?;
        info!("Unsubscribed from source '{}'", self.name);
        Ok(())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Err(e) = self.unsubscribe() {
            warn!("{}", e);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Pushes one event to the session, waiting while the channel is full.
///
/// Returns `false` when the worker should stop: the session hung up or a
/// shutdown was requested while waiting.
pub fn deliver(sender: &Sender<SensorEvent>, event: SensorEvent, shutdown: &AtomicBool) -> bool {
    let mut pending = event;
    loop {
        match sender.send_timeout(pending, POLL_INTERVAL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(back)) => {
                if shutdown.load(Ordering::Relaxed) {
                    return false;
                }
                pending = back;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

/// The gyroscope source named by `[source] kind`.
pub fn source_from_config(config: &SourceConfig) -> Box<dyn SampleSource> {
    match config.kind {
        SourceKind::Mqtt => Box::new(MqttSource::new(config.mqtt.clone())),
        SourceKind::Simulated => Box::new(SimulatedSource::new(config.simulated.clone())),
    }
}

/// The location provider named by `[location] kind`; the MQTT one reuses the
/// broker settings of `[source.mqtt]`.
pub fn location_from_config(config: &AppConfig) -> Arc<dyn LocationProvider> {
    match config.location.kind {
        LocationKind::Configured => Arc::new(ConfiguredLocation::from_config(&config.location)),
        LocationKind::Mqtt => Arc::new(MqttLocation::new(config.source.mqtt.clone(), &config.location)),
    }
}

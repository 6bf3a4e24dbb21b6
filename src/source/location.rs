use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use log::{debug, info, warn};
use rumqttc::{Client, Event, Packet};

use super::mqtt::mqtt_options;
use super::POLL_INTERVAL;
use crate::config::{LocationConfig, MqttConfig};
use crate::error::SourceError;
use crate::types::{LocationFix, LocationPayload, SensorEvent};
use crate::utils::now_millis;

/// One-shot provider of the current position.
///
/// `request_fix` may block; callers run it through [`spawn_fix_request`].
pub trait LocationProvider: Send + Sync {
    fn name(&self) -> &str;

    fn request_fix(&self) -> Result<LocationFix, SourceError>;
}

/// Position taken from configuration, or a denial when permission is withheld.
#[derive(Debug, Clone)]
pub struct ConfiguredLocation {
    permission_granted: bool,
    latitude: f64,
    longitude: f64,
}

impl ConfiguredLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            permission_granted: true,
            latitude,
            longitude,
        }
    }

    pub fn denied() -> Self {
        Self {
            permission_granted: false,
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    pub fn from_config(config: &LocationConfig) -> Self {
        Self {
            permission_granted: config.permission_granted,
            latitude: config.latitude,
            longitude: config.longitude,
        }
    }
}

impl LocationProvider for ConfiguredLocation {
    fn name(&self) -> &str {
        "configured"
    }

    fn request_fix(&self) -> Result<LocationFix, SourceError> {
        if !self.permission_granted {
            return Err(SourceError::PermissionDenied("location".to_string()));
        }
        Ok(LocationFix::new(self.latitude, self.longitude, now_millis()))
    }
}

/// Asks a device for its position over MQTT: one request, one reply.
pub struct MqttLocation {
    mqtt: MqttConfig,
    request_topic: String,
    response_topic: String,
    timeout: Duration,
}

impl MqttLocation {
    pub fn new(mqtt: MqttConfig, config: &LocationConfig) -> Self {
        Self {
            mqtt,
            request_topic: config.request_topic.clone(),
            response_topic: config.response_topic.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

impl LocationProvider for MqttLocation {
    fn name(&self) -> &str {
        "mqtt"
    }

    fn request_fix(&self) -> Result<LocationFix, SourceError> {
        let options = mqtt_options(&self.mqtt, "location")?;
        let (client, mut connection) = Client::new(options, 10);
        client.subscribe(self.response_topic.as_str(), self.mqtt.qos())?;
        client.publish(
            self.request_topic.as_str(),
            self.mqtt.qos(),
            false,
            r#"{"request":"current_position"}"#,
        )?;

        let deadline = Instant::now() + self.timeout;
        let result = loop {
            let now = Instant::now();
            if now >= deadline {
                break Err(SourceError::Timeout(self.timeout.as_millis() as u64));
            }

            match connection.recv_timeout((deadline - now).min(POLL_INTERVAL)) {
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) if publish.topic == self.response_topic => {
                    break serde_json::from_slice::<LocationPayload>(&publish.payload)
                        .map_err(|e| SourceError::Payload(format!("location JSON: {}", e)))
                        .and_then(|payload| payload.into_fix(now_millis()));
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => break Err(e.into()),
                Err(_) => {}
            }
        };

        if let Err(e) = client.disconnect() {
            debug!("MQTT disconnect: {}", e);
        }
        result
    }
}

/// Runs the provider once on the blocking pool and posts the outcome to the
/// session as a `Location` or `LocationFailed` event. There is no retry.
pub fn spawn_fix_request(
    runtime: &tokio::runtime::Handle,
    provider: Arc<dyn LocationProvider>,
    timeout: Duration,
    sender: Sender<SensorEvent>,
) -> tokio::task::JoinHandle<()> {
    runtime.spawn(async move {
        let name = provider.name().to_string();
        let request = tokio::task::spawn_blocking(move || provider.request_fix());

        let event = match tokio::time::timeout(timeout, request).await {
            Ok(Ok(Ok(fix))) => {
                info!(
                    "Location fix from '{}': {:.5}, {:.5}",
                    name, fix.latitude, fix.longitude
                );
                SensorEvent::Location(fix)
            }
            Ok(Ok(Err(e))) => {
                warn!("Location provider '{}' failed: {}", name, e);
                SensorEvent::LocationFailed(e)
            }
            Ok(Err(join_error)) => SensorEvent::LocationFailed(SourceError::Worker(join_error.to_string())),
            Err(_) => {
                warn!("Location provider '{}' timed out", name);
                SensorEvent::LocationFailed(SourceError::Timeout(timeout.as_millis() as u64))
            }
        };

        if sender.try_send(event).is_err() {
            debug!("Location result dropped, session not listening");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    struct SlowProvider;

    impl LocationProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        fn request_fix(&self) -> Result<LocationFix, SourceError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(LocationFix::new(1.0, 2.0, 0))
        }
    }

    #[test]
    fn test_configured_location() {
        let fix = ConfiguredLocation::new(51.5, -0.1).request_fix().unwrap();
        assert_eq!((fix.latitude, fix.longitude), (51.5, -0.1));

        let denied = ConfiguredLocation::denied().request_fix().unwrap_err();
        assert!(denied.is_permission_denied());
    }

    #[test]
    fn test_mqtt_request_fails_fast_without_broker() {
        let mut mqtt = MqttConfig::default();
        mqtt.broker = "127.0.0.1".to_string();
        mqtt.port = 1;
        mqtt.use_credentials = false;
        let mut config = LocationConfig::default();
        config.timeout_ms = 5_000;

        let started = Instant::now();
        let error = MqttLocation::new(mqtt, &config).request_fix().unwrap_err();

        assert!(matches!(error, SourceError::Connection(_)), "{:?}", error);
        assert!(!error.is_permission_denied());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_spawned_request_delivers_fix() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (tx, rx) = bounded(4);

        let provider: Arc<dyn LocationProvider> = Arc::new(ConfiguredLocation::new(10.0, 20.0));
        spawn_fix_request(runtime.handle(), provider, Duration::from_secs(1), tx);

        match rx.recv_timeout(Duration::from_secs(2)) {
            Ok(SensorEvent::Location(fix)) => assert_eq!(fix.latitude, 10.0),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_spawned_request_times_out() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (tx, rx) = bounded(4);

        spawn_fix_request(runtime.handle(), Arc::new(SlowProvider), Duration::from_millis(20), tx);

        match rx.recv_timeout(Duration::from_secs(2)) {
            Ok(SensorEvent::LocationFailed(SourceError::Timeout(ms))) => assert_eq!(ms, 20),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

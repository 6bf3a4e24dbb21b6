use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::Sender;
use dotenv::dotenv;
use log::{debug, info, warn};
use rumqttc::{Client, Connection, Event, LastWill, MqttOptions, Packet, QoS};

use super::{deliver, SampleSource, Subscription, POLL_INTERVAL};
use crate::config::MqttConfig;
use crate::error::SourceError;
use crate::types::{RawReading, SensorEvent};

/// Gyroscope readings published as JSON on an MQTT topic.
pub struct MqttSource {
    config: MqttConfig,
}

impl MqttSource {
    pub fn new(config: MqttConfig) -> Self {
        Self { config }
    }
}

impl SampleSource for MqttSource {
    fn name(&self) -> &str {
        "mqtt"
    }

    fn subscribe(&mut self, sender: Sender<SensorEvent>) -> Result<Subscription, SourceError> {
        let options = mqtt_options(&self.config, "gyro")?;
        let (client, connection) = Client::new(options, 10);
        client.subscribe(self.config.gyro_topic.as_str(), self.config.qos())?;

        let topic = self.config.gyro_topic.clone();
        info!(
            "Listening for gyroscope data on {}:{} topic '{}'",
            self.config.broker, self.config.port, topic
        );

        let cancel_client = client.clone();
        let subscription = Subscription::spawn("mqtt", sender, move |shutdown, sender| {
            run_gyro_loop(connection, &topic, sender, shutdown)
        })?
        .with_cancel(move || {
            if let Err(e) = cancel_client.disconnect() {
                debug!("MQTT disconnect: {}", e);
            }
        });

        Ok(subscription)
    }
}

/// Builds broker options shared by the gyroscope and location clients.
///
/// Credentials come from `MQTT_USER` / `MQTT_PASS` (a `.env` file is honoured)
/// when `use_credentials` is set.
pub fn mqtt_options(config: &MqttConfig, role: &str) -> Result<MqttOptions, SourceError> {
    let mut options = MqttOptions::new(
        format!("{}-{}", config.client_id, role),
        config.broker.clone(),
        config.port,
    );

    if config.use_credentials {
        dotenv().ok();
        let user = env::var("MQTT_USER").map_err(|source| SourceError::Env { name: "MQTT_USER", source })?;
        let pass = env::var("MQTT_PASS").map_err(|source| SourceError::Env { name: "MQTT_PASS", source })?;
        options.set_credentials(user, pass);
    }

    options
        .set_keep_alive(Duration::from_secs(config.keep_alive.max(5) as u64))
        .set_last_will(LastWill::new(
            format!("{}/viewer", config.gyro_topic),
            "offline",
            QoS::AtLeastOnce,
            false,
        ));

    Ok(options)
}

fn run_gyro_loop(
    mut connection: Connection,
    topic: &str,
    sender: &Sender<SensorEvent>,
    shutdown: &AtomicBool,
) -> Result<(), SourceError> {
    while !shutdown.load(Ordering::Relaxed) {
        match connection.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(Event::Incoming(Packet::Publish(publish)))) if publish.topic == topic => {
                match parse_reading(&publish.payload) {
                    Ok(reading) => {
                        if !deliver(sender, SensorEvent::Gyro(reading), shutdown) {
                            info!("Session closed, MQTT gyroscope loop exiting");
                            break;
                        }
                    }
                    Err(e) => warn!("Invalid gyroscope data: {}", e),
                }
            }
            Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                info!("Connected to MQTT broker ({:?})", ack.code);
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                return Err(e.into());
            }
            // nothing arrived within the poll interval
            Err(_) => {}
        }
    }

    Ok(())
}

pub fn parse_reading(payload: &[u8]) -> Result<RawReading, SourceError> {
    let payload_str =
        std::str::from_utf8(payload).map_err(|e| SourceError::Payload(format!("Invalid UTF-8: {}", e)))?;

    serde_json::from_str::<RawReading>(payload_str)
        .map_err(|e| SourceError::Payload(format!("JSON parsing error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reading() {
        let reading = parse_reading(br#"{"x":0.12,"y":-1.5,"z":3.0,"timestamp":99}"#).unwrap();
        assert_eq!(reading, RawReading::at(0.12, -1.5, 3.0, 99));
    }

    #[test]
    fn test_parse_rejects_bad_payloads() {
        assert!(matches!(parse_reading(&[0xff, 0xfe]), Err(SourceError::Payload(_))));
        assert!(matches!(parse_reading(b"{\"x\":1}"), Err(SourceError::Payload(_))));
    }

    #[test]
    fn test_options_without_credentials() {
        let config = MqttConfig::default();
        let options = mqtt_options(&config, "gyro").unwrap();
        assert_eq!(options.client_id(), "gyrochart_client-gyro");
        assert_eq!(options.broker_address(), ("localhost".to_string(), 1883));
        assert!(options.credentials().is_none());
    }
}

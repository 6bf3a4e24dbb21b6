use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use gyrochart::source::{deliver, ConfiguredLocation, LocationProvider, SampleSource, Subscription};
use gyrochart::{AppConfig, ChartSession, LocationFix, LocationStatus, RawReading, SensorEvent, SourceError};

/// Replays a fixed list of readings, then idles until unsubscribed.
struct ScriptedSource {
    readings: Vec<RawReading>,
    subscribe_calls: Arc<AtomicUsize>,
    stopped: Arc<AtomicBool>,
}

impl ScriptedSource {
    fn new(readings: Vec<RawReading>) -> Self {
        Self {
            readings,
            subscribe_calls: Arc::new(AtomicUsize::new(0)),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SampleSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn subscribe(&mut self, sender: Sender<SensorEvent>) -> Result<Subscription, SourceError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let readings = self.readings.clone();
        let stopped = Arc::clone(&self.stopped);

        Subscription::spawn("scripted", sender, move |shutdown, sender| {
            for reading in readings {
                if !deliver(sender, SensorEvent::Gyro(reading), shutdown) {
                    break;
                }
            }
            while !shutdown.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(5));
            }
            stopped.store(true, Ordering::SeqCst);
            Ok(())
        })
    }
}

struct FailingLocation;

impl LocationProvider for FailingLocation {
    fn name(&self) -> &str {
        "failing"
    }

    fn request_fix(&self) -> Result<LocationFix, SourceError> {
        Err(SourceError::Unavailable("no satellites".to_string()))
    }
}

fn config(capacity: usize) -> AppConfig {
    let mut config = AppConfig::default();
    config.buffer.capacity = capacity;
    config.location.timeout_ms = 1_000;
    config
}

/// Pumps until `done` holds or two seconds pass.
fn pump_until(session: &mut ChartSession, done: impl Fn(&ChartSession) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !done(session) && Instant::now() < deadline {
        session.wait_and_pump(Duration::from_millis(20));
    }
}

#[test]
fn test_session_collects_samples_and_fix() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut source = ScriptedSource::new(vec![
        RawReading::at(0.0005, 0.0002, 0.0, 1_000),
        RawReading::at(1.234, 0.0, 0.0, 1_100),
        RawReading::at(-0.5, 0.3, 0.0, 1_200),
    ]);
    let location: Arc<dyn LocationProvider> = Arc::new(ConfiguredLocation::new(51.5, -0.1));

    let mut session = ChartSession::start(&mut source, location, &config(10), runtime.handle()).unwrap();
    pump_until(&mut session, |s| {
        s.buffer().len() == 2 && s.location_status() == LocationStatus::Fixed
    });

    let snapshot = session.snapshot();
    assert_eq!(snapshot.gyro_series, vec![1.234, -0.5]);
    assert_eq!(snapshot.location_series, vec![51.5, 51.5]);
    assert_eq!(snapshot.labels, vec!["00:00:01.100".to_string(), "00:00:01.200".to_string()]);
    assert_eq!(session.stats().dropped, 1);
    assert_eq!(snapshot, session.snapshot());
}

#[test]
fn test_denied_location_keeps_zero_overlay() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut source = ScriptedSource::new(vec![RawReading::at(2.0, 0.0, 0.0, 10)]);
    let location: Arc<dyn LocationProvider> = Arc::new(ConfiguredLocation::denied());

    let mut session = ChartSession::start(&mut source, location, &config(10), runtime.handle()).unwrap();
    pump_until(&mut session, |s| {
        s.buffer().len() == 1 && s.location_status() == LocationStatus::Denied
    });

    assert_eq!(session.location_status(), LocationStatus::Denied);
    assert_eq!(session.snapshot().location_series, vec![0.0]);
    assert!(session.status_message().unwrap().contains("Permission"));
    assert!(session.is_subscribed());
}

#[test]
fn test_failed_location_is_reported() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut source = ScriptedSource::new(vec![]);

    let mut session =
        ChartSession::start(&mut source, Arc::new(FailingLocation), &config(4), runtime.handle()).unwrap();
    pump_until(&mut session, |s| s.location_status() != LocationStatus::Pending);

    assert_eq!(session.location_status(), LocationStatus::Failed);
    assert_eq!(session.status_message(), Some("Source unavailable: no satellites"));
    assert!(session.buffer().latest_fix().is_none());
}

#[test]
fn test_bounded_history_keeps_newest() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let readings = (1..=4)
        .map(|i| RawReading::at(i as f64, 0.0, 0.0, i * 100))
        .collect();
    let mut source = ScriptedSource::new(readings);
    let location: Arc<dyn LocationProvider> = Arc::new(ConfiguredLocation::new(0.0, 0.0));

    let mut session = ChartSession::start(&mut source, location, &config(3), runtime.handle()).unwrap();
    pump_until(&mut session, |s| s.stats().ingested == 4);

    let stamps: Vec<i64> = session.buffer().history().map(|s| s.timestamp_millis).collect();
    assert_eq!(stamps, vec![200, 300, 400]);
    assert_eq!(session.snapshot().gyro_series, vec![2.0, 3.0, 4.0]);
    assert_eq!(session.stats().evicted, 1);
}

#[test]
fn test_single_subscription_released_on_end() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut source = ScriptedSource::new(vec![RawReading::at(1.0, 0.0, 0.0, 1)]);
    let calls = Arc::clone(&source.subscribe_calls);
    let stopped = Arc::clone(&source.stopped);
    let location: Arc<dyn LocationProvider> = Arc::new(ConfiguredLocation::new(1.0, 1.0));

    let mut session = ChartSession::start(&mut source, location, &config(5), runtime.handle()).unwrap();
    for _ in 0..5 {
        session.wait_and_pump(Duration::from_millis(20));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!stopped.load(Ordering::SeqCst));

    session.end();
    assert!(stopped.load(Ordering::SeqCst));
    assert!(!session.is_subscribed());
    session.end();
}

#[test]
fn test_drop_releases_subscription() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut source = ScriptedSource::new(vec![]);
    let stopped = Arc::clone(&source.stopped);
    let location: Arc<dyn LocationProvider> = Arc::new(ConfiguredLocation::new(1.0, 1.0));

    let session = ChartSession::start(&mut source, location, &config(5), runtime.handle()).unwrap();
    drop(session);

    assert!(stopped.load(Ordering::SeqCst));
}

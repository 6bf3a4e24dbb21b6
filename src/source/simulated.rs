use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{deliver, SampleSource, Subscription, POLL_INTERVAL};
use crate::config::SimulatedConfig;
use crate::error::SourceError;
use crate::types::{RawReading, SensorEvent};
use crate::utils::now_millis;

/// Synthetic gyroscope for running without hardware or a broker.
///
/// Produces a slow sine on x with phase-shifted y and z, random jitter on
/// every axis, and every so often a near-zero reading that the noise floor
/// should swallow.
pub struct SimulatedSource {
    config: SimulatedConfig,
}

impl SimulatedSource {
    pub fn new(config: SimulatedConfig) -> Self {
        Self { config }
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    pub fn reading_at<R: Rng>(&self, elapsed_secs: f64, rng: &mut R) -> RawReading {
        if self.config.quiet_ratio > 0.0 && rng.random_bool(self.config.quiet_ratio.min(1.0)) {
            return RawReading::new(
                rng.random_range(-0.0004..0.0004),
                rng.random_range(-0.0004..0.0004),
                0.0,
            );
        }

        let phase = TAU * self.config.frequency_hz * elapsed_secs;
        let amplitude = self.config.amplitude;
        let mut jitter = || {
            if self.config.jitter > 0.0 {
                rng.random_range(-self.config.jitter..self.config.jitter)
            } else {
                0.0
            }
        };

        RawReading::new(
            amplitude * phase.sin() + jitter(),
            amplitude * 0.5 * (phase + TAU / 3.0).sin() + jitter(),
            amplitude * 0.25 * (phase + 2.0 * TAU / 3.0).sin() + jitter(),
        )
    }

    fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.config.rate_hz.max(0.001))
    }
}

impl SampleSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    fn subscribe(&mut self, sender: Sender<SensorEvent>) -> Result<Subscription, SourceError> {
        let generator = SimulatedSource::new(self.config.clone());
        let period = self.period();
        info!("Simulating gyroscope at {:.1} Hz", self.config.rate_hz);

        Subscription::spawn("simulated", sender, move |shutdown, sender| {
            run_generator(&generator, period, sender, shutdown);
            Ok(())
        })
    }
}

fn run_generator(generator: &SimulatedSource, period: Duration, sender: &Sender<SensorEvent>, shutdown: &AtomicBool) {
    let mut rng = generator.rng();
    let started = Instant::now();

    while !shutdown.load(Ordering::Relaxed) {
        let elapsed = started.elapsed().as_secs_f64();
        let mut reading = generator.reading_at(elapsed, &mut rng);
        reading.timestamp = Some(now_millis());

        if !deliver(sender, SensorEvent::Gyro(reading), shutdown) {
            break;
        }

        // long periods are slept in slices so shutdown stays responsive
        let mut remaining = period;
        while !remaining.is_zero() && !shutdown.load(Ordering::Relaxed) {
            let step = remaining.min(POLL_INTERVAL);
            thread::sleep(step);
            remaining -= step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::NoiseFilter;
    use crossbeam_channel::bounded;

    fn quiet_free() -> SimulatedConfig {
        SimulatedConfig {
            quiet_ratio: 0.0,
            jitter: 0.0,
            seed: Some(7),
            ..SimulatedConfig::default()
        }
    }

    #[test]
    fn test_reading_follows_sine() {
        let source = SimulatedSource::new(quiet_free());
        let mut rng = StdRng::seed_from_u64(1);

        let start = source.reading_at(0.0, &mut rng);
        assert!(start.x.abs() < 1e-9);

        // quarter period of a 0.25 Hz sine
        let peak = source.reading_at(1.0, &mut rng);
        assert!((peak.x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_quiet_readings_fall_below_floor() {
        let config = SimulatedConfig {
            quiet_ratio: 1.0,
            ..SimulatedConfig::default()
        };
        let source = SimulatedSource::new(config);
        let mut rng = StdRng::seed_from_u64(3);
        let filter = NoiseFilter::default();

        for i in 0..20 {
            let reading = source.reading_at(i as f64 * 0.1, &mut rng);
            assert!(filter.apply(&reading).is_none());
        }
    }

    #[test]
    fn test_subscription_streams_timestamped_readings() {
        let mut source = SimulatedSource::new(SimulatedConfig {
            rate_hz: 200.0,
            ..quiet_free()
        });
        let (tx, rx) = bounded(64);
        let mut subscription = source.subscribe(tx).unwrap();

        for _ in 0..3 {
            match rx.recv_timeout(Duration::from_secs(2)) {
                Ok(SensorEvent::Gyro(reading)) => assert!(reading.timestamp.is_some()),
                other => panic!("unexpected event: {:?}", other),
            }
        }

        subscription.unsubscribe().unwrap();
    }
}

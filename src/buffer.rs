use std::collections::VecDeque;

use log::{debug, warn};

use crate::config::BufferConfig;
use crate::types::{LocationFix, RawReading, Sample, Snapshot};
use crate::utils::format_timestamp;

/// Rounding and noise-floor policy applied to every reading before it is stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseFilter {
    pub precision_digits: u32,
    pub damping: f64,
    pub floor: f64,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self {
            precision_digits: 3,
            damping: 0.01,
            floor: 0.001,
        }
    }
}

impl NoiseFilter {
    pub fn from_config(config: &BufferConfig) -> Self {
        Self {
            precision_digits: config.precision_digits,
            damping: config.damping,
            floor: config.noise_floor,
        }
    }

    /// NaN and infinities carry no signal; they are read as zero.
    pub fn normalize(value: f64) -> f64 {
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }

    pub fn round(&self, value: f64) -> f64 {
        let scale = 10f64.powi(self.precision_digits as i32);
        let rounded = (value * scale).round() / scale;
        // huge inputs overflow the scaling step
        if rounded.is_finite() {
            rounded
        } else {
            value
        }
    }

    /// True when every axis, once damped, sits below the floor.
    pub fn is_noise(&self, axes: &[f64; 3]) -> bool {
        axes.iter().all(|v| (v * self.damping).abs() < self.floor)
    }

    /// Normalizes and rounds all three axes, or returns `None` if the reading is noise.
    pub fn apply(&self, raw: &RawReading) -> Option<[f64; 3]> {
        let axes = raw.axes().map(|v| self.round(Self::normalize(v)));
        if self.is_noise(&axes) {
            None
        } else {
            Some(axes)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Empty,
    Populated,
}

/// What a single `ingest` call did to the history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IngestOutcome {
    Stored,
    /// Stored, and the oldest sample was pushed out to make room.
    Evicted(Sample),
    /// Below the noise floor; history untouched.
    Dropped,
}

/// Bounded, time-ordered sample history plus the current location fix.
#[derive(Debug)]
pub struct SampleBuffer {
    history: VecDeque<Sample>,
    capacity: usize,
    filter: NoiseFilter,
    latest_fix: Option<LocationFix>,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self::with_filter(capacity, NoiseFilter::default())
    }

    pub fn with_filter(capacity: usize, filter: NoiseFilter) -> Self {
        let capacity = if capacity == 0 {
            warn!("Sample buffer capacity 0 requested, using 1");
            1
        } else {
            capacity
        };

        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            filter,
            latest_fix: None,
        }
    }

    pub fn from_config(config: &BufferConfig) -> Self {
        Self::with_filter(config.capacity, NoiseFilter::from_config(config))
    }

    pub fn ingest(&mut self, raw: &RawReading, now_millis: i64) -> IngestOutcome {
        let Some([x, y, z]) = self.filter.apply(raw) else {
            return IngestOutcome::Dropped;
        };

        let timestamp = match self.history.back() {
            Some(last) if now_millis < last.timestamp_millis => {
                debug!(
                    "Timestamp {} older than newest sample {}, clamping",
                    now_millis, last.timestamp_millis
                );
                last.timestamp_millis
            }
            _ => now_millis,
        };

        self.history.push_back(Sample::new(timestamp, x, y, z));

        if self.history.len() > self.capacity {
            if let Some(evicted) = self.history.pop_front() {
                return IngestOutcome::Evicted(evicted);
            }
        }
        IngestOutcome::Stored
    }

    /// Replaces the current fix; earlier fixes are not kept.
    pub fn set_location(&mut self, fix: LocationFix) {
        self.latest_fix = Some(fix);
    }

    pub fn snapshot(&self) -> Snapshot {
        let overlay = self.latest_fix.map_or(0.0, |fix| fix.latitude);

        Snapshot {
            labels: self
                .history
                .iter()
                .map(|s| format_timestamp(s.timestamp_millis))
                .collect(),
            gyro_series: self.history.iter().map(|s| s.x).collect(),
            location_series: vec![overlay; self.history.len()],
        }
    }

    pub fn state(&self) -> BufferState {
        if self.history.is_empty() {
            BufferState::Empty
        } else {
            BufferState::Populated
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &Sample> {
        self.history.iter()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.history.back()
    }

    pub fn latest_fix(&self) -> Option<&LocationFix> {
        self.latest_fix.as_ref()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

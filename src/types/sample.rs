use serde::{Deserialize, Serialize};

/// One gyroscope reading as delivered by a source, before rounding or filtering.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
pub struct RawReading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Source-side capture time in milliseconds, when the source provides one.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl RawReading {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z, timestamp: None }
    }

    pub fn at(x: f64, y: f64, z: f64, timestamp: i64) -> Self {
        Self { x, y, z, timestamp: Some(timestamp) }
    }

    pub fn axes(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// A stored reading: rounded, filtered and stamped.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub timestamp_millis: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Sample {
    pub fn new(timestamp_millis: i64, x: f64, y: f64, z: f64) -> Self {
        Self { timestamp_millis, x, y, z }
    }
}

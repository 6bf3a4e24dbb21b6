use crate::error::SourceError;
use super::{LocationFix, RawReading};

/// Everything a source can push towards the chart session.
#[derive(Debug)]
pub enum SensorEvent {
    Gyro(RawReading),
    Location(LocationFix),
    /// The one-shot location request ended without a fix.
    LocationFailed(SourceError),
    /// The sample source gave up; the session keeps running.
    Failed(SourceError),
}

pub mod events;
pub mod location;
pub mod sample;
pub mod snapshot;

pub use events::SensorEvent;
pub use location::{LocationFix, LocationPayload};
pub use sample::{RawReading, Sample};
pub use snapshot::Snapshot;

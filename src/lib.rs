//! Live gyroscope chart: a bounded, noise-filtered sample buffer fed by a
//! sensor stream and a one-shot location fix, rendered with egui_plot.

pub mod app;
pub mod buffer;
pub mod chart;
pub mod config;
pub mod error;
pub mod logger;
pub mod session;
pub mod source;
pub mod types;
pub mod utils;

pub use buffer::{BufferState, IngestOutcome, NoiseFilter, SampleBuffer};
pub use config::{AppConfig, ConfigError, ConfigManager};
pub use error::SourceError;
pub use session::{ChartSession, LocationStatus, SessionStats};
pub use types::{LocationFix, RawReading, Sample, SensorEvent, Snapshot};

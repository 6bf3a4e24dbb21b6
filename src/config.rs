use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration.
/// Every setting lives here with its default and validation

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub buffer: BufferConfig,
    pub source: SourceConfig,
    pub location: LocationConfig,
    pub plot: PlotConfig,
    pub channels: ChannelConfig,
}

/// Window settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub width: f32,
    pub height: f32,
    pub title: String,
    pub resizable: bool,
    pub vsync: bool,
    pub refresh_interval_ms: u64,
}

/// Sample history size and noise-floor policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
    pub precision_digits: u32,
    pub damping: f64,
    pub noise_floor: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Mqtt,
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub mqtt: MqttConfig,
    pub simulated: SimulatedConfig,
}

/// MQTT broker settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub client_id: String,
    pub gyro_topic: String,
    pub qos: u8,
    pub keep_alive: u16,
    /// Read `MQTT_USER` / `MQTT_PASS` from the environment (and `.env`).
    pub use_credentials: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulatedConfig {
    pub rate_hz: f64,
    pub amplitude: f64,
    pub frequency_hz: f64,
    pub jitter: f64,
    /// Fraction of readings emitted below the noise floor.
    pub quiet_ratio: f64,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Configured,
    Mqtt,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocationConfig {
    pub kind: LocationKind,
    pub permission_granted: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub request_topic: String,
    pub response_topic: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartMode {
    Line,
    Scatter,
}

/// Plot settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlotConfig {
    pub mode: ChartMode,
    pub plot_height: f32,
    pub show_axes: bool,
    pub allow_drag: bool,
    pub allow_zoom: bool,
    pub show_legend: bool,
    pub point_radius: f32,
    pub gyro: SeriesStyle,
    pub location: SeriesStyle,
}

/// Styling for one plotted series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesStyle {
    pub label: String,
    pub line_width: f32,
    pub color: [u8; 3],
    #[serde(default)]
    pub show_points: bool,
}

/// Channel settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChannelConfig {
    pub event_channel_capacity: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1000.0,
            height: 600.0,
            title: "Gyrochart - Live Gyroscope".to_string(),
            resizable: true,
            vsync: true,
            refresh_interval_ms: 150,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: 300,
            precision_digits: 3,
            damping: 0.01,
            noise_floor: 0.001,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Simulated,
            mqtt: MqttConfig::default(),
            simulated: SimulatedConfig::default(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: "localhost".to_string(),
            port: 1883,
            client_id: "gyrochart_client".to_string(),
            gyro_topic: "sensor/gyroscope".to_string(),
            qos: 1,
            keep_alive: 5,
            use_credentials: false,
        }
    }
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            rate_hz: 20.0,
            amplitude: 2.0,
            frequency_hz: 0.25,
            jitter: 0.05,
            quiet_ratio: 0.1,
            seed: None,
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            kind: LocationKind::Configured,
            permission_granted: true,
            latitude: 51.5,
            longitude: -0.1,
            request_topic: "sensor/location/request".to_string(),
            response_topic: "sensor/location".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            mode: ChartMode::Line,
            plot_height: 400.0,
            show_axes: true,
            allow_drag: false,
            allow_zoom: false,
            show_legend: true,
            point_radius: 2.5,
            gyro: SeriesStyle {
                label: "Gyroscopic change in values".to_string(),
                line_width: 2.0,
                color: [255, 0, 0], // #FF0000
                show_points: true,
            },
            location: SeriesStyle {
                label: "Current location".to_string(),
                line_width: 2.0,
                color: [0, 0, 255], // #0000FF
                show_points: false,
            },
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: 5000,
        }
    }
}

impl MqttConfig {
    pub fn qos(&self) -> rumqttc::QoS {
        match self.qos {
            0 => rumqttc::QoS::AtMostOnce,
            2 => rumqttc::QoS::ExactlyOnce,
            _ => rumqttc::QoS::AtLeastOnce,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;
        std::fs::write(path, content).map_err(ConfigError::IoError)?;
        Ok(())
    }

    /// Checks that the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width <= 0.0 || self.window.height <= 0.0 {
            return Err(ConfigError::ValidationError("Window dimensions must be positive".to_string()));
        }

        if self.buffer.capacity == 0 {
            return Err(ConfigError::ValidationError("Buffer capacity must be positive".to_string()));
        }

        if !(self.buffer.damping.is_finite() && self.buffer.noise_floor.is_finite())
            || self.buffer.noise_floor < 0.0
        {
            return Err(ConfigError::ValidationError(
                "Damping and noise floor must be finite, noise floor non-negative".to_string(),
            ));
        }

        if self.buffer.precision_digits > 12 {
            return Err(ConfigError::ValidationError("Precision must be at most 12 digits".to_string()));
        }

        if self.source.kind == SourceKind::Simulated && self.source.simulated.rate_hz <= 0.0 {
            return Err(ConfigError::ValidationError("Simulated rate must be positive".to_string()));
        }

        if !(0.0..=1.0).contains(&self.source.simulated.quiet_ratio) {
            return Err(ConfigError::ValidationError("Quiet ratio must be within 0..=1".to_string()));
        }

        if !(self.location.latitude.is_finite() && self.location.longitude.is_finite()) {
            return Err(ConfigError::ValidationError("Location coordinates must be finite".to_string()));
        }

        if self.location.timeout_ms == 0 {
            return Err(ConfigError::ValidationError("Location timeout must be positive".to_string()));
        }

        if self.channels.event_channel_capacity == 0 {
            return Err(ConfigError::ValidationError("Event channel capacity must be positive".to_string()));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(toml::de::Error),
    #[error("Serialize error: {0}")]
    SerializeError(toml::ser::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Holds the loaded configuration
pub struct ConfigManager {
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Creates a manager with default configuration
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            config_path: None,
        }
    }

    /// Loads and validates configuration from a file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let config = AppConfig::load_from_file(&path)?;
        Ok(Self {
            config,
            config_path: Some(path.as_ref().to_path_buf()),
        })
    }

    /// Loads `path` when it exists, otherwise falls back to defaults.
    pub fn load_or_default<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Current configuration
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&std::path::Path> {
        self.config_path.as_deref()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [buffer]
            capacity = 3

            [source]
            kind = "mqtt"

            [plot]
            mode = "scatter"
            "#,
        )
        .unwrap();

        assert_eq!(config.buffer.capacity, 3);
        assert_eq!(config.buffer.damping, 0.01);
        assert_eq!(config.source.kind, SourceKind::Mqtt);
        assert_eq!(config.source.mqtt.port, 1883);
        assert_eq!(config.plot.mode, ChartMode::Scatter);
        assert_eq!(config.plot.gyro.color, [255, 0, 0]);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = AppConfig::from_toml_str("[buffer]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_non_finite_location_rejected() {
        let err = AppConfig::from_toml_str("[location]\nlatitude = nan\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let mut config = AppConfig::default();
        config.location.longitude = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_source_kind_rejected() {
        let err = AppConfig::from_toml_str("[source]\nkind = \"bluetooth\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!("gyrochart_cfg_{}.toml", std::process::id()));
        let mut config = AppConfig::default();
        config.buffer.capacity = 42;
        config.location.permission_granted = false;
        config.save_to_file(&path).unwrap();

        let manager = ConfigManager::load_or_default(&path).unwrap();
        assert_eq!(manager.get_config(), &config);
        assert_eq!(manager.config_path(), Some(path.as_path()));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let manager = ConfigManager::load_or_default("/nonexistent/gyrochart.toml").unwrap();
        assert_eq!(manager.get_config(), &AppConfig::default());
        assert!(manager.config_path().is_none());
    }

    #[test]
    fn test_qos_mapping() {
        let mut mqtt = MqttConfig::default();
        assert_eq!(mqtt.qos(), rumqttc::QoS::AtLeastOnce);
        mqtt.qos = 0;
        assert_eq!(mqtt.qos(), rumqttc::QoS::AtMostOnce);
    }
}

use serde::Serialize;

/// Point-in-time view of the buffer, shaped for a chart widget.
///
/// All three sequences have the same length, one entry per stored sample.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub labels: Vec<String>,
    pub gyro_series: Vec<f64>,
    pub location_series: Vec<f64>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.gyro_series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gyro_series.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

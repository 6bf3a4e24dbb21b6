use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// A single geographic position. Only the most recent one is ever kept.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at_millis: i64,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, captured_at_millis: i64) -> Self {
        Self { latitude, longitude, captured_at_millis }
    }
}

/// Reply shape of a location provider: either coordinates or an error code.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum LocationPayload {
    Fix {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    Failure {
        error: String,
    },
}

impl LocationPayload {
    /// Converts a provider reply into a fix, stamping it with `now_millis` when the
    /// reply carries no timestamp of its own.
    pub fn into_fix(self, now_millis: i64) -> Result<LocationFix, SourceError> {
        match self {
            LocationPayload::Fix { latitude, longitude, timestamp } => {
                if !latitude.is_finite() || !longitude.is_finite() {
                    return Err(SourceError::Payload(format!(
                        "non-finite coordinates ({}, {})",
                        latitude, longitude
                    )));
                }
                Ok(LocationFix::new(latitude, longitude, timestamp.unwrap_or(now_millis)))
            }
            LocationPayload::Failure { error } if error == "permission_denied" => {
                Err(SourceError::PermissionDenied("location".to_string()))
            }
            LocationPayload::Failure { error } => Err(SourceError::Unavailable(error)),
        }
    }
}

/// Failures reported by sample sources and location providers.
///
/// None of these stop the chart: the session turns them into a status message
/// and keeps rendering whatever data it has.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Permission to access {0} was denied")]
    PermissionDenied(String),
    #[error("Source unavailable: {0}")]
    Unavailable(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Invalid payload: {0}")]
    Payload(String),
    #[error("Request timed out after {0} ms")]
    Timeout(u64),
    #[error("Missing environment variable {name}: {source}")]
    Env {
        name: &'static str,
        source: std::env::VarError,
    },
    #[error("Worker thread error: {0}")]
    Worker(String),
}

impl SourceError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, SourceError::PermissionDenied(_))
    }
}

impl From<rumqttc::ClientError> for SourceError {
    fn from(e: rumqttc::ClientError) -> Self {
        SourceError::Connection(e.to_string())
    }
}

impl From<rumqttc::ConnectionError> for SourceError {
    fn from(e: rumqttc::ConnectionError) -> Self {
        match e {
            rumqttc::ConnectionError::ConnectionRefused(code) => match code {
                rumqttc::ConnectReturnCode::NotAuthorized
                | rumqttc::ConnectReturnCode::BadUserNamePassword => {
                    SourceError::PermissionDenied(format!("MQTT broker ({:?})", code))
                }
                other => SourceError::Connection(format!("refused: {:?}", other)),
            },
            other => SourceError::Connection(other.to_string()),
        }
    }
}

use thiserror::Error;

/// Failure of a single gateway call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No HTTP response at all (connect, DNS, timeout).
    #[error("Network Error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("invalid gateway url: {0}")]
    InvalidUrl(String),
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, GatewayError::Network(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            GatewayError::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

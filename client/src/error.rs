use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("driver is bound to another device")]
    DeviceMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionFailure {
    #[error("session not found")]
    NotFound,
    #[error("session expired")]
    Expired,
    #[error("session belongs to another driver")]
    DriverMismatch,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("validation failed: {0:?}")]
    Validation(Vec<String>),
    #[error(transparent)]
    Auth(AuthFailure),
    #[error(transparent)]
    Session(SessionFailure),
}

impl ClientError {
    /// Transport failures are eligible for automatic retry; everything else is reported as is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::Timeout)
    }

    /// The driver app should send the user back to login.
    pub fn requires_login(&self) -> bool {
        matches!(self, ClientError::Session(_))
    }

    /// Maps an error body `{error, code, details?}` back onto the taxonomy.
    pub fn from_api(status: u16, code: &str, message: String, details: Vec<String>) -> Self {
        match code {
            "INVALID_CREDENTIALS" => ClientError::Auth(AuthFailure::InvalidCredentials),
            "DEVICE_MISMATCH" => ClientError::Auth(AuthFailure::DeviceMismatch),
            "SESSION_NOT_FOUND" => ClientError::Session(SessionFailure::NotFound),
            "SESSION_EXPIRED" => ClientError::Session(SessionFailure::Expired),
            "SESSION_DRIVER_MISMATCH" => ClientError::Session(SessionFailure::DriverMismatch),
            "VALIDATION_ERROR" if details.is_empty() => ClientError::Validation(vec![message]),
            "VALIDATION_ERROR" => ClientError::Validation(details),
            _ => ClientError::Server { status, message },
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_decode() {
            ClientError::Protocol(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::Protocol(e) => ClientError::Protocol(e.to_string()),
            other => ClientError::Network(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_codes_map_to_taxonomy() {
        assert!(matches!(
            ClientError::from_api(409, "DEVICE_MISMATCH", String::new(), vec![]),
            ClientError::Auth(AuthFailure::DeviceMismatch)
        ));
        assert!(ClientError::from_api(401, "SESSION_EXPIRED", String::new(), vec![]).requires_login());
        match ClientError::from_api(400, "VALIDATION_ERROR", "Validation failed".into(), vec![]) {
            ClientError::Validation(errors) => assert_eq!(errors, vec!["Validation failed"]),
            other => panic!("unexpected {other:?}"),
        }
        let server = ClientError::from_api(500, "INTERNAL_SERVER_ERROR", "boom".into(), vec![]);
        assert!(matches!(server, ClientError::Server { status: 500, .. }));
        assert!(!server.is_retryable());
        assert!(ClientError::Timeout.is_retryable());
    }
}

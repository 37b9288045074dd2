use thiserror::Error;

use crate::types::ClientId;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    #[error("Invalid area: {0}")]
    InvalidArea(String),

    #[error("Too many subscriptions (max {0})")]
    TooManySubscriptions(usize),

    #[error("Unsupported frame type")]
    UnsupportedFrame,

    #[error("Client not found: {0}")]
    ClientNotFound(ClientId),

    #[error("Channel send error")]
    ChannelSend,
}

impl GatewayError {
    /// Code carried in the `data.code` field of an `error` envelope.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Json(_) | GatewayError::UnsupportedFrame => "INVALID_MESSAGE",
            GatewayError::InvalidBounds(_) | GatewayError::InvalidArea(_) => "INVALID_SUBSCRIPTION",
            GatewayError::TooManySubscriptions(_) => "SUBSCRIPTION_LIMIT",
            GatewayError::ClientNotFound(_) | GatewayError::ChannelSend => "PROCESSING_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

use std::time::Duration;

/// Settings for [`crate::ObserverClient`].
#[derive(Debug, Clone)]
pub struct ObserverConfig {
    /// WebSocket endpoint, e.g. `ws://localhost:3000/ws`.
    pub url: String,
    /// Time allowed for the handshake before the attempt counts as failed.
    pub connect_timeout: Duration,
    /// Interval between application-level `ping` messages while connected.
    pub heartbeat_interval: Duration,
    /// First reconnect delay; doubled per attempt.
    pub reconnect_base: Duration,
    /// Upper bound for the reconnect delay.
    pub reconnect_max: Duration,
    /// Reconnect attempts before settling in `Disconnected`.
    pub max_reconnect_attempts: u32,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3000/ws".to_string(),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(25),
            reconnect_base: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
            max_reconnect_attempts: 5,
        }
    }
}

impl ObserverConfig {
    /// `min(base * 2^attempt, max)`, with `attempt` counted from zero.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.reconnect_base
            .checked_mul(factor)
            .unwrap_or(self.reconnect_max)
            .min(self.reconnect_max)
    }
}

#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// API root including the `/api` prefix.
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

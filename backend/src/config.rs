use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::{env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub session_ttl_hours: u64,
    pub session_sliding_expiry: bool,
    pub session_cleanup_interval_secs: u64,
    pub session_retention_minutes: u64,
    pub online_threshold_secs: u64,
    pub location_history_limit: usize,
    pub ws_client_buffer: usize,
    pub ws_ping_interval_secs: u64,
    pub admin_api_token: String,
    pub drivers_file: Option<PathBuf>,
    pub cors_allow_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            session_ttl_hours: 24,
            session_sliding_expiry: false,
            session_cleanup_interval_secs: 300,
            session_retention_minutes: 60,
            online_threshold_secs: 300,
            location_history_limit: 50,
            ws_client_buffer: 1000,
            ws_ping_interval_secs: 30,
            admin_api_token: String::new(),
            drivers_file: None,
            cors_allow_origins: vec!["*".to_string()],
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let bind_addr = parse_var("BIND_ADDR", defaults.bind_addr)?;
        let session_ttl_hours = parse_var("SESSION_TTL_HOURS", defaults.session_ttl_hours)?;
        if session_ttl_hours == 0 {
            return Err(anyhow!("SESSION_TTL_HOURS must be greater than zero"));
        }
        let session_sliding_expiry =
            parse_bool_var("SESSION_SLIDING_EXPIRY", defaults.session_sliding_expiry)?;
        let session_cleanup_interval_secs = parse_var(
            "SESSION_CLEANUP_INTERVAL_SECS",
            defaults.session_cleanup_interval_secs,
        )?;
        let session_retention_minutes =
            parse_var("SESSION_RETENTION_MINUTES", defaults.session_retention_minutes)?;
        let online_threshold_secs =
            parse_var("ONLINE_THRESHOLD_SECS", defaults.online_threshold_secs)?;
        let location_history_limit =
            parse_var("LOCATION_HISTORY_LIMIT", defaults.location_history_limit)?;
        let ws_client_buffer = parse_var("WS_CLIENT_BUFFER", defaults.ws_client_buffer)?.max(1);
        let ws_ping_interval_secs =
            parse_var("WS_PING_INTERVAL_SECS", defaults.ws_ping_interval_secs)?;

        let admin_api_token = env::var("ADMIN_API_TOKEN").unwrap_or_default();
        let drivers_file = env::var("DRIVERS_FILE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or(defaults.cors_allow_origins);

        Ok(Config {
            bind_addr,
            session_ttl_hours,
            session_sliding_expiry,
            session_cleanup_interval_secs,
            session_retention_minutes,
            online_threshold_secs,
            location_history_limit,
            ws_client_buffer,
            ws_ping_interval_secs,
            admin_api_token,
            drivers_file,
            cors_allow_origins,
        })
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours as i64)
    }

    pub fn session_retention(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_retention_minutes as i64)
    }

    pub fn online_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.online_threshold_secs as i64)
    }

    /// `None` when the sweeper is disabled.
    pub fn session_cleanup_interval(&self) -> Option<Duration> {
        (self.session_cleanup_interval_secs > 0)
            .then(|| Duration::from_secs(self.session_cleanup_interval_secs))
    }

    pub fn ws_ping_interval(&self) -> Option<Duration> {
        (self.ws_ping_interval_secs > 0).then(|| Duration::from_secs(self.ws_ping_interval_secs))
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} value: {}", name, raw)),
        _ => Ok(default),
    }
}

fn parse_bool_var(name: &str, default: bool) -> anyhow::Result<bool> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => parse_bool(&raw)
            .ok_or_else(|| anyhow!("Invalid {} value: {}", name, raw)),
        _ => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .collect();
    if origins.is_empty() {
        vec!["*".to_string()]
    } else {
        origins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" on "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_origins_trims_and_falls_back_to_wildcard() {
        assert_eq!(
            parse_origins("http://a.test/, http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert_eq!(parse_origins(" , "), vec!["*".to_string()]);
    }

    #[test]
    fn default_config_matches_documented_values() {
        let config = Config::default();
        assert_eq!(config.session_ttl(), chrono::Duration::hours(24));
        assert!(!config.session_sliding_expiry);
        assert_eq!(
            config.session_cleanup_interval(),
            Some(Duration::from_secs(300))
        );
        assert!(config.admin_api_token.is_empty());
    }

    #[test]
    fn zero_intervals_disable_background_work() {
        let config = Config {
            session_cleanup_interval_secs: 0,
            ws_ping_interval_secs: 0,
            ..Config::default()
        };
        assert!(config.session_cleanup_interval().is_none());
        assert!(config.ws_ping_interval().is_none());
    }
}

use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    config::ApiClientConfig,
    device::DeviceIdentity,
    error::ClientError,
    protocol::{
        ApiErrorBody, DriverStatus, LiveBus, LocationUpdate, LoginRequest, LoginResponse,
        SessionInfo,
    },
};

/// HTTP client for the driver endpoints.
pub struct DriverApiClient {
    client: Client,
    base_url: String,
    device: Arc<dyn DeviceIdentity>,
}

impl DriverApiClient {
    pub fn new(config: ApiClientConfig, device: Arc<dyn DeviceIdentity>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            device,
        })
    }

    pub fn new_with_base_url(
        base_url: impl Into<String>,
        device: Arc<dyn DeviceIdentity>,
    ) -> Result<Self, ClientError> {
        Self::new(
            ApiClientConfig {
                base_url: base_url.into(),
                ..ApiClientConfig::default()
            },
            device,
        )
    }

    fn device_id(&self) -> Result<String, ClientError> {
        self.device
            .device_id()
            .map_err(|e| ClientError::Protocol(format!("device id unavailable: {}", e)))
    }

    pub async fn login_with_phone(&self, phone: &str) -> Result<LoginResponse, ClientError> {
        self.login(LoginRequest {
            phone: Some(phone.to_string()),
            email: None,
            device_id: self.device_id()?,
        })
        .await
    }

    pub async fn login_with_email(&self, email: &str) -> Result<LoginResponse, ClientError> {
        self.login(LoginRequest {
            phone: None,
            email: Some(email.to_string()),
            device_id: self.device_id()?,
        })
        .await
    }

    async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ClientError> {
        let response = self.post("/driver/login", &request).await?;
        let login: LoginResponse = Self::read_json(response).await?;
        tracing::info!(driver_id = %login.driver_id, "Driver logged in");
        Ok(login)
    }

    /// Sends one GPS sample. Rejections come back as errors; the client stays usable.
    pub async fn send_location(&self, update: &LocationUpdate) -> Result<(), ClientError> {
        let device_id = self.device_id()?;
        let mut body = serde_json::to_value(update)?;
        if let Value::Object(map) = &mut body {
            map.insert("deviceId".into(), Value::String(device_id));
        }
        let response = self.post("/driver/location", &body).await?;
        Self::read_json::<Value>(response).await.map(|_| ())
    }

    pub async fn validate_session(&self, session_id: &str) -> Result<SessionInfo, ClientError> {
        let response = self
            .post("/driver/validate-session", &json!({ "sessionId": session_id }))
            .await?;
        let body: Value = Self::read_json(response).await?;
        let data = body
            .get("data")
            .cloned()
            .ok_or_else(|| ClientError::Protocol("missing session data".into()))?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), ClientError> {
        let response = self
            .post("/driver/logout", &json!({ "sessionId": session_id }))
            .await?;
        Self::read_json::<Value>(response).await.map(|_| ())
    }

    pub async fn set_status(
        &self,
        driver_id: &str,
        session_id: &str,
        status: DriverStatus,
    ) -> Result<DriverStatus, ClientError> {
        let response = self
            .post(
                "/driver/status",
                &json!({ "driverId": driver_id, "sessionId": session_id, "status": status }),
            )
            .await?;
        let body: Value = Self::read_json(response).await?;
        let status = body
            .get("status")
            .cloned()
            .ok_or_else(|| ClientError::Protocol("missing status".into()))?;
        Ok(serde_json::from_value(status)?)
    }

    pub async fn live_buses(&self) -> Result<Vec<LiveBus>, ClientError> {
        let response = self
            .client
            .get(format!("{}/buses/live", self.base_url))
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, ClientError> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await?;
        match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) => {
                let details = body.detail_messages();
                Err(ClientError::from_api(status.as_u16(), &body.code, body.error, details))
            }
            Err(_) => Err(ClientError::Server {
                status: status.as_u16(),
                message: text,
            }),
        }
    }
}

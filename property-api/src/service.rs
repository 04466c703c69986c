use crate::error::{ApiError, ApiResult};
use crate::models::{CreatePropertyRequest, PhotoUpload, PropertyId, PropertyResponse};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// The three remote calls a property submission is made of.
///
/// Implementations must not retry on their own; retry is a caller decision.
#[async_trait]
pub trait PropertyApi: Send + Sync {
    /// Creates the property row and returns its identifier
    async fn create_property(&self, request: &CreatePropertyRequest) -> ApiResult<PropertyId>;

    /// Attaches one photo to an existing property
    async fn upload_photo(&self, property_id: &PropertyId, photo: PhotoUpload<'_>) -> ApiResult<()>;

    /// Marks the property as submitted for valuation
    async fn submit_property(&self, property_id: &PropertyId) -> ApiResult<()>;
}

/// Connection settings for [`HttpPropertyApi`]
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL including the version prefix, e.g. `http://localhost:8000/api/v1`
    pub base_url: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1".to_string(),
            timeout_secs: 60,
            connect_timeout_secs: 10,
            user_agent: "PropFlow/0.1.0".to_string(),
        }
    }
}

type TokenProvider = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// reqwest-backed property API
pub struct HttpPropertyApi {
    base_url: String,
    client: reqwest::Client,
    token: TokenProvider,
}

impl HttpPropertyApi {
    /// Create a new API client. `token` is asked for the current bearer token on every call.
    pub fn new<F>(config: ApiConfig, token: F) -> ApiResult<Self>
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .tcp_keepalive(Duration::from_secs(30))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ApiError::Client(format!("Client build failed: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            token: Arc::new(token),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (self.token)() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn check_status(response: reqwest::Response) -> ApiResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_status(status.as_u16(), &body))
}

#[async_trait]
impl PropertyApi for HttpPropertyApi {
    async fn create_property(&self, request: &CreatePropertyRequest) -> ApiResult<PropertyId> {
        let response = self
            .authorized(self.client.post(self.url("/properties/")))
            .json(request)
            .send()
            .await?;

        let created = check_status(response)
            .await?
            .json::<PropertyResponse>()
            .await
            .map_err(|e| ApiError::Json(format!("Failed to parse response: {}", e)))?;

        log::info!("Created property {}", created.id);
        Ok(created.id)
    }

    async fn upload_photo(&self, property_id: &PropertyId, photo: PhotoUpload<'_>) -> ApiResult<()> {
        let part = reqwest::multipart::Part::bytes(photo.bytes.to_vec())
            .file_name(photo.file_name.to_string())
            .mime_str(photo.content_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = self.url(&format!("/properties/{}/photos", property_id));
        let response = self
            .authorized(self.client.post(&url))
            .multipart(form)
            .send()
            .await?;
        check_status(response).await?;

        log::debug!(
            "Uploaded {} ({} bytes) to property {}",
            photo.file_name,
            photo.bytes.len(),
            property_id
        );
        Ok(())
    }

    async fn submit_property(&self, property_id: &PropertyId) -> ApiResult<()> {
        let url = self.url(&format!("/properties/{}/submit", property_id));
        let response = self.authorized(self.client.post(&url)).send().await?;
        check_status(response).await?;

        log::info!("Submitted property {} for valuation", property_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = ApiConfig {
            base_url: "http://localhost:8000/api/v1/".to_string(),
            ..ApiConfig::default()
        };
        let api = HttpPropertyApi::new(config, || None).unwrap();
        assert_eq!(
            api.url("/properties/"),
            "http://localhost:8000/api/v1/properties/"
        );
    }
}

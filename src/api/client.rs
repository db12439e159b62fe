//! Shared HTTP skeleton used by every provider adapter

use super::{ApiError, ModelDescriptor, ModelKind, ProviderConfig};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Extra request headers as (name, value) pairs
pub type Headers = Vec<(&'static str, String)>;

/// HTTP client bound to one provider's endpoint and credentials
pub struct ProviderClient {
    config: ProviderConfig,
    client: Client,
}

impl ProviderClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Join the endpoint and an operation path with exactly one slash
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.endpoint_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn api_key(&self) -> Result<&str, ApiError> {
        if self.config.has_api_key() {
            Ok(self.config.api_key.trim())
        } else {
            Err(ApiError::MissingApiKey(self.config.name.clone()))
        }
    }

    /// `Authorization: Bearer <key>`
    pub fn bearer_headers(&self) -> Result<Headers, ApiError> {
        Ok(vec![("Authorization", format!("Bearer {}", self.api_key()?))])
    }

    pub async fn post_json(
        &self,
        path: &str,
        headers: Headers,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let url = self.url(path);
        debug!(provider = %self.config.name, %url, "sending request");

        let request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body);

        let response = apply_headers(request, headers).send().await?;
        self.read_json(response).await
    }

    pub async fn get_json(&self, path: &str, headers: Headers) -> Result<Value, ApiError> {
        let url = self.url(path);
        debug!(provider = %self.config.name, %url, "sending request");

        let response = apply_headers(self.client.get(&url), headers).send().await?;
        self.read_json(response).await
    }

    /// GET that only checks the status, ignoring the body
    pub async fn probe(&self, path: &str, headers: Headers) -> Result<(), ApiError> {
        let url = self.url(path);
        let response = apply_headers(self.client.get(&url), headers).send().await?;
        self.check_status(response).await.map(|_| ())
    }

    async fn read_json(&self, response: Response) -> Result<Value, ApiError> {
        let response = self.check_status(response).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn check_status(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status().as_u16();
        if status < 400 {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(provider = %self.config.name, status, "upstream request failed");
        Err(ApiError::UpstreamError {
            status,
            body: self.redact(&body),
        })
    }

    /// Strip the API key from text headed back to a caller
    pub fn redact(&self, text: &str) -> String {
        let key = self.config.api_key.trim();
        if key.is_empty() {
            text.to_string()
        } else {
            text.replace(key, "[REDACTED]")
        }
    }
}

fn apply_headers(mut request: RequestBuilder, headers: Headers) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(name, value);
    }
    request
}

/// Look up the requested model (or the default) among models of the given kinds
pub fn resolve_model<'a>(
    models: &'a [ModelDescriptor],
    requested: Option<&str>,
    default: &str,
    kinds: &[ModelKind],
) -> Result<&'a ModelDescriptor, ApiError> {
    let id = requested
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(default);

    models
        .iter()
        .find(|m| m.id == id && kinds.contains(&m.kind))
        .ok_or_else(|| ApiError::InvalidModel(id.to_string()))
}

/// Current unix time in seconds
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

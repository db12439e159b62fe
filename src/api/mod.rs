//! Provider abstraction layer: one adapter per vendor behind a unified contract

mod anthropic;
mod client;
mod models;
mod openai;
mod openai_compat;
mod openrouter;
mod request;
mod response;
mod together;

pub use anthropic::AnthropicProvider;
pub use client::{resolve_model, ProviderClient};
pub use models::{ModelDescriptor, ModelKind, Pricing};
pub use openai::OpenAiProvider;
pub use openrouter::OpenRouterProvider;
pub use request::{ChatArgs, ChatMessage, CompletionArgs, EmbedArgs, ImageArgs, Role};
pub use response::{
    ChatResult, CompletionResult, EmbeddingResult, GeneratedImage, ImageResult, TokenUsage,
};
pub use together::TogetherProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Default outbound request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0} cannot be empty")]
    EmptyInput(&'static str),

    #[error("Invalid model specified: {0}")]
    InvalidModel(String),

    #[error("Invalid provider specified: {0}")]
    InvalidProvider(String),

    #[error("No API key configured for provider '{0}'")]
    MissingApiKey(String),

    #[error("{operation} is not supported by {provider}")]
    Unsupported {
        provider: String,
        operation: Operation,
    },

    #[error("API error {status}: {body}")]
    UpstreamError { status: u16, body: String },

    #[error("Rate limit exceeded: retry after {retry_after_secs} seconds")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Missing required capability: {0}")]
    Forbidden(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    pub fn unsupported(provider: &str, operation: Operation) -> Self {
        ApiError::Unsupported {
            provider: provider.to_string(),
            operation,
        }
    }

    /// HTTP-equivalent status code reported to callers
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::EmptyInput(_)
            | ApiError::InvalidModel(_)
            | ApiError::InvalidProvider(_)
            | ApiError::InvalidRequest(_) => 400,
            ApiError::Forbidden(_) => 403,
            ApiError::TemplateNotFound(_) => 404,
            ApiError::RateLimitExceeded { .. } => 429,
            ApiError::Unsupported { .. } => 501,
            ApiError::MissingApiKey(_) => 503,
            ApiError::UpstreamError { status, .. } => *status,
            ApiError::InvalidResponse(_) | ApiError::Http(_) | ApiError::Serialization(_) => 502,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::EmptyInput(_) => "empty_input",
            ApiError::InvalidModel(_) => "invalid_model",
            ApiError::InvalidProvider(_) => "invalid_provider",
            ApiError::MissingApiKey(_) => "missing_api_key",
            ApiError::Unsupported { .. } => "not_supported",
            ApiError::UpstreamError { .. } => "api_error",
            ApiError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::TemplateNotFound(_) => "template_not_found",
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::InvalidResponse(_) => "invalid_response",
            ApiError::Http(_) => "http_error",
            ApiError::Serialization(_) => "serialization_error",
        }
    }
}

/// The four operations every provider exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Chat,
    Complete,
    Embed,
    GenerateImage,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Chat,
        Operation::Complete,
        Operation::Embed,
        Operation::GenerateImage,
    ];

    /// Stable external path for this operation
    pub fn path(&self) -> &'static str {
        match self {
            Operation::Chat => "chat",
            Operation::Complete => "complete",
            Operation::Embed => "embed",
            Operation::GenerateImage => "generate-image",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim_matches('/');
        Self::ALL.into_iter().find(|op| op.path() == path)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Declared abilities of a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub chat: bool,
    pub completion: bool,
    pub embeddings: bool,
    pub images: bool,
    pub streaming: bool,
    pub function_calling: bool,
}

impl Capabilities {
    pub fn supports(&self, operation: Operation) -> bool {
        match operation {
            Operation::Chat => self.chat,
            Operation::Complete => self.completion,
            Operation::Embed => self.embeddings,
            Operation::GenerateImage => self.images,
        }
    }
}

/// Vendor families with a built-in adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "together-ai")]
    Together,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::OpenRouter,
        ProviderKind::Together,
    ];

    /// Registry name the adapter is known by
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Together => "together-ai",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::OpenRouter => "OpenRouter",
            ProviderKind::Together => "Together AI",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderKind::Together => "https://api.together.xyz/v1",
        }
    }

    /// Environment variable holding this vendor's API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenRouter => "OPENROUTER_API_KEY",
            ProviderKind::Together => "TOGETHER_API_KEY",
        }
    }

    /// Instantiate the adapter for this vendor
    pub fn build(&self, config: ProviderConfig) -> Result<std::sync::Arc<dyn AiProvider>, ApiError> {
        use std::sync::Arc;
        Ok(match self {
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config)?),
            ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(config)?),
            ProviderKind::OpenRouter => Arc::new(OpenRouterProvider::new(config)?),
            ProviderKind::Together => Arc::new(TogetherProvider::new(config)?),
        })
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Connection settings for one provider
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub display_name: String,
    pub api_key: String,
    pub endpoint_url: String,
    pub timeout_secs: u64,
    /// Vendor-specific extras (organization, version, site_url, ...)
    #[serde(default)]
    pub settings: HashMap<String, Value>,
}

impl ProviderConfig {
    /// Config for a built-in vendor with its default endpoint
    pub fn for_kind(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            name: kind.name().to_string(),
            display_name: kind.display_name().to_string(),
            api_key: api_key.into(),
            endpoint_url: kind.default_endpoint().to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            settings: HashMap::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = endpoint_url.into();
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// String setting, treating empty strings as absent
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn setting_f64(&self, key: &str) -> Option<f64> {
        self.settings.get(key).and_then(Value::as_f64)
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("api_key", &if self.has_api_key() { "***" } else { "" })
            .field("endpoint_url", &self.endpoint_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Trait implemented by every vendor adapter
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Registry key, e.g. "openai"
    fn name(&self) -> &str;

    fn display_name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Static model table compiled into the adapter
    fn models(&self) -> &[ModelDescriptor];

    fn default_model(&self) -> &str;

    /// Whether an API key is configured
    fn is_active(&self) -> bool;

    async fn chat(&self, args: ChatArgs) -> Result<ChatResult, ApiError>;

    async fn complete(&self, args: CompletionArgs) -> Result<CompletionResult, ApiError>;

    async fn embed(&self, text: &str, args: EmbedArgs) -> Result<EmbeddingResult, ApiError> {
        let _ = (text, args);
        Err(ApiError::unsupported(self.name(), Operation::Embed))
    }

    async fn generate_image(&self, args: ImageArgs) -> Result<ImageResult, ApiError> {
        let _ = args;
        Err(ApiError::unsupported(self.name(), Operation::GenerateImage))
    }

    /// Verify the key is present and the endpoint answers
    async fn test_connection(&self) -> Result<(), ApiError>;

    fn find_model(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models().iter().find(|m| m.id == id)
    }
}

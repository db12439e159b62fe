//! Request gateway: permission and rate checks in front of the registry
//!
//! Every call runs in the same order: capability check, rate limit, provider
//! resolution, then the adapter call. Forwarded calls emit one
//! [`UsageRecord`] whether they succeed or fail.

use crate::api::{
    ApiError, ChatArgs, ChatResult, CompletionArgs, CompletionResult, EmbedArgs,
    EmbeddingResult, ImageArgs, ImageResult, Operation, TokenUsage,
};
use crate::metrics::{UsageRecord, UsageSink, UsageStatus};
use crate::ratelimit::RateLimiter;
use crate::registry::ProviderRegistry;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Capability required when none is configured
pub const DEFAULT_CAPABILITY: &str = "manage_options";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Capability a caller must hold to use the gateway
    pub required_capability: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            required_capability: DEFAULT_CAPABILITY.to_string(),
        }
    }
}

/// Identity and capabilities of whoever is calling
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<u64>,
    pub capabilities: HashSet<String>,
}

impl Caller {
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id: Some(user_id),
            capabilities: HashSet::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// User holding the default administrative capability
    pub fn administrator(user_id: u64) -> Self {
        Self::new(user_id).with_capability(DEFAULT_CAPABILITY)
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn can(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Key the rate limiter counts this caller under
    pub fn identity(&self) -> Option<String> {
        self.user_id.map(|id| id.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub provider: String,
    #[serde(flatten)]
    pub args: ChatArgs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub provider: String,
    #[serde(flatten)]
    pub args: CompletionArgs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub provider: String,
    pub text: String,
    #[serde(flatten)]
    pub args: EmbedArgs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRequest {
    pub provider: String,
    #[serde(flatten)]
    pub args: ImageArgs,
}

/// HTTP-shaped outcome of [`RequestGateway::dispatch`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: Value,
}

impl GatewayResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(error: &ApiError) -> Self {
        let mut body = json!({
            "code": error.code(),
            "message": error.to_string(),
            "status": error.status_code(),
        });
        if let ApiError::RateLimitExceeded { retry_after_secs } = error {
            body["retry_after"] = json!(retry_after_secs);
        }

        Self {
            status: error.status_code(),
            body,
        }
    }

    pub fn not_found(path: &str) -> Self {
        Self {
            status: 404,
            body: json!({
                "code": "no_route",
                "message": format!("No route matches '{}'", path),
                "status": 404,
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

/// Token usage and model carried by a unified result
trait Metered {
    fn usage(&self) -> Option<&TokenUsage>;
    fn model_id(&self) -> Option<&str>;
}

impl Metered for ChatResult {
    fn usage(&self) -> Option<&TokenUsage> {
        Some(&self.usage)
    }
    fn model_id(&self) -> Option<&str> {
        Some(&self.model_id)
    }
}

impl Metered for CompletionResult {
    fn usage(&self) -> Option<&TokenUsage> {
        Some(&self.usage)
    }
    fn model_id(&self) -> Option<&str> {
        Some(&self.model_id)
    }
}

impl Metered for EmbeddingResult {
    fn usage(&self) -> Option<&TokenUsage> {
        Some(&self.usage)
    }
    fn model_id(&self) -> Option<&str> {
        Some(&self.model_id)
    }
}

impl Metered for ImageResult {
    fn usage(&self) -> Option<&TokenUsage> {
        None
    }
    fn model_id(&self) -> Option<&str> {
        None
    }
}

/// Entry point for callers: checks, forwards and records
pub struct RequestGateway {
    registry: Arc<ProviderRegistry>,
    limiter: Arc<RateLimiter>,
    usage: Arc<dyn UsageSink>,
    settings: GatewaySettings,
}

impl RequestGateway {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        limiter: Arc<RateLimiter>,
        usage: Arc<dyn UsageSink>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            registry,
            limiter,
            usage,
            settings,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub async fn chat(&self, caller: &Caller, request: ChatRequest) -> Result<ChatResult, ApiError> {
        self.admit(caller)?;
        self.forward_chat(caller, request).await
    }

    pub async fn complete(
        &self,
        caller: &Caller,
        request: CompletionRequest,
    ) -> Result<CompletionResult, ApiError> {
        self.admit(caller)?;
        self.forward_complete(caller, request).await
    }

    pub async fn embed(
        &self,
        caller: &Caller,
        request: EmbedRequest,
    ) -> Result<EmbeddingResult, ApiError> {
        self.admit(caller)?;
        self.forward_embed(caller, request).await
    }

    pub async fn generate_image(
        &self,
        caller: &Caller,
        request: ImageRequest,
    ) -> Result<ImageResult, ApiError> {
        self.admit(caller)?;
        self.forward_image(caller, request).await
    }

    /// Route a JSON payload to the operation named by `path`
    pub async fn dispatch(&self, caller: &Caller, path: &str, body: Value) -> GatewayResponse {
        let Some(operation) = Operation::from_path(path) else {
            warn!(path, "no route for gateway path");
            return GatewayResponse::not_found(path);
        };

        let result = match self.admit(caller) {
            Ok(()) => self.route(caller, operation, body).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(body) => GatewayResponse::ok(body),
            Err(e) => GatewayResponse::error(&e),
        }
    }

    async fn route(&self, caller: &Caller, operation: Operation, body: Value) -> Result<Value, ApiError> {
        let value = match operation {
            Operation::Chat => {
                serde_json::to_value(self.forward_chat(caller, parse(body)?).await?)?
            }
            Operation::Complete => {
                serde_json::to_value(self.forward_complete(caller, parse(body)?).await?)?
            }
            Operation::Embed => {
                serde_json::to_value(self.forward_embed(caller, parse(body)?).await?)?
            }
            Operation::GenerateImage => {
                serde_json::to_value(self.forward_image(caller, parse(body)?).await?)?
            }
        };
        Ok(value)
    }

    /// Capability check followed by the rate limit
    fn admit(&self, caller: &Caller) -> Result<(), ApiError> {
        let capability = &self.settings.required_capability;
        if !caller.can(capability) {
            warn!(user_id = ?caller.user_id, capability = %capability, "caller lacks capability");
            return Err(ApiError::Forbidden(capability.clone()));
        }

        self.limiter.check(caller.identity().as_deref())?;
        Ok(())
    }

    async fn forward_chat(&self, caller: &Caller, request: ChatRequest) -> Result<ChatResult, ApiError> {
        let provider = self.registry.resolve(&request.provider)?;
        let requested = request.args.model.clone();
        let started = Instant::now();
        let result = provider.chat(request.args).await;
        self.track(caller, Operation::Chat, &request.provider, requested, started, &result);
        result
    }

    async fn forward_complete(
        &self,
        caller: &Caller,
        request: CompletionRequest,
    ) -> Result<CompletionResult, ApiError> {
        let provider = self.registry.resolve(&request.provider)?;
        let requested = request.args.model.clone();
        let started = Instant::now();
        let result = provider.complete(request.args).await;
        self.track(caller, Operation::Complete, &request.provider, requested, started, &result);
        result
    }

    async fn forward_embed(
        &self,
        caller: &Caller,
        request: EmbedRequest,
    ) -> Result<EmbeddingResult, ApiError> {
        let provider = self.registry.resolve(&request.provider)?;
        let requested = request.args.model.clone();
        let started = Instant::now();
        let result = provider.embed(&request.text, request.args).await;
        self.track(caller, Operation::Embed, &request.provider, requested, started, &result);
        result
    }

    async fn forward_image(
        &self,
        caller: &Caller,
        request: ImageRequest,
    ) -> Result<ImageResult, ApiError> {
        let provider = self.registry.resolve(&request.provider)?;
        let requested = request.args.model.clone();
        let started = Instant::now();
        let result = provider.generate_image(request.args).await;
        self.track(caller, Operation::GenerateImage, &request.provider, requested, started, &result);
        result
    }

    fn track<T: Metered>(
        &self,
        caller: &Caller,
        action: Operation,
        provider: &str,
        requested_model: Option<String>,
        started: Instant,
        result: &Result<T, ApiError>,
    ) {
        let elapsed = started.elapsed();
        let response_time_ms = elapsed.as_millis() as u64;

        let record = match result {
            Ok(value) => {
                let usage = value.usage();
                info!(
                    action = %action,
                    provider,
                    tokens = usage.map(|u| u.total_tokens).unwrap_or(0),
                    elapsed_ms = response_time_ms,
                    "gateway call completed"
                );
                UsageRecord {
                    action,
                    provider: provider.to_string(),
                    model: value.model_id().map(str::to_string).or(requested_model),
                    tokens_used: usage.map(|u| u.total_tokens).unwrap_or(0),
                    cost: usage.and_then(|u| u.estimated_cost_usd),
                    response_time_ms,
                    status: UsageStatus::Success,
                    error: None,
                    user_id: caller.user_id,
                    timestamp: Utc::now(),
                }
            }
            Err(e) => {
                warn!(
                    action = %action,
                    provider,
                    code = e.code(),
                    elapsed_ms = response_time_ms,
                    "gateway call failed: {}",
                    e
                );
                UsageRecord {
                    action,
                    provider: provider.to_string(),
                    model: requested_model,
                    tokens_used: 0,
                    cost: None,
                    response_time_ms,
                    status: UsageStatus::Error,
                    error: Some(e.code().to_string()),
                    user_id: caller.user_id,
                    timestamp: Utc::now(),
                }
            }
        };

        self.usage.record(record);
    }
}

fn parse<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        AiProvider, Capabilities, ChatMessage, ModelDescriptor, Role, TokenUsage,
    };
    use crate::metrics::UsageTracker;
    use crate::ratelimit::RateLimitConfig;
    use async_trait::async_trait;

    /// Adapter double answering chat and complete without HTTP
    struct EchoProvider {
        models: Vec<ModelDescriptor>,
    }

    impl EchoProvider {
        fn new() -> Self {
            Self {
                models: vec![ModelDescriptor::chat("echo-1", "Echo", "Repeats the last message")],
            }
        }
    }

    #[async_trait]
    impl AiProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }
        fn display_name(&self) -> &str {
            "Echo"
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                chat: true,
                completion: true,
                ..Default::default()
            }
        }
        fn models(&self) -> &[ModelDescriptor] {
            &self.models
        }
        fn default_model(&self) -> &str {
            "echo-1"
        }
        fn is_active(&self) -> bool {
            true
        }

        async fn chat(&self, args: ChatArgs) -> Result<ChatResult, ApiError> {
            let last = args
                .messages
                .last()
                .ok_or(ApiError::EmptyInput("messages"))?;
            Ok(ChatResult {
                content: last.content.clone(),
                role: Role::Assistant,
                function_call: None,
                finish_reason: Some("stop".to_string()),
                usage: TokenUsage::new(3, 2),
                model_id: "echo-1".to_string(),
                created_at: 0,
                id: None,
            })
        }

        async fn complete(&self, args: CompletionArgs) -> Result<CompletionResult, ApiError> {
            self.chat(args.into_chat()).await.map(CompletionResult::from)
        }

        async fn test_connection(&self) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn gateway(limit: u32) -> (RequestGateway, UsageTracker) {
        let registry = ProviderRegistry::new();
        registry.register("echo", Arc::new(EchoProvider::new()));

        let limiter = RateLimiter::new(RateLimitConfig {
            limit,
            period_secs: 60,
            ..Default::default()
        });
        let tracker = UsageTracker::new();

        let gateway = RequestGateway::new(
            Arc::new(registry),
            Arc::new(limiter),
            Arc::new(tracker.clone()),
            GatewaySettings::default(),
        );
        (gateway, tracker)
    }

    #[tokio::test]
    async fn test_dispatch_chat_success() {
        let (gateway, tracker) = gateway(10);
        let response = gateway
            .dispatch(
                &Caller::administrator(1),
                "chat",
                json!({"provider": "echo", "messages": [{"role": "user", "content": "ping"}]}),
            )
            .await;

        assert_eq!(response.status, 200);
        assert_eq!(response.body["content"], "ping");
        assert_eq!(response.body["usage"]["total_tokens"], 5);

        let recent = tracker.recent();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].tokens_used, 5);
        assert_eq!(recent[0].user_id, Some(1));
        assert!(recent[0].is_success());
    }

    #[tokio::test]
    async fn test_missing_capability_is_forbidden() {
        let (gateway, tracker) = gateway(10);
        let response = gateway
            .dispatch(&Caller::new(2), "chat", json!({"provider": "echo"}))
            .await;

        assert_eq!(response.status, 403);
        assert_eq!(response.body["code"], "forbidden");
        assert!(tracker.recent().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_after_limit() {
        let (gateway, _) = gateway(2);
        let caller = Caller::administrator(3);
        let request = ChatRequest {
            provider: "echo".to_string(),
            args: ChatArgs::new(vec![ChatMessage::user("hi")]),
        };

        assert!(gateway.chat(&caller, request.clone()).await.is_ok());
        assert!(gateway.chat(&caller, request.clone()).await.is_ok());

        let response = gateway
            .dispatch(&caller, "chat", serde_json::to_value(&request).unwrap())
            .await;
        assert_eq!(response.status, 429);
        assert!(response.body["retry_after"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_bad_request() {
        let (gateway, tracker) = gateway(10);
        let response = gateway
            .dispatch(
                &Caller::administrator(1),
                "complete",
                json!({"provider": "nonexistent", "prompt": "x"}),
            )
            .await;

        assert_eq!(response.status, 400);
        assert_eq!(response.body["code"], "invalid_provider");
        assert!(tracker.recent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_path_and_malformed_body() {
        let (gateway, _) = gateway(10);
        let admin = Caller::administrator(1);

        let response = gateway.dispatch(&admin, "templates", json!({})).await;
        assert_eq!(response.status, 404);

        let response = gateway
            .dispatch(&admin, "chat", json!({"provider": "echo", "messages": "hello"}))
            .await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["code"], "invalid_request");
    }

    #[tokio::test]
    async fn test_unsupported_operation_is_recorded() {
        let (gateway, tracker) = gateway(10);
        let response = gateway
            .dispatch(
                &Caller::administrator(1),
                "embed",
                json!({"provider": "echo", "text": "vectorize me"}),
            )
            .await;

        assert_eq!(response.status, 501);
        assert_eq!(response.body["code"], "not_supported");

        let recent = tracker.recent();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].status, UsageStatus::Error);
        assert_eq!(recent[0].error.as_deref(), Some("not_supported"));
        assert_eq!(tracker.provider("echo").unwrap().errors, 1);
    }

    #[tokio::test]
    async fn test_custom_capability() {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register("echo", Arc::new(EchoProvider::new()));
        let gateway = RequestGateway::new(
            registry,
            Arc::new(RateLimiter::default()),
            Arc::new(crate::metrics::NoopSink),
            GatewaySettings {
                required_capability: "use_ai".to_string(),
            },
        );

        let request = CompletionRequest {
            provider: "echo".to_string(),
            args: CompletionArgs::new("hello"),
        };
        assert!(matches!(
            gateway.complete(&Caller::administrator(1), request.clone()).await,
            Err(ApiError::Forbidden(cap)) if cap == "use_ai"
        ));

        let result = gateway
            .complete(&Caller::new(1).with_capability("use_ai"), request)
            .await
            .unwrap();
        assert_eq!(result.text, "hello");
    }
}

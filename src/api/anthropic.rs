//! Anthropic Messages API provider

use super::client::{unix_now, Headers, ProviderClient};
use super::openai_compat::insert_opt;
use super::{
    resolve_model, AiProvider, ApiError, Capabilities, ChatArgs, ChatResult, CompletionArgs,
    CompletionResult, ModelDescriptor, ModelKind, ProviderConfig, Role, TokenUsage,
};
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";
const DEFAULT_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_TEMPERATURE: f64 = 0.7;

fn models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::chat(
            "claude-3-opus-20240229",
            "Claude 3 Opus",
            "Most capable Claude model for complex tasks",
        )
        .with_limits(200_000, 4096)
        .with_pricing(0.000015, 0.000075),
        ModelDescriptor::chat(
            "claude-3-sonnet-20240229",
            "Claude 3 Sonnet",
            "Balanced performance and speed",
        )
        .with_limits(200_000, 4096)
        .with_pricing(0.000003, 0.000015),
        ModelDescriptor::chat(
            "claude-3-haiku-20240307",
            "Claude 3 Haiku",
            "Fast and efficient Claude model",
        )
        .with_limits(200_000, 4096)
        .with_pricing(0.00000025, 0.00000125),
    ]
}

/// Anthropic API provider
pub struct AnthropicProvider {
    client: ProviderClient,
    models: Vec<ModelDescriptor>,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ApiError> {
        Ok(Self {
            client: ProviderClient::new(config)?,
            models: models(),
        })
    }

    fn headers(&self) -> Result<Headers, ApiError> {
        let version = self
            .client
            .config()
            .setting_str("version")
            .unwrap_or(DEFAULT_VERSION);

        Ok(vec![
            ("x-api-key", self.client.api_key()?.to_string()),
            ("anthropic-version", version.to_string()),
            ("User-Agent", format!("ai-gateway/{}", env!("CARGO_PKG_VERSION"))),
        ])
    }

    /// Messages API body; system messages move to the top-level `system` field
    fn build_request(&self, args: &ChatArgs, model: &ModelDescriptor) -> Result<Value, ApiError> {
        let mut system_parts: Vec<&str> = Vec::new();
        if let Some(system) = args.system.as_deref().filter(|s| !s.is_empty()) {
            system_parts.push(system);
        }

        let mut messages = Vec::with_capacity(args.messages.len());
        for msg in &args.messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                Role::User | Role::Assistant => messages.push(json!({
                    "role": msg.role.as_str(),
                    "content": msg.content
                })),
            }
        }

        if messages.is_empty() {
            return Err(ApiError::EmptyInput("messages"));
        }

        let mut body = json!({
            "model": model.id,
            "messages": messages,
            "max_tokens": model.cap_output_tokens(args.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            "temperature": args.temperature.unwrap_or(DEFAULT_TEMPERATURE).clamp(0.0, 1.0),
        });

        if !system_parts.is_empty() {
            body["system"] = json!(system_parts.join("\n\n"));
        }

        insert_opt(&mut body, "top_p", args.top_p.map(|p| p.clamp(0.0, 1.0)));
        insert_opt(&mut body, "stop_sequences", args.stop.clone());

        Ok(body)
    }

    fn parse_response(&self, json: Value, model: &ModelDescriptor) -> ChatResult {
        // Concatenate every text block; tool_use and other block types are skipped
        let content = json["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"] == "text")
                    .filter_map(|b| b["text"].as_str())
                    .collect::<String>()
            })
            .unwrap_or_default();

        let usage = TokenUsage::from_counts(
            json["usage"]["input_tokens"].as_u64(),
            json["usage"]["output_tokens"].as_u64(),
        )
        .with_cost(model.pricing.as_ref());

        ChatResult {
            content,
            role: Role::Assistant,
            function_call: None,
            finish_reason: json["stop_reason"].as_str().map(str::to_string),
            usage,
            model_id: json["model"].as_str().unwrap_or(&model.id).to_string(),
            created_at: unix_now(),
            id: json["id"].as_str().map(str::to_string),
        }
    }
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn name(&self) -> &str {
        self.client.name()
    }

    fn display_name(&self) -> &str {
        &self.client.config().display_name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            chat: true,
            completion: true,
            embeddings: false,
            images: false,
            streaming: true,
            function_calling: true,
        }
    }

    fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    fn is_active(&self) -> bool {
        self.client.config().has_api_key()
    }

    async fn chat(&self, args: ChatArgs) -> Result<ChatResult, ApiError> {
        let model = resolve_model(
            &self.models,
            args.model.as_deref(),
            DEFAULT_MODEL,
            &[ModelKind::Chat],
        )?;

        if args.messages.is_empty() {
            return Err(ApiError::EmptyInput("messages"));
        }

        let body = self.build_request(&args, model)?;
        let json = self
            .client
            .post_json("messages", self.headers()?, &body)
            .await?;

        Ok(self.parse_response(json, model))
    }

    async fn complete(&self, args: CompletionArgs) -> Result<CompletionResult, ApiError> {
        // No native completions endpoint: run the prompt as a one-message chat
        if args.prompt.trim().is_empty() {
            return Err(ApiError::EmptyInput("prompt"));
        }

        self.chat(args.into_chat()).await.map(CompletionResult::from)
    }

    async fn test_connection(&self) -> Result<(), ApiError> {
        let headers = self.headers()?;
        self.client.probe("models", headers).await
    }
}

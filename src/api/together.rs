//! Together AI provider with native chat and completions endpoints

use super::client::{Headers, ProviderClient};
use super::openai_compat::{self, insert_opt};
use super::{
    resolve_model, AiProvider, ApiError, Capabilities, ChatArgs, ChatResult, CompletionArgs,
    CompletionResult, ModelDescriptor, ModelKind, ProviderConfig,
};
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_MODEL: &str = "togethercomputer/llama-2-7b-chat";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_TOP_P: f64 = 0.7;
const DEFAULT_TOP_K: f64 = 50.0;
const DEFAULT_REPETITION_PENALTY: f64 = 1.0;

/// Together models serve both chat and completions
const TEXT_KINDS: &[ModelKind] = &[ModelKind::Chat, ModelKind::Completion];

fn models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::chat(
            "togethercomputer/llama-2-7b-chat",
            "Llama 2 7B Chat",
            "Llama 2 7B Chat model from Together AI.",
        )
        .with_context_window(4096),
        ModelDescriptor::chat(
            "togethercomputer/llama-2-70b-chat",
            "Llama 2 70B Chat",
            "Llama 2 70B Chat model from Together AI.",
        )
        .with_context_window(4096),
        ModelDescriptor::chat(
            "togethercomputer/redpajama-incite-7b-chat",
            "RedPajama-INCITE-7B-Chat",
            "RedPajama-INCITE-7B-Chat model from Together AI.",
        )
        .with_context_window(2048),
    ]
}

/// Together AI API provider
pub struct TogetherProvider {
    client: ProviderClient,
    models: Vec<ModelDescriptor>,
}

impl TogetherProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ApiError> {
        Ok(Self {
            client: ProviderClient::new(config)?,
            models: models(),
        })
    }

    fn headers(&self) -> Result<Headers, ApiError> {
        self.client.bearer_headers()
    }

    /// Sampling fields common to both endpoints; values pass through unchanged
    fn sampling(
        &self,
        body: &mut Value,
        max_tokens: Option<u32>,
        temperature: Option<f64>,
        top_p: Option<f64>,
        stop: Option<Vec<String>>,
    ) {
        let config = self.client.config();

        body["max_tokens"] = json!(max_tokens.unwrap_or(DEFAULT_MAX_TOKENS));
        body["temperature"] = json!(temperature.unwrap_or(DEFAULT_TEMPERATURE));
        body["top_p"] = json!(top_p.unwrap_or(DEFAULT_TOP_P));
        body["top_k"] = json!(config.setting_f64("top_k").unwrap_or(DEFAULT_TOP_K));
        body["repetition_penalty"] = json!(config
            .setting_f64("repetition_penalty")
            .unwrap_or(DEFAULT_REPETITION_PENALTY));
        insert_opt(body, "stop", stop.filter(|s| !s.is_empty()));
    }

    fn build_chat_request(&self, args: &ChatArgs, model: &ModelDescriptor) -> Value {
        let mut body = json!({
            "model": model.id,
            "messages": openai_compat::wire_messages(args.system.as_deref(), &args.messages),
        });
        self.sampling(&mut body, args.max_tokens, args.temperature, args.top_p, args.stop.clone());
        body
    }
}

#[async_trait]
impl AiProvider for TogetherProvider {
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
            ..Default::default()
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
        let model = resolve_model(&self.models, args.model.as_deref(), DEFAULT_MODEL, TEXT_KINDS)?;

        if args.messages.is_empty() {
            return Err(ApiError::EmptyInput("messages"));
        }

        let body = self.build_chat_request(&args, model);
        let json = self
            .client
            .post_json("chat/completions", self.headers()?, &body)
            .await?;

        openai_compat::parse_chat(json, model)
    }

    async fn complete(&self, args: CompletionArgs) -> Result<CompletionResult, ApiError> {
        let model = resolve_model(&self.models, args.model.as_deref(), DEFAULT_MODEL, TEXT_KINDS)?;

        if args.prompt.trim().is_empty() {
            return Err(ApiError::EmptyInput("prompt"));
        }

        let mut body = json!({
            "model": model.id,
            "prompt": args.prompt,
        });
        self.sampling(&mut body, args.max_tokens, args.temperature, args.top_p, args.stop);

        let json = self
            .client
            .post_json("completions", self.headers()?, &body)
            .await?;

        openai_compat::parse_completion(json, model)
    }

    async fn test_connection(&self) -> Result<(), ApiError> {
        let headers = self.headers()?;
        self.client.probe("models", headers).await
    }
}

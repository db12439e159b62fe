//! OpenAI provider: chat, native completions, embeddings and images

use super::client::{Headers, ProviderClient};
use super::openai_compat::{self, insert_opt};
use super::{
    resolve_model, AiProvider, ApiError, Capabilities, ChatArgs, ChatResult, CompletionArgs,
    CompletionResult, EmbedArgs, EmbeddingResult, ImageArgs, ImageResult, ModelDescriptor,
    ModelKind, ProviderConfig,
};
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo-instruct";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_TEMPERATURE: f64 = 0.7;

fn models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::chat("gpt-4", "GPT-4", "Most capable GPT-4 model")
            .with_limits(8192, 4096)
            .with_pricing(0.00003, 0.00006),
        ModelDescriptor::chat(
            "gpt-4-turbo",
            "GPT-4 Turbo",
            "GPT-4 Turbo with improved speed and efficiency",
        )
        .with_limits(128_000, 4096)
        .with_pricing(0.00001, 0.00003),
        ModelDescriptor::chat("gpt-3.5-turbo", "GPT-3.5 Turbo", "Fast and efficient GPT-3.5 model")
            .with_limits(16_384, 4096)
            .with_pricing(0.0000005, 0.0000015),
        ModelDescriptor::new(
            "gpt-3.5-turbo-instruct",
            "GPT-3.5 Turbo Instruct",
            "Instruction model for the legacy completions endpoint",
            ModelKind::Completion,
        )
        .with_limits(4096, 4096)
        .with_pricing(0.0000015, 0.000002),
        ModelDescriptor::new(
            "text-embedding-3-large",
            "Text Embedding 3 Large",
            "High-quality text embeddings",
            ModelKind::Embedding,
        )
        .with_dimensions(3072),
        ModelDescriptor::new(
            "text-embedding-3-small",
            "Text Embedding 3 Small",
            "Efficient text embeddings",
            ModelKind::Embedding,
        )
        .with_dimensions(1536),
        ModelDescriptor::new("dall-e-3", "DALL-E 3", "Advanced image generation", ModelKind::Image),
    ]
}

/// OpenAI API provider
pub struct OpenAiProvider {
    client: ProviderClient,
    models: Vec<ModelDescriptor>,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ApiError> {
        Ok(Self {
            client: ProviderClient::new(config)?,
            models: models(),
        })
    }

    fn headers(&self) -> Result<Headers, ApiError> {
        let mut headers = self.client.bearer_headers()?;
        if let Some(org) = self.client.config().setting_str("organization") {
            headers.push(("OpenAI-Organization", org.to_string()));
        }
        Ok(headers)
    }

    fn build_chat_request(&self, args: &ChatArgs, model: &ModelDescriptor) -> Value {
        let mut body = json!({
            "model": model.id,
            "messages": openai_compat::wire_messages(args.system.as_deref(), &args.messages),
            "max_tokens": model.cap_output_tokens(args.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            "temperature": args.temperature.unwrap_or(DEFAULT_TEMPERATURE).clamp(0.0, 2.0),
            "stream": false,
        });

        insert_opt(&mut body, "top_p", args.top_p.map(|p| p.clamp(0.0, 1.0)));
        insert_opt(&mut body, "frequency_penalty", args.frequency_penalty.map(|p| p.clamp(-2.0, 2.0)));
        insert_opt(&mut body, "presence_penalty", args.presence_penalty.map(|p| p.clamp(-2.0, 2.0)));
        insert_opt(&mut body, "stop", args.stop.clone());
        openai_compat::insert_functions(&mut body, args);

        body
    }

    fn build_completion_request(&self, args: CompletionArgs, model: &ModelDescriptor) -> Value {
        let mut body = json!({
            "model": model.id,
            "prompt": args.prompt,
            "max_tokens": model.cap_output_tokens(args.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            "temperature": args.temperature.unwrap_or(DEFAULT_TEMPERATURE).clamp(0.0, 2.0),
        });

        insert_opt(&mut body, "top_p", args.top_p.map(|p| p.clamp(0.0, 1.0)));
        insert_opt(&mut body, "frequency_penalty", args.frequency_penalty.map(|p| p.clamp(-2.0, 2.0)));
        insert_opt(&mut body, "presence_penalty", args.presence_penalty.map(|p| p.clamp(-2.0, 2.0)));
        insert_opt(&mut body, "stop", args.stop);

        body
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
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
            embeddings: true,
            images: true,
            streaming: true,
            function_calling: true,
        }
    }

    fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    fn default_model(&self) -> &str {
        DEFAULT_CHAT_MODEL
    }

    fn is_active(&self) -> bool {
        self.client.config().has_api_key()
    }

    async fn chat(&self, args: ChatArgs) -> Result<ChatResult, ApiError> {
        let model = resolve_model(
            &self.models,
            args.model.as_deref(),
            DEFAULT_CHAT_MODEL,
            &[ModelKind::Chat],
        )?;

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
        let model = resolve_model(
            &self.models,
            args.model.as_deref(),
            DEFAULT_COMPLETION_MODEL,
            &[ModelKind::Completion],
        )?;

        if args.prompt.trim().is_empty() {
            return Err(ApiError::EmptyInput("prompt"));
        }

        let body = self.build_completion_request(args, model);
        let json = self
            .client
            .post_json("completions", self.headers()?, &body)
            .await?;

        openai_compat::parse_completion(json, model)
    }

    async fn embed(&self, text: &str, args: EmbedArgs) -> Result<EmbeddingResult, ApiError> {
        let model = resolve_model(
            &self.models,
            args.model.as_deref(),
            DEFAULT_EMBEDDING_MODEL,
            &[ModelKind::Embedding],
        )?;

        if text.trim().is_empty() {
            return Err(ApiError::EmptyInput("text"));
        }

        let mut body = json!({
            "model": model.id,
            "input": text,
        });
        insert_opt(&mut body, "dimensions", args.dimensions);

        let json = self
            .client
            .post_json("embeddings", self.headers()?, &body)
            .await?;

        let embedding = json["data"][0]
            .as_object()
            .ok_or_else(|| ApiError::InvalidResponse("missing data[0]".to_string()))?;

        let vector = embedding
            .get("embedding")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_f64)
                    .map(|v| v as f32)
                    .collect()
            })
            .unwrap_or_default();

        Ok(EmbeddingResult {
            vector,
            index: embedding.get("index").and_then(Value::as_u64).unwrap_or(0) as u32,
            usage: openai_compat::parse_usage(&json, model),
            model_id: json["model"].as_str().unwrap_or(&model.id).to_string(),
        })
    }

    async fn generate_image(&self, args: ImageArgs) -> Result<ImageResult, ApiError> {
        let model = resolve_model(
            &self.models,
            args.model.as_deref(),
            DEFAULT_IMAGE_MODEL,
            &[ModelKind::Image],
        )?;

        if args.prompt.trim().is_empty() {
            return Err(ApiError::EmptyInput("prompt"));
        }

        let body = openai_compat::image_body(&args, model);
        let json = self
            .client
            .post_json("images/generations", self.headers()?, &body)
            .await?;

        openai_compat::parse_images(json)
    }

    async fn test_connection(&self) -> Result<(), ApiError> {
        let headers = self.headers()?;
        self.client.probe("models", headers).await
    }
}

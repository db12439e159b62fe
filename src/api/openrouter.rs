//! OpenRouter provider: OpenAI-compatible routing across many upstream models

use super::client::{Headers, ProviderClient};
use super::openai_compat::{self, insert_opt};
use super::{
    resolve_model, AiProvider, ApiError, Capabilities, ChatArgs, ChatResult, CompletionArgs,
    CompletionResult, ImageArgs, ImageResult, ModelDescriptor, ModelKind, Pricing,
    ProviderConfig,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

const DEFAULT_MODEL: &str = "anthropic/claude-3-haiku";
const DEFAULT_IMAGE_MODEL: &str = "stability-ai/stable-diffusion-xl";
const DEFAULT_ROUTE: &str = "fallback";
const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_TEMPERATURE: f64 = 0.7;

fn models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::chat("anthropic/claude-3-opus", "Claude 3 Opus", "Most capable Claude model")
            .with_context_window(200_000)
            .with_pricing(0.000015, 0.000075),
        ModelDescriptor::chat("anthropic/claude-3-sonnet", "Claude 3 Sonnet", "Balanced Claude model")
            .with_context_window(200_000)
            .with_pricing(0.000003, 0.000015),
        ModelDescriptor::chat("anthropic/claude-3-haiku", "Claude 3 Haiku", "Fast Claude model")
            .with_context_window(200_000)
            .with_pricing(0.00000025, 0.00000125),
        ModelDescriptor::chat(
            "openai/gpt-4-turbo",
            "GPT-4 Turbo",
            "OpenAI GPT-4 Turbo via OpenRouter",
        )
        .with_context_window(128_000),
        ModelDescriptor::chat(
            "openai/gpt-3.5-turbo",
            "GPT-3.5 Turbo",
            "OpenAI GPT-3.5 Turbo via OpenRouter",
        )
        .with_context_window(16_384),
        ModelDescriptor::chat(
            "meta-llama/llama-3-70b-instruct",
            "Llama 3 70B Instruct",
            "Meta Llama 3 70B instruction model",
        )
        .with_context_window(8192),
        ModelDescriptor::chat("mistralai/mistral-large", "Mistral Large", "Mistral AI large model")
            .with_context_window(32_768),
        ModelDescriptor::chat("google/gemini-pro", "Gemini Pro", "Google Gemini Pro model")
            .with_context_window(30_720),
        ModelDescriptor::new(
            "stability-ai/stable-diffusion-xl",
            "Stable Diffusion XL",
            "Stability AI image generation",
            ModelKind::Image,
        ),
    ]
}

/// OpenRouter API provider
pub struct OpenRouterProvider {
    client: ProviderClient,
    models: Vec<ModelDescriptor>,
}

impl OpenRouterProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ApiError> {
        Ok(Self {
            client: ProviderClient::new(config)?,
            models: models(),
        })
    }

    fn headers(&self) -> Result<Headers, ApiError> {
        let config = self.client.config();
        let mut headers = self.client.bearer_headers()?;

        if let Some(site_url) = config.setting_str("site_url") {
            headers.push(("HTTP-Referer", site_url.to_string()));
        }
        if let Some(app_name) = config.setting_str("app_name") {
            headers.push(("X-Title", app_name.to_string()));
        }

        Ok(headers)
    }

    fn build_chat_request(&self, args: &ChatArgs, model: &ModelDescriptor) -> Value {
        // Sampling values are forwarded untouched; the routed upstream validates them
        let route = args
            .route
            .as_deref()
            .or_else(|| self.client.config().setting_str("route"))
            .unwrap_or(DEFAULT_ROUTE);

        let mut body = json!({
            "model": model.id,
            "messages": openai_compat::wire_messages(args.system.as_deref(), &args.messages),
            "max_tokens": args.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": args.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            "stream": false,
            "route": route,
        });

        insert_opt(&mut body, "top_p", args.top_p);
        insert_opt(&mut body, "frequency_penalty", args.frequency_penalty);
        insert_opt(&mut body, "presence_penalty", args.presence_penalty);
        insert_opt(&mut body, "stop", args.stop.clone());
        insert_opt(&mut body, "provider", args.provider_routing.clone());
        openai_compat::insert_functions(&mut body, args);

        body
    }

    /// Fetch the live model catalogue, falling back to the built-in table on any failure
    pub async fn fetch_models(&self) -> Vec<ModelDescriptor> {
        let headers = match self.headers() {
            Ok(headers) => headers,
            Err(_) => return self.models.clone(),
        };

        match self.client.get_json("models", headers).await {
            Ok(json) => {
                let fetched = parse_catalogue(&json);
                if fetched.is_empty() {
                    self.models.clone()
                } else {
                    fetched
                }
            }
            Err(e) => {
                warn!("Failed to fetch OpenRouter models: {}", e);
                self.models.clone()
            }
        }
    }
}

fn parse_catalogue(json: &Value) -> Vec<ModelDescriptor> {
    let Some(entries) = json["data"].as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let id = entry["id"].as_str()?;
            let mut model = ModelDescriptor::chat(
                id,
                entry["name"].as_str().unwrap_or(id),
                entry["description"].as_str().unwrap_or(""),
            );

            if let Some(ctx) = entry["context_length"].as_u64() {
                model = model.with_context_window(ctx as u32);
            }

            // Prices arrive as decimal strings per token
            let price = |key: &str| -> Option<f64> {
                match &entry["pricing"][key] {
                    Value::String(s) => s.parse().ok(),
                    other => other.as_f64(),
                }
            };
            if let (Some(input), Some(output)) = (price("prompt"), price("completion")) {
                model.pricing = Some(Pricing {
                    input_per_token: input,
                    output_per_token: output,
                });
            }

            Some(model)
        })
        .collect()
}

#[async_trait]
impl AiProvider for OpenRouterProvider {
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
            images: true,
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

        let body = self.build_chat_request(&args, model);
        let json = self
            .client
            .post_json("chat/completions", self.headers()?, &body)
            .await?;

        openai_compat::parse_chat(json, model)
    }

    async fn complete(&self, args: CompletionArgs) -> Result<CompletionResult, ApiError> {
        if args.prompt.trim().is_empty() {
            return Err(ApiError::EmptyInput("prompt"));
        }

        self.chat(args.into_chat()).await.map(CompletionResult::from)
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

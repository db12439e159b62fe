//! Unified response structures returned by every provider

use super::{Pricing, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub input_tokens: u32,
    /// Tokens in the response
    pub output_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
    /// Estimated cost in USD (if pricing is known)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost_usd: Option<f64>,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
            estimated_cost_usd: None,
        }
    }

    /// Counts as reported in a vendor envelope; oversized values saturate
    pub fn from_counts(input_tokens: Option<u64>, output_tokens: Option<u64>) -> Self {
        let clamp = |n: Option<u64>| u32::try_from(n.unwrap_or(0)).unwrap_or(u32::MAX);
        Self::new(clamp(input_tokens), clamp(output_tokens))
    }

    pub fn with_cost(mut self, pricing: Option<&Pricing>) -> Self {
        self.estimated_cost_usd = pricing.map(|p| p.cost(self.input_tokens, self.output_tokens));
        self
    }
}

/// Result of a chat call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub role: Role,
    /// Function the model asked to call, as returned by the vendor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<serde_json::Value>,
    pub finish_reason: Option<String>,
    pub usage: TokenUsage,
    pub model_id: String,
    /// Unix timestamp (seconds)
    pub created_at: i64,
    pub id: Option<String>,
}

/// Result of a text completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub text: String,
    pub finish_reason: Option<String>,
    pub usage: TokenUsage,
    pub model_id: String,
    pub created_at: i64,
    pub id: Option<String>,
}

impl From<ChatResult> for CompletionResult {
    fn from(chat: ChatResult) -> Self {
        Self {
            text: chat.content,
            finish_reason: chat.finish_reason,
            usage: chat.usage,
            model_id: chat.model_id,
            created_at: chat.created_at,
            id: chat.id,
        }
    }
}

/// Result of an embedding call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub vector: Vec<f32>,
    pub index: u32,
    pub usage: TokenUsage,
    pub model_id: String,
}

/// A single generated image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedImage {
    Url {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        revised_prompt: Option<String>,
    },
    B64Json {
        b64_json: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        revised_prompt: Option<String>,
    },
}

/// Result of an image generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    pub images: Vec<GeneratedImage>,
    pub created_at: i64,
}

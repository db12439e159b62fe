//! Static model descriptors and per-token pricing

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Chat,
    Completion,
    Embedding,
    Image,
}

/// Cost in USD per token
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_token: f64,
    pub output_per_token: f64,
}

impl Pricing {
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        input_tokens as f64 * self.input_per_token + output_tokens as f64 * self.output_per_token
    }
}

/// A model an adapter knows how to call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: ModelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Output vector size (embedding models)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
}

impl ModelDescriptor {
    pub fn new(id: &str, name: &str, description: &str, kind: ModelKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            kind,
            context_window: None,
            max_output_tokens: None,
            dimensions: None,
            pricing: None,
        }
    }

    pub fn chat(id: &str, name: &str, description: &str) -> Self {
        Self::new(id, name, description, ModelKind::Chat)
    }

    pub fn with_limits(mut self, context_window: u32, max_output_tokens: u32) -> Self {
        self.context_window = Some(context_window);
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn with_context_window(mut self, context_window: u32) -> Self {
        self.context_window = Some(context_window);
        self
    }

    pub fn with_dimensions(mut self, dimensions: u32) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_pricing(mut self, input_per_token: f64, output_per_token: f64) -> Self {
        self.pricing = Some(Pricing {
            input_per_token,
            output_per_token,
        });
        self
    }

    /// Clamp a requested output budget to what the model allows
    pub fn cap_output_tokens(&self, requested: u32) -> u32 {
        match self.max_output_tokens {
            Some(max) => requested.min(max),
            None => requested,
        }
    }
}

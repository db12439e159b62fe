//! ai_gateway - One request contract over many AI providers
//!
//! This library puts chat, completion, embedding and image generation from
//! several vendors behind a single request/response shape.
//!
//! ## Key Features
//!
//! - **Provider Adapters**: OpenAI, Anthropic, OpenRouter and Together AI behind one trait
//! - **Provider Registry**: Adapters built from configuration and selected by name
//! - **Request Gateway**: Capability checks, rate limiting and HTTP-style status mapping
//! - **Usage Tracking**: Per-call usage records with per-provider totals

pub mod api;
pub mod config;
pub mod gateway;
pub mod metrics;
pub mod ratelimit;
pub mod registry;
pub mod tui;

pub use api::{
    AiProvider, ApiError, Capabilities, ChatArgs, ChatMessage, ChatResult, CompletionArgs,
    CompletionResult, EmbedArgs, EmbeddingResult, ImageArgs, ImageResult, ModelDescriptor,
    Operation, ProviderConfig, ProviderKind, Role, TokenUsage,
};
pub use config::{Config, ConfigBuilder, ConfigError, ProviderSettings};
pub use gateway::{
    Caller, ChatRequest, CompletionRequest, EmbedRequest, GatewayResponse, GatewaySettings,
    ImageRequest, RequestGateway,
};
pub use metrics::{UsageRecord, UsageSink, UsageStatus, UsageSummary, UsageTracker};
pub use ratelimit::{RateLimitConfig, RateLimiter};
pub use registry::ProviderRegistry;

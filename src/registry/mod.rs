//! Named collection of provider adapters

use crate::api::{
    AiProvider, ApiError, ChatArgs, ChatResult, CompletionArgs, CompletionResult, EmbedArgs,
    EmbeddingResult, ImageArgs, ImageResult,
};
use crate::config::{Config, ConfigError};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Registry of adapters keyed by provider name
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn AiProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration, then instantiate every configured provider
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = Self::new();

        for (name, settings) in &config.providers {
            let provider = settings
                .kind
                .build(settings.to_provider_config(name))
                .map_err(|e| {
                    ConfigError::InvalidValue(format!("provider '{}': {}", name, e))
                })?;
            registry.register(name, provider);
        }

        info!(
            "Registered {} providers ({} active)",
            registry.len(),
            registry.active().len()
        );
        Ok(registry)
    }

    /// Add or replace an adapter
    pub fn register(&self, name: impl Into<String>, provider: Arc<dyn AiProvider>) {
        let name = name.into();
        debug!(provider = %name, "registering provider");
        self.write().insert(name, provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AiProvider>> {
        self.read().get(name).cloned()
    }

    /// Adapters with a configured API key, sorted by name
    pub fn active(&self) -> Vec<Arc<dyn AiProvider>> {
        let providers = self.read();
        let mut active: Vec<_> = providers
            .iter()
            .filter(|(_, p)| p.is_active())
            .collect();
        active.sort_by(|a, b| a.0.cmp(b.0));
        active.into_iter().map(|(_, p)| Arc::clone(p)).collect()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Adapter for `name`, or `InvalidProvider`
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn AiProvider>, ApiError> {
        self.get(name)
            .ok_or_else(|| ApiError::InvalidProvider(name.to_string()))
    }

    pub async fn chat(&self, provider: &str, args: ChatArgs) -> Result<ChatResult, ApiError> {
        self.resolve(provider)?.chat(args).await
    }

    pub async fn complete(
        &self,
        provider: &str,
        args: CompletionArgs,
    ) -> Result<CompletionResult, ApiError> {
        self.resolve(provider)?.complete(args).await
    }

    pub async fn embed(
        &self,
        provider: &str,
        text: &str,
        args: EmbedArgs,
    ) -> Result<EmbeddingResult, ApiError> {
        self.resolve(provider)?.embed(text, args).await
    }

    pub async fn generate_image(
        &self,
        provider: &str,
        args: ImageArgs,
    ) -> Result<ImageResult, ApiError> {
        self.resolve(provider)?.generate_image(args).await
    }

    // Entries are only ever inserted whole, so a poisoned lock still holds a usable map
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<dyn AiProvider>>> {
        self.providers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<dyn AiProvider>>> {
        self.providers.write().unwrap_or_else(|e| e.into_inner())
    }
}

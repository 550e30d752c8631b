//! LLM Router
//!
//! Tries the configured default provider first and fails over to the others
//! in registration order. Each attempt runs under the configured timeout.
//! The router is itself an [`LLMProvider`], so the conductor never knows how
//! many backends sit behind it.

use super::anthropic::AnthropicProvider;
use super::ollama::OllamaProvider;
use super::openai::OpenAIProvider;
use super::{LLMError, LLMProvider, Message};
use crate::config::LLMConfig;
use crate::secrets::SecretCache;
use sdk::errors::EngineError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// LLM Router with ordered failover
pub struct LLMRouter {
    providers: Vec<Box<dyn LLMProvider>>,
    default_provider: String,
    timeout: Duration,
}

impl LLMRouter {
    /// Create a new LLM router
    ///
    /// # Arguments
    /// * `providers` - Available providers, in fallback order
    /// * `default_provider` - Name of the provider to try first
    /// * `timeout` - Budget for a single provider attempt
    pub fn new(
        providers: Vec<Box<dyn LLMProvider>>,
        default_provider: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            providers,
            default_provider: default_provider.into(),
            timeout,
        }
    }

    /// Build the router with every provider the configuration describes
    pub fn from_config(
        config: &LLMConfig,
        secret_cache: Arc<SecretCache>,
    ) -> Result<Self, EngineError> {
        let timeout = config.timeout();
        let providers: Vec<Box<dyn LLMProvider>> = vec![
            Box::new(OllamaProvider::from_config(&config.ollama, timeout)?),
            Box::new(OpenAIProvider::new(
                config.openai.clone(),
                Arc::clone(&secret_cache),
                timeout,
            )?),
            Box::new(AnthropicProvider::new(
                config.anthropic.clone(),
                secret_cache,
                timeout,
            )?),
        ];
        Ok(Self::new(providers, &config.default_provider, timeout))
    }

    /// Providers in the order they will be attempted
    pub fn ordered_providers(&self) -> Vec<&dyn LLMProvider> {
        let mut providers: Vec<&dyn LLMProvider> =
            self.providers.iter().map(|b| b.as_ref()).collect();
        // Stable sort keeps registration order among the fallbacks
        providers.sort_by_key(|p| p.name() != self.default_provider);
        providers
    }

    /// Call LLM providers with automatic failover
    ///
    /// Returns the reply and the name of the provider that produced it.
    pub async fn call(&self, messages: &[Message]) -> super::Result<(String, String)> {
        if self.providers.is_empty() {
            return Err(LLMError::ProviderUnavailable(
                "No LLM providers configured".to_string(),
            ));
        }

        let mut failures = Vec::new();
        for provider in self.ordered_providers() {
            tracing::debug!(
                "Attempting provider: {} (timeout: {}s)",
                provider.name(),
                self.timeout.as_secs()
            );

            let result = tokio::time::timeout(self.timeout, provider.generate(messages)).await;

            match result {
                Ok(Ok(response)) => {
                    tracing::info!("Provider {} succeeded", provider.name());
                    return Ok((response, provider.name().to_string()));
                }
                Ok(Err(e)) => {
                    tracing::warn!("Provider {} failed: {}", provider.name(), e);
                    failures.push(e);
                }
                Err(_) => {
                    tracing::warn!(
                        "Provider {} timed out after {}s",
                        provider.name(),
                        self.timeout.as_secs()
                    );
                    failures.push(LLMError::Timeout);
                }
            }
        }

        tracing::error!("All LLM providers exhausted");
        // A lone provider keeps its own error so the code survives
        if failures.len() == 1 {
            if let Some(only) = failures.pop() {
                return Err(only);
            }
        }
        let summary = failures
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Err(LLMError::ProviderUnavailable(format!(
            "All LLM providers failed: {}",
            summary
        )))
    }

    /// Check the health of all registered providers
    /// Returns a list of (provider_name, is_healthy)
    pub async fn check_health_all(&self) -> Vec<(String, bool)> {
        let mut results = Vec::new();
        for provider in &self.providers {
            let is_healthy = provider.check_health().await;
            results.push((provider.name().to_string(), is_healthy));
        }
        results
    }
}

#[async_trait]
impl LLMProvider for LLMRouter {
    fn name(&self) -> &str {
        "router"
    }

    fn is_local(&self) -> bool {
        self.providers.iter().all(|p| p.is_local())
    }

    async fn generate(&self, messages: &[Message]) -> super::Result<String> {
        self.call(messages).await.map(|(reply, _)| reply)
    }

    async fn check_health(&self) -> bool {
        for provider in &self.providers {
            if provider.check_health().await {
                return true;
            }
        }
        false
    }
}

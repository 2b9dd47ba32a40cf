//! Provider registry and composite model resolution.
//!
//! Providers are registered once at startup and kept in registration order;
//! that order defines how model listings are concatenated. Clients address
//! models with composite ids of the form `provider:model`, split at the
//! first separator so provider-local names may themselves contain `:`.

use anyhow::bail;
use chrono::Utc;
use std::sync::Arc;

use crate::api::models::{ModelInfo, ModelList};
use crate::core::config::{AppConfig, ProviderKind};
use crate::core::error::{GatewayError, Result};
use crate::services::echo::EchoProvider;
use crate::services::openai::OpenAiProvider;
use crate::services::provider::ChatProvider;

/// Separator between the provider name and the provider-local model name.
pub const MODEL_SEPARATOR: char = ':';

#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry {
            providers: Vec::new(),
        }
    }

    /// Register a provider. Names must be unique; the first registration of
    /// a name wins and later duplicates are a configuration error.
    pub fn register(&mut self, provider: Arc<dyn ChatProvider>) -> anyhow::Result<()> {
        if self.providers.iter().any(|p| p.name() == provider.name()) {
            bail!("provider '{}' is already registered", provider.name());
        }
        self.providers.push(provider);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn providers(&self) -> &[Arc<dyn ChatProvider>] {
        &self.providers
    }

    /// Resolve a composite model id to its provider and provider-local name.
    ///
    /// The id is split at the first separator only. Ids without a separator
    /// carry no provider prefix and are rejected the same way as ids naming
    /// an unregistered provider.
    pub fn resolve(&self, model_id: &str) -> Result<(Arc<dyn ChatProvider>, String)> {
        let (provider_name, model_name) = model_id
            .split_once(MODEL_SEPARATOR)
            .ok_or_else(|| GatewayError::UnknownProvider(model_id.to_string()))?;

        let provider = self
            .find(provider_name)
            .ok_or_else(|| GatewayError::UnknownProvider(provider_name.to_string()))?;

        Ok((Arc::clone(provider), model_name.to_string()))
    }

    pub fn find(&self, name: &str) -> Option<&Arc<dyn ChatProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// Collect model listings from every provider, in registration order.
    ///
    /// A provider that fails to list is skipped with a warning so one broken
    /// upstream cannot hide the rest. Only when every provider fails does the
    /// whole listing fail.
    pub async fn aggregate_models(&self) -> Result<ModelList> {
        let mut data = Vec::new();
        let mut failures = 0usize;
        let created = Utc::now().timestamp();

        for provider in &self.providers {
            match provider.list_models().await {
                Ok(models) => {
                    for model in models {
                        data.push(ModelInfo {
                            id: format!("{}{}{}", provider.name(), MODEL_SEPARATOR, model),
                            object: "model".to_string(),
                            created,
                            owned_by: provider.name().to_string(),
                        });
                    }
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        provider = %provider.name(),
                        error = %e,
                        "Provider failed to list models, skipping"
                    );
                }
            }
        }

        if failures > 0 && failures == self.providers.len() {
            return Err(GatewayError::ProviderUnavailable(
                "no provider could list models".to_string(),
            ));
        }

        Ok(ModelList {
            object: "list".to_string(),
            data,
        })
    }

    /// Log registered providers at startup.
    pub fn log_providers(&self) {
        tracing::info!("Starting LLM gateway with {} providers", self.providers.len());
        for provider in &self.providers {
            tracing::info!("  - {}: type={}", provider.name(), provider.kind());
        }
    }
}

/// Build the registry from configuration, registering providers in the
/// order they appear in the config file.
pub fn build_registry(
    config: &AppConfig,
    client: reqwest::Client,
) -> anyhow::Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();

    for provider_config in &config.providers {
        let provider: Arc<dyn ChatProvider> = match provider_config.kind {
            ProviderKind::Echo => Arc::new(EchoProvider::new(
                provider_config.name.clone(),
                provider_config.models.clone(),
            )),
            ProviderKind::Openai => {
                let base_url = provider_config.base_url.as_deref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "provider '{}': base_url is required for openai providers",
                        provider_config.name
                    )
                })?;
                Arc::new(OpenAiProvider::new(
                    provider_config.name.clone(),
                    base_url,
                    provider_config.api_key.clone(),
                    provider_config.models.clone(),
                    client.clone(),
                ))
            }
        };
        registry.register(provider)?;
    }

    Ok(registry)
}

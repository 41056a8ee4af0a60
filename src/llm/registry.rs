use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, LlmConfig, ProviderEntry};
use crate::errors::{GridPilotError, GridPilotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::anthropic::AnthropicProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

/// Registry of all available LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> GridPilotResult<Arc<dyn LlmProvider>> {
        self.providers.get(&self.active).cloned().ok_or_else(|| {
            GridPilotError::Config(format!(
                "active provider '{}' has no usable credentials",
                self.active
            ))
        })
    }

    /// Provider and call configuration for the vision role.
    ///
    /// Resolution order:
    /// 1. `[llm.roles.vision]` in config.toml
    /// 2. Fallback: active provider with its default model / temperature, no streaming
    pub fn vision(&self) -> GridPilotResult<(Arc<dyn LlmProvider>, CallConfig)> {
        if let Some(entry) = self.llm_config.roles.vision.as_ref() {
            let provider = self.providers.get(&entry.provider).cloned().ok_or_else(|| {
                GridPilotError::Config(format!(
                    "vision role references provider '{}' which is unknown or has no credentials",
                    entry.provider
                ))
            })?;
            let defaults = self.llm_config.providers.get(&entry.provider);
            let temperature = entry
                .temperature
                .or_else(|| defaults.map(|p| p.temperature))
                .unwrap_or(0.1);
            let max_tokens = defaults.map(|p| p.max_tokens).unwrap_or(1000);
            tracing::debug!(
                provider = %entry.provider,
                model = %entry.model,
                stream = entry.stream,
                temperature,
                "resolved vision role"
            );
            return Ok((
                provider,
                CallConfig {
                    model: entry.model.clone(),
                    stream: entry.stream,
                    temperature,
                    max_tokens,
                },
            ));
        }

        let provider = self.get_active()?;
        let entry = self.llm_config.providers.get(&self.active);
        let (model, temperature, max_tokens) = entry
            .map(|p| (p.model.clone(), p.temperature, p.max_tokens))
            .unwrap_or_else(|| (String::new(), 0.1, 1000));
        tracing::debug!(
            provider = %self.active,
            model = %model,
            "vision role not configured, using active provider"
        );
        Ok((
            provider,
            CallConfig {
                model,
                stream: false,
                temperature,
                max_tokens,
            },
        ))
    }

    /// Build a registry from the loaded config, reading credentials from the process environment.
    pub fn from_config(config: &AppConfig) -> GridPilotResult<Self> {
        Self::from_config_with_env(config, |name| std::env::var(name).ok())
    }

    /// Providers without a credential are left out; the vision role must still resolve.
    pub fn from_config_with_env(
        config: &AppConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> GridPilotResult<Self> {
        let mut registry = Self {
            providers: HashMap::new(),
            active: config.llm.active_provider.clone(),
            llm_config: config.llm.clone(),
        };

        for (id, entry) in &config.llm.providers {
            let Some(api_key) = resolve_api_key(id, entry, &env) else {
                tracing::debug!(provider = %id, "no API key, provider not registered");
                continue;
            };
            let client = http_client(entry)?;
            let provider: Arc<dyn LlmProvider> = match entry.adapter.as_deref() {
                Some("anthropic") => Arc::new(AnthropicProvider::new(
                    id.clone(),
                    entry.api_base.clone(),
                    api_key,
                    client,
                )),
                None | Some("openai") => Arc::new(OpenAiCompatibleProvider::new(
                    id.clone(),
                    entry.api_base.clone(),
                    api_key,
                    client,
                )),
                Some(other) => {
                    return Err(GridPilotError::Config(format!(
                        "provider '{id}' uses unknown adapter '{other}'"
                    )));
                }
            };
            registry.register(provider);
        }

        if let Err(e) = registry.vision() {
            let id = config
                .llm
                .roles
                .vision
                .as_ref()
                .map(|r| r.provider.as_str())
                .unwrap_or(config.llm.active_provider.as_str());
            return Err(GridPilotError::Config(format!(
                "{e}; set {} or api_key in config.toml",
                env_key_name(id)
            )));
        }
        Ok(registry)
    }
}

fn env_key_name(id: &str) -> String {
    format!("GRIDPILOT_{}_API_KEY", id.to_uppercase().replace('-', "_"))
}

fn resolve_api_key(
    id: &str,
    entry: &ProviderEntry,
    env: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env(&env_key_name(id))
        .or_else(|| entry.api_key.clone())
        .or_else(|| match entry.adapter.as_deref() {
            Some("anthropic") => env("ANTHROPIC_API_KEY"),
            _ => None,
        })
        .filter(|k| !k.trim().is_empty())
}

fn http_client(entry: &ProviderEntry) -> GridPilotResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(proxy) = entry.proxy.as_deref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }
    if let Some(secs) = entry.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}

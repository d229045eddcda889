//! Unified OpenAI-compatible text generator.
//!
//! A single struct that handles chat completions for every OpenAI-compatible
//! API. Providers differ only by endpoint URL, auth style and API key.

use async_trait::async_trait;
use serde_json::{Value, json};
use tedclub_core::config::LlmConfig;
use tedclub_core::error::{Result, TedClubError};
use tedclub_core::traits::TextGenerator;

use crate::provider_registry::{AuthStyle, ProviderConfig};

/// A generator that works with any OpenAI-compatible API.
pub struct OpenAiCompatibleGenerator {
    /// Provider name (e.g., "deepseek", "ollama").
    name: String,
    api_key: String,
    /// Base URL for the API (e.g., "https://api.deepseek.com/v1").
    base_url: String,
    chat_path: String,
    auth_style: AuthStyle,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatibleGenerator {
    /// Create from a known provider config + `[llm]` section.
    ///
    /// Resolution order:
    /// - API key: `llm.api_key` > env vars > empty
    /// - Base URL: `llm.endpoint` > env override > registry default
    pub fn from_registry(registry: &ProviderConfig, config: &LlmConfig) -> Result<Self> {
        let api_key = if !config.api_key.is_empty() {
            config.api_key.clone()
        } else {
            registry
                .env_keys
                .iter()
                .find_map(|key| std::env::var(key).ok())
                .unwrap_or_default()
        };

        let base_url = if !config.endpoint.is_empty() {
            config.endpoint.trim_end_matches('/').to_string()
        } else {
            registry
                .base_url_env
                .and_then(|env_key| {
                    let val = std::env::var(env_key).ok()?;
                    // OLLAMA_HOST is usually given without /v1
                    if val.ends_with("/v1") {
                        Some(val)
                    } else {
                        Some(format!("{}/v1", val.trim_end_matches('/')))
                    }
                })
                .unwrap_or_else(|| registry.base_url.to_string())
        };

        let model = if config.model.is_empty() {
            registry.default_model.to_string()
        } else {
            config.model.clone()
        };

        Ok(Self {
            name: registry.name.to_string(),
            api_key,
            base_url,
            chat_path: registry.chat_path.to_string(),
            auth_style: registry.auth_style,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: reqwest::Client::new(),
        })
    }

    /// Create for a custom endpoint (e.g., "custom:http://my-server:8000/v1").
    pub fn custom(endpoint: &str, config: &LlmConfig) -> Result<Self> {
        let base_url = endpoint
            .strip_prefix("custom:")
            .unwrap_or(endpoint)
            .trim_end_matches('/')
            .to_string();
        if base_url.is_empty() {
            return Err(TedClubError::Config(
                "custom provider needs a base URL, e.g. custom:http://host:8000/v1".into(),
            ));
        }

        let api_key = if !config.api_key.is_empty() {
            config.api_key.clone()
        } else {
            std::env::var("CUSTOM_API_KEY").unwrap_or_default()
        };
        let auth_style = if api_key.is_empty() {
            AuthStyle::None
        } else {
            AuthStyle::Bearer
        };

        Ok(Self {
            name: "custom".to_string(),
            api_key,
            base_url,
            chat_path: "/chat/completions".to_string(),
            auth_style,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_style {
            AuthStyle::Bearer if !self.api_key.is_empty() => {
                req.header("Authorization", format!("Bearer {}", self.api_key))
            }
            _ => req,
        }
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

/// Pull `choices[0].message.content` out of a completion response.
pub(crate) fn parse_completion(provider: &str, json: &Value) -> Result<String> {
    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| TedClubError::Provider(format!("{provider}: no choices in response")))?;
    let content = choice["message"]["content"].as_str().ok_or_else(|| {
        TedClubError::Provider(format!("{provider}: response has no message content"))
    })?;
    Ok(content.trim().to_string())
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        if self.auth_style != AuthStyle::None && self.api_key.is_empty() {
            return Err(TedClubError::ApiKeyMissing(self.name.clone()));
        }

        let url = format!("{}{}", self.base_url, self.chat_path);
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt));
        let req = self.apply_auth(req);

        let resp = req.send().await.map_err(|e| {
            TedClubError::Http(format!("{} connection failed ({}): {}", self.name, url, e))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(TedClubError::Provider(format!(
                "{} API error {}: {}",
                self.name, status, text
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| TedClubError::Http(e.to_string()))?;
        let content = parse_completion(&self.name, &json)?;
        tracing::debug!("🧠 {} generated {} chars", self.name, content.len());
        Ok(content)
    }
}

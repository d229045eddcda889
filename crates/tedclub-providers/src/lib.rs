//! # TedClub Providers
//!
//! Adapters for the content-search and text-generation collaborators.
//!
//! Every OpenAI-compatible chat endpoint (DeepSeek, OpenAI, Ollama, custom
//! servers) is served by a single `OpenAiCompatibleGenerator`; talks come
//! from `TedSearch`.

pub mod openai_compatible;
pub mod provider_registry;
pub mod ted;

use tedclub_core::config::LlmConfig;
use tedclub_core::error::{Result, TedClubError};
use tedclub_core::traits::TextGenerator;

pub use openai_compatible::OpenAiCompatibleGenerator;
pub use ted::TedSearch;

/// Create a text generator from the `[llm]` section.
pub fn create_generator(config: &LlmConfig) -> Result<Box<dyn TextGenerator>> {
    let name = config.provider.as_str();
    if name.starts_with("custom:") {
        return Ok(Box::new(OpenAiCompatibleGenerator::custom(name, config)?));
    }
    let registry = provider_registry::get_provider_config(name)
        .ok_or_else(|| TedClubError::ProviderNotFound(name.into()))?;
    Ok(Box::new(OpenAiCompatibleGenerator::from_registry(
        registry, config,
    )?))
}

/// List all available provider names.
pub fn available_providers() -> Vec<&'static str> {
    let mut names = provider_registry::all_provider_names();
    names.push("custom");
    names
}

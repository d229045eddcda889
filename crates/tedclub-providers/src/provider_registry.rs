//! Provider registry: maps provider names to endpoint configurations.
//!
//! The unified `OpenAiCompatibleGenerator` uses these entries to talk to any
//! chat-completions server.

/// How to attach auth credentials to requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// No authentication required (local servers).
    None,
}

/// Configuration for a single provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider identifier.
    pub name: &'static str,
    /// Base URL for the API.
    pub base_url: &'static str,
    /// Path for chat completions endpoint (appended to base_url).
    pub chat_path: &'static str,
    /// Environment variable names to try for the API key (in order).
    pub env_keys: &'static [&'static str],
    pub auth_style: AuthStyle,
    /// Environment variable to override the base URL (e.g., OLLAMA_HOST).
    pub base_url_env: Option<&'static str>,
    /// Model used when `[llm] model` is empty.
    pub default_model: &'static str,
}

static PROVIDERS: &[ProviderConfig] = &[
    ProviderConfig {
        name: "deepseek",
        base_url: "https://api.deepseek.com/v1",
        chat_path: "/chat/completions",
        env_keys: &["DEEPSEEK_APIKEY", "DEEPSEEK_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: None,
        default_model: "deepseek-chat",
    },
    ProviderConfig {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        chat_path: "/chat/completions",
        env_keys: &["OPENAI_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: Some("OPENAI_API_BASE"),
        default_model: "gpt-4o-mini",
    },
    ProviderConfig {
        name: "ollama",
        base_url: "http://localhost:11434/v1",
        chat_path: "/chat/completions",
        env_keys: &[],
        auth_style: AuthStyle::None,
        base_url_env: Some("OLLAMA_HOST"),
        default_model: "llama3.2",
    },
];

/// Look up a provider config by name.
pub fn get_provider_config(name: &str) -> Option<&'static ProviderConfig> {
    let lookup = match name {
        "deepseek-chat" => "deepseek",
        "gpt" | "chatgpt" => "openai",
        other => other,
    };
    PROVIDERS.iter().find(|p| p.name == lookup)
}

/// List all known provider names.
pub fn all_provider_names() -> Vec<&'static str> {
    PROVIDERS.iter().map(|p| p.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let deepseek = get_provider_config("deepseek").unwrap();
        assert_eq!(deepseek.auth_style, AuthStyle::Bearer);
        assert_eq!(deepseek.default_model, "deepseek-chat");
        assert_eq!(get_provider_config("chatgpt").unwrap().name, "openai");
        assert_eq!(
            get_provider_config("ollama").unwrap().auth_style,
            AuthStyle::None
        );
        assert!(get_provider_config("brain").is_none());
    }
}

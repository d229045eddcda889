//! TedClub configuration system.
//!
//! Loaded from `~/.tedclub/config.toml` (or an explicit path), then
//! overridden by environment variables so the bot can run from a plain
//! `.env` in a container.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TedClubError};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TedClubConfig {
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ted: TedConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl TedClubConfig {
    /// Load config from the default path, falling back to defaults when the
    /// file does not exist. Environment overrides are applied either way.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific path (no environment overrides).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TedClubError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| TedClubError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Apply process environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (tests inject a map).
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(chat_id) = get("TG_GROUP_ID") {
            self.telegram.chat_id = chat_id.trim().to_string();
        }
        if let Some(topics) = get("TOPIC_LIST") {
            self.workflow.topics = parse_topic_list(&topics);
        }
        if let Some(key) = get("DEEPSEEK_APIKEY") {
            self.llm.api_key = key;
        }
        if let Some(key) = get("TED_APIKEY") {
            self.ted.api_key = key;
        }
        if let Some(path) = get("TEDCLUB_DB") {
            self.store.path = path;
        }
        if let Some(tz) = get("TEDCLUB_TIMEZONE") {
            self.schedule.timezone = tz;
        }
    }

    /// Check everything the bot needs before it may start.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.is_empty() {
            return Err(TedClubError::Config("BOT_TOKEN is required".into()));
        }
        if self.telegram.chat_id.is_empty() {
            return Err(TedClubError::Config("TG_GROUP_ID is required".into()));
        }
        self.telegram.chat_id.parse::<i64>().map_err(|e| {
            TedClubError::Config(format!("invalid TG_GROUP_ID '{}': {e}", self.telegram.chat_id))
        })?;
        if self.workflow.topics.is_empty() {
            return Err(TedClubError::Config("TOPIC_LIST is required".into()));
        }
        if self.ted.api_key.is_empty() {
            return Err(TedClubError::Config("TED_APIKEY is required".into()));
        }
        if self.llm.requires_api_key() && self.llm.api_key.is_empty() {
            return Err(TedClubError::Config(format!(
                "API key for LLM provider '{}' is required (DEEPSEEK_APIKEY)",
                self.llm.provider
            )));
        }
        let wf = &self.workflow;
        if wf.min_duration_secs > wf.max_duration_secs {
            return Err(TedClubError::Config(format!(
                "min_duration_secs ({}) exceeds max_duration_secs ({})",
                wf.min_duration_secs, wf.max_duration_secs
            )));
        }
        // Telegram polls carry 2-10 options.
        if wf.min_candidates < 2 {
            return Err(TedClubError::Config(format!(
                "min_candidates ({}) must be at least 2, a poll needs two options",
                wf.min_candidates
            )));
        }
        if wf.batch_size < 2 {
            return Err(TedClubError::Config(format!(
                "batch_size ({}) must be at least 2, a poll needs two options",
                wf.batch_size
            )));
        }
        if wf.batch_size > 10 {
            return Err(TedClubError::Config(format!(
                "batch_size ({}) exceeds the 10 options a poll can hold",
                wf.batch_size
            )));
        }
        if wf.batch_size < wf.min_candidates {
            tracing::warn!(
                "⚠️ batch_size ({}) is below min_candidates ({}); polls will have {} options",
                wf.batch_size,
                wf.min_candidates,
                wf.batch_size
            );
        }
        if self.schedule.tick_secs == 0 {
            return Err(TedClubError::Config("tick_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the TedClub home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tedclub")
    }
}

/// Split a comma-separated topic list, dropping blanks.
pub fn parse_topic_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Propose-phase parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default = "default_min_duration")]
    pub min_duration_secs: u32,
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u32,
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_min_duration() -> u32 { 600 }
fn default_max_duration() -> u32 { 1200 }
fn default_min_candidates() -> usize { 5 }
fn default_batch_size() -> usize { 6 }

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            topics: Vec::new(),
            min_duration_secs: default_min_duration(),
            max_duration_secs: default_max_duration(),
            min_candidates: default_min_candidates(),
            batch_size: default_batch_size(),
        }
    }
}

/// When each phase fires. Slots use the `"Mon 08:00"` format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// IANA timezone the slots are expressed in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// A task fires on the first tick within this many minutes of its slot.
    #[serde(default = "default_tolerance_mins")]
    pub tolerance_mins: u32,
    #[serde(default = "default_propose")]
    pub propose: String,
    #[serde(default = "default_select")]
    pub select: String,
    #[serde(default = "default_prepare")]
    pub prepare: String,
}

fn default_timezone() -> String { "Europe/Berlin".into() }
fn default_tick_secs() -> u64 { 60 }
fn default_tolerance_mins() -> u32 { 1 }
fn default_propose() -> String { "Mon 08:00".into() }
fn default_select() -> String { "Wed 18:00".into() }
fn default_prepare() -> String { "Sun 12:00".into() }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            tick_secs: default_tick_secs(),
            tolerance_mins: default_tolerance_mins(),
            propose: default_propose(),
            select: default_select(),
            prepare: default_prepare(),
        }
    }
}

/// Text generation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Registry name ("deepseek", "openai", "ollama") or "custom:<base url>".
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    /// Overrides the registry base URL when set.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_provider() -> String { "deepseek".into() }
fn default_llm_model() -> String { "deepseek-chat".into() }
fn default_temperature() -> f32 { 0.7 }
fn default_max_tokens() -> u32 { 512 }

impl LlmConfig {
    /// Local servers run without a key.
    pub fn requires_api_key(&self) -> bool {
        !(self.provider == "ollama" || self.provider.starts_with("custom:"))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key: String::new(),
            endpoint: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// TED talks search API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TedConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_ted_base_url")]
    pub base_url: String,
    #[serde(default = "default_ted_limit")]
    pub limit: u32,
}

fn default_ted_base_url() -> String { "https://api.ted.com/v1".into() }
fn default_ted_limit() -> u32 { 20 }

impl Default for TedConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_ted_base_url(),
            limit: default_ted_limit(),
        }
    }
}

/// Telegram group the club lives in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Group chat id, e.g. "-1001234567890".
    #[serde(default)]
    pub chat_id: String,
}

/// SQLite location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String { "~/.tedclub/tedclub.db".into() }

impl StoreConfig {
    /// Path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

/// Health/status HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn bool_true() -> bool { true }
fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 8080 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

//! Telegram Bot API messenger: polls, announcements and pins in one group.
//!
//! Poll handles are stored as `"<chat_id>:<message_id>"` because `stopPoll`
//! is addressed by the message that carries the poll.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tedclub_core::config::TelegramConfig;
use tedclub_core::error::{Result, TedClubError};
use tedclub_core::traits::Messenger;
use tedclub_core::types::{MessageRef, PollRef, PollTally};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
/// Bot API bounds for a regular poll.
pub const MIN_POLL_OPTIONS: usize = 2;
pub const MAX_POLL_OPTIONS: usize = 10;

/// Telegram messenger bound to a single group chat.
pub struct TelegramMessenger {
    bot_token: String,
    chat_id: i64,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramMessenger {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let chat_id = config.chat_id.trim().parse::<i64>().map_err(|_| {
            TedClubError::Config(format!("invalid Telegram chat id '{}'", config.chat_id))
        })?;
        Ok(Self {
            bot_token: config.bot_token.clone(),
            chat_id,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Point at a self-hosted Bot API server.
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    /// POST a Bot API method and unwrap the `{ok, result, description}` envelope.
    async fn call<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| TedClubError::Channel(format!("Telegram {method} failed: {e}")))?;

        let body: TelegramApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TedClubError::Channel(format!("Invalid {method} response: {e}")))?;
        body.into_result(method)
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn open_poll(&self, question: &str, options: &[String]) -> Result<PollRef> {
        if !(MIN_POLL_OPTIONS..=MAX_POLL_OPTIONS).contains(&options.len()) {
            return Err(TedClubError::Channel(format!(
                "Telegram polls need {MIN_POLL_OPTIONS}-{MAX_POLL_OPTIONS} options, got {}",
                options.len()
            )));
        }
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "question": question,
            "options": options,
            "is_anonymous": false,
            "type": "regular",
        });
        let msg: TelegramMessage = self.call("sendPoll", body).await?;
        let poll_ref = format_poll_ref(msg.chat.id, msg.message_id);
        tracing::info!("🗳️ Poll opened: {}", poll_ref);
        Ok(poll_ref)
    }

    async fn close_poll(&self, poll: &PollRef) -> Result<Vec<PollTally>> {
        let (chat_id, message_id) = parse_poll_ref(poll)?;
        let body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
        });
        let closed: TelegramPoll = self.call("stopPoll", body).await?;
        tracing::info!(
            "🗳️ Poll closed: {} ({} voters)",
            poll,
            closed.total_voter_count
        );
        Ok(closed.tallies())
    }

    async fn send_message(&self, text: &str) -> Result<MessageRef> {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });
        let msg: TelegramMessage = self.call("sendMessage", body).await?;
        Ok(MessageRef(msg.message_id.to_string()))
    }

    async fn pin_message(&self, message: &MessageRef) -> Result<()> {
        let message_id: i64 = message
            .0
            .parse()
            .map_err(|_| TedClubError::Channel(format!("Invalid message ref '{message}'")))?;
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "message_id": message_id,
            "disable_notification": false,
        });
        let _: bool = self.call("pinChatMessage", body).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let body = serde_json::json!({ "chat_id": self.chat_id });
        let chat: TelegramChat = self.call("getChat", body).await?;
        tracing::debug!("Telegram chat reachable: {}", chat.title.as_deref().unwrap_or("?"));
        Ok(())
    }
}

fn format_poll_ref(chat_id: i64, message_id: i64) -> PollRef {
    PollRef(format!("{chat_id}:{message_id}"))
}

fn parse_poll_ref(poll: &PollRef) -> Result<(i64, i64)> {
    let invalid = || TedClubError::Channel(format!("Invalid poll ref '{poll}'"));
    let (chat, message) = poll.0.rsplit_once(':').ok_or_else(invalid)?;
    Ok((
        chat.parse().map_err(|_| invalid())?,
        message.parse().map_err(|_| invalid())?,
    ))
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

impl<T> TelegramApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        if !self.ok {
            return Err(TedClubError::Channel(format!(
                "Telegram {method} error: {}",
                self.description.unwrap_or_default()
            )));
        }
        self.result
            .ok_or_else(|| TedClubError::Channel(format!("Telegram {method} returned no result")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub chat: TelegramChat,
    #[serde(default)]
    pub poll: Option<TelegramPoll>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramPoll {
    pub id: String,
    pub question: String,
    pub options: Vec<TelegramPollOption>,
    #[serde(default)]
    pub total_voter_count: u32,
    #[serde(default)]
    pub is_closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramPollOption {
    pub text: String,
    pub voter_count: u32,
}

impl TelegramPoll {
    /// Options keep the order they were sent in.
    pub fn tallies(&self) -> Vec<PollTally> {
        self.options
            .iter()
            .enumerate()
            .map(|(option_index, o)| PollTally {
                option_index,
                text: o.text.clone(),
                votes: o.voter_count,
            })
            .collect()
    }
}

//! Minimal Telegram Bot API client: `sendMessage` and `getUpdates`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::{Notifier, NotifyError, NotifyResult};
use crate::config::TelegramConfig;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);
/// Slack added on top of the long-poll timeout before the HTTP request gives up.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Clone)]
pub struct TelegramClient {
    http_client: Client,
    /// `{api_url}/bot{token}`, without a trailing slash.
    bot_url: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn from_config(config: &TelegramConfig) -> NotifyResult<Self> {
        Self::new(
            &config.api_url,
            &config.bot_token,
            Duration::from_secs(config.poll_timeout_secs),
        )
    }

    pub fn new(api_url: &str, bot_token: &str, poll_timeout: Duration) -> NotifyResult<Self> {
        let http_client = Client::builder().build()?;

        Ok(Self {
            http_client,
            bot_url: format!("{}/bot{bot_token}", api_url.trim_end_matches('/')),
            poll_timeout,
        })
    }

    /// Long-poll for updates with an id of at least `offset`.
    ///
    /// Returns an empty list when the poll timeout elapses without activity.
    pub async fn get_updates(&self, offset: Option<i64>) -> NotifyResult<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: ["message"],
        };
        self.call("getUpdates", &request, self.poll_timeout + POLL_GRACE)
            .await
    }

    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
        timeout: Duration,
    ) -> NotifyResult<T> {
        let response = self
            .http_client
            .post(format!("{}/{method}", self.bot_url))
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        // Error replies carry a JSON body with `ok: false` and a description.
        let envelope: ApiResponse<T> = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(NotifyError::Api {
                    description: format!("HTTP {status}"),
                });
            }
        };

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(NotifyError::Api {
                description: description.unwrap_or_else(|| format!("{method} failed ({status})")),
            }),
        }
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send_message(&self, chat_id: &str, text: &str) -> NotifyResult<()> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let message: Message = self.call("sendMessage", &request, SEND_TIMEOUT).await?;

        tracing::debug!(
            chat_id = message.chat.id,
            message_id = message.message_id,
            "Sent chat message"
        );
        Ok(())
    }
}

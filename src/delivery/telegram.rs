//! Telegram Bot API: sending messages and long-polling for `/start`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::delivery::{Notifier, NotifyError, OutboundMessage, ParseMode, Trigger, TriggerOrigin};

pub const START_COMMAND: &str = "/start";
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

fn method_url(api_base: &str, token: &str, method: &str) -> String {
    format!("{}/bot{token}/{method}", api_base.trim().trim_end_matches('/'))
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<Value>,
}

impl ApiResponse {
    fn description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| "no description".to_string())
    }
}

async fn call(request: reqwest::RequestBuilder) -> Result<Value, NotifyError> {
    let response = request.send().await.map_err(NotifyError::transport)?;
    let status = response.status();
    if !status.is_success() {
        // error pages from proxies are often not JSON
        let description = response
            .json::<ApiResponse>()
            .await
            .map(|body| body.description())
            .unwrap_or_else(|_| "no description".to_string());
        return Err(NotifyError::Status {
            status: status.as_u16(),
            description,
        });
    }
    let body: ApiResponse = response.json().await.map_err(NotifyError::decode)?;
    if !body.ok {
        return Err(NotifyError::Rejected(body.description()));
    }
    Ok(body.result.unwrap_or(Value::Null))
}

#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl TelegramNotifier {
    pub fn new(client: Client, api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        let body = SendMessageBody {
            chat_id: &message.chat_id,
            text: &message.text,
            parse_mode: match message.parse_mode {
                ParseMode::Html => Some("HTML"),
                ParseMode::Plain => None,
            },
        };
        let url = method_url(&self.api_base, &self.token, "sendMessage");
        call(self.client.post(url).json(&body)).await?;
        debug!(chat_id = %message.chat_id, chars = message.text.chars().count(), "Message delivered");
        Ok(())
    }
}

/// Chat id of a `/start` message, if `update` carries one.
///
/// The command may be addressed to a bot (`/start@sla_bot`) and may carry
/// arguments; anything else is ignored.
pub fn parse_start_command(update: &Value) -> Option<String> {
    let message = update.get("message")?;
    let text = message.get("text")?.as_str()?;
    let command = text.split_whitespace().next()?;
    let name = command.split('@').next()?;
    if name != START_COMMAND {
        return None;
    }
    match message.get("chat")?.get("id")? {
        Value::Number(id) => Some(id.to_string()),
        Value::String(id) => Some(id.clone()),
        _ => None,
    }
}

/// Long-polls `getUpdates` and fires a run for every `/start`
pub struct TelegramCommandListener {
    client: Client,
    api_base: String,
    token: String,
    poll_timeout: Duration,
    offset: Option<u64>,
}

impl TelegramCommandListener {
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        token: impl Into<String>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            token: token.into(),
            poll_timeout,
            offset: None,
        }
    }

    /// Offset of the next update to request
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// Fetch pending updates once and return the chats that sent `/start`
    pub async fn poll_once(&mut self) -> Result<Vec<String>, NotifyError> {
        let url = method_url(&self.api_base, &self.token, "getUpdates");
        let mut query = vec![("timeout", self.poll_timeout.as_secs().to_string())];
        if let Some(offset) = self.offset {
            query.push(("offset", offset.to_string()));
        }
        // Leave room for the long poll itself on top of the client timeout
        let request = self
            .client
            .get(url)
            .query(&query)
            .timeout(self.poll_timeout + Duration::from_secs(10));

        let result = call(request).await?;
        let updates = result
            .as_array()
            .ok_or_else(|| NotifyError::Rejected("getUpdates result is not an array".to_string()))?;

        let mut chats = Vec::new();
        for update in updates {
            if let Some(update_id) = update.get("update_id").and_then(Value::as_u64) {
                let next = update_id.saturating_add(1);
                self.offset = Some(self.offset.map_or(next, |current| current.max(next)));
            }
            if let Some(chat_id) = parse_start_command(update) {
                chats.push(chat_id);
            }
        }
        Ok(chats)
    }

    /// Poll until `shutdown` flips. Each `/start` runs on its own task so a
    /// slow report never stalls polling.
    pub async fn run(mut self, trigger: Arc<dyn Trigger>, mut shutdown: watch::Receiver<bool>) {
        info!("Listening for {START_COMMAND} commands");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                polled = self.poll_once() => match polled {
                    Ok(chats) => {
                        for chat_id in chats {
                            info!(chat_id = %chat_id, "Received {START_COMMAND}");
                            let trigger = Arc::clone(&trigger);
                            tokio::spawn(async move {
                                trigger.fire(TriggerOrigin::Command { chat_id }).await;
                            });
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Polling for updates failed");
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    }
                }
            }
        }
        info!("Command listener stopped");
    }
}

//! Thin Telegram Bot API transport: long polling in, text messages out.
//! Everything the core needs from the chat platform lives behind this one
//! module; the rule engine never sees a transport type.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::handler::{InboundMessage, MessageHandler};

const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_BACKOFF_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    /// Send time, unix seconds (transport clock; the handler stamps its own
    /// receive time).
    pub date: i64,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("advice-patrol/0.1")
            .connect_timeout(Duration::from_secs(4))
            // Long poll plus slack.
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()
            .context("building Telegram HTTP client")?;
        Ok(Self {
            http,
            base: format!("https://api.telegram.org/bot{token}"),
        })
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        #[derive(Serialize)]
        struct Req {
            offset: i64,
            timeout: u64,
            allowed_updates: [&'static str; 1],
        }
        #[derive(Deserialize)]
        struct Resp {
            ok: bool,
            #[serde(default)]
            result: Vec<Update>,
            #[serde(default)]
            description: Option<String>,
        }

        let resp = self
            .http
            .post(format!("{}/getUpdates", self.base))
            .json(&Req {
                offset,
                timeout: POLL_TIMEOUT_SECS,
                allowed_updates: ["message"],
            })
            .send()
            .await
            .context("getUpdates request failed")?;
        let body: Resp = resp.json().await.context("getUpdates response body")?;
        if !body.ok {
            return Err(anyhow!(
                "getUpdates rejected: {}",
                body.description.unwrap_or_default()
            ));
        }
        Ok(body.result)
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        #[derive(Serialize)]
        struct Req<'a> {
            chat_id: i64,
            text: &'a str,
        }

        let resp = self
            .http
            .post(format!("{}/sendMessage", self.base))
            .json(&Req { chat_id, text })
            .send()
            .await
            .context("sendMessage request failed")?;
        resp.error_for_status().context("sendMessage rejected")?;
        Ok(())
    }
}

/// Per-update admission: only text messages with a known sender reach the
/// handler, and only from the allowed chat when one is configured. Decided
/// before classification, so a foreign chat never costs a backend call.
fn admit(
    message: Message,
    allowed_chat: Option<i64>,
    received_at: NaiveDateTime,
) -> Option<InboundMessage> {
    let chat_id = message.chat.id;
    let text = message.text?;
    let from = message.from?;
    if allowed_chat.is_some_and(|id| id != chat_id) {
        debug!(chat_id, "ignoring message outside allowed chat");
        return None;
    }
    Some(InboundMessage {
        user_id: from.id,
        username: from.username.unwrap_or_default(),
        text,
        received_at,
    })
}

/// Long-polling loop: a single logical worker handling one message at a
/// time in arrival order, each to completion before the next update is
/// touched. Transport errors back off and continue; handler errors are
/// logged and never stop the loop.
pub async fn run_polling(
    bot: &TelegramClient,
    handler: &MessageHandler,
    allowed_chat: Option<i64>,
) -> Result<()> {
    let mut offset = 0i64;
    loop {
        let updates = match bot.get_updates(offset).await {
            Ok(updates) => updates,
            Err(error) => {
                warn!(%error, "polling failed, backing off");
                tokio::time::sleep(Duration::from_secs(POLL_BACKOFF_SECS)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            let chat_id = message.chat.id;
            let Some(inbound) = admit(message, allowed_chat, chrono::Local::now().naive_local())
            else {
                continue;
            };
            match handler.handle(&inbound).await {
                Ok(Some(reply)) => {
                    if let Err(error) = bot.send_message(chat_id, &reply).await {
                        warn!(user_id = inbound.user_id, %error, "failed to send reply");
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(user_id = inbound.user_id, %error, "message handling failed");
                }
            }
        }
    }
}

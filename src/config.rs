//! Process configuration, resolved once at startup from the environment
//! (`.env` is loaded by the binary first). Every required variable that is
//! missing is fatal: the bot never starts partially configured.

use std::env;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub openai_api_key: String,
    /// Chat that receives the weekly broadcast.
    pub target_chat_id: i64,
    pub sheet_id: String,
    /// Path to the service-account key JSON for the Sheets ledger.
    pub credentials_path: String,
    /// When set, messages from any other chat are ignored.
    pub allowed_chat_id: Option<i64>,
    /// Classifier model override; defaults to gpt-3.5-turbo.
    pub openai_model: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            telegram_token: require("TELEGRAM_TOKEN")?,
            openai_api_key: require("OPENAI_API_KEY")?,
            target_chat_id: require("TARGET_CHAT_ID")?
                .parse()
                .context("TARGET_CHAT_ID must be an integer chat id")?,
            sheet_id: require("GOOGLE_SHEET_ID")?,
            credentials_path: require("GOOGLE_CREDENTIALS_JSON_PATH")?,
            allowed_chat_id: optional("ALLOWED_CHAT_ID")
                .map(|v| v.parse())
                .transpose()
                .context("ALLOWED_CHAT_ID must be an integer chat id")?,
            openai_model: optional("OPENAI_MODEL"),
        })
    }
}

fn require(name: &str) -> Result<String> {
    // A blank value is as fatal as a missing one.
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("missing required env var {name}"))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

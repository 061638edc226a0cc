//! Advice classifier: provider trait plus the OpenAI-backed implementation.
//!
//! A backend failure must never leak into message handling: [`is_advice`]
//! collapses any error to "not advice", so an unreachable backend degrades
//! the bot to inactivity rather than to wrong penalties.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Boolean advice predicate over one message text. An `Err` means the
/// backend could not answer (transport error, timeout, bad response).
#[async_trait::async_trait]
pub trait AdviceClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<bool>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynClassifier = Arc<dyn AdviceClassifier>;

/// The explicit fail-closed branch: a classifier error reads as "not advice"
/// and is only visible in the logs.
pub async fn is_advice(classifier: &dyn AdviceClassifier, text: &str) -> bool {
    match classifier.classify(text).await {
        Ok(verdict) => verdict,
        Err(error) => {
            warn!(
                provider = classifier.name(),
                %error,
                "classifier call failed, treating message as not advice"
            );
            false
        }
    }
}

const ADVICE_PROMPT: &str = "Look at the message below and say whether it is a piece of advice. \
If unsure, rate from 1 to 5 how strongly it reads as advice and answer Yes when it is advice \
or your rating is 4 or 5; answer No when it is not advice or your rating is below 4. \
Answer with exactly one word: Yes or No.";

/// OpenAI chat-completions classifier.
pub struct OpenAiClassifier {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClassifier {
    pub const DEFAULT_MODEL: &'static str = "gpt-3.5-turbo";

    /// `model_override`: pass Some("gpt-4o-mini") to override the default.
    pub fn new(api_key: String, model_override: Option<&str>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("advice-patrol/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building classifier HTTP client")?;
        Ok(Self {
            http,
            api_key,
            model: model_override.unwrap_or(Self::DEFAULT_MODEL).to_string(),
        })
    }
}

#[async_trait::async_trait]
impl AdviceClassifier for OpenAiClassifier {
    async fn classify(&self, text: &str) -> Result<bool> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let prompt = format!("{ADVICE_PROMPT}\nMessage: \"{text}\"");
        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: &prompt,
            }],
            temperature: 0.2,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("classifier request failed")?;

        if !resp.status().is_success() {
            return Err(anyhow!("classifier backend returned {}", resp.status()));
        }
        let body: Resp = resp.json().await.context("classifier response body")?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.trim().to_lowercase())
            .unwrap_or_default();
        Ok(content.contains("yes"))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Deterministic classifier for tests and dry runs.
pub struct FixedClassifier {
    pub verdict: bool,
}

#[async_trait::async_trait]
impl AdviceClassifier for FixedClassifier {
    async fn classify(&self, _text: &str) -> Result<bool> {
        Ok(self.verdict)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

//! One inbound message, end to end: classify, score, append, reply.
//! Strictly sequential within a message; each step is awaited before the
//! next, no fire-and-forget.

use anyhow::Result;
use chrono::NaiveDateTime;
use metrics::counter;
use tracing::{debug, info};

use crate::classifier::{is_advice, DynClassifier};
use crate::rules::RuleEngine;

/// One user text message as delivered by the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub user_id: i64,
    pub username: String,
    pub text: String,
    pub received_at: NaiveDateTime,
}

pub struct MessageHandler {
    classifier: DynClassifier,
    engine: RuleEngine,
}

impl MessageHandler {
    pub fn new(classifier: DynClassifier, engine: RuleEngine) -> Self {
        Self { classifier, engine }
    }

    /// Handle one message to completion. `Ok(None)` means no reply is owed:
    /// the text was not advice, or the classifier backend failed and the
    /// verdict collapsed to not-advice (no ledger write either way). A
    /// ledger write failure propagates; the caller logs it and the user
    /// receives no confirmation.
    pub async fn handle(&self, msg: &InboundMessage) -> Result<Option<String>> {
        counter!("messages_checked_total").increment(1);
        debug!(user_id = msg.user_id, "checking message");

        if !is_advice(self.classifier.as_ref(), &msg.text).await {
            info!(user_id = msg.user_id, "not recognized as advice");
            return Ok(None);
        }
        counter!("advice_detected_total").increment(1);

        let outcome = self
            .engine
            .classify_and_score(msg.user_id, &msg.username, &msg.text, msg.received_at)
            .await?;
        Ok(Some(outcome.reply_text))
    }
}

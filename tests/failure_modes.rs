// tests/failure_modes.rs
// The error taxonomy from the handler's point of view: classifier failures
// go quiet, ledger failures surface.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;

use advice_patrol::classifier::{AdviceClassifier, FixedClassifier};
use advice_patrol::handler::{InboundMessage, MessageHandler};
use advice_patrol::ledger::{DynLedger, Event, LedgerStore, MemoryLedger, TIMESTAMP_FORMAT};
use advice_patrol::report::ReportGenerator;
use advice_patrol::rules::RuleEngine;

fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).expect("test timestamp")
}

fn msg(text: &str, at: &str) -> InboundMessage {
    InboundMessage {
        user_id: 7,
        username: "ann".to_string(),
        text: text.to_string(),
        received_at: ts(at),
    }
}

struct ExplodingClassifier;

#[async_trait::async_trait]
impl AdviceClassifier for ExplodingClassifier {
    async fn classify(&self, _text: &str) -> Result<bool> {
        Err(anyhow!("backend timed out"))
    }

    fn name(&self) -> &'static str {
        "exploding"
    }
}

/// Scans succeed, appends fail: the store went away mid-handling.
struct ReadOnlyLedger;

#[async_trait::async_trait]
impl LedgerStore for ReadOnlyLedger {
    async fn append(&self, _event: &Event) -> Result<()> {
        Err(anyhow!("store unavailable"))
    }

    async fn scan_all(&self) -> Result<Vec<Event>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "read-only"
    }
}

/// Everything fails: the store is unreachable.
struct UnavailableLedger;

#[async_trait::async_trait]
impl LedgerStore for UnavailableLedger {
    async fn append(&self, _event: &Event) -> Result<()> {
        Err(anyhow!("store unavailable"))
    }

    async fn scan_all(&self) -> Result<Vec<Event>> {
        Err(anyhow!("store unavailable"))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

#[tokio::test]
async fn classifier_failure_means_no_reply_and_no_ledger_row() {
    let ledger: DynLedger = Arc::new(MemoryLedger::new());
    let handler = MessageHandler::new(
        Arc::new(ExplodingClassifier),
        RuleEngine::new(Arc::clone(&ledger)),
    );

    let reply = handler
        .handle(&msg("some advice", "2026-08-25 10:00:00"))
        .await
        .unwrap();

    // Fail-closed: the message is silently ignored, never penalized.
    assert!(reply.is_none());
    assert!(ledger.scan_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn ledger_write_failure_propagates_without_a_reply() {
    let handler = MessageHandler::new(
        Arc::new(FixedClassifier { verdict: true }),
        RuleEngine::new(Arc::new(ReadOnlyLedger)),
    );

    let result = handler.handle(&msg("advice", "2026-08-25 10:00:00")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn ledger_read_failure_aborts_the_stats_scan() {
    let engine = RuleEngine::new(Arc::new(UnavailableLedger));
    let result = engine.weekly_stats(7, ts("2026-08-25 10:00:00")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn ledger_read_failure_aborts_the_report_cycle() {
    let generator = ReportGenerator::new(Arc::new(UnavailableLedger));
    assert!(generator.build_report().await.is_err());
}

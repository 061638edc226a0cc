//! Weekly broadcast report: lifetime-cumulative penalty totals per username,
//! rendered as one fixed-format text message. Pure read plus format; the
//! scheduler owns delivery.

use anyhow::{Context, Result};

use crate::ledger::{DynLedger, Event, LedgerStore};

/// Per-username penalty totals in first-seen insertion order.
///
/// A username with any ledger activity appears even at zero penalties; a
/// username with no rows at all never does. Zero-count entries are retained
/// on purpose: showing a clean slate is part of the game.
pub fn summarize(events: &[Event]) -> Vec<(String, u32)> {
    let mut totals: Vec<(String, u32)> = Vec::new();
    for event in events {
        let add = u32::from(event.penalty);
        match totals.iter_mut().find(|(name, _)| *name == event.username) {
            Some((_, count)) => *count += add,
            None => totals.push((event.username.clone(), add)),
        }
    }
    totals
}

/// Render the broadcast text, or `None` when there is nothing to report.
pub fn render_report(totals: &[(String, u32)]) -> Option<String> {
    if totals.is_empty() {
        return None;
    }
    let mut lines = vec!["📊 Weekly penalty report:\n".to_string()];
    for (username, count) in totals {
        lines.push(format!("@{username} — {count} penalties"));
    }
    lines.push("\nWatch your language. Next Monday is coming up.".to_string());
    Some(lines.join("\n"))
}

/// Scans the full ledger and builds the weekly broadcast.
pub struct ReportGenerator {
    ledger: DynLedger,
}

impl ReportGenerator {
    pub fn new(ledger: DynLedger) -> Self {
        Self { ledger }
    }

    /// Full-ledger scan plus aggregate. `Ok(None)` means an empty ledger and
    /// nothing to send. A read failure propagates; that cycle sends nothing
    /// and the next cycle is unaffected.
    pub async fn build_report(&self) -> Result<Option<String>> {
        let events = self
            .ledger
            .scan_all()
            .await
            .context("weekly report: ledger scan failed")?;
        Ok(render_report(&summarize(&events)))
    }
}

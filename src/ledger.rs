//! Append-only event ledger: the single source of truth for every derived
//! statistic. One `Event` is written per classified advice message and is
//! never mutated or deleted afterwards.
//!
//! The wire row layout is a durable external contract: other tooling reads
//! the same sheet, so column order and cell formats are fixed.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::NaiveDateTime;

/// Cell format for the `timestamp` column, second precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub user_id: i64,
    /// Display handle; may be empty.
    pub username: String,
    pub timestamp: NaiveDateTime,
    /// Original message text, free form.
    pub message: String,
    /// `true` counts against the user; `false` is an accepted Monday advice.
    pub penalty: bool,
}

impl Event {
    /// Encode as the persisted row:
    /// `[user_id, username, "YYYY-MM-DD HH:MM:SS", message, "0"|"1"]`.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.user_id.to_string(),
            self.username.clone(),
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.message.clone(),
            (if self.penalty { "1" } else { "0" }).to_string(),
        ]
    }

    /// Decode one persisted row. Returns `None` for a malformed row (too few
    /// cells, non-numeric user id, unparseable timestamp); scans skip those
    /// rather than abort. Any penalty cell other than `"1"` reads as `false`.
    pub fn from_row(row: &[String]) -> Option<Event> {
        if row.len() < 5 {
            return None;
        }
        let user_id = row[0].trim().parse::<i64>().ok()?;
        let timestamp = NaiveDateTime::parse_from_str(row[2].trim(), TIMESTAMP_FORMAT).ok()?;
        Some(Event {
            user_id,
            username: row[1].clone(),
            timestamp,
            message: row[3].clone(),
            penalty: row[4].trim() == "1",
        })
    }
}

/// Storage seam for the ledger. Implementations must be safe for concurrent
/// append and concurrent full scan; a scan sees a consistent (possibly
/// slightly stale) snapshot.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append(&self, event: &Event) -> Result<()>;
    async fn scan_all(&self) -> Result<Vec<Event>>;
    /// Store name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Trait object alias used by the engine, the report generator and tests.
pub type DynLedger = Arc<dyn LedgerStore>;

/// In-memory ledger for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: Mutex<Vec<Event>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<Event>) -> Self {
        Self {
            inner: Mutex::new(events),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("ledger mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedger {
    async fn append(&self, event: &Event) -> Result<()> {
        self.inner
            .lock()
            .expect("ledger mutex poisoned")
            .push(event.clone());
        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<Event>> {
        Ok(self.inner.lock().expect("ledger mutex poisoned").clone())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

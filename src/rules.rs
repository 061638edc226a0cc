//! # Weekly Rule Engine
//! Pure, testable logic for the Monday game: which day gets a free pass and
//! how per-user weekly counters fall out of the event log. No I/O beyond the
//! injected ledger.
//!
//! Policy: advice on Monday is accepted and counted; advice on any other day
//! records one penalty point. Counters are always re-derived from the full
//! event log, never maintained incrementally.
//!
//! All timestamps are naive process-local time: callers pass
//! `Local::now().naive_local()` and the ledger stores the same wall clock.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime};
use metrics::counter;
use tracing::info;

use crate::ledger::{DynLedger, Event, LedgerStore};

/// This week's counters for one user, derived on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeeklyStats {
    pub penalties: u32,
    pub advices: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Accepted,
    Penalized,
}

/// Result of scoring one already-classified advice message.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub reply_text: String,
}

/// Midnight of the Monday on/before `now` (ISO week, Monday first).
pub fn week_start(now: NaiveDateTime) -> NaiveDateTime {
    let days_into_week = now.weekday().num_days_from_monday() as i64;
    (now.date() - Duration::days(days_into_week)).and_time(NaiveTime::MIN)
}

/// Fold the full event log into this week's counters for one user.
/// Counts events with `week_start(now) <= timestamp <= now`; penalty rows
/// increment `penalties`, accepted rows increment `advices`.
pub fn stats_from_events(events: &[Event], user_id: i64, now: NaiveDateTime) -> WeeklyStats {
    let start = week_start(now);
    let mut stats = WeeklyStats::default();
    for event in events {
        if event.user_id != user_id {
            continue;
        }
        if event.timestamp < start || event.timestamp > now {
            continue;
        }
        if event.penalty {
            stats.penalties += 1;
        } else {
            stats.advices += 1;
        }
    }
    stats
}

/// Scores classified advice messages against the weekly cycle and keeps the
/// ledger as the single authority for all counters.
pub struct RuleEngine {
    ledger: DynLedger,
}

impl RuleEngine {
    pub fn new(ledger: DynLedger) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> DynLedger {
        Arc::clone(&self.ledger)
    }

    /// Exact re-derivation of this week's counters from the authoritative
    /// log. Full scan on every call; a read failure propagates.
    pub async fn weekly_stats(&self, user_id: i64, now: NaiveDateTime) -> Result<WeeklyStats> {
        let events = self
            .ledger
            .scan_all()
            .await
            .context("weekly stats: ledger scan failed")?;
        Ok(stats_from_events(&events, user_id, now))
    }

    /// Decide the outcome of one message already verified to be advice.
    ///
    /// Monday accepts the advice (penalty=0 row); any other day records a
    /// penalty (penalty=1 row). Exactly one row is appended per call. Stats
    /// are computed before the append, so the reply adds one to the counter
    /// the fresh row lands on. A ledger write failure propagates and no
    /// reply text is produced.
    pub async fn classify_and_score(
        &self,
        user_id: i64,
        username: &str,
        text: &str,
        now: NaiveDateTime,
    ) -> Result<Outcome> {
        let stats = self.weekly_stats(user_id, now).await?;
        let monday = now.weekday().num_days_from_monday() == 0;

        let event = Event {
            user_id,
            username: username.to_string(),
            timestamp: now,
            message: text.to_string(),
            penalty: !monday,
        };
        self.ledger
            .append(&event)
            .await
            .context("ledger append failed")?;

        let outcome = if monday {
            counter!("advice_accepted_total").increment(1);
            Outcome {
                kind: OutcomeKind::Accepted,
                reply_text: format!(
                    "It's Monday, so thank you for the advice. \
                     That's advice #{} from you this week.",
                    stats.advices + 1
                ),
            }
        } else {
            counter!("penalties_recorded_total").increment(1);
            Outcome {
                kind: OutcomeKind::Penalized,
                reply_text: format!(
                    "Today is not Monday. That means it's not Advice Day!\n\
                     You get a penalty point.\n\
                     Penalty points this week: {}\n\
                     Advice given this week: {}",
                    stats.penalties + 1,
                    stats.advices
                ),
            }
        };
        info!(user_id, kind = ?outcome.kind, "scored advice message");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MemoryLedger, TIMESTAMP_FORMAT};

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).expect("test timestamp")
    }

    fn event(user_id: i64, at: &str, penalty: bool) -> Event {
        Event {
            user_id,
            username: "ann".to_string(),
            timestamp: ts(at),
            message: "x".to_string(),
            penalty,
        }
    }

    // 2026-08-24 is a Monday.

    #[test]
    fn week_start_is_monday_midnight() {
        assert_eq!(week_start(ts("2026-08-26 15:45:12")), ts("2026-08-24 00:00:00"));
        // Monday maps to itself at midnight.
        assert_eq!(week_start(ts("2026-08-24 00:00:00")), ts("2026-08-24 00:00:00"));
        // Sunday still belongs to the week that started six days earlier.
        assert_eq!(week_start(ts("2026-08-30 23:59:59")), ts("2026-08-24 00:00:00"));
    }

    #[test]
    fn stats_count_only_this_weeks_events_for_the_user() {
        let events = vec![
            // Tuesday this week, penalty.
            event(7, "2026-08-25 12:00:00", true),
            // Tuesday last week, penalty: outside the window.
            event(7, "2026-08-18 12:00:00", true),
            // This week but a different user.
            event(8, "2026-08-25 13:00:00", true),
            // Monday this week, accepted advice.
            event(7, "2026-08-24 09:00:00", false),
        ];
        let stats = stats_from_events(&events, 7, ts("2026-08-26 10:00:00"));
        assert_eq!(stats, WeeklyStats { penalties: 1, advices: 1 });
    }

    #[test]
    fn stats_exclude_events_after_now() {
        let events = vec![event(7, "2026-08-26 18:00:00", true)];
        let stats = stats_from_events(&events, 7, ts("2026-08-26 10:00:00"));
        assert_eq!(stats, WeeklyStats::default());
    }

    #[tokio::test]
    async fn monday_advice_is_accepted_and_appended_without_penalty() {
        let ledger: DynLedger = Arc::new(MemoryLedger::new());
        let engine = RuleEngine::new(Arc::clone(&ledger));

        let outcome = engine
            .classify_and_score(7, "ann", "advice", ts("2026-08-24 10:00:00"))
            .await
            .unwrap();

        assert_eq!(outcome.kind, OutcomeKind::Accepted);
        assert!(outcome.reply_text.contains("advice #1"));
        let events = ledger.scan_all().await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].penalty);
        assert_eq!(events[0].message, "advice");
    }

    #[tokio::test]
    async fn monday_boundary_midnight_exactly_is_accepted() {
        let ledger: DynLedger = Arc::new(MemoryLedger::new());
        let engine = RuleEngine::new(ledger);
        let outcome = engine
            .classify_and_score(7, "ann", "advice", ts("2026-08-24 00:00:00"))
            .await
            .unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Accepted);
    }

    #[tokio::test]
    async fn sunday_last_second_is_penalized() {
        let ledger: DynLedger = Arc::new(MemoryLedger::new());
        let engine = RuleEngine::new(ledger);
        let outcome = engine
            .classify_and_score(7, "ann", "advice", ts("2026-08-30 23:59:59"))
            .await
            .unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Penalized);
        assert!(outcome.reply_text.contains("Penalty points this week: 1"));
    }

    #[tokio::test]
    async fn penalty_reply_cites_new_total_and_unchanged_advice_count() {
        let ledger: DynLedger = Arc::new(MemoryLedger::with_events(vec![
            event(7, "2026-08-24 09:00:00", false),
            event(7, "2026-08-25 09:00:00", true),
        ]));
        let engine = RuleEngine::new(Arc::clone(&ledger));

        let outcome = engine
            .classify_and_score(7, "ann", "more advice", ts("2026-08-26 10:00:00"))
            .await
            .unwrap();

        assert_eq!(outcome.kind, OutcomeKind::Penalized);
        assert!(outcome.reply_text.contains("Penalty points this week: 2"));
        assert!(outcome.reply_text.contains("Advice given this week: 1"));
        assert_eq!(ledger.scan_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn repeated_monday_advice_increments_the_running_count() {
        let ledger: DynLedger = Arc::new(MemoryLedger::new());
        let engine = RuleEngine::new(Arc::clone(&ledger));

        for expected in 1..=3u32 {
            let outcome = engine
                .classify_and_score(7, "ann", "advice", ts("2026-08-24 10:00:00"))
                .await
                .unwrap();
            assert!(outcome.reply_text.contains(&format!("advice #{expected}")));
        }
        assert_eq!(ledger.scan_all().await.unwrap().len(), 3);
    }
}

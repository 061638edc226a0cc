// src/lib.rs
// Public library surface for integration tests (and the bot binary).

pub mod classifier;
pub mod config;
pub mod handler;
pub mod ledger;
pub mod report;
pub mod rules;
pub mod scheduler;
pub mod sheets;
pub mod telegram;

// ---- Re-exports for stable public API ----
pub use crate::classifier::{
    is_advice, AdviceClassifier, DynClassifier, FixedClassifier, OpenAiClassifier,
};
pub use crate::config::Config;
pub use crate::handler::{InboundMessage, MessageHandler};
pub use crate::ledger::{DynLedger, Event, LedgerStore, MemoryLedger};
pub use crate::report::ReportGenerator;
pub use crate::rules::{Outcome, OutcomeKind, RuleEngine, WeeklyStats};

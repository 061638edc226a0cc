//! advice-patrol — Binary Entrypoint
//! Wires config, the Sheets ledger, the OpenAI classifier, the Telegram
//! transport, and the weekly report job, then runs the polling loop.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use advice_patrol::classifier::OpenAiClassifier;
use advice_patrol::config::Config;
use advice_patrol::handler::MessageHandler;
use advice_patrol::ledger::DynLedger;
use advice_patrol::report::ReportGenerator;
use advice_patrol::rules::RuleEngine;
use advice_patrol::scheduler::spawn_weekly_report;
use advice_patrol::sheets::SheetsLedger;
use advice_patrol::telegram::{run_polling, TelegramClient};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("advice_patrol=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the vars come from the environment.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::from_env()?;

    let ledger: DynLedger = Arc::new(SheetsLedger::from_key_file(
        &config.credentials_path,
        &config.sheet_id,
    )?);
    let classifier = Arc::new(OpenAiClassifier::new(
        config.openai_api_key.clone(),
        config.openai_model.as_deref(),
    )?);
    let bot = TelegramClient::new(&config.telegram_token)?;

    let engine = RuleEngine::new(ledger);
    let generator = ReportGenerator::new(engine.ledger());
    let handler = MessageHandler::new(classifier, engine);

    spawn_weekly_report(generator, bot.clone(), config.target_chat_id);

    info!("bot started");
    run_polling(&bot, &handler, config.allowed_chat_id).await
}

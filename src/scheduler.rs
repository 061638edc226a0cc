//! Weekly report trigger: one fixed Sunday 18:00 broadcast per week,
//! process-local clock. The report itself is a pure callback; this module
//! only owns the timer loop around it.

use chrono::{Datelike, Duration as ChronoDuration, NaiveDateTime, NaiveTime, Weekday};
use metrics::counter;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::report::ReportGenerator;
use crate::telegram::TelegramClient;

pub const REPORT_WEEKDAY: Weekday = Weekday::Sun;
pub const REPORT_HOUR: u32 = 18;

/// Time remaining until the next `weekday` at `at`, strictly in the future:
/// a `now` exactly on the boundary waits a full week.
pub fn time_until(now: NaiveDateTime, weekday: Weekday, at: NaiveTime) -> std::time::Duration {
    let days_ahead = (weekday.num_days_from_monday() as i64
        - now.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    let mut target = (now.date() + ChronoDuration::days(days_ahead)).and_time(at);
    if target <= now {
        target = target + ChronoDuration::days(7);
    }
    (target - now).to_std().unwrap_or_default()
}

fn report_time() -> NaiveTime {
    NaiveTime::from_hms_opt(REPORT_HOUR, 0, 0).expect("valid report time")
}

/// Spawn the weekly loop. A failed cycle is logged and the job simply waits
/// for its next scheduled run; there is no retry within the same cycle.
pub fn spawn_weekly_report(
    generator: ReportGenerator,
    bot: TelegramClient,
    target_chat_id: i64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = time_until(
                chrono::Local::now().naive_local(),
                REPORT_WEEKDAY,
                report_time(),
            );
            info!(secs = wait.as_secs(), "weekly report: sleeping until next run");
            tokio::time::sleep(wait).await;

            match generator.build_report().await {
                Ok(Some(text)) => match bot.send_message(target_chat_id, &text).await {
                    Ok(()) => {
                        counter!("weekly_reports_sent_total").increment(1);
                        info!("weekly report sent");
                    }
                    Err(e) => error!(error = %e, "failed to send weekly report"),
                },
                Ok(None) => info!("ledger empty, skipping weekly report"),
                Err(e) => error!(error = %e, "failed to build weekly report"),
            }
        }
    })
}

//! RSS AI digest: one run per invocation.
//! Fetch feeds, summarize unseen articles, post them to chat, remember what was sent.

use std::process::ExitCode;
use std::sync::Arc;

use rss_ai_digest::app::{build_notifier, build_pipeline};
use rss_ai_digest::config::AppConfig;
use rss_ai_digest::notify::Notifier;
use rss_ai_digest::telemetry::{init_tracing, LogFormat};
use rss_ai_digest::RunReport;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing(LogFormat::from_env());

    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = ?e, "configuration error");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        feeds = cfg.feeds.len(),
        max_per_run = cfg.max_per_run,
        items_per_feed = cfg.items_per_feed,
        "starting run"
    );

    let notifier = build_notifier(&cfg.notifier);
    match run_job(&cfg, notifier.clone()).await {
        Ok(report) => {
            log_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = ?e, "run aborted");
            if let Err(alert) = notifier.send_error(&format!("{e:#}")).await {
                tracing::warn!(error = ?alert, "failure alert not delivered");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run_job(cfg: &AppConfig, notifier: Arc<dyn Notifier>) -> anyhow::Result<RunReport> {
    let pipeline = build_pipeline(cfg, notifier)?;
    Ok(pipeline.run().await)
}

fn log_report(report: &RunReport) {
    tracing::info!(
        fetched = report.fetched,
        new = report.new,
        summarized = report.summarized,
        skipped = report.skipped,
        deferred = report.deferred,
        notified = report.notified,
        persisted = ?report.persisted,
        known = report.known_after,
        "run finished"
    );
    if let Some(err) = &report.notify_error {
        tracing::warn!(error = %err, "digest was not fully delivered");
    }
    if report.persisted == Some(false) {
        tracing::warn!("dedup set not saved; these articles may be sent again");
    }
}

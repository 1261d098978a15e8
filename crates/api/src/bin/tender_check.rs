//! One-shot tender feed check across every monitored organisation.
//!
//! Meant for cron: exits non-zero only when the run itself could not start
//! (bad config, store unreachable). Per-organisation failures are reported
//! in the printed JSON.

use caretrack_api::app::services::AppServices;
use caretrack_infra::AppConfig;
use chrono::Utc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    caretrack_observability::init();

    let config = AppConfig::from_env()?;
    let services = AppServices::from_config(&config).await?;
    let report = services.tender_check().run_all(Utc::now()).await?;

    tracing::info!(
        organisations_checked = report.organisations_checked,
        new_opportunities = report.new_opportunities,
        emails_sent = report.emails_sent,
        failures = report.failures.len(),
        "tender check run complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

//! One retention sweep, for cron or any external scheduler.
//!
//! Reads configuration from the environment, applies pending migrations,
//! sweeps every table, trims password history and prints the report as
//! JSON on stdout. Exits non-zero when any step failed.

use std::process::ExitCode;

use serde_json::json;
use warden_core::{CleanupJob, Config, db, logging};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_logging_stderr(logging::LogFormat::from_env());

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let db = match db::connect_and_migrate(&config).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(error = %e, "failed to open database");
            return ExitCode::FAILURE;
        }
    };

    let job = CleanupJob::new(db, config.retention.clone());
    let report = job.run().await;
    let trimmed = job
        .trim_password_history(config.retention.password_history_per_user)
        .await;

    let password_history = match &trimmed {
        Ok(rows) => json!({ "status": "deleted", "rows": rows }),
        Err(e) => json!({ "status": "failed", "error": e.to_string() }),
    };
    let output = json!({
        "ran_at": report.ran_at,
        "tables": report.tables,
        "password_history": password_history,
        "total_deleted": report.total_deleted() + trimmed.as_ref().copied().unwrap_or(0),
    });

    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{text}"),
        Err(e) => tracing::error!(error = %e, "failed to render cleanup report"),
    }

    if report.is_complete() && trimmed.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

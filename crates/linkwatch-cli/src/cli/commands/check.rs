use super::{exit_codes, open_store, print_json};
use crate::cli::args::{CheckArgs, OutputFormat, RunArgs};
use anyhow::Context;
use linkwatch_core::config::Settings;
use linkwatch_core::schedule::{run_scheduler, Schedule};
use linkwatch_core::Checker;
use serde_json::json;

pub async fn cmd_check(args: CheckArgs, settings: &Settings) -> anyhow::Result<i32> {
    let store = open_store(settings)?;
    let checker = Checker::from_settings(store, settings)?;
    let checked = checker.run_cycle().await.context("check cycle failed")?;

    match args.format {
        OutputFormat::Json => print_json(&json!({ "checked": checked }))?,
        OutputFormat::Text => println!("checked {} URL(s)", checked),
    }
    Ok(exit_codes::OK)
}

pub async fn cmd_run(args: RunArgs, settings: &Settings) -> anyhow::Result<i32> {
    if !settings.scheduler.enabled {
        eprintln!("config error: scheduler.enabled is false");
        return Ok(exit_codes::CONFIG_ERROR);
    }
    let schedule = match Schedule::parse(&settings.scheduler.schedules) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let store = open_store(settings)?;
    let checker = Checker::from_settings(store, settings)?;
    let run_on_startup = args.now || settings.scheduler.run_on_startup;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(event = "signal_error", error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        tracing::info!(event = "shutdown_requested");
    };
    run_scheduler(checker, schedule, run_on_startup, shutdown).await;
    Ok(exit_codes::OK)
}

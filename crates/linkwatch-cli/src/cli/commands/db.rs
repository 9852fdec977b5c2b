use super::{exit_codes, open_store, print_json};
use crate::cli::args::{CleanupArgs, InitArgs, OutputFormat, VerifyDbArgs};
use linkwatch_core::config::{write_sample_config, Settings};
use linkwatch_core::model::days;
use std::path::Path;

pub fn cmd_init(config_path: &Path, args: InitArgs, settings: &Settings) -> anyhow::Result<i32> {
    if config_path.exists() && !args.force {
        eprintln!("note: {} already exists", config_path.display());
    } else {
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        write_sample_config(config_path)?;
        eprintln!("created {}", config_path.display());
    }

    let store = open_store(settings)?;
    let stats = store.stats()?;
    println!(
        "database ready at {} (schema {})",
        settings.database.path.display(),
        stats.schema_version.as_deref().unwrap_or("unknown")
    );
    Ok(exit_codes::OK)
}

pub fn cmd_cleanup(args: CleanupArgs, settings: &Settings) -> anyhow::Result<i32> {
    let retention_days = args.days.unwrap_or(settings.database.retention_days);
    if retention_days == 0 {
        eprintln!("error: retention must be at least one day");
        return Ok(exit_codes::OP_FAILED);
    }
    let store = open_store(settings)?;
    let removed = store.cleanup_old(days(retention_days))?;
    println!(
        "removed {} check result(s) older than {} day(s)",
        removed, retention_days
    );
    Ok(exit_codes::OK)
}

pub fn cmd_verify(args: VerifyDbArgs, settings: &Settings) -> anyhow::Result<i32> {
    let store = open_store(settings)?;
    let stats = store.stats()?;

    match args.format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Text => {
            println!("database:       {}", settings.database.path.display());
            println!(
                "schema version: {}",
                stats.schema_version.as_deref().unwrap_or("unknown")
            );
            println!(
                "targets:        {} ({} active)",
                stats.total_targets, stats.active_targets
            );
            println!("checks:         {}", stats.total_checks);
            println!("checks (24h):   {}", stats.checks_last_24h);
            if let Some(bytes) = stats.db_size_bytes {
                println!("size:           {:.2} MiB", bytes as f64 / (1024.0 * 1024.0));
            }
        }
    }
    Ok(exit_codes::OK)
}

use super::{exit_codes, open_store, print_json};
use crate::cli::args::{HistoryArgs, OutputFormat, StatsArgs, StatusArgs};
use chrono::{DateTime, Utc};
use linkwatch_core::config::Settings;
use linkwatch_core::model::{StatusState, TargetStatus};
use serde_json::json;
use std::time::Duration;

fn hours(n: u32) -> Duration {
    Duration::from_secs(u64::from(n) * 3600)
}

fn fmt_ts(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "never".into())
}

fn fmt_ms(ms: Option<f64>) -> String {
    ms.map(|v| format!("{:.2}ms", v)).unwrap_or_else(|| "-".into())
}

fn state_label(s: StatusState) -> &'static str {
    match s {
        StatusState::Up => "UP",
        StatusState::Down => "DOWN",
        StatusState::Pending => "PENDING",
    }
}

pub fn cmd_status(args: StatusArgs, settings: &Settings) -> anyhow::Result<i32> {
    let store = open_store(settings)?;
    let statuses: Vec<TargetStatus> = match args.id {
        Some(id) => match store.get_latest_status(id)? {
            Some(st) => vec![st],
            None => {
                eprintln!("error: no target with ID {}", id);
                return Ok(exit_codes::OP_FAILED);
            }
        },
        None => store.get_all_status()?,
    };

    match args.format {
        OutputFormat::Json => print_json(&statuses)?,
        OutputFormat::Text => print_status_table(&statuses),
    }
    Ok(exit_codes::OK)
}

fn print_status_table(statuses: &[TargetStatus]) {
    if statuses.is_empty() {
        println!("no URLs configured");
        return;
    }
    println!(
        "{:<5} {:<8} {:<6} {:<12} {:<20} {}",
        "ID", "STATE", "CODE", "TIME", "CHECKED", "TARGET"
    );
    let (mut up, mut down) = (0, 0);
    for st in statuses {
        let state = st.state();
        match state {
            StatusState::Up => up += 1,
            StatusState::Down => down += 1,
            StatusState::Pending => {}
        }
        println!(
            "{:<5} {:<8} {:<6} {:<12} {:<20} {}",
            st.target.id,
            state_label(state),
            st.status_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
            fmt_ms(st.response_time_ms),
            fmt_ts(st.checked_at),
            st.target.label()
        );
        if let (StatusState::Down, Some(msg)) = (state, &st.error_message) {
            println!("      {}", msg);
        }
    }
    println!();
    println!("{} total, {} up, {} down", statuses.len(), up, down);
}

pub fn cmd_history(args: HistoryArgs, settings: &Settings) -> anyhow::Result<i32> {
    let store = open_store(settings)?;
    let Some(target) = store.get_target(args.id)? else {
        eprintln!("error: no target with ID {}", args.id);
        return Ok(exit_codes::OP_FAILED);
    };
    let history = store.get_history(args.id, hours(args.hours), args.limit)?;

    match args.format {
        OutputFormat::Json => print_json(&json!({
            "target": target,
            "hours": args.hours,
            "history": history,
        }))?,
        OutputFormat::Text => {
            println!("{} ({})", target.label(), target.url);
            if history.is_empty() {
                println!("no checks in the last {}h", args.hours);
            }
            for r in &history {
                println!(
                    "{:<20} {:<5} {:<6} {:<12} {}",
                    fmt_ts(Some(r.checked_at)),
                    if r.is_up { "UP" } else { "DOWN" },
                    r.status_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                    fmt_ms(r.response_time_ms),
                    r.error_message.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(exit_codes::OK)
}

pub fn cmd_stats(args: StatsArgs, settings: &Settings) -> anyhow::Result<i32> {
    let store = open_store(settings)?;
    let Some(target) = store.get_target(args.id)? else {
        eprintln!("error: no target with ID {}", args.id);
        return Ok(exit_codes::OP_FAILED);
    };
    let stats = store.get_uptime_stats(args.id, hours(args.hours))?;

    match args.format {
        OutputFormat::Json => print_json(&json!({
            "target": target,
            "stats": stats,
        }))?,
        OutputFormat::Text => {
            println!("{} over the last {}h", target.label(), args.hours);
            println!("  checks:   {} ({} up, {} down)", stats.total, stats.up_count, stats.down_count);
            println!("  uptime:   {:.2}%", stats.uptime_percent);
            println!("  avg time: {:.2}ms", stats.avg_response_ms);
            println!(
                "  min/max:  {} / {}",
                fmt_ms(stats.min_response_ms),
                fmt_ms(stats.max_response_ms)
            );
        }
    }
    Ok(exit_codes::OK)
}

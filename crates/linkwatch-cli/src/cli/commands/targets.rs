use super::{exit_codes, open_store, print_json};
use crate::cli::args::{AddArgs, ListArgs, OutputFormat, RemoveArgs, UpdateArgs};
use linkwatch_core::config::Settings;
use linkwatch_core::model::{TargetKey, TargetUpdate};
use linkwatch_core::validate::validate_url;
use linkwatch_core::StoreError;

pub fn cmd_add(args: AddArgs, settings: &Settings) -> anyhow::Result<i32> {
    let url = args.url.trim().to_string();
    if !args.no_validate && !validate_url(&url) {
        eprintln!("error: invalid URL format: {}", url);
        return Ok(exit_codes::OP_FAILED);
    }

    let store = open_store(settings)?;
    let mut new = settings.checker.new_target(url.clone()).active(!args.inactive);
    if let Some(name) = args.name {
        new = new.name(name);
    }
    if let Some(timeout) = args.timeout {
        new = new.timeout_seconds(timeout);
    }

    match store.add_target(&new) {
        Ok(id) => {
            println!("added {} (ID {})", url, id);
            Ok(exit_codes::OK)
        }
        Err(e @ StoreError::Duplicate { .. }) | Err(e @ StoreError::Invalid(_)) => {
            eprintln!("error: {}", e);
            Ok(exit_codes::OP_FAILED)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn cmd_update(args: UpdateArgs, settings: &Settings) -> anyhow::Result<i32> {
    let update = TargetUpdate {
        name: if args.clear_name {
            Some(None)
        } else {
            args.name.map(Some)
        },
        timeout_seconds: args.timeout,
        active: match (args.activate, args.deactivate) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
        last_checked_at: None,
    };
    if update.is_empty() {
        eprintln!("error: nothing to update (use --name, --clear-name, --timeout, --activate or --deactivate)");
        return Ok(exit_codes::OP_FAILED);
    }

    let store = open_store(settings)?;
    match store.update_target(args.id, &update) {
        Ok(true) => {
            println!("updated ID {}", args.id);
            Ok(exit_codes::OK)
        }
        Ok(false) => {
            eprintln!("error: no target with ID {}", args.id);
            Ok(exit_codes::OP_FAILED)
        }
        Err(e @ StoreError::Invalid(_)) => {
            eprintln!("error: {}", e);
            Ok(exit_codes::OP_FAILED)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn cmd_remove(args: RemoveArgs, settings: &Settings) -> anyhow::Result<i32> {
    let store = open_store(settings)?;
    let key = TargetKey::parse(&args.target);
    if store.delete_target(&key)? {
        println!("removed {}", key);
        Ok(exit_codes::OK)
    } else {
        eprintln!("error: target not found: {}", key);
        Ok(exit_codes::OP_FAILED)
    }
}

pub fn cmd_list(args: ListArgs, settings: &Settings) -> anyhow::Result<i32> {
    let store = open_store(settings)?;
    let targets = store.list_targets(args.active_only)?;

    match args.format {
        OutputFormat::Json => print_json(&targets)?,
        OutputFormat::Text => {
            if targets.is_empty() {
                println!("no URLs configured");
                return Ok(exit_codes::OK);
            }
            println!(
                "{:<5} {:<8} {:<8} {:<24} URL",
                "ID", "ACTIVE", "TIMEOUT", "NAME"
            );
            for t in &targets {
                println!(
                    "{:<5} {:<8} {:<8} {:<24} {}",
                    t.id,
                    if t.active { "yes" } else { "no" },
                    format!("{}s", t.timeout_seconds),
                    t.name.as_deref().unwrap_or("-"),
                    t.url
                );
            }
        }
    }
    Ok(exit_codes::OK)
}

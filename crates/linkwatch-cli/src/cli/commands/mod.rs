use super::args::*;
use anyhow::Context;
use linkwatch_core::config::{load_settings, Settings};
use linkwatch_core::Store;
use std::path::Path;

pub mod check;
pub mod db;
pub mod status;
pub mod targets;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const OP_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

/// Loads the config file, applies env and `--db` overrides, then validates.
pub fn resolve_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = load_settings(&cli.config, cli.strict)?.with_env_overrides();
    if let Some(db) = &cli.db {
        settings.database.path = db.clone();
    }
    Ok(settings.validated()?)
}

pub async fn dispatch(cli: Cli, settings: Settings) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Init(args) => db::cmd_init(&cli.config, args, &settings),
        Command::Add(args) => targets::cmd_add(args, &settings),
        Command::Update(args) => targets::cmd_update(args, &settings),
        Command::Remove(args) => targets::cmd_remove(args, &settings),
        Command::List(args) => targets::cmd_list(args, &settings),
        Command::Status(args) => status::cmd_status(args, &settings),
        Command::History(args) => status::cmd_history(args, &settings),
        Command::Stats(args) => status::cmd_stats(args, &settings),
        Command::Check(args) => check::cmd_check(args, &settings).await,
        Command::Run(args) => check::cmd_run(args, &settings).await,
        Command::Cleanup(args) => db::cmd_cleanup(args, &settings),
        Command::VerifyDb(args) => db::cmd_verify(args, &settings),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

/// Opens the configured database, creating its directory and schema if needed.
pub fn open_store(settings: &Settings) -> anyhow::Result<Store> {
    let path = &settings.database.path;
    ensure_parent_dir(path)?;
    let store = Store::open_with(path, &settings.database.store_options())
        .with_context(|| format!("failed to open database {}", path.display()))?;
    store
        .init_schema()
        .with_context(|| format!("failed to initialize schema in {}", path.display()))?;
    Ok(store)
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

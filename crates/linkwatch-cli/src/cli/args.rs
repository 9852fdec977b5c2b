use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "linkwatch",
    version,
    about = "Scheduled URL uptime checks with a local SQLite history"
)]
pub struct Cli {
    /// Config file; defaults apply when it does not exist
    #[arg(long, global = true, default_value = "linkwatch.yaml", env = "LINKWATCH_CONFIG")]
    pub config: PathBuf,

    /// Database path, overrides `database.path`
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Reject unknown config keys instead of warning
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a sample config and create the database
    Init(InitArgs),
    /// Start monitoring a URL
    Add(AddArgs),
    /// Change name, timeout or active flag of a target
    Update(UpdateArgs),
    /// Stop monitoring a URL and drop its history
    Remove(RemoveArgs),
    List(ListArgs),
    /// Latest result for every target (or one)
    Status(StatusArgs),
    History(HistoryArgs),
    /// Uptime aggregation for one target
    Stats(StatsArgs),
    /// Run one check cycle now
    Check(CheckArgs),
    /// Run the scheduler until interrupted
    Run(RunArgs),
    /// Delete check results older than the retention period
    Cleanup(CleanupArgs),
    VerifyDb(VerifyDbArgs),
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AddArgs {
    pub url: String,

    #[arg(long)]
    pub name: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u32>,

    /// Register the target without checking it yet
    #[arg(long)]
    pub inactive: bool,

    /// Skip the URL format check
    #[arg(long)]
    pub no_validate: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct UpdateArgs {
    pub id: i64,

    #[arg(long, conflicts_with = "clear_name")]
    pub name: Option<String>,

    #[arg(long)]
    pub clear_name: bool,

    #[arg(long)]
    pub timeout: Option<u32>,

    #[arg(long, conflicts_with = "deactivate")]
    pub activate: bool,

    #[arg(long)]
    pub deactivate: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RemoveArgs {
    /// Target id or URL
    pub target: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(long)]
    pub active_only: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct StatusArgs {
    /// Limit output to one target id
    pub id: Option<i64>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct HistoryArgs {
    pub id: i64,

    /// Look back this many hours
    #[arg(long, default_value_t = 24)]
    pub hours: u32,

    #[arg(long, default_value_t = 100)]
    pub limit: u32,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct StatsArgs {
    pub id: i64,

    #[arg(long, default_value_t = 24)]
    pub hours: u32,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CheckArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Run a cycle immediately, in addition to `scheduler.run_on_startup`
    #[arg(long)]
    pub now: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CleanupArgs {
    /// Retention in days, overrides `database.retention_days`
    #[arg(long)]
    pub days: Option<u32>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct VerifyDbArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

//! Argument parsing and command dispatch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sluice_api_models::Priority;
use sluice_panel::{DEFAULT_HISTORY_LIMIT, SingleAction};
use sluice_telemetry::{LogFormat, LoggingConfig, init_logging};
use tracing::debug;
use url::Url;

use crate::client::{AppContext, CliResult, ReqwestTransport, new_trace_id, parse_url};
use crate::commands::history::{handle_history_clear, handle_history_delete, handle_history_list};
use crate::commands::prefs::{handle_prefs_get, handle_prefs_set};
use crate::commands::queue::{
    handle_bulk_delete, handle_bulk_priority, handle_pause_all, handle_queue_list,
    handle_resume_all, handle_single_action, handle_speed_limit,
};
use crate::commands::watch::handle_watch;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CLI_LOG_LEVEL: &str = "warn";

/// Parses CLI arguments, executes the requested command, and returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let log_format = cli.log_format.map_or_else(LogFormat::infer, LogFormat::from);
    if let Err(err) = init_logging(&LoggingConfig {
        level: &cli.log_level,
        format: log_format,
        build_sha: option_env!("SLUICE_BUILD_SHA").unwrap_or(env!("CARGO_PKG_VERSION")),
    }) {
        eprintln!("warning: {err:#}");
    }

    let command_name = command_label(&cli.command);
    let trace_id = new_trace_id();
    let transport = match ReqwestTransport::new(
        cli.api_url.clone(),
        cli.api_key.clone(),
        Duration::from_secs(cli.timeout),
        &trace_id,
    ) {
        Ok(transport) => transport,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };
    let ctx = AppContext::new(Arc::new(transport));

    match dispatch(cli, &ctx).await {
        Ok(()) => {
            debug!(command = command_name, trace_id = %trace_id, "command completed");
            0
        }
        Err(err) => {
            let message = err.display_message();
            debug!(
                command = command_name,
                trace_id = %trace_id,
                error = %message,
                "command failed"
            );
            eprintln!("error: {message}");
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli, ctx: &AppContext) -> CliResult<()> {
    let output = cli.output;
    match cli.command {
        Command::Watch(args) => handle_watch(ctx, args, output).await,
        Command::Queue(args) => handle_queue_list(ctx, args, output).await,
        Command::History(args) => handle_history_list(ctx, args, output).await,
        Command::Pause(args) => handle_single_action(ctx, SingleAction::Pause, args).await,
        Command::Resume(args) => handle_single_action(ctx, SingleAction::Resume, args).await,
        Command::Remove(args) => handle_single_action(ctx, SingleAction::Remove, args).await,
        Command::Priority(args) => handle_bulk_priority(ctx, args).await,
        Command::Delete(args) => handle_bulk_delete(ctx, args).await,
        Command::PauseAll => handle_pause_all(ctx).await,
        Command::ResumeAll => handle_resume_all(ctx).await,
        Command::SpeedLimit(args) => handle_speed_limit(ctx, args, output).await,
        Command::HistoryDelete(args) => handle_history_delete(ctx, args).await,
        Command::HistoryClear => handle_history_clear(ctx).await,
        Command::Prefs(prefs) => match prefs {
            PrefsCommand::Get => handle_prefs_get(ctx, output).await,
            PrefsCommand::Set(args) => handle_prefs_set(ctx, args).await,
        },
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Watch(_) => "watch",
        Command::Queue(_) => "queue",
        Command::History(_) => "history",
        Command::Pause(_) => "pause",
        Command::Resume(_) => "resume",
        Command::Remove(_) => "remove",
        Command::Priority(_) => "priority",
        Command::Delete(_) => "delete",
        Command::PauseAll => "pause-all",
        Command::ResumeAll => "resume-all",
        Command::SpeedLimit(_) => "speed-limit",
        Command::HistoryDelete(_) => "history-delete",
        Command::HistoryClear => "history-clear",
        Command::Prefs(PrefsCommand::Get) => "prefs get",
        Command::Prefs(PrefsCommand::Set(_)) => "prefs set",
    }
}

#[derive(Parser)]
#[command(
    name = "sluice",
    version,
    about = "Terminal front-end for a Sluice download server"
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "SLUICE_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    pub(crate) api_url: Url,
    #[arg(long, global = true, env = "SLUICE_API_KEY", hide_env_values = true)]
    pub(crate) api_key: Option<String>,
    #[arg(
        long,
        global = true,
        env = "SLUICE_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[arg(
        long,
        global = true,
        env = "SLUICE_LOG_LEVEL",
        default_value = DEFAULT_CLI_LOG_LEVEL
    )]
    pub(crate) log_level: String,
    #[arg(long, global = true, env = "SLUICE_LOG_FORMAT", value_enum)]
    pub(crate) log_format: Option<LogFormatArg>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Keep polling and print the views whenever they change.
    Watch(WatchArgs),
    /// Print one page of the download queue.
    Queue(ListArgs),
    /// Print one page of the download history.
    History(HistoryListArgs),
    /// Pause one item.
    Pause(ItemArgs),
    /// Resume one item.
    Resume(ItemArgs),
    /// Remove one item from the queue.
    Remove(ItemArgs),
    /// Change the priority of one or more items.
    Priority(PriorityArgs),
    /// Remove several items at once.
    Delete(BulkArgs),
    /// Pause the whole queue.
    PauseAll,
    /// Resume the whole queue.
    ResumeAll,
    /// Show or set the global speed limit.
    SpeedLimit(SpeedLimitArgs),
    /// Delete one history record.
    HistoryDelete(ItemArgs),
    /// Delete every history record.
    HistoryClear,
    /// Read or replace the stored display preferences.
    #[command(subcommand)]
    Prefs(PrefsCommand),
}

#[derive(Subcommand)]
pub(crate) enum PrefsCommand {
    /// Print the stored preferences.
    Get,
    /// Replace the stored preferences with a JSON document.
    Set(PrefsSetArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct ListArgs {
    /// Case-insensitive name filter.
    #[arg(long)]
    pub(crate) filter: Option<String>,
    /// 1-based page number.
    #[arg(long, default_value_t = 1)]
    pub(crate) page: usize,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct HistoryListArgs {
    #[command(flatten)]
    pub(crate) list: ListArgs,
    /// Maximum number of records to fetch.
    #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
    pub(crate) limit: usize,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct WatchArgs {
    /// Queue name filter.
    #[arg(long)]
    pub(crate) filter: Option<String>,
    /// Queue page.
    #[arg(long, default_value_t = 1)]
    pub(crate) page: usize,
    /// History name filter.
    #[arg(long)]
    pub(crate) history_filter: Option<String>,
    /// Maximum number of history records per poll.
    #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
    pub(crate) history_limit: usize,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ItemArgs {
    pub(crate) id: String,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct BulkArgs {
    /// Comma-separated item ids.
    #[arg(long, value_delimiter = ',', required = true)]
    pub(crate) ids: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct PriorityArgs {
    #[command(flatten)]
    pub(crate) targets: BulkArgs,
    #[arg(value_enum)]
    pub(crate) priority: PriorityArg,
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct SpeedLimitArgs {
    /// New limit in bytes per second; 0 removes the limit. Omit to print the current one.
    pub(crate) bytes_per_second: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct PrefsSetArgs {
    /// JSON file holding the preferences; missing fields take their defaults.
    #[arg(long)]
    pub(crate) file: PathBuf,
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub(crate) enum PriorityArg {
    Force,
    High,
    Normal,
    Low,
    Stop,
}

impl From<PriorityArg> for Priority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Force => Self::Force,
            PriorityArg::High => Self::High,
            PriorityArg::Normal => Self::Normal,
            PriorityArg::Low => Self::Low,
            PriorityArg::Stop => Self::Stop,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub(crate) enum LogFormatArg {
    Json,
    Pretty,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Json => Self::Json,
            LogFormatArg::Pretty => Self::Pretty,
        }
    }
}

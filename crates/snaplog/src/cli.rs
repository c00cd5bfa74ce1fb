//! Clap derive structures for the `snaplog` CLI.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// snaplog -- periodic device sampler with CSV logging
#[derive(Debug, Parser)]
#[command(
    name = "snaplog",
    version,
    about = "Sample device values on a fixed period and log them to CSV",
    long_about = "Polls a set of named values on a refresh period, keeps the latest\n\
        complete snapshot in memory, and appends one CSV row per persist\n\
        period. Ships with a simulated batch-capable device.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file to use instead of the platform default
    #[arg(long, env = "SNAPLOG_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SNAPLOG_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sample the simulated device and append rows to the log
    #[command(alias = "rec")]
    Record(RecordArgs),

    /// Print the sessions stored in a log file
    Show(ShowArgs),

    /// Manage the configuration file
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Record ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RecordArgs {
    /// Log file to append to (overrides `logger.output`)
    #[arg(long, short = 'l')]
    pub log: Option<PathBuf>,

    /// Stop after this long (e.g. "30s", "5m"); runs until Ctrl-C otherwise
    #[arg(long, short = 'd', value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Refresh period in seconds (overrides `logger.refresh_interval`)
    #[arg(long)]
    pub refresh: Option<f64>,

    /// Persist period in seconds (overrides `logger.persist_interval`)
    #[arg(long)]
    pub persist: Option<f64>,

    /// Simulated round-trip latency in milliseconds
    #[arg(long)]
    pub latency_ms: Option<u64>,

    /// Channels to sample (repeatable; overrides `device.channels`)
    #[arg(long = "channel", short = 'c')]
    pub channels: Vec<String>,
}

// ── Show ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Log file to read
    pub file: PathBuf,

    /// Session to print, counted from 1 (default: the last one)
    #[arg(long, short = 's', conflicts_with = "all")]
    pub session: Option<usize>,

    /// Print every session in the file
    #[arg(long)]
    pub all: bool,

    /// Only print the last N rows of each session
    #[arg(long)]
    pub tail: Option<usize>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the effective configuration
    Show,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

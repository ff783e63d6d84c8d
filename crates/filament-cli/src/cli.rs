use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    Off,
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages (default)
    Info,
    /// Debug messages
    Debug,
    /// Trace-level messages (most verbose)
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Output format for run-log listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned table
    Table,
    /// Pretty-printed JSON
    Json,
    /// Comma-separated values
    Csv,
}

/// Terminal run status filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusFilter {
    Success,
    Partial,
    Error,
    InProgress,
}

impl From<StatusFilter> for filament_core::RunStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Success => filament_core::RunStatus::Success,
            StatusFilter::Partial => filament_core::RunStatus::Partial,
            StatusFilter::Error => filament_core::RunStatus::Error,
            StatusFilter::InProgress => filament_core::RunStatus::InProgress,
        }
    }
}

#[derive(Parser)]
#[command(name = "filament")]
#[command(about = "filament - Incremental semantic linking for markdown vaults")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (defaults to ~/.config/filament/config.toml)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Embedding provider (ollama, openai, mock; overrides config file)
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Embedding service URL (overrides config file)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Embedding model name (overrides config file)
    #[arg(long, global = true)]
    pub model: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Link related documents by embedding similarity
    Link {
        /// Vault root (defaults to config file value or current directory)
        vault: Option<PathBuf>,

        /// Minimum cosine similarity for a link (default: 0.6)
        #[arg(long)]
        similarity: Option<f32>,

        /// Force at least this many links per document, below threshold if
        /// needed (default: 0, strict threshold only)
        #[arg(long)]
        min_links: Option<usize>,

        /// Maximum links per document (default: 9)
        #[arg(long)]
        max_links: Option<usize>,

        /// Confine links to k-means clusters (default: 0, no clustering)
        #[arg(long)]
        clusters: Option<usize>,

        /// Blend weight for summary-excerpt similarity (default: 0.0,
        /// body only)
        #[arg(long)]
        summary_weight: Option<f32>,

        /// Documents per embedding request (defaults to config file value)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Write link blocks into the files (default is report only)
        #[arg(long)]
        apply: bool,

        /// Remove existing link blocks; with --apply they are rewritten,
        /// alone they are deleted
        #[arg(long)]
        delete: bool,

        /// Discard cached embeddings and re-embed everything
        #[arg(long)]
        force: bool,
    },

    /// Assign each document its nearest tag by description similarity
    Tag {
        /// Vault root (defaults to config file value or current directory)
        vault: Option<PathBuf>,

        /// Tag definitions file, one name::description per line
        #[arg(long)]
        tags_file: Option<PathBuf>,

        /// Write assigned tags into front matter (default is report only)
        #[arg(long)]
        apply: bool,

        /// Strip the managed tags key from front matter instead
        #[arg(long)]
        remove: bool,

        /// Documents per embedding request (defaults to config file value)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Discard cached embeddings and re-embed everything
        #[arg(long)]
        force: bool,
    },

    /// Inspect and prune the run log
    #[command(subcommand)]
    Runs(RunsCommands),
}

#[derive(Subcommand)]
pub enum RunsCommands {
    /// Show recent runs, newest first
    List {
        /// Vault root (defaults to config file value or current directory)
        vault: Option<PathBuf>,

        /// Only runs recorded by this tool (linker, tagger)
        #[arg(long)]
        tool: Option<String>,

        /// Maximum runs to show (0 = all)
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Only runs with this final status
        #[arg(long, value_enum)]
        status: Option<StatusFilter>,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete old runs by age or count
    #[command(group(ArgGroup::new("retention").required(true).args(["older_than", "keep_last"])))]
    Prune {
        /// Vault root (defaults to config file value or current directory)
        vault: Option<PathBuf>,

        /// Delete runs older than a duration, e.g. 30d, 12w, 6m, 1y
        #[arg(long, value_name = "DURATION")]
        older_than: Option<String>,

        /// Keep only the N most recent runs
        #[arg(long, value_name = "N")]
        keep_last: Option<usize>,

        /// Only prune runs recorded by this tool
        #[arg(long)]
        tool: Option<String>,

        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },
}

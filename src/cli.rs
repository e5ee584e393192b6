use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "clawsave",
    about = "Agent token usage and savings tracker"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Record-store root (agents directory); repeatable
    #[arg(long = "root", global = true)]
    pub roots: Vec<PathBuf>,

    /// Checkpoint file
    #[arg(long, global = true)]
    pub checkpoint: Option<PathBuf>,

    /// Pricing document (baseline/treated rates)
    #[arg(long, global = true)]
    pub pricing: Option<PathBuf>,

    /// Output format: table (default), json
    #[arg(long, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Scan new usage since the last checkpoint and report savings (default)
    Report {
        /// Report without persisting the checkpoint
        #[arg(long)]
        peek: bool,
    },
    /// Show lifetime totals from the stored checkpoint
    Lifetime,
    /// Merge a provider/model patch into the agent configuration
    Merge(MergeArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct MergeArgs {
    /// Configuration document to patch
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON patch document applied first
    #[arg(long)]
    pub patch: Option<PathBuf>,

    /// Provider name to register
    #[arg(long, requires = "model")]
    pub provider: Option<String>,

    /// Model id to make the default primary
    #[arg(long, requires = "provider")]
    pub model: Option<String>,

    /// Provider base URL
    #[arg(long, requires = "provider")]
    pub base_url: Option<String>,

    /// Provider API flavour (e.g. openai-completions)
    #[arg(long, requires = "provider")]
    pub api: Option<String>,

    /// Provider API key
    #[arg(long, requires = "provider")]
    pub api_key: Option<String>,

    /// Print the merged document instead of writing it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(ValueEnum, Debug, Clone, PartialEq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl Cli {
    pub fn effective_command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Report { peek: false })
    }
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "msync",
    about = "msync: model change-event synchronization",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level regardless of config
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a config file and list the bindings it produces
    Check(CheckArgs),
    /// Dispatch newline-delimited JSON envelopes against configured subscriptions
    Replay(ReplayArgs),
    /// Show the wire headers and body a publisher would send
    Encode(EncodeArgs),
}

impl Command {
    /// Config file named by the command, if any.
    pub fn config_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Check(args) => Some(&args.config),
            Self::Replay(args) => Some(&args.config),
            Self::Encode(_) => None,
        }
    }
}

#[derive(Args)]
pub struct CheckArgs {
    #[arg(short, long)]
    pub config: PathBuf,
}

#[derive(Args)]
pub struct ReplayArgs {
    #[arg(short, long)]
    pub config: PathBuf,
    /// File with one JSON envelope per line
    pub events: PathBuf,
}

#[derive(Args)]
pub struct EncodeArgs {
    #[arg(long)]
    pub class: String,
    #[arg(long)]
    pub action: String,
    /// Identity value as JSON (e.g. `5` or `"abc"`)
    #[arg(long)]
    pub id: Option<String>,
    /// Payload as a JSON object
    #[arg(long)]
    pub data: Option<String>,
}

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "scenectl",
    about = "Scene branching: versioned branches of floor-plan scenes",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP API server
    Serve(ServeArgs),
    /// Print the effective configuration
    Config,
    /// Run a scripted fork, edit, diff, merge and snapshot session in memory
    Demo(DemoArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Override `[server] bind_addr`
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct DemoArgs {
    /// Walls placed on the main branch before forking
    #[arg(long, default_value_t = 3)]
    pub walls: usize,

    /// How long to wait for each replication job, in milliseconds
    #[arg(long, default_value_t = 5_000)]
    pub wait_ms: u64,
}

use clap::Parser;

mod cli;
mod commands;
mod demo;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_target(false)
        .init();
    commands::run_command(cli).await
}

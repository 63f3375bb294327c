use anyhow::Context;
use colored::Colorize;

use scene_server::{AppConfig, SceneServer};

use crate::cli::*;
use crate::demo;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Config => cmd_config(&config, &cli.format),
        Command::Demo(args) => demo::run(&config, &args, &cli.format).await,
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("reading configuration from {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

async fn cmd_serve(mut config: AppConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    println!(
        "{} scene server on {}",
        "▶".green().bold(),
        config.server.bind_addr.to_string().bold()
    );
    SceneServer::new(config).serve().await?;
    println!("{} stopped", "■".yellow());
    Ok(())
}

fn cmd_config(config: &AppConfig, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
    }
    Ok(())
}

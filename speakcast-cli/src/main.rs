//! Speakcast CLI - Command-line interface
//!
//! Streams audio files to a network speaker from the terminal.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use speakcast_core::SpeakcastConfig;
use speakcast_core::config::DeliveryMode;
use speakcast_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "speakcast")]
#[command(about = "Stream audio files to a network speaker")]
#[command(version)]
struct Cli {
    /// Device address, optionally with port (defaults to SPEAKCAST_HOST)
    #[arg(long, global = true)]
    host: Option<String>,
    /// Device user name (defaults to SPEAKCAST_USERNAME)
    #[arg(short, long, global = true)]
    username: Option<String>,
    /// Device password (defaults to SPEAKCAST_PASSWORD)
    #[arg(short, long, global = true)]
    password: Option<String>,
    /// Delivery path: transcoder or direct
    #[arg(long, global = true)]
    delivery: Option<DeliveryMode>,
    /// Console log level
    #[arg(long, global = true, value_enum, default_value_t = CliLogLevel::Warn)]
    log_level: CliLogLevel,
    /// Print replies as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_level.as_tracing_level(), None) {
        eprintln!("Warning: trace log unavailable: {e}");
    }

    let mut config = SpeakcastConfig::from_env();
    if let Some(host) = cli.host {
        config.device.credentials.host = host;
    }
    if let Some(username) = cli.username {
        config.device.credentials.username = username;
    }
    if let Some(password) = cli.password {
        config.device.credentials.password = password;
    }
    if let Some(delivery) = cli.delivery {
        config.delivery = delivery;
    }

    let succeeded = commands::handle_command(cli.command, config, cli.json).await?;
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

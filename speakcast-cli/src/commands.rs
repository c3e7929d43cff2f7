//! CLI command implementations

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use bytes::Bytes;
use clap::Subcommand;
use speakcast_core::session::{PendingTransmit, StreamSessionManager};
use speakcast_core::transcode::{ProgressEvents, ProgressSample};
use speakcast_core::{
    AudioSource, CommandReply, SpeakcastConfig, TranscodeProcessController, TransmitResult,
};
use tracing::debug;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Check connectivity and credentials against the device
    Probe,
    /// Stream an audio file to the device
    Stream {
        /// Any audio file the transcoder can read
        file: PathBuf,
    },
    /// Upload a pre-encoded G.711 mu-law file as is
    Upload {
        /// Raw mu-law audio, 8 kHz mono
        file: PathBuf,
    },
    /// Play a sine tone through the streaming path
    Tone {
        /// Tone length in seconds
        #[arg(short, long, default_value_t = 1.0)]
        duration: f64,
        /// Tone frequency in Hz
        #[arg(short, long, default_value_t = 1000)]
        frequency: u32,
    },
    /// Check that the transcoder can be executed
    CheckTranscoder,
}

/// Runs one command; returns whether it succeeded.
///
/// # Errors
/// Setup failures such as an invalid configuration or an unreadable file
pub async fn handle_command(
    command: Commands,
    config: SpeakcastConfig,
    json: bool,
) -> anyhow::Result<bool> {
    match command {
        Commands::Probe => probe(&config, json).await,
        Commands::Stream { file } => stream(&config, AudioSource::file(file), json).await,
        Commands::Upload { file } => upload(&config, file, json).await,
        Commands::Tone {
            duration,
            frequency,
        } => {
            let duration = Duration::try_from_secs_f64(duration)
                .context("Tone duration must be a non-negative number of seconds")?;
            if frequency == 0 {
                bail!("Tone frequency must be greater than 0");
            }
            let source = AudioSource::TestTone {
                frequency_hz: frequency,
                duration,
            };
            stream(&config, source, json).await
        }
        Commands::CheckTranscoder => check_transcoder(&config, json).await,
    }
}

fn session_manager(config: &SpeakcastConfig) -> anyhow::Result<StreamSessionManager> {
    StreamSessionManager::from_config(config)
        .map_err(|e| anyhow::anyhow!("{}: {e}", e.user_message()))
}

async fn probe(config: &SpeakcastConfig, json: bool) -> anyhow::Result<bool> {
    let manager = session_manager(config)?;
    println!("Probing {}...", config.device.credentials.host);
    let reply = CommandReply::from(manager.test_connection().await);
    print_reply(&reply, json)
}

async fn upload(config: &SpeakcastConfig, file: PathBuf, json: bool) -> anyhow::Result<bool> {
    let manager = session_manager(config)?;
    let payload = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Cannot read {}", file.display()))?;

    println!("Uploading {} ({} bytes)...", file.display(), payload.len());
    let reply = CommandReply::from(manager.upload_raw(Bytes::from(payload)).await);
    print_reply(&reply, json)
}

async fn stream(
    config: &SpeakcastConfig,
    source: AudioSource,
    json: bool,
) -> anyhow::Result<bool> {
    let mut manager = session_manager(config)?;
    println!(
        "Streaming {} to {} via {} (Ctrl-C to stop)",
        source,
        config.device.credentials.host,
        manager.delivery_label()
    );

    let pending = manager.start(source);
    let reply = CommandReply::from(follow(&mut manager, pending).await);
    print_reply(&reply, json)
}

/// Prints progress until the stream ends; Ctrl-C requests a stop.
async fn follow(
    manager: &mut StreamSessionManager,
    mut pending: PendingTransmit,
) -> TransmitResult {
    let mut progress = pending.take_progress();
    let mut result = pending.completion().into_future();
    let mut interrupt = std::pin::pin!(tokio::signal::ctrl_c());
    let mut interrupted = false;

    let outcome = loop {
        tokio::select! {
            outcome = &mut result => break outcome,
            sample = next_sample(&mut progress), if progress.is_some() => match sample {
                Some(sample) => eprint!("\r{}", progress_line(&sample)),
                None => progress = None,
            },
            signal = &mut interrupt, if !interrupted => {
                interrupted = true;
                if let Err(e) = signal {
                    debug!("Ctrl-C handler unavailable: {}", e);
                    continue;
                }
                eprintln!();
                eprintln!("{}", manager.stop().message);
            }
        }
    };

    eprintln!();
    manager.reap();
    outcome
}

async fn next_sample(
    progress: &mut Option<ProgressEvents>,
) -> Option<ProgressSample> {
    match progress {
        Some(events) => events.next_sample().await,
        None => None,
    }
}

fn progress_line(sample: &ProgressSample) -> String {
    let elapsed = sample.elapsed.as_secs_f64();
    let mut line = format!("  {elapsed:>7.1}s sent");
    if let Some(size) = &sample.size_label {
        line.push_str(&format!(", {size}"));
    }
    if let Some(speed) = sample.speed_factor {
        line.push_str(&format!(", {speed:.2}x"));
    }
    line
}

async fn check_transcoder(config: &SpeakcastConfig, json: bool) -> anyhow::Result<bool> {
    let controller = TranscodeProcessController::new(config.transcoder.clone());
    let program = config.transcoder.program.display().to_string();

    let reply = if controller.is_available().await {
        CommandReply {
            message: Some(format!("{program} is available")),
            ..CommandReply::ok()
        }
    } else {
        CommandReply::failure(format!("{program} could not be executed"))
    };
    print_reply(&reply, json)
}

fn print_reply(reply: &CommandReply, json: bool) -> anyhow::Result<bool> {
    if json {
        println!("{}", serde_json::to_string_pretty(reply)?);
    } else {
        print_summary(reply);
    }
    Ok(reply.success || reply.stopped == Some(true))
}

fn print_summary(reply: &CommandReply) {
    if reply.stopped == Some(true) {
        println!("Stream stopped");
        return;
    }

    if reply.success {
        match (&reply.size, &reply.duration, &reply.speed) {
            (Some(size), Some(duration), Some(speed)) => {
                println!("Done: {size} sent, duration {duration}, speed {speed}");
            }
            _ => println!("{}", reply.message.as_deref().unwrap_or("OK")),
        }
        if let Some(status) = reply.status {
            println!("  HTTP status: {status}");
        }
        if let Some(data) = &reply.data {
            for line in data.lines().take(20) {
                println!("  {line}");
            }
        }
        return;
    }

    let error = reply
        .error
        .as_deref()
        .or(reply.message.as_deref())
        .unwrap_or("Unknown error");
    eprintln!("Error: {error}");
    if let Some(status) = reply.status {
        eprintln!("  HTTP status: {status}");
    }
    if let Some(stderr) = &reply.stderr {
        eprintln!("  Transcoder output (last lines):");
        let lines: Vec<&str> = stderr.lines().collect();
        for line in &lines[lines.len().saturating_sub(10)..] {
            eprintln!("    {line}");
        }
    }
}

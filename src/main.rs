use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scope_link::media;
use scope_link::{
    ClientConfig, InitialParametersOverlay, MediaStream, PromptUpdateOptions, SessionClient,
    StyleAdapter,
};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// scope-link command line arguments
#[derive(Parser, Debug)]
#[command(name = "scope-link")]
#[command(version, about = "Stream live video through a remote AI generation pipeline", long_about = None)]
struct CliArgs {
    /// Scope server base URL (overrides SCOPE_URL)
    #[arg(short = 'u', long, value_name = "URL")]
    url: Option<String>,

    /// Pipeline to load
    #[arg(short = 'p', long, value_name = "ID")]
    pipeline_id: Option<String>,

    /// Server-side path of style adapter weights to prefer
    #[arg(long, value_name = "PATH")]
    adapter_path: Option<String>,

    /// Initial prompt for the first frames
    #[arg(long, value_name = "TEXT")]
    prompt: Option<String>,

    /// Reference image to upload for reference conditioning (repeatable)
    #[arg(long, value_name = "FILE")]
    reference_image: Vec<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose);

    let mut config = ClientConfig::from_env();
    if let Some(url) = args.url {
        config.base_url = url;
    }
    if let Some(id) = args.pipeline_id {
        config.pipeline_id = id;
    }
    if let Some(path) = args.adapter_path {
        config.style_adapter = Some(StyleAdapter::new(path));
    }
    config.reference_images = args.reference_image.clone();

    let client = Arc::new(
        SessionClient::new(config).with_remote_track_handler(|track| {
            tracing::info!(kind = ?track.kind(), id = %track.id(), "processed track arrived");
        }),
    );

    // Print state transitions while the session lives
    let mut status_rx = client.subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow().clone();
            match &status.error {
                Some(error) => tracing::error!(state = %status.state, %error, "session status"),
                None => tracing::info!(state = %status.state, "session status"),
            }
        }
    });

    if !args.reference_image.is_empty() {
        let uploaded = client.upload_reference_images().await?;
        tracing::info!(uploaded, "reference images uploaded");
    }

    // The demo sends a silent video track; a real caller feeds encoded
    // frames into it from a capture or render loop.
    let mut stream = MediaStream::new();
    stream.add_track(media::video_sample_track("video", "scope-link"));

    let overlay = match &args.prompt {
        Some(text) => InitialParametersOverlay::with_prompt(text.clone()),
        None => InitialParametersOverlay::default(),
    };
    client.connect(&stream, overlay).await?;

    println!("Session negotiated. Type a prompt and press enter to steer the pipeline; ctrl-c to quit.");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) => {
                    let text = line.trim();
                    if text.is_empty() {
                        continue;
                    }
                    if let Err(e) = client
                        .update_prompt(text, PromptUpdateOptions::default())
                        .await
                    {
                        tracing::warn!("prompt update failed: {}", e);
                    }
                }
                None => break,
            },
        }
    }

    client.disconnect().await;
    Ok(())
}

fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "scope_link=error,webrtc=error",
        LogLevel::Warn => "scope_link=warn,webrtc=warn",
        LogLevel::Info => "scope_link=info,webrtc=warn",
        LogLevel::Debug => "scope_link=debug,webrtc=info",
        LogLevel::Trace => "scope_link=trace,webrtc=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

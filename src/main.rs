use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use callcoach::{
    create_router, AppConfig, AppState, AudioSource, CallConfig, CallSessionController, CallState,
    DefaultBackends, Role, TranscriptMessage,
};
use callcoach::call::TranscriptFeed;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "callcoach", version, about = "Practice sales calls against a simulated customer")]
struct Cli {
    /// Config file, extension optional
    #[arg(long, default_value = "config/callcoach")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP control API
    Serve,

    /// Run one call in the terminal
    Call {
        /// Stream this WAV file instead of the microphone
        #[arg(long)]
        input: Option<PathBuf>,

        /// Input device name (default device when omitted)
        #[arg(long)]
        device: Option<String>,

        /// System instruction for the simulated customer
        #[arg(long)]
        prompt: Option<String>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "callcoach=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = AppConfig::load(&cli.config)?;
    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Commands::Serve => serve(cfg).await,
        Commands::Call {
            input,
            device,
            prompt,
        } => {
            let source = match input {
                Some(path) => AudioSource::File(path),
                None => AudioSource::Microphone { device },
            };
            call(cfg, source, prompt.unwrap_or_default()).await
        }
    }
}

async fn serve(cfg: AppConfig) -> Result<()> {
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("HTTP API listening on {}", addr);
    axum::serve(listener, create_router(AppState::new(cfg)))
        .await
        .context("HTTP server failed")
}

fn print_message(message: &TranscriptMessage) {
    let speaker = match message.role {
        Role::User => "You",
        Role::Model => "Customer",
    };
    println!("[{}] {}: {}", message.timestamp.format("%H:%M:%S"), speaker, message.text.trim());
}

async fn call(cfg: AppConfig, source: AudioSource, prompt: String) -> Result<()> {
    let backends = Arc::new(DefaultBackends::new(&cfg, source));
    let (controller, handle) = CallSessionController::new(CallConfig::from_app(&cfg, prompt), backends);
    let task = tokio::spawn(controller.run());

    handle.start().await?;
    println!("Calling... Ctrl-C hangs up, 'm' toggles mute.");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let mut feed = TranscriptFeed::new();
    let mut last_state = CallState::Idle;
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Hanging up");
                handle.hangup().await?;
                break;
            }
            line = stdin.next_line(), if stdin_open => {
                let Some(command) = line? else {
                    stdin_open = false;
                    continue;
                };
                let result = match command.trim() {
                    "m" => handle.toggle_mute().await,
                    "r" => handle.retry().await,
                    "q" if handle.state() == CallState::Error => handle.cancel().await,
                    "q" => handle.hangup().await,
                    _ => continue,
                };
                match result {
                    Ok(CallState::Ended) => break,
                    Ok(_) => {}
                    Err(e) => warn!("{}", e),
                }
            }
            _ = ticker.tick() => {
                let snapshot = handle.snapshot().await?;
                feed.complete(snapshot.stats.attempts, &snapshot.transcript)
                    .iter()
                    .for_each(print_message);

                if snapshot.state != last_state {
                    last_state = snapshot.state;
                    match snapshot.state {
                        CallState::Connected => println!("Connected."),
                        CallState::Error => println!(
                            "Call failed: {}. 'r' retries, 'q' quits.",
                            snapshot.error.as_deref().unwrap_or("unknown error")
                        ),
                        _ => {}
                    }
                }
            }
        }
    }

    let outcome = task.await.context("Call task failed")?;
    feed.rest(outcome.stats.attempts, &outcome.transcript)
        .iter()
        .for_each(print_message);
    println!(
        "Call {} ended: {} messages, {:.1}s connected, {} frames sent",
        outcome.session_id,
        outcome.transcript.len(),
        outcome.stats.connected_secs,
        outcome.stats.frames_forwarded
    );

    Ok(())
}

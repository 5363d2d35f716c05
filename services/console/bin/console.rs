//! Main entrypoint for the realtime console.
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and the command line.
//! 2. Initializing logging on stderr so the transcript owns stdout.
//! 3. Wiring the realtime connector and the audio backend into the app.
//! 4. Feeding terminal input to the app until `/quit` or Ctrl+C.

use anyhow::Context;
use clap::Parser;
use console_core::{dispatch::Console, form::Form};
use openai_realtime::WebSocketConnector;
use openai_realtime_types::Voice;
use realtime_console::{
    app::App,
    audio::AudioBackend,
    config::Config,
    ui::{self, HELP, TerminalRenderer, UiCommand},
};
use std::sync::Arc;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Talk to a realtime assistant from the terminal")]
struct Cli {
    /// Voice the assistant speaks with.
    #[arg(long, default_value = "alloy")]
    voice: Voice,

    /// Sampling temperature, 0.6 to 1.2.
    #[arg(long, default_value_t = 0.8)]
    temperature: f32,

    /// Language the assistants answer in.
    #[arg(long, default_value = "English")]
    language: String,

    /// Connect to Azure OpenAI (needs REALTIME_ENDPOINT).
    #[arg(long)]
    azure: bool,

    /// Do not open the microphone.
    #[arg(long)]
    chat_only: bool,

    /// Start a session right away.
    #[arg(long)]
    autostart: bool,
}

fn audio_backend() -> Arc<dyn AudioBackend> {
    #[cfg(feature = "native-audio")]
    {
        Arc::new(realtime_console::audio::native::NativeAudio)
    }
    #[cfg(not(feature = "native-audio"))]
    {
        Arc::new(realtime_console::audio::NullAudio)
    }
}

/// Forwards terminal lines to the app as commands.
async fn read_terminal(ui_tx: mpsc::Sender<UiCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match ui::parse_line(&line) {
                Ok(Some(command)) => {
                    if ui_tx.send(command).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => eprintln!("* {}", e),
            },
            Ok(None) => {
                let _ = ui_tx.send(UiCommand::Quit).await;
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read terminal input");
                let _ = ui_tx.send(UiCommand::Quit).await;
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!(
        azure = cli.azure,
        deployment = %config.deployment,
        "Configuration loaded"
    );

    // --- 3. Build the Console ---
    let mut form = Form::default();
    form.set_voice(cli.voice);
    form.set_temperature(cli.temperature).context("Invalid --temperature")?;
    form.set_language(&cli.language)?;
    form.set_azure(cli.azure)?;
    form.set_chat_only(cli.chat_only)?;
    if cli.azure {
        config.endpoint(true)?;
    }

    let mut app = App::new(
        Console::new(form),
        config,
        Arc::new(WebSocketConnector),
        audio_backend(),
        Box::new(TerminalRenderer::stdout()),
    );

    // --- 4. Run ---
    let (ui_tx, ui_rx) = mpsc::channel(32);
    eprintln!("{}", HELP);
    if cli.autostart {
        ui_tx.send(UiCommand::Start).await?;
    }
    tokio::spawn(read_terminal(ui_tx.clone()));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C. Shutting down...");
            let _ = ui_tx.send(UiCommand::Quit).await;
        }
    });

    app.run(ui_rx).await?;
    info!("Console has shut down.");
    Ok(())
}

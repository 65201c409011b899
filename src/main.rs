//! Application entry point for `voice-command`.
//!
//! # Startup sequence
//!
//! 1. Parse the command line.
//! 2. Initialise logging (`RUST_LOG` overrides the default `info`).
//! 3. Load [`AppConfig`] from disk (defaults on first run).
//! 4. Create the [`tokio`] runtime.
//! 5. Build the [`SpeechService`] with the microphone, the wake word engine,
//!    the speech provider client and the training client.
//! 6. Run the requested command. `run` (the default) listens until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use voice_command::audio::{AudioSource, MicrophoneSource};
use voice_command::config::{AppConfig, AppPaths, HOTWORD_SAMPLES};
use voice_command::events::{ChannelEventSink, EventSink, LogEventSink};
use voice_command::hotword::DetectorFactory;
use voice_command::pipeline::PipelineServices;
use voice_command::recognition::AzureSpeechClient;
use voice_command::resource::LocalResourceBroker;
use voice_command::service::{SourceFactory, SpeechService};
use voice_command::training::HttpTrainingClient;

/// Hotword-triggered voice commands
#[derive(Parser)]
#[command(name = "voice-command", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for the hotword until Ctrl-C (default)
    Run,
    /// Print the service status as JSON
    Status,
    /// Select the speech-to-text provider and store its API key
    SetProvider { id: u32, api_key: String },
    /// Store the API token of the hotword training service
    SetToken { token: String },
    /// Record the next hotword sample; the third one starts training
    Record,
    /// Train a voice model from the three recorded samples
    Train,
    /// Delete the voice model and the recorded samples
    Reset,
    /// Report hotword detections without recording commands
    TestHotword {
        /// How long to listen, in seconds
        #[arg(short, long, default_value = "30")]
        duration: u64,
    },
    /// Enable the service and listen until Ctrl-C
    Enable,
    /// Disable the service
    Disable,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice-command starting up");

    let paths = AppPaths::new();
    let config = AppConfig::load_from(&paths.settings_file).unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(run(cli.command.unwrap_or(Command::Run), config, paths))
}

async fn run(command: Command, config: AppConfig, paths: AppPaths) -> anyhow::Result<()> {
    let waits_for_training = matches!(command, Command::Record | Command::Train);
    let (events, mut event_rx): (Arc<dyn EventSink>, _) = if waits_for_training {
        let (sink, rx) = ChannelEventSink::new(16);
        (Arc::new(sink) as Arc<dyn EventSink>, Some(rx))
    } else {
        (Arc::new(LogEventSink) as Arc<dyn EventSink>, None)
    };

    let services = PipelineServices {
        detectors: detector_factory(),
        recognizer: Arc::new(AzureSpeechClient::new(
            config.provider.endpoint.as_deref(),
            Duration::from_secs(config.provider.timeout_secs),
        )),
        events,
        broker: Arc::new(LocalResourceBroker::new()),
    };
    let trainer = Arc::new(HttpTrainingClient::new(&config.training));
    let sources: SourceFactory =
        Box::new(|| Box::new(MicrophoneSource::default()) as Box<dyn AudioSource>);

    let mut service = SpeechService::new(config, paths, sources, services, trainer);

    let mut training_started = false;
    match command {
        Command::Run => {
            if !service.start()? {
                log::warn!("Not listening; see the warnings above");
                return Ok(());
            }
            log::info!("Listening; press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            log::info!("Shutting down");
            service.stop().await;
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&service.status())?);
        }
        Command::SetProvider { id, api_key } => {
            service.set_provider(id, &api_key).await?;
            log::info!("Provider {id} saved");
        }
        Command::SetToken { token } => {
            service.set_hotword_token(&token)?;
            log::info!("Training token saved");
        }
        Command::Record => {
            let slot = service.record_hotword().await?;
            log::info!("Hotword sample {} recorded", slot + 1);
            training_started = slot + 1 == HOTWORD_SAMPLES;
        }
        Command::Train => {
            service.build_hotword()?;
            training_started = true;
        }
        Command::Reset => service.reset_hotword().await?,
        Command::TestHotword { duration } => {
            if !service.start_hotword_test()? {
                log::warn!("Hotword test could not start; see the warnings above");
                return Ok(());
            }
            log::info!("Say the hotword ({duration}s)");
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(duration)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
            service.stop_hotword_test().await;
        }
        Command::Enable => {
            if service.enable_service().await? {
                log::info!("Service enabled and listening; press Ctrl-C to stop");
                tokio::signal::ctrl_c().await?;
                service.stop().await;
            }
        }
        Command::Disable => service.disable_service().await?,
    }

    // Training runs in the background; wait for its verdict.
    if let Some(rx) = event_rx.as_mut().filter(|_| training_started) {
        log::info!("Training voice model...");
        while let Some(event) = rx.recv().await {
            log::info!("event: {} {}", event.name, event.params);
            if event.name.starts_with("training.") {
                break;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Detector factory
// ---------------------------------------------------------------------------

#[cfg(feature = "wake-word")]
fn detector_factory() -> Arc<dyn DetectorFactory> {
    Arc::new(voice_command::hotword::WakeWordFactory)
}

/// Fallback when built without the wake word engine: every model fails to
/// load, so the pipeline never starts.
#[cfg(not(feature = "wake-word"))]
fn detector_factory() -> Arc<dyn DetectorFactory> {
    use voice_command::hotword::{DetectorError, HotwordDetector, VoiceModel};

    struct NoEngine;

    impl DetectorFactory for NoEngine {
        fn load(&self, _model: &VoiceModel) -> Result<Box<dyn HotwordDetector>, DetectorError> {
            Err(DetectorError::Load(
                "built without the `wake-word` feature".into(),
            ))
        }
    }

    Arc::new(NoEngine)
}

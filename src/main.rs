//! visualeyes-core: interaction core for a voice-first visual assistant
//!
//! The core runs as a headless process and provides:
//! - Gesture-driven mode selection (double/triple volume presses)
//! - Guidance loops that capture frames, describe them aloud and listen
//!   for voice commands
//! - A question interrupt that pauses and restores the active mode
//! - Exam-mode companion pairing over the local network
//!
//! Camera, speech synthesis/recognition and key hooks are platform
//! services behind trait seams; this build wires in the local stand-ins
//! (spooled frames, console speech, stdin gestures) plus the HTTP
//! backend for vision, answers and translation.

mod config;
mod controller;
mod events;
mod gesture;
mod guidance;
mod lifecycle;
mod pairing;
mod prompts;
mod services;
mod speech;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::controller::{Command, Controller, Services};
use crate::events::StateEvent;
use crate::gesture::GestureListener;
use crate::lifecycle::ShutdownSignal;
use crate::services::backend::BackendClient;
use crate::services::local::{EnvAddressPrompt, JsonSettings, NullLocation, SpoolCamera};
use crate::speech::{ConsoleSpeech, IdleMicrophone};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "visualeyes-core starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(backend = %config.backend_url, data_dir = ?config.data_dir, "configuration loaded");

    // Create shutdown signal handler
    let mut shutdown = ShutdownSignal::new()?;

    // Create channels for inter-component communication
    // Gesture listener -> controller
    let (gesture_tx, mut gesture_rx) = mpsc::channel(32);
    // Everything -> controller actor
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(64);
    // Controller -> observers (for broadcasting state events)
    let (event_tx, _event_rx) = broadcast::channel::<StateEvent>(64);

    // Wire up the services behind the controller's trait seams
    let backend = Arc::new(BackendClient::new(&config.backend_url)?);
    let settings = Arc::new(JsonSettings::load(
        config.profile_path(),
        &config.language_code,
    ));
    let services = Services {
        speech_out: Arc::new(ConsoleSpeech),
        speech_in: Arc::new(IdleMicrophone::default()),
        camera: Arc::new(SpoolCamera::new(config.incoming_dir(), config.frames_dir())),
        vision: backend.clone(),
        answers: backend.clone(),
        translator: backend,
        settings,
        location: Arc::new(NullLocation),
        address_prompt: Arc::new(EnvAddressPrompt),
    };

    // Create the controller actor
    let mut controller = Controller::new(config, services, cmd_tx.clone(), event_tx.clone());

    // Start the gesture listener (runs on dedicated thread)
    let gesture_listener = GestureListener::new(gesture_tx);
    match gesture_listener.start() {
        Ok(()) => info!("gesture listener started"),
        Err(e) => {
            error!(?e, "failed to start gesture listener");
            warn!("continuing without gesture input");
        }
    }

    // Forward gestures into the controller's command channel
    let forward = tokio::spawn(async move {
        while let Some(gesture) = gesture_rx.recv().await {
            if cmd_tx.send(Command::Gesture(gesture)).await.is_err() {
                break;
            }
        }
    });

    let mut event_rx = event_tx.subscribe();

    info!("core initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the controller (processes gestures, frames and utterances)
        _ = controller.run(cmd_rx) => {
            info!("controller exited");
        }

        // Log state events for observers
        _ = async {
            loop {
                match event_rx.recv().await {
                    Ok(event) => info!(%event, "state event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "state event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("state event handler exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    gesture_listener.stop();
    forward.abort();

    info!("visualeyes-core stopped");

    Ok(())
}

//! Gesture event source.
//!
//! Reads newline-delimited gesture tokens from standard input on a
//! dedicated thread. The host shell (or the platform bridge in a packaged
//! build) writes one token per recognized button gesture.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::GestureEvent;

/// Gesture listener feeding the controller channel from a dedicated thread
pub struct GestureListener {
    event_tx: mpsc::Sender<GestureEvent>,
    running: Arc<AtomicBool>,
}

impl GestureListener {
    /// Create a new gesture listener
    pub fn new(event_tx: mpsc::Sender<GestureEvent>) -> Self {
        Self {
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the listener thread
    ///
    /// The thread blocks on standard input and forwards each recognized
    /// token until input closes or `stop()` is called.
    pub fn start(&self) -> Result<(), GestureError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(GestureError::AlreadyRunning);
        }

        let event_tx = self.event_tx.clone();
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name("gesture-listener".to_string())
            .spawn(move || {
                info!("gesture listener thread started");

                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }

                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            warn!(?e, "gesture input read error");
                            break;
                        }
                    };

                    let event: GestureEvent = match line.parse() {
                        Ok(event) => event,
                        Err(()) => {
                            if !line.trim().is_empty() {
                                debug!(token = %line.trim(), "unrecognized gesture token");
                            }
                            continue;
                        }
                    };

                    if event_tx.blocking_send(event).is_err() {
                        warn!("failed to send gesture event - channel closed?");
                        break;
                    }
                }

                running.store(false, Ordering::SeqCst);
                info!("gesture listener thread stopped");
            })
            .map_err(|e| GestureError::ThreadSpawn(e.to_string()))?;

        Ok(())
    }

    /// Stop the listener; takes effect on the next input line
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the gesture listener
#[derive(Debug, thiserror::Error)]
pub enum GestureError {
    #[error("gesture listener is already running")]
    AlreadyRunning,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),
}

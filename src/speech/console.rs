//! Console stand-ins for the platform speech services.
//!
//! `ConsoleSpeech` prints announcements to stdout; `IdleMicrophone` keeps
//! the listen-cycle contract (bounded window, one outstanding call) while
//! never recognizing anything. A packaged build swaps in the platform
//! TTS/STT bridges behind the same traits.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{SpeechInput, SpeechOutput};

/// Speech output that prints instead of speaking
#[derive(Default)]
pub struct ConsoleSpeech;

#[async_trait]
impl SpeechOutput for ConsoleSpeech {
    async fn speak(&self, text: &str) {
        info!(text, "speaking");
        println!("[speak] {text}");
    }

    fn stop(&self) {
        debug!("speech halted");
    }
}

/// Speech input that waits out the window and hears nothing
#[derive(Default)]
pub struct IdleMicrophone {
    busy: Mutex<()>,
}

#[async_trait]
impl SpeechInput for IdleMicrophone {
    async fn listen_once(&self, window: Duration, _language: &str) -> String {
        // One outstanding listen at a time; a concurrent call is a no-op.
        let Ok(_guard) = self.busy.try_lock() else {
            debug!("listen rejected, another listen is outstanding");
            return String::new();
        };

        tokio::time::sleep(window).await;
        String::new()
    }
}

//! Speech input/output seams.
//!
//! Text-to-speech and speech recognition are platform services; the
//! controller only sees these two traits.

mod console;

pub use console::{ConsoleSpeech, IdleMicrophone};

use std::time::Duration;

use async_trait::async_trait;

/// Spoken output
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Speak the given text. Failures are the backend's problem; the
    /// controller never treats a missed announcement as fatal.
    async fn speak(&self, text: &str);

    /// Halt any in-progress speech. Safe to call when idle.
    fn stop(&self);
}

/// Speech recognition
#[async_trait]
pub trait SpeechInput: Send + Sync {
    /// Listen for one utterance within the window.
    ///
    /// Returns the recognized text, or an empty string on timeout or no
    /// result. Implementations allow exactly one outstanding call; a
    /// second concurrent call returns empty immediately.
    async fn listen_once(&self, window: Duration, language: &str) -> String;
}

//! Collaborator contracts the controller depends on.
//!
//! Camera, vision, answering, translation, settings and location are
//! external services; the controller only sees these traits. The `backend`
//! module talks to the VisualEyes HTTP backend, `local` holds the on-device
//! collaborators.

pub mod backend;
pub mod local;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Latitude/longitude pair from the location provider
pub type GeoFix = (f64, f64);

/// Failure taxonomy shared by all collaborators. Nothing here is fatal:
/// every variant collapses to a spoken fallback and a defined transition.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("operation timed out")]
    Timeout,

    #[error("transient service failure: {0}")]
    Transient(String),
}

/// User-facing settings, persisted by the settings collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub display_name: String,
    pub language_code: String,
    pub companion_address: Option<String>,
}

/// Produces camera frames on demand; each guidance tick asks for one
#[async_trait]
pub trait CameraCapture: Send + Sync {
    /// Capture a single frame and return where it was stored
    async fn capture_frame(&self) -> Result<PathBuf, ServiceError>;
}

/// Scene description over captured frames
#[async_trait]
pub trait VisionService: Send + Sync {
    /// Describe a frame for a blind user in the given language
    async fn describe(&self, image: &Path, language: &str) -> Result<String, ServiceError>;

    /// Read on-screen or printed text visible in a frame
    async fn read_text(&self, image: &Path, language: &str) -> Result<String, ServiceError>;

    /// How the last-detected object is used
    async fn object_usage(&self, language: &str) -> Result<String, ServiceError>;

    /// Relative size of the last-detected object
    async fn object_size(&self, language: &str) -> Result<String, ServiceError>;

    /// Last vision error text, drained on read. Kept for diagnostic
    /// display, never spoken.
    fn last_error(&self) -> Option<String>;
}

/// Answers one-off questions with recent visual context
#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn answer(
        &self,
        question: &str,
        language: &str,
        images: &[PathBuf],
        location: Option<GeoFix>,
    ) -> Result<String, ServiceError>;
}

/// Text translation into the user's language
#[async_trait]
pub trait TranslationService: Send + Sync {
    async fn translate(&self, text: &str, language: &str) -> Result<String, ServiceError>;
}

/// Narrow interface over the externally-owned user profile
pub trait SettingsStore: Send + Sync {
    fn profile(&self) -> UserProfile;
    fn set_display_name(&self, name: &str);
    fn set_language_code(&self, code: &str);
    fn set_companion_address(&self, address: Option<String>);
    /// Change notification; receivers see every profile update
    fn watch(&self) -> watch::Receiver<UserProfile>;
}

/// Best-effort location. Never fails: denial, disabled services and fix
/// errors all collapse to `None`.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_fix(&self) -> Option<GeoFix>;
}

/// Manual fallback input when companion auto-discovery fails
#[async_trait]
pub trait AddressPrompt: Send + Sync {
    /// Returns the user-entered companion address, unnormalized
    async fn companion_address(&self) -> Option<String>;
}

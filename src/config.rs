//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

/// Port the desktop companion listens on.
pub const COMPANION_PORT: u16 = 8765;

/// Core configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the vision backend
    pub backend_url: String,

    /// Default BCP-47 language code when the profile has none
    pub language_code: String,

    /// Interval between guidance frame captures
    pub capture_interval: Duration,

    /// Listen window for voice commands inside a guidance loop
    pub listen_window: Duration,

    /// Listen window for question mode
    pub question_listen_window: Duration,

    /// Suppression window for near-duplicate announcements
    pub announce_cooldown: Duration,

    /// How long the pairing listener waits for the companion to fetch
    /// its installer
    pub pairing_wait: Duration,

    /// Companion installer payload served during pairing
    pub payload_path: PathBuf,

    /// Directory for runtime data (captured frames, profile)
    pub data_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME")?;
        let data_dir = std::env::var("VISUALEYES_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                PathBuf::from(&home)
                    .join(".local")
                    .join("share")
                    .join("visualeyes")
            });

        let payload_path = std::env::var("VISUALEYES_COMPANION_PAYLOAD")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("companion.zip"));

        Ok(Self {
            backend_url: std::env::var("VISUALEYES_BACKEND_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
            language_code: std::env::var("VISUALEYES_LANGUAGE")
                .unwrap_or_else(|_| "en-IN".to_string()),
            capture_interval: env_secs("VISUALEYES_CAPTURE_INTERVAL_SECS", 5),
            listen_window: env_secs("VISUALEYES_LISTEN_WINDOW_SECS", 6),
            question_listen_window: env_secs("VISUALEYES_QUESTION_WINDOW_SECS", 10),
            announce_cooldown: env_secs("VISUALEYES_ANNOUNCE_COOLDOWN_SECS", 20),
            pairing_wait: env_secs("VISUALEYES_PAIRING_WAIT_SECS", 600),
            payload_path,
            data_dir,
        })
    }

    /// Ensure data directories exist and drop frames left over from a
    /// previous run
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.incoming_dir())?;
        std::fs::create_dir_all(self.frames_dir())?;

        for entry in std::fs::read_dir(self.frames_dir())?.flatten() {
            if entry.path().is_file() {
                let _ = std::fs::remove_file(entry.path());
            }
        }
        Ok(())
    }

    /// Spool directory the platform camera bridge drops frames into
    pub fn incoming_dir(&self) -> PathBuf {
        self.data_dir.join("incoming")
    }

    /// Directory holding frames owned by the image context ring
    pub fn frames_dir(&self) -> PathBuf {
        self.data_dir.join("frames")
    }

    /// Path of the persisted user profile
    pub fn profile_path(&self) -> PathBuf {
        self.data_dir.join("profile.json")
    }
}

fn env_secs(key: &str, default: u64) -> Duration {
    let secs = std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load() {
        let config = Config::load().unwrap();
        assert!(config.data_dir.to_string_lossy().contains("visualeyes"));
        assert_eq!(config.capture_interval, Duration::from_secs(5));
        assert_eq!(config.announce_cooldown, Duration::from_secs(20));
    }

    #[test]
    fn test_env_secs_default_on_garbage() {
        std::env::set_var("VISUALEYES_TEST_SECS", "not-a-number");
        assert_eq!(env_secs("VISUALEYES_TEST_SECS", 7), Duration::from_secs(7));
        std::env::remove_var("VISUALEYES_TEST_SECS");
    }
}

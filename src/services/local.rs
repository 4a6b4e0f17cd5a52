//! On-device collaborators: frame spool camera, JSON-file settings,
//! and the fallback location/address providers used in headless runs.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{
    AddressPrompt, CameraCapture, GeoFix, LocationProvider, ServiceError, SettingsStore,
    UserProfile,
};

/// Camera fed by a spool directory.
///
/// The platform camera bridge drops encoded frames into `incoming`; each
/// capture takes the newest one and moves it into `store`, where the image
/// context ring owns its lifetime.
pub struct SpoolCamera {
    incoming: PathBuf,
    store: PathBuf,
    counter: AtomicU64,
}

impl SpoolCamera {
    pub fn new(incoming: PathBuf, store: PathBuf) -> Self {
        Self {
            incoming,
            store,
            counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl CameraCapture for SpoolCamera {
    async fn capture_frame(&self) -> Result<PathBuf, ServiceError> {
        let newest = std::fs::read_dir(&self.incoming)
            .map_err(|e| ServiceError::Unavailable(format!("frame spool: {e}")))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .max_by_key(|entry| {
                entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH)
            });

        let Some(entry) = newest else {
            return Err(ServiceError::Unavailable("no frame in spool".to_string()));
        };

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let dest = self.store.join(format!("frame-{n}.jpg"));
        std::fs::rename(entry.path(), &dest)
            .map_err(|e| ServiceError::Transient(format!("frame move failed: {e}")))?;
        Ok(dest)
    }
}

/// Settings collaborator persisting the profile as a JSON file
pub struct JsonSettings {
    path: PathBuf,
    profile: RwLock<UserProfile>,
    tx: watch::Sender<UserProfile>,
}

impl JsonSettings {
    /// Load the profile, falling back to an empty one with the given
    /// default language
    pub fn load(path: PathBuf, default_language: &str) -> Self {
        let profile = std::fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<UserProfile>(&bytes).ok())
            .unwrap_or_else(|| UserProfile {
                display_name: String::new(),
                language_code: default_language.to_string(),
                companion_address: None,
            });

        let (tx, _) = watch::channel(profile.clone());
        Self {
            path,
            profile: RwLock::new(profile),
            tx,
        }
    }

    fn update(&self, apply: impl FnOnce(&mut UserProfile)) {
        let updated = {
            let Ok(mut profile) = self.profile.write() else {
                warn!("profile lock poisoned, change dropped");
                return;
            };
            apply(&mut profile);
            profile.clone()
        };

        match serde_json::to_vec_pretty(&updated) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&self.path, bytes) {
                    warn!(path = ?self.path, ?e, "failed to persist profile");
                }
            }
            Err(e) => warn!(?e, "failed to encode profile"),
        }

        self.tx.send_replace(updated);
    }
}

impl SettingsStore for JsonSettings {
    fn profile(&self) -> UserProfile {
        self.profile
            .read()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn set_display_name(&self, name: &str) {
        self.update(|p| p.display_name = name.to_string());
    }

    fn set_language_code(&self, code: &str) {
        self.update(|p| p.language_code = code.to_string());
    }

    fn set_companion_address(&self, address: Option<String>) {
        self.update(|p| p.companion_address = address);
    }

    fn watch(&self) -> watch::Receiver<UserProfile> {
        self.tx.subscribe()
    }
}

/// Location provider for platforms without a fix source
pub struct NullLocation;

#[async_trait]
impl LocationProvider for NullLocation {
    async fn current_fix(&self) -> Option<GeoFix> {
        None
    }
}

/// Manual companion address supplied through the environment, the
/// headless stand-in for the app's address-entry screen
#[derive(Default)]
pub struct EnvAddressPrompt;

#[async_trait]
impl AddressPrompt for EnvAddressPrompt {
    async fn companion_address(&self) -> Option<String> {
        match std::env::var("VISUALEYES_COMPANION_ADDRESS") {
            Ok(value) if !value.trim().is_empty() => Some(value),
            _ => {
                debug!("no manual companion address configured");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("visualeyes-local-test-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_settings_roundtrip() {
        let path = temp_path("profile.json");
        let _ = std::fs::remove_file(&path);

        let settings = JsonSettings::load(path.clone(), "en-IN");
        assert_eq!(settings.profile().language_code, "en-IN");
        assert_eq!(settings.profile().companion_address, None);

        settings.set_display_name("Asha");
        settings.set_companion_address(Some("ws://192.168.0.7:8765".to_string()));

        // A fresh load sees the persisted values.
        let reloaded = JsonSettings::load(path.clone(), "en-IN");
        assert_eq!(reloaded.profile().display_name, "Asha");
        assert_eq!(
            reloaded.profile().companion_address.as_deref(),
            Some("ws://192.168.0.7:8765")
        );

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_settings_watch_notifies() {
        let path = temp_path("watch-profile.json");
        let _ = std::fs::remove_file(&path);

        let settings = JsonSettings::load(path.clone(), "en-IN");
        let mut rx = settings.watch();
        settings.set_language_code("ta-IN");
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().language_code, "ta-IN");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_spool_camera_takes_newest_and_moves() {
        let incoming = temp_path("spool-in");
        let store = temp_path("spool-out");
        std::fs::create_dir_all(&incoming).unwrap();
        std::fs::create_dir_all(&store).unwrap();

        let camera = SpoolCamera::new(incoming.clone(), store.clone());
        assert!(matches!(
            camera.capture_frame().await,
            Err(ServiceError::Unavailable(_))
        ));

        std::fs::write(incoming.join("a.jpg"), b"frame").unwrap();
        let captured = tokio_test::assert_ok!(camera.capture_frame().await);
        assert!(captured.starts_with(&store));
        assert!(captured.exists());
        assert!(!incoming.join("a.jpg").exists());

        let _ = std::fs::remove_dir_all(&incoming);
        let _ = std::fs::remove_dir_all(&store);
    }
}

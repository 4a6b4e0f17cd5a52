//! Bounded store of recent frame descriptions.
//!
//! Question mode sends these frames along with the spoken question, so the
//! answering service can see what the user was just looking at. Strict
//! FIFO: when full, the oldest entry is evicted and its image file removed
//! from the spool.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::warn;

/// How many recent frames are kept
const DEFAULT_CAPACITY: usize = 4;

/// One captured frame and its spoken-form description
#[derive(Debug, Clone)]
pub struct ImageContextEntry {
    pub path: PathBuf,
    pub description: String,
    pub captured_at: SystemTime,
}

/// FIFO ring of the most recent captured-frame descriptions
pub struct ImageContextRing {
    entries: VecDeque<ImageContextEntry>,
    capacity: usize,
}

impl ImageContextRing {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a captured frame, evicting (and deleting) the oldest when full
    pub fn push(&mut self, path: PathBuf, description: String) {
        if self.entries.len() == self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                release_image(&evicted.path);
            }
        }

        self.entries.push_back(ImageContextEntry {
            path,
            description,
            captured_at: SystemTime::now(),
        });
    }

    /// Buffered image paths, oldest first
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    /// The most recently captured entry
    pub fn latest(&self) -> Option<&ImageContextEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for ImageContextRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Delete an evicted frame from the spool. Best effort; the spool directory
/// is cleaned on startup anyway.
fn release_image(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(?path, ?e, "failed to remove evicted frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_frame(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "visualeyes-ctx-test-{}-{name}.jpg",
            std::process::id()
        ));
        std::fs::write(&path, b"jpeg bytes").unwrap();
        path
    }

    #[test]
    fn test_push_and_order() {
        let mut ring = ImageContextRing::new();
        ring.push(PathBuf::from("/tmp/a.jpg"), "first".into());
        ring.push(PathBuf::from("/tmp/b.jpg"), "second".into());

        assert_eq!(ring.len(), 2);
        assert_eq!(
            ring.paths(),
            vec![PathBuf::from("/tmp/a.jpg"), PathBuf::from("/tmp/b.jpg")]
        );
        assert_eq!(ring.latest().unwrap().description, "second");
    }

    #[test]
    fn test_fifo_eviction_releases_file() {
        let mut ring = ImageContextRing::new();
        let first = temp_frame("evict-0");
        ring.push(first.clone(), "oldest".into());
        for i in 1..=4 {
            ring.push(temp_frame(&format!("evict-{i}")), format!("frame {i}"));
        }

        assert_eq!(ring.len(), 4);
        // Oldest entry is gone from the ring and from disk.
        assert!(!ring.paths().contains(&first));
        assert!(!first.exists());

        // Clean up the surviving files.
        for path in ring.paths() {
            let _ = std::fs::remove_file(path);
        }
    }

    #[test]
    fn test_eviction_tolerates_missing_file() {
        let mut ring = ImageContextRing::with_capacity(1);
        ring.push(PathBuf::from("/tmp/visualeyes-never-existed.jpg"), "a".into());
        ring.push(PathBuf::from("/tmp/also-missing.jpg"), "b".into());
        assert_eq!(ring.len(), 1);
    }
}

//! Duplicate-announcement suppression.
//!
//! Scene descriptions arrive every few seconds and the same obstacle tends
//! to produce near-identical wording each time. Descriptions that carry
//! both a rough position and a rough distance are keyed on that pair alone,
//! so two objects at "left, very close" count as the same announcement even
//! when the labels differ. This deliberately trades recall for less chatter.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Soft cap on tracked descriptions; exceeding it triggers a purge of
/// entries older than twice the cooldown.
const MAX_TRACKED: usize = 100;

/// Position phrases, coarsest match wins
const LEFT_PHRASES: [&str; 3] = ["on your left", "to your left", "left side"];
const RIGHT_PHRASES: [&str; 3] = ["on your right", "to your right", "right side"];
const CENTER_PHRASES: [&str; 4] = ["in front", "ahead of you", "straight ahead", "center"];

/// Distance phrases, nearest match wins
const VERY_CLOSE_PHRASES: [&str; 3] = ["very close", "half a meter", "half a metre"];
const CLOSE_1M_PHRASES: [&str; 4] = ["about a meter", "one meter", "about a metre", "one metre"];
const FEW_METERS_PHRASES: [&str; 4] =
    ["few meters", "few metres", "meters away", "metres away"];
const FAR_PHRASES: [&str; 2] = ["far away", "far ahead"];

/// Decides whether a candidate announcement should be spoken or suppressed
/// as a near-duplicate of a recent one.
pub struct AnnouncementDedup {
    cooldown: Duration,
    last_spoken: HashMap<String, Instant>,
}

impl AnnouncementDedup {
    /// Create a deduplicator with the given suppression window
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_spoken: HashMap::new(),
        }
    }

    /// Should this description be spoken now?
    ///
    /// Returns false without touching any state for empty input, and false
    /// without refreshing the timestamp when the key was announced within
    /// the cooldown window.
    pub fn should_speak(&mut self, text: &str) -> bool {
        self.check(text, Instant::now())
    }

    fn check(&mut self, text: &str, now: Instant) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }

        let lower = trimmed.to_lowercase();
        let key = dedup_key(&lower);

        if let Some(&at) = self.last_spoken.get(&key) {
            if now.duration_since(at) < self.cooldown {
                return false;
            }
        }

        self.last_spoken.insert(key, now);

        if self.last_spoken.len() > MAX_TRACKED {
            let horizon = self.cooldown * 2;
            self.last_spoken
                .retain(|_, &mut at| now.duration_since(at) <= horizon);
        }

        true
    }

    /// Number of descriptions currently tracked
    pub fn tracked(&self) -> usize {
        self.last_spoken.len()
    }
}

/// Coarsen a lowercased description into its dedup key.
///
/// `position|distance` when both markers are present, the full text
/// otherwise.
fn dedup_key(lower: &str) -> String {
    let position = position_marker(lower);
    let distance = distance_marker(lower);

    match (position, distance) {
        (Some(p), Some(d)) => format!("{p}|{d}"),
        _ => lower.to_string(),
    }
}

fn position_marker(lower: &str) -> Option<&'static str> {
    if LEFT_PHRASES.iter().any(|p| lower.contains(p)) {
        Some("left")
    } else if RIGHT_PHRASES.iter().any(|p| lower.contains(p)) {
        Some("right")
    } else if CENTER_PHRASES.iter().any(|p| lower.contains(p)) {
        Some("center")
    } else {
        None
    }
}

fn distance_marker(lower: &str) -> Option<&'static str> {
    if VERY_CLOSE_PHRASES.iter().any(|p| lower.contains(p)) {
        Some("very_close")
    } else if CLOSE_1M_PHRASES.iter().any(|p| lower.contains(p)) {
        Some("close_1m")
    } else if FEW_METERS_PHRASES.iter().any(|p| lower.contains(p)) {
        Some("few_meters")
    } else if FAR_PHRASES.iter().any(|p| lower.contains(p)) {
        Some("far")
    } else {
        None
    }
}

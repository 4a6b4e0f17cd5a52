//! Self-echo filtering of recognized speech.
//!
//! The voice loop listens while the device speaker is announcing, and
//! without hardware echo cancellation the recognizer regularly returns the
//! system's own prompts. These ordered rules drop or trim the known echo
//! shapes; everything else passes through untouched. Best effort only,
//! false positives and negatives are accepted.

use std::collections::HashSet;

/// Marker of the legacy yes/no confirmation prompt
const CONFIRMATION_MARKER: &str = "did you say";
/// Fixed phrase the confirmation prompt ends with; the user's actual
/// answer follows it
const CONFIRMATION_TAIL: &str = "yes or no";

/// Marker of the language-selection prompt
const LANGUAGE_MARKER: &str = "which language";

/// Substrings of the system's own prompts (see `crate::prompts`); any match
/// drops the whole utterance
const SYSTEM_PROMPT_FRAGMENTS: [&str; 5] = [
    "double press volume up to start",
    "exam mode connects this phone",
    "cancelled",
    "please speak now",
    "could not understand",
];

/// Directional phrases that mark an utterance starting with "i see " as an
/// echoed scene announcement
const DIRECTION_PHRASES: [&str; 6] = [
    "on your left",
    "on your right",
    "to your left",
    "to your right",
    "in front",
    "ahead",
];

/// Minimum candidate length for the general overlap rule
const OVERLAP_MIN_LEN: usize = 8;
/// Word overlap with the last spoken text that counts as an echo
const OVERLAP_WORDS: usize = 3;
/// Words shorter than this are ignored when measuring overlap
const OVERLAP_MIN_WORD_LEN: usize = 3;

/// Filter recognized speech against known echoes of the system's own voice.
///
/// `last_spoken` is the most recent text sent to speech output. Returns the
/// surviving text trimmed, or an empty string when the utterance is judged
/// to be an echo. Idempotent: re-sanitizing the output changes nothing.
pub fn sanitize(raw: &str, last_spoken: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lower = trimmed.to_lowercase();

    // Rule 1: confirmation-prompt echo, keep only the user's yes/no.
    if lower.contains(CONFIRMATION_MARKER) {
        return match lower.find(CONFIRMATION_TAIL) {
            Some(at) => lower[at + CONFIRMATION_TAIL.len()..]
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_string(),
            None => String::new(),
        };
    }

    // Rule 2: language-prompt echo, only a trailing "english" survives.
    if lower.contains(LANGUAGE_MARKER) {
        return match lower.split_whitespace().last() {
            Some("english") => "english".to_string(),
            _ => String::new(),
        };
    }

    // Rule 3: known system prompts echo back whole.
    if SYSTEM_PROMPT_FRAGMENTS.iter().any(|f| lower.contains(f)) {
        return String::new();
    }

    // Rule 4: echoed scene announcement.
    if lower.starts_with(crate::prompts::SCENE_PREFIX)
        && DIRECTION_PHRASES.iter().any(|p| lower.contains(p))
    {
        return String::new();
    }

    // Rule 5: general overlap with whatever was spoken last.
    if trimmed.len() >= OVERLAP_MIN_LEN {
        let candidate = significant_words(&lower);
        let spoken = significant_words(&last_spoken.to_lowercase());
        let shared = candidate.intersection(&spoken).count();
        if shared >= OVERLAP_WORDS {
            return String::new();
        }
    }

    trimmed.to_string()
}

/// Alphanumeric words of length >= 3, for overlap measurement
fn significant_words(lower: &str) -> HashSet<String> {
    lower
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|w| w.len() >= OVERLAP_MIN_WORD_LEN)
        .map(|w| w.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts;

    #[test]
    fn test_empty_input() {
        assert_eq!(sanitize("", ""), "");
        assert_eq!(sanitize("   ", "anything"), "");
    }

    #[test]
    fn test_confirmation_prompt_keeps_answer() {
        let heard = "Did you say stop guidance? Please answer yes or no. Yes";
        assert_eq!(sanitize(heard, ""), "yes");
    }

    #[test]
    fn test_confirmation_prompt_without_tail_drops() {
        assert_eq!(sanitize("did you say something", ""), "");
    }

    #[test]
    fn test_language_prompt_keeps_trailing_english_only() {
        assert_eq!(sanitize("Which language do you prefer? English", ""), "english");
        assert_eq!(sanitize("which language do you prefer? Tamil", ""), "");
    }

    #[test]
    fn test_system_prompts_dropped() {
        assert_eq!(sanitize(prompts::LISTENING, ""), "");
        assert_eq!(sanitize(prompts::NOT_UNDERSTOOD, ""), "");
        assert_eq!(sanitize(prompts::CANCELLED, ""), "");
        assert_eq!(sanitize(prompts::SETUP_COMPLETE, ""), "");
        assert_eq!(sanitize(prompts::EXAM_EXPLAINER, ""), "");
    }

    /// The fragment list must keep matching the prompts it was cut from.
    #[test]
    fn test_fragments_match_current_prompts() {
        let all = [
            prompts::SETUP_COMPLETE,
            prompts::EXAM_EXPLAINER,
            prompts::CANCELLED,
            prompts::LISTENING,
            prompts::NOT_UNDERSTOOD,
        ]
        .map(|p| p.to_lowercase());

        for fragment in SYSTEM_PROMPT_FRAGMENTS {
            assert!(
                all.iter().any(|p| p.contains(fragment)),
                "fragment {fragment:?} no longer matches any prompt"
            );
        }
    }

    #[test]
    fn test_scene_echo_dropped() {
        assert_eq!(sanitize("I see a chair on your left", ""), "");
        // "i see" without a direction is a legitimate utterance.
        assert_eq!(sanitize("I see what you mean", ""), "I see what you mean");
    }

    #[test]
    fn test_overlap_with_last_spoken_dropped() {
        let spoken = "There is a crossing signal showing red ahead of you";
        assert_eq!(sanitize("crossing signal showing red", spoken), "");
    }

    #[test]
    fn test_short_candidate_skips_overlap_rule() {
        // Under 8 characters, even full overlap passes.
        assert_eq!(sanitize("red go", "red go red go red go"), "red go");
    }

    #[test]
    fn test_low_overlap_passes() {
        let spoken = "Visual guidance started";
        assert_eq!(
            sanitize("what is in front of me", spoken),
            "what is in front of me"
        );
    }

    #[test]
    fn test_passthrough_trims() {
        assert_eq!(sanitize("  stop guidance  ", ""), "stop guidance");
    }

    #[test]
    fn test_idempotent() {
        let cases = [
            "Did you say stop? please answer yes or no. no",
            "Which language do you prefer? English",
            "I see a pole on your right",
            "listening. please speak now",
            "  a perfectly normal sentence  ",
        ];
        for case in cases {
            let once = sanitize(case, "");
            let twice = sanitize(&once, "");
            assert_eq!(once, twice, "not idempotent for {case:?}");
        }
    }
}

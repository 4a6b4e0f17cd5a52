//! Fixed spoken phrases used by the controller.
//!
//! Centralized so the transcript sanitizer can recognize the system's own
//! voice when it leaks back in through the microphone.

/// Spoken once after first-run setup completes.
pub const SETUP_COMPLETE: &str =
    "Setup complete. Double press volume up to start, triple press to change mode.";

/// Spoken when entering exam mode for the first time.
pub const EXAM_EXPLAINER: &str =
    "Exam mode connects this phone to your computer so a helper can see your screen.";

/// Spoken when a pending interaction is cancelled.
pub const CANCELLED: &str = "Cancelled.";

/// Spoken right before a listen window opens.
pub const LISTENING: &str = "Listening. Please speak now.";

/// Spoken when a listen window closed without a usable result.
pub const NOT_UNDERSTOOD: &str = "Sorry, I could not understand that.";

/// Mode introductions, spoken when a guidance loop starts.
pub const INTRO_VISUAL: &str =
    "Visual guidance started. I will describe your surroundings every few seconds.";
pub const INTRO_ROAD: &str =
    "Road crossing guidance started. I will watch for vehicles and signals.";
pub const INTRO_ATM: &str =
    "ATM assistance started. Hold your phone towards the machine.";

/// Spoken when a guidance loop has fully stopped.
pub const GUIDANCE_STOPPED: &str = "Guidance stopped.";

/// Mutual-exclusion rejections.
pub const REJECT_GUIDANCE_DURING_EXAM: &str =
    "Camera guidance is not available while exam mode is connected.";
pub const REJECT_TRANSLATE_DURING_EXAM: &str =
    "Translation is not available while exam mode is connected.";
pub const REJECT_EXAM_DURING_GUIDANCE: &str =
    "Please stop guidance before starting exam mode.";

/// Exam mode lifecycle.
pub const EXAM_CONNECTED: &str = "Exam mode connected to your computer.";
pub const EXAM_DISCONNECTED: &str = "Exam mode disconnected.";
pub const EXAM_NO_COMPANION: &str =
    "Could not find your computer. Install the companion application and try again.";

/// Question mode.
pub const QUESTION_INVITE: &str = "What is your question?";
pub const QUESTION_NOT_HEARD: &str = "I did not hear a question.";
pub const QUESTION_NO_ANSWER: &str = "I do not have an answer for that right now.";

/// Translate mode.
pub const TRANSLATE_INVITE: &str = "Translation mode. Speak the phrase to translate.";
pub const TRANSLATE_FAILED: &str = "Translation is not available right now.";

/// Pairing.
pub const PAIRING_FAILED: &str = "Could not start pairing on this network.";
pub const PAIRING_TIMED_OUT: &str = "Pairing timed out. You can enter the address manually.";

/// Spoken when the "read" command finds no readable text.
pub const READ_NOTHING: &str = "I could not find any text to read.";

/// Prefix used by scene announcements; the sanitizer treats utterances that
/// start with it and carry a direction as echoes.
pub const SCENE_PREFIX: &str = "i see ";

/// Tells the user where the companion installer is being served.
pub fn pairing_instructions(addr: &std::net::SocketAddr) -> String {
    format!("To pair your computer, open http://{addr}/companion in its browser and run the installer.")
}

//! Guidance-loop building blocks.
//!
//! Leaf components driven by the controller while a capture loop is
//! running: duplicate-announcement suppression, self-echo filtering of
//! recognized speech, and the bounded ring of recent frame descriptions
//! used to answer follow-up questions.

mod context;
mod dedup;
mod sanitize;

pub use context::ImageContextRing;
pub use dedup::AnnouncementDedup;
pub use sanitize::sanitize;

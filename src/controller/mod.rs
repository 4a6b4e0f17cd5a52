//! Session/mode controller.
//!
//! A single actor owns the active mode, the guidance loops, the
//! announcement policy and the question interrupt. Gestures and
//! loop-internal messages arrive on one command channel; nothing outside
//! the actor mutates its state.

mod machine;

pub use machine::{Command, Controller, Services};

use serde::{Deserialize, Serialize};

/// Assistive modes. The controller tracks the active one as
/// `Option<Mode>`; `None` is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// General visual guidance
    Visual,
    /// Road-crossing guidance
    Road,
    /// ATM assistance
    Atm,
    /// Exam / remote-desktop mode, paired with the companion
    Exam,
    /// One-shot live translation
    Translate,
}

impl Mode {
    /// Visual, Road and Atm share the capture+listen guidance loop
    pub fn is_guidance(self) -> bool {
        matches!(self, Mode::Visual | Mode::Road | Mode::Atm)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Visual => write!(f, "visual"),
            Mode::Road => write!(f, "road"),
            Mode::Atm => write!(f, "atm"),
            Mode::Exam => write!(f, "exam"),
            Mode::Translate => write!(f, "translate"),
        }
    }
}

/// Cycling order for the triple-press gesture
const CYCLE_ORDER: [Mode; 5] = [Mode::Visual, Mode::Road, Mode::Atm, Mode::Exam, Mode::Translate];

/// Cyclic mode selection; survives mode start/stop and only moves on an
/// explicit cycle gesture
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeSelection {
    index: usize,
}

impl ModeSelection {
    pub fn current(&self) -> Mode {
        CYCLE_ORDER[self.index]
    }

    /// Advance to the next mode and return it
    pub fn advance(&mut self) -> Mode {
        self.index = (self.index + 1) % CYCLE_ORDER.len();
        self.current()
    }

    /// Point the selection at a specific mode
    pub fn select(&mut self, mode: Mode) {
        if let Some(index) = CYCLE_ORDER.iter().position(|&m| m == mode) {
            self.index = index;
        }
    }
}

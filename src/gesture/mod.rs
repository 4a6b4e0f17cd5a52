//! Volume-button gesture events.
//!
//! The platform layer owns key hooks and debouncing; by the time events
//! reach this core they are already discrete double/triple presses. The
//! listener here is the injection point that feeds them into the
//! controller's channel.

mod listener;

pub use listener::GestureListener;

/// Discrete gesture events delivered by the platform layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureEvent {
    /// Double press of volume up: start the selected mode
    VolumeUpDouble,
    /// Triple press of volume up: cycle the selection and start it
    VolumeUpTriple,
    /// Double press of volume down: stop the active mode and ask a question
    VolumeDownDouble,
}

impl std::str::FromStr for GestureEvent {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "volume_up_double" | "up2" | "uu" => Ok(GestureEvent::VolumeUpDouble),
            "volume_up_triple" | "up3" | "uuu" => Ok(GestureEvent::VolumeUpTriple),
            "volume_down_double" | "down2" | "dd" => Ok(GestureEvent::VolumeDownDouble),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(
            "volume_up_double".parse::<GestureEvent>(),
            Ok(GestureEvent::VolumeUpDouble)
        );
        assert_eq!("uuu".parse::<GestureEvent>(), Ok(GestureEvent::VolumeUpTriple));
        assert_eq!(" DD ".parse::<GestureEvent>(), Ok(GestureEvent::VolumeDownDouble));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("volume_sideways".parse::<GestureEvent>().is_err());
        assert!("".parse::<GestureEvent>().is_err());
    }
}

//! Sound cues for a terminal host.

use std::io::{self, Write};

use chatsim_core::{AudioCapability, PlaybackError, SoundKind};

/// Rings the terminal bell for incoming sounds. Terminals cannot vibrate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell {
    /// Also ring on the learner's own sent messages.
    pub ring_on_send: bool,
}

impl AudioCapability for TerminalBell {
    fn play(&self, sound: SoundKind) -> Result<(), PlaybackError> {
        if sound == SoundKind::Sent && !self.ring_on_send {
            return Ok(());
        }
        let mut out = io::stdout();
        out.write_all(b"\x07")
            .and_then(|_| out.flush())
            .map_err(|e| PlaybackError::Blocked(e.to_string()))
    }

    fn vibrate(&self, _duration_ms: u64) -> Result<(), PlaybackError> {
        Err(PlaybackError::Unsupported)
    }
}

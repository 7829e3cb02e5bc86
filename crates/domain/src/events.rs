use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub enum Dynamic {
    Pianissimo,
    Piano,
    MezzoPiano,
    MezzoForte,
    Forte,
    Fortissimo,
}

impl Dynamic {
    pub fn from_velocity(velocity: u8) -> Self {
        match velocity {
            0..=20 => Dynamic::Pianissimo,
            21..=50 => Dynamic::Piano,
            51..=80 => Dynamic::MezzoPiano,
            81..=100 => Dynamic::MezzoForte,
            101..=115 => Dynamic::Forte,
            _ => Dynamic::Fortissimo,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dynamic::Pianissimo => "pianissimo",
            Dynamic::Piano => "piano",
            Dynamic::MezzoPiano => "mezzo-piano",
            Dynamic::MezzoForte => "mezzo-forte",
            Dynamic::Forte => "forte",
            Dynamic::Fortissimo => "fortissimo",
        }
    }
}

/// One key transition from the host's MIDI stream. Timestamps are
/// milliseconds on the host's monotonic clock; the engine only ever
/// subtracts them, never interprets them as wall-clock time.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct NoteEvent {
    pub pitch: u8,
    pub velocity: u8,
    pub is_note_on: bool,
    pub timestamp_ms: f64,
}

impl NoteEvent {
    pub fn on(pitch: u8, velocity: u8, timestamp_ms: f64) -> Self {
        Self {
            pitch,
            velocity,
            is_note_on: true,
            timestamp_ms,
        }
    }

    pub fn off(pitch: u8, timestamp_ms: f64) -> Self {
        Self {
            pitch,
            velocity: 0,
            is_note_on: false,
            timestamp_ms,
        }
    }

    /// Decode a raw MIDI message. Returns `None` for anything that is not
    /// a note-on/note-off channel voice message. A note-on with velocity 0
    /// is a note-off per the MIDI spec.
    pub fn from_raw(bytes: &[u8], timestamp_ms: f64) -> Option<Self> {
        if bytes.len() < 3 {
            return None;
        }
        let (status, pitch, velocity) = (bytes[0] & 0xF0, bytes[1], bytes[2]);
        if pitch > 127 || velocity > 127 {
            return None;
        }
        match status {
            0x90 if velocity > 0 => Some(Self::on(pitch, velocity, timestamp_ms)),
            0x90 | 0x80 => Some(Self::off(pitch, timestamp_ms)),
            _ => None,
        }
    }

    pub fn dynamic(&self) -> Dynamic {
        Dynamic::from_velocity(self.velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_from_velocity() {
        assert_eq!(Dynamic::from_velocity(10), Dynamic::Pianissimo);
        assert_eq!(Dynamic::from_velocity(55), Dynamic::MezzoPiano);
        assert_eq!(Dynamic::from_velocity(120), Dynamic::Fortissimo);
    }

    #[test]
    fn dynamic_labels() {
        assert_eq!(Dynamic::from_velocity(110).label(), "forte");
        assert_eq!(Dynamic::from_velocity(40).label(), "piano");
    }

    #[test]
    fn decodes_note_on_and_off() {
        let on = NoteEvent::from_raw(&[0x90, 60, 96], 10.0).unwrap();
        assert!(on.is_note_on);
        assert_eq!(on.pitch, 60);

        let off = NoteEvent::from_raw(&[0x80, 60, 0], 20.0).unwrap();
        assert!(!off.is_note_on);
    }

    #[test]
    fn velocity_zero_note_on_is_off() {
        let event = NoteEvent::from_raw(&[0x90, 64, 0], 0.0).unwrap();
        assert!(!event.is_note_on);
        assert_eq!(event.pitch, 64);
    }

    #[test]
    fn ignores_non_note_messages() {
        assert!(NoteEvent::from_raw(&[0xB0, 64, 127], 0.0).is_none());
        assert!(NoteEvent::from_raw(&[0x90, 60], 0.0).is_none());
    }
}

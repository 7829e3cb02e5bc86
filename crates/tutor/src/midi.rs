use anyhow::Result;
use midir::MidiInput;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MidiDevice {
    pub name: String,
}

/// Input-port enumeration. The event stream itself is delivered by the
/// host, which decodes raw messages via `NoteEvent::from_raw` and feeds
/// them to the practice session.
pub struct MidiManager;

impl MidiManager {
    pub fn list_inputs() -> Result<Vec<MidiDevice>> {
        let input = MidiInput::new("klavier")?;
        let devices = input
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                let name = input
                    .port_name(port)
                    .unwrap_or_else(|_| format!("input-{index}"));
                MidiDevice { name }
            })
            .collect();
        Ok(devices)
    }
}

use serde::{Deserialize, Serialize};

/// A single notated event within a measure. `keys` carries the engraving
/// spellings ("c/4", "e/4"), `midi_numbers` the sounding pitches. Times are
/// in quarter-note units, absolute from the start of the piece.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub duration: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub midi_numbers: Vec<u8>,
}

impl Note {
    pub fn new(
        id: impl Into<String>,
        midi_numbers: Vec<u8>,
        start_time: f64,
        end_time: f64,
        duration: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            keys: Vec::new(),
            duration: duration.into(),
            start_time,
            end_time,
            midi_numbers,
        }
    }

    /// Whether this record represents an actual sounding event. Rests and
    /// malformed records (no pitches, no duration code) are not sounding.
    /// Every consumer that skips non-sounding events must go through this
    /// one predicate so clustering and cursor logic cannot drift apart.
    pub fn is_sounding(&self) -> bool {
        !self.midi_numbers.is_empty() && !self.duration.is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    pub measure_number: u32,
    #[serde(default)]
    pub clef: String,
    #[serde(default)]
    pub time_signature: Option<(u8, u8)>,
    #[serde(default)]
    pub key_signature: Option<String>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreMetadata {
    pub title: String,
    pub composer: String,
    pub copyright: String,
}

/// A fully parsed piece as delivered by the external MusicXML parser.
/// Immutable once loaded; the engine never writes back into it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub measures: Vec<Measure>,
    pub tempo: f32,
    #[serde(default)]
    pub total_duration: f64,
    #[serde(default)]
    pub metadata: ScoreMetadata,
}

impl Score {
    pub fn new(measures: Vec<Measure>, tempo: f32) -> Self {
        Self {
            measures,
            tempo,
            total_duration: 0.0,
            metadata: ScoreMetadata::default(),
        }
    }

    /// Total count of sounding note records across all measures.
    pub fn sounding_note_count(&self) -> usize {
        self.measures
            .iter()
            .flat_map(|measure| measure.notes.iter())
            .filter(|note| note.is_sounding())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rests_are_not_sounding() {
        let rest = Note::new("r1", vec![], 0.0, 1.0, "q");
        assert!(!rest.is_sounding());
        let note = Note::new("n1", vec![60], 0.0, 1.0, "q");
        assert!(note.is_sounding());
    }

    #[test]
    fn missing_duration_is_not_sounding() {
        let broken = Note::new("n1", vec![60], 0.0, 1.0, "");
        assert!(!broken.is_sounding());
    }

    #[test]
    fn sounding_note_count_skips_rests() {
        let measure = Measure {
            measure_number: 1,
            clef: "treble".into(),
            time_signature: Some((4, 4)),
            key_signature: None,
            notes: vec![
                Note::new("n1", vec![60], 0.0, 1.0, "q"),
                Note::new("r1", vec![], 1.0, 2.0, "q"),
            ],
        };
        let score = Score::new(vec![measure], 120.0);
        assert_eq!(score.sounding_note_count(), 1);
    }
}

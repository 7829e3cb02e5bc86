use crate::{error::DomainError, score::Score, tempo};

/// Result of importing a parser-produced score document: the usable score
/// plus the number of malformed note records that were dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportedScore {
    pub score: Score,
    pub skipped_notes: usize,
}

/// Deserialize the JSON document emitted by the external MusicXML parser
/// and drop note records the engine cannot use (missing pitches or
/// duration). Malformed notes are never fatal, only skipped.
pub fn import_score_json(json: &str) -> Result<ImportedScore, DomainError> {
    let score: Score =
        serde_json::from_str(json).map_err(|err| DomainError::Parse(err.to_string()))?;
    tempo::validate_bpm(score.tempo)?;
    Ok(sanitize(score))
}

/// Remove non-sounding/malformed note records. Idempotent.
pub fn sanitize(mut score: Score) -> ImportedScore {
    let mut skipped = 0;
    for measure in &mut score.measures {
        let before = measure.notes.len();
        measure.notes.retain(|note| note.is_sounding());
        skipped += before - measure.notes.len();
    }
    ImportedScore {
        score,
        skipped_notes: skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCORE_JSON: &str = r#"{
        "measures": [
            {
                "measureNumber": 1,
                "clef": "treble",
                "notes": [
                    {
                        "id": "n1",
                        "keys": ["c/4", "e/4"],
                        "duration": "q",
                        "startTime": 0.0,
                        "endTime": 1.0,
                        "midiNumbers": [60, 64]
                    },
                    {
                        "id": "broken",
                        "duration": "q",
                        "startTime": 1.0,
                        "endTime": 2.0,
                        "midiNumbers": []
                    }
                ]
            }
        ],
        "tempo": 96.0,
        "totalDuration": 8.0,
        "metadata": { "title": "Etude", "composer": "Unknown" }
    }"#;

    #[test]
    fn imports_and_skips_malformed_notes() {
        let imported = import_score_json(SCORE_JSON).unwrap();
        assert_eq!(imported.skipped_notes, 1);
        assert_eq!(imported.score.measures[0].notes.len(), 1);
        assert_eq!(imported.score.metadata.title, "Etude");
        assert_eq!(imported.score.tempo, 96.0);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let imported = import_score_json(SCORE_JSON).unwrap();
        let again = sanitize(imported.score.clone());
        assert_eq!(again.skipped_notes, 0);
        assert_eq!(again.score, imported.score);
    }

    #[test]
    fn rejects_out_of_range_tempo() {
        let json = SCORE_JSON.replace("96.0", "900.0");
        assert!(import_score_json(&json).is_err());
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(
            import_score_json("not json"),
            Err(DomainError::Parse(_))
        ));
    }
}

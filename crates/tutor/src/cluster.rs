use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use klavier_domain::Score;

/// Start times are already rationally quantized by the parser; anything
/// closer than this is the same instant.
const CLUSTER_EPSILON: f64 = 1e-6;

/// One step of guided practice: the set of pitches expected to sound
/// simultaneously, clustered across every part and clef of a measure.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NavigationPoint {
    pub id: String,
    pub measure_index: u32,
    /// Quarter-note units, absolute from the start of the piece.
    pub start_time: f64,
    /// Max end time of the cluster's members, so the point "lasts" as
    /// long as its longest constituent note.
    pub end_time: f64,
    pub pitches: BTreeSet<u8>,
    pub keys: Vec<String>,
}

/// Build the ordered navigation-point sequence for a score.
///
/// Measures are processed in ascending measure number regardless of input
/// order, pooling every clef/part record that shares a number. A measure
/// with no sounding notes contributes nothing: runs of full-measure rests
/// collapse out of the navigable list entirely.
pub fn cluster_score(score: &Score) -> Vec<NavigationPoint> {
    let mut by_measure: BTreeMap<u32, Vec<&klavier_domain::Note>> = BTreeMap::new();
    for measure in &score.measures {
        by_measure
            .entry(measure.measure_number)
            .or_default()
            .extend(measure.notes.iter().filter(|note| note.is_sounding()));
    }

    let mut points = Vec::new();
    for (measure_number, mut pool) in by_measure {
        pool.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        let mut ordinal = 0usize;
        let mut current: Option<NavigationPoint> = None;
        for note in pool {
            let joined = match current.as_mut() {
                Some(point)
                    if (note.start_time - point.start_time).abs() <= CLUSTER_EPSILON =>
                {
                    point.end_time = point.end_time.max(note.end_time);
                    point.pitches.extend(note.midi_numbers.iter().copied());
                    point.keys.extend(note.keys.iter().cloned());
                    true
                }
                _ => false,
            };
            if !joined {
                if let Some(done) = current.take() {
                    points.push(done);
                }
                current = Some(NavigationPoint {
                    id: format!("nav-{measure_number}-{ordinal}"),
                    measure_index: measure_number,
                    start_time: note.start_time,
                    end_time: note.end_time,
                    pitches: note.midi_numbers.iter().copied().collect(),
                    keys: note.keys.clone(),
                });
                ordinal += 1;
            }
        }
        if let Some(done) = current.take() {
            points.push(done);
        }
    }

    debug!(
        points = points.len(),
        measures = score.measures.len(),
        "clustered score into navigation points"
    );
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use klavier_domain::{Measure, Note};

    fn measure(number: u32, clef: &str, notes: Vec<Note>) -> Measure {
        Measure {
            measure_number: number,
            clef: clef.into(),
            time_signature: None,
            key_signature: None,
            notes,
        }
    }

    #[test]
    fn merges_simultaneous_notes_across_clefs() {
        let score = Score::new(
            vec![
                measure(1, "treble", vec![Note::new("t1", vec![64, 67], 0.0, 1.0, "q")]),
                measure(1, "bass", vec![Note::new("b1", vec![48], 0.0, 2.0, "h")]),
            ],
            120.0,
        );
        let points = cluster_score(&score);
        assert_eq!(points.len(), 1);
        assert_eq!(
            points[0].pitches.iter().copied().collect::<Vec<_>>(),
            vec![48, 64, 67]
        );
        // cluster lasts as long as its longest member
        assert_eq!(points[0].end_time, 2.0);
    }

    #[test]
    fn orders_points_within_a_measure_by_start_time() {
        let score = Score::new(
            vec![measure(
                1,
                "treble",
                vec![
                    Note::new("n2", vec![62], 1.0, 2.0, "q"),
                    Note::new("n1", vec![60], 0.0, 1.0, "q"),
                ],
            )],
            120.0,
        );
        let points = cluster_score(&score);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].start_time, 0.0);
        assert_eq!(points[1].start_time, 1.0);
    }

    #[test]
    fn processes_measures_in_numeric_order() {
        let score = Score::new(
            vec![
                measure(2, "treble", vec![Note::new("n2", vec![62], 4.0, 5.0, "q")]),
                measure(1, "treble", vec![Note::new("n1", vec![60], 0.0, 1.0, "q")]),
            ],
            120.0,
        );
        let points = cluster_score(&score);
        assert_eq!(points[0].measure_index, 1);
        assert_eq!(points[1].measure_index, 2);
    }

    #[test]
    fn empty_measures_contribute_nothing() {
        let score = Score::new(
            vec![
                measure(1, "treble", vec![Note::new("n1", vec![60], 0.0, 1.0, "q")]),
                measure(2, "treble", vec![Note::new("r", vec![], 4.0, 8.0, "w")]),
                measure(3, "treble", vec![Note::new("n3", vec![65], 8.0, 9.0, "q")]),
            ],
            120.0,
        );
        let points = cluster_score(&score);
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].measure_index, 3);
    }

    #[test]
    fn clustering_is_deterministic() {
        let score = Score::new(
            vec![
                measure(1, "bass", vec![Note::new("b1", vec![48], 0.0, 1.0, "q")]),
                measure(1, "treble", vec![Note::new("t1", vec![60], 0.0, 1.0, "q")]),
            ],
            120.0,
        );
        assert_eq!(cluster_score(&score), cluster_score(&score));
    }
}

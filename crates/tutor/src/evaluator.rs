use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use klavier_domain::tempo::ms_per_quarter;
use klavier_domain::{Dynamic, Score};

use crate::tempo::TempoTracker;

/// Timing tolerances in milliseconds, widening from perfect to the outer
/// acceptable window. Beyond `acceptable_ms` a played note matches nothing.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToleranceSettings {
    pub perfect_ms: f64,
    pub good_ms: f64,
    pub acceptable_ms: f64,
}

impl Default for ToleranceSettings {
    fn default() -> Self {
        Self {
            perfect_ms: 50.0,
            good_ms: 100.0,
            acceptable_ms: 200.0,
        }
    }
}

/// One expected (pitch, time) pair. Multi-pitch score notes expand into
/// independent entries.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExpectedNote {
    pub id: String,
    pub pitch: u8,
    /// Quarter-note units, including any load-time offset.
    pub start_time: f64,
    pub end_time: f64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlayedNote {
    pub pitch: u8,
    /// Milliseconds relative to evaluation start.
    pub start_ms: f64,
    pub end_ms: Option<f64>,
    pub velocity: u8,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Perfect,
    Good,
    Early,
    Late,
    Wrong,
    Missed,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    /// `None` when the note matched nothing in the score.
    pub expected_id: Option<String>,
    pub pitch: u8,
    pub classification: Classification,
    /// Signed: negative is early, positive is late. Zero for unmatched.
    pub timing_error_ms: f64,
    pub score: f64,
    pub message: String,
    /// Milliseconds relative to evaluation start, for recency queries.
    pub at_ms: f64,
}

/// Aggregate metrics derived on demand from the evaluation log. Never
/// stored incrementally, so repeated reads cannot drift.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PerformanceMetrics {
    pub expected_count: usize,
    pub played_count: usize,
    /// (perfect + good) / expected.
    pub note_accuracy: f64,
    /// Weighted correctness over played notes; good notes weigh 0.85.
    pub rhythm_accuracy: f64,
    pub perfect_count: usize,
    pub good_count: usize,
    pub early_count: usize,
    pub late_count: usize,
    pub wrong_count: usize,
    /// Count deficit only; does not identify which notes went unplayed.
    pub missed_notes: usize,
    pub avg_timing_error_ms: f64,
    pub timing_stddev_ms: f64,
    pub detected_bpm: f64,
    pub tempo_variation_bpm: f64,
}

/// Free-form performance grader. Independent of the chord navigator: it
/// never gates progression, it classifies every note-on against the best
/// same-pitch candidate in the expected index and keeps a rolling tempo
/// estimate from inter-onset intervals.
pub struct PerformanceEvaluator {
    expected: Vec<ExpectedNote>,
    consumed: HashSet<String>,
    tolerances: ToleranceSettings,
    nominal_bpm: f32,
    tempo: TempoTracker,
    played: Vec<PlayedNote>,
    evaluations: Vec<Evaluation>,
    session_start: Option<Instant>,
}

impl PerformanceEvaluator {
    pub fn new(tolerances: ToleranceSettings) -> Self {
        Self {
            expected: Vec::new(),
            consumed: HashSet::new(),
            tolerances,
            nominal_bpm: 120.0,
            tempo: TempoTracker::new(120.0),
            played: Vec::new(),
            evaluations: Vec::new(),
            session_start: None,
        }
    }

    /// Expand the score into the immutable expected-note index. Malformed
    /// notes are skipped, never fatal. `offset_quarters` shifts the whole
    /// piece, e.g. to account for a count-in.
    pub fn load_expected_notes(&mut self, score: &Score, offset_quarters: f64) {
        self.expected.clear();
        let mut skipped = 0usize;
        let mut sequence = 0usize;
        for measure in &score.measures {
            for note in &measure.notes {
                if !note.is_sounding() {
                    skipped += 1;
                    continue;
                }
                for &pitch in &note.midi_numbers {
                    self.expected.push(ExpectedNote {
                        id: format!("exp-{sequence}"),
                        pitch,
                        start_time: note.start_time + offset_quarters,
                        end_time: note.end_time + offset_quarters,
                    });
                    sequence += 1;
                }
            }
        }
        self.nominal_bpm = score.tempo;
        self.tempo = TempoTracker::new(score.tempo);
        if skipped > 0 {
            warn!(skipped, "skipped malformed notes while indexing score");
        }
        debug!(
            expected = self.expected.len(),
            bpm = self.nominal_bpm,
            "expected-note index built"
        );
    }

    /// Start a grading session: clears the played-note log, the evaluation
    /// log and the tempo window, and arms the session clock.
    pub fn start_evaluation(&mut self) {
        self.played.clear();
        self.evaluations.clear();
        self.consumed.clear();
        self.tempo.reset();
        self.session_start = Some(Instant::now());
    }

    /// Stop grading. Logs are kept so metrics remain inspectable.
    pub fn stop_evaluation(&mut self) {
        self.session_start = None;
    }

    pub fn is_active(&self) -> bool {
        self.session_start.is_some()
    }

    /// Record a key transition on the internal session clock. A no-op
    /// returning `None` while no session is active.
    pub fn record_note(&mut self, pitch: u8, velocity: u8, is_note_on: bool) -> Option<Evaluation> {
        let start = self.session_start?;
        let at_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.record_note_at(pitch, velocity, is_note_on, at_ms)
    }

    /// Explicit-timestamp variant used for deterministic replay and tests.
    /// `at_ms` is milliseconds since evaluation start.
    pub fn record_note_at(
        &mut self,
        pitch: u8,
        velocity: u8,
        is_note_on: bool,
        at_ms: f64,
    ) -> Option<Evaluation> {
        if self.session_start.is_none() {
            return None;
        }
        if !is_note_on {
            self.close_note(pitch, at_ms);
            return None;
        }

        self.played.push(PlayedNote {
            pitch,
            start_ms: at_ms,
            end_ms: None,
            velocity,
        });
        self.tempo.on_onset(at_ms);

        let evaluation = self.evaluate(pitch, velocity, at_ms);
        self.evaluations.push(evaluation.clone());
        Some(evaluation)
    }

    /// Stamp the end time of the most recent still-open note of a pitch.
    fn close_note(&mut self, pitch: u8, at_ms: f64) {
        if let Some(open) = self
            .played
            .iter_mut()
            .rev()
            .find(|note| note.pitch == pitch && note.end_ms.is_none())
        {
            open.end_ms = Some(at_ms);
        }
    }

    /// Find the minimum-delta unconsumed candidate of the same pitch
    /// inside the acceptable window. Distances are judged against the
    /// rolling tempo, not the nominal score tempo, so a player who drifts
    /// is graded against their own beat. Matched entries are consumed:
    /// a repeated press cannot double-credit one expected note.
    fn evaluate(&mut self, pitch: u8, velocity: u8, at_ms: f64) -> Evaluation {
        let quarter_ms = ms_per_quarter(self.tempo.bpm() as f32);
        let mut best: Option<(usize, f64)> = None;
        for (index, candidate) in self.expected.iter().enumerate() {
            if candidate.pitch != pitch || self.consumed.contains(&candidate.id) {
                continue;
            }
            let delta_ms = at_ms - candidate.start_time * quarter_ms;
            if delta_ms.abs() > self.tolerances.acceptable_ms {
                continue;
            }
            match best {
                Some((_, current)) if current.abs() <= delta_ms.abs() => {}
                _ => best = Some((index, delta_ms)),
            }
        }

        match best {
            Some((index, delta_ms)) => {
                let expected = &self.expected[index];
                self.consumed.insert(expected.id.clone());
                let (classification, score) = self.classify(delta_ms);
                Evaluation {
                    expected_id: Some(expected.id.clone()),
                    pitch,
                    classification,
                    timing_error_ms: delta_ms,
                    score,
                    message: feedback_message(classification, delta_ms, velocity),
                    at_ms,
                }
            }
            None => Evaluation {
                expected_id: None,
                pitch,
                classification: Classification::Wrong,
                timing_error_ms: 0.0,
                score: 0.0,
                message: feedback_message(Classification::Wrong, 0.0, velocity),
                at_ms,
            },
        }
    }

    fn classify(&self, error_ms: f64) -> (Classification, f64) {
        let magnitude = error_ms.abs();
        if magnitude <= self.tolerances.perfect_ms {
            (Classification::Perfect, 100.0)
        } else if magnitude <= self.tolerances.good_ms {
            (Classification::Good, 85.0)
        } else {
            let classification = if error_ms < 0.0 {
                Classification::Early
            } else {
                Classification::Late
            };
            (classification, (70.0 - magnitude / 5.0).max(50.0))
        }
    }

    /// Recompute aggregate metrics from the logs. Calling this repeatedly
    /// without intervening notes returns identical results.
    pub fn calculate_metrics(&self) -> PerformanceMetrics {
        let expected_count = self.expected.len();
        let played_count = self.played.len();

        let mut counts = [0usize; 5];
        for evaluation in &self.evaluations {
            let slot = match evaluation.classification {
                Classification::Perfect => 0,
                Classification::Good => 1,
                Classification::Early => 2,
                Classification::Late => 3,
                Classification::Wrong => 4,
                Classification::Missed => continue,
            };
            counts[slot] += 1;
        }
        let [perfect, good, early, late, wrong] = counts;

        let note_accuracy = if expected_count > 0 {
            (perfect + good) as f64 / expected_count as f64
        } else {
            0.0
        };
        let rhythm_accuracy = if played_count > 0 {
            (perfect as f64 + good as f64 * 0.85) / played_count as f64
        } else {
            0.0
        };

        let timed: Vec<f64> = self
            .evaluations
            .iter()
            .filter(|e| e.classification != Classification::Wrong)
            .map(|e| e.timing_error_ms)
            .collect();
        let (avg_timing_error_ms, timing_stddev_ms) = mean_and_stddev(&timed);

        PerformanceMetrics {
            expected_count,
            played_count,
            note_accuracy,
            rhythm_accuracy,
            perfect_count: perfect,
            good_count: good,
            early_count: early,
            late_count: late,
            wrong_count: wrong,
            missed_notes: expected_count.saturating_sub(played_count),
            avg_timing_error_ms,
            timing_stddev_ms,
            detected_bpm: self.tempo.bpm(),
            tempo_variation_bpm: self.tempo.bpm() - self.nominal_bpm as f64,
        }
    }

    /// Evaluations whose timestamps fall within `max_age_ms` of now, for
    /// transient feedback widgets. Not used by metrics.
    pub fn recent_evaluations(&self, max_age_ms: f64) -> Vec<Evaluation> {
        let Some(start) = self.session_start else {
            return Vec::new();
        };
        let now_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.recent_evaluations_at(max_age_ms, now_ms)
    }

    pub fn recent_evaluations_at(&self, max_age_ms: f64, now_ms: f64) -> Vec<Evaluation> {
        self.evaluations
            .iter()
            .filter(|e| now_ms - e.at_ms <= max_age_ms)
            .cloned()
            .collect()
    }

    pub fn expected_notes(&self) -> &[ExpectedNote] {
        &self.expected
    }

    pub fn played_notes(&self) -> &[PlayedNote] {
        &self.played
    }

    pub fn evaluations(&self) -> &[Evaluation] {
        &self.evaluations
    }
}

impl Default for PerformanceEvaluator {
    fn default() -> Self {
        Self::new(ToleranceSettings::default())
    }
}

fn feedback_message(classification: Classification, error_ms: f64, velocity: u8) -> String {
    let dynamic = Dynamic::from_velocity(velocity).label();
    match classification {
        Classification::Perfect => format!("Perfect! ({dynamic})"),
        Classification::Good => format!("Good ({dynamic})"),
        Classification::Early => format!("{:.0} ms early", error_ms.abs()),
        Classification::Late => format!("{:.0} ms late", error_ms),
        Classification::Wrong => "Unexpected note".into(),
        Classification::Missed => "Missed".into(),
    }
}

fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    (mean, variance.sqrt())
}

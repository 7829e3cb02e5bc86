use serde::{Deserialize, Serialize};
use tracing::info;

use klavier_domain::{NoteEvent, Score};

use crate::evaluator::{Evaluation, PerformanceEvaluator, ToleranceSettings};
use crate::navigator::{ChordNavigator, MatchPolicy, NavigatorEffect};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PracticeMode {
    /// Progression gated chord-by-chord by the navigator.
    Guided,
    /// Free playback, graded after the fact by the evaluator.
    FreePlay,
}

/// Outcome of fanning one MIDI event out to both engines.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionUpdate {
    pub effects: Vec<NavigatorEffect>,
    pub evaluation: Option<Evaluation>,
}

/// Host-facing integration point: owns a navigator and an evaluator,
/// feeds every key transition to both. The two keep fully independent
/// state; they share only the loaded score.
pub struct PracticeSession {
    mode: PracticeMode,
    navigator: ChordNavigator,
    evaluator: PerformanceEvaluator,
}

impl PracticeSession {
    pub fn new(mode: PracticeMode, policy: MatchPolicy, tolerances: ToleranceSettings) -> Self {
        Self {
            mode,
            navigator: ChordNavigator::new(policy),
            evaluator: PerformanceEvaluator::new(tolerances),
        }
    }

    pub fn load(&mut self, score: &Score) -> Vec<NavigatorEffect> {
        info!(
            measures = score.measures.len(),
            tempo = score.tempo,
            "loading score into practice session"
        );
        self.evaluator.load_expected_notes(score, 0.0);
        self.navigator.load(score)
    }

    pub fn start(&mut self) {
        self.evaluator.start_evaluation();
    }

    pub fn stop(&mut self) {
        self.evaluator.stop_evaluation();
    }

    /// Fan one event out to both engines.
    pub fn handle_event(&mut self, event: NoteEvent) -> SessionUpdate {
        let effects = self.navigator.key_event(event.pitch, event.is_note_on);
        let evaluation =
            self.evaluator
                .record_note(event.pitch, event.velocity, event.is_note_on);
        SessionUpdate {
            effects,
            evaluation,
        }
    }

    pub fn mode(&self) -> PracticeMode {
        self.mode
    }

    pub fn navigator(&self) -> &ChordNavigator {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut ChordNavigator {
        &mut self.navigator
    }

    pub fn evaluator(&self) -> &PerformanceEvaluator {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut PerformanceEvaluator {
        &mut self.evaluator
    }
}

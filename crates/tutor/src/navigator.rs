use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use klavier_domain::Score;

use crate::cluster::{cluster_score, NavigationPoint};

/// Gating policy for chord completion.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Live keys must equal the expected set exactly.
    Exact,
    /// Extra simultaneously held keys are tolerated.
    Subset,
}

impl MatchPolicy {
    fn matches(self, live: &BTreeSet<u8>, expected: &BTreeSet<u8>) -> bool {
        match self {
            MatchPolicy::Exact => live == expected,
            MatchPolicy::Subset => live.is_superset(expected),
        }
    }
}

/// Value-type snapshot of the navigator. Mutated only through `reduce`;
/// the wrapper hands out clones for UI polling.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct NavigatorState {
    pub current_index: usize,
    pub total_points: usize,
    pub live_keys: BTreeSet<u8>,
    pub completed_ids: Vec<String>,
    pub is_current_complete: bool,
    pub error_count: u32,
    pub success_streak: u32,
    pub error_streak: u32,
    pub correct_count: u32,
    pub longest_streak: u32,
}

impl NavigatorState {
    pub fn for_points(total_points: usize) -> Self {
        Self {
            total_points,
            ..Self::default()
        }
    }

    /// Terminal once the cursor has walked past the last point. An empty
    /// point list is terminal immediately.
    pub fn is_complete(&self) -> bool {
        self.current_index >= self.total_points
    }

    /// Caller-supplied error accounting. The navigator never calls this
    /// itself: a wrong press simply fails the match predicate and the
    /// player has to release and try again. Hosts that want explicit
    /// mistake counting wire their own detection (see `has_wrong_press`)
    /// to this hook.
    pub fn record_error(&mut self) {
        self.error_count += 1;
        self.error_streak += 1;
        self.success_streak = 0;
    }

    pub fn reset_counters(&mut self) {
        self.error_count = 0;
        self.success_streak = 0;
        self.error_streak = 0;
        self.correct_count = 0;
        self.longest_streak = 0;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigatorEvent {
    Key { pitch: u8, is_down: bool },
    Seek(usize),
    Reset,
}

/// Notifications produced by a transition. The host decides how to
/// surface these (cursor move, toast, log); the core never calls out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavigatorEffect {
    ChordChanged { index: usize },
    ChordCompleted { id: String },
    NavigationComplete,
}

/// Pure transition function over the navigator state machine.
pub fn reduce(
    state: &NavigatorState,
    points: &[NavigationPoint],
    policy: MatchPolicy,
    event: NavigatorEvent,
) -> (NavigatorState, Vec<NavigatorEffect>) {
    let mut next = state.clone();
    let mut effects = Vec::new();

    match event {
        NavigatorEvent::Key { pitch, is_down } => {
            if is_down {
                next.live_keys.insert(pitch);
            } else {
                next.live_keys.remove(&pitch);
            }
            let Some(point) = points.get(next.current_index) else {
                // Terminal: keep tracking keys, emit nothing.
                return (next, effects);
            };
            let now_complete = policy.matches(&next.live_keys, &point.pitches);
            if now_complete && !state.is_current_complete {
                complete_current(&mut next, points, policy, &mut effects);
            } else {
                next.is_current_complete = now_complete;
            }
        }
        NavigatorEvent::Seek(index) => {
            // Out-of-range requests are ignored, not clamped.
            if index < next.total_points {
                next.current_index = index;
                next.live_keys.clear();
                next.is_current_complete = false;
                effects.push(NavigatorEffect::ChordChanged { index });
            }
        }
        NavigatorEvent::Reset => {
            next.current_index = 0;
            next.completed_ids.clear();
            next.live_keys.clear();
            next.is_current_complete = false;
            if next.total_points > 0 {
                effects.push(NavigatorEffect::ChordChanged { index: 0 });
            }
        }
    }

    (next, effects)
}

fn complete_current(
    state: &mut NavigatorState,
    points: &[NavigationPoint],
    policy: MatchPolicy,
    effects: &mut Vec<NavigatorEffect>,
) {
    let Some(point) = points.get(state.current_index) else {
        return;
    };
    state.completed_ids.push(point.id.clone());
    state.correct_count += 1;
    state.success_streak += 1;
    state.error_streak = 0;
    state.longest_streak = state.longest_streak.max(state.success_streak);
    state.current_index += 1;
    effects.push(NavigatorEffect::ChordCompleted {
        id: point.id.clone(),
    });

    if let Some(next_point) = points.get(state.current_index) {
        // Completion of the next point still requires a fresh false-to-true
        // transition, so a held identical chord cannot cascade through
        // repeated points without being re-struck.
        state.is_current_complete = policy.matches(&state.live_keys, &next_point.pitches);
        effects.push(NavigatorEffect::ChordChanged {
            index: state.current_index,
        });
    } else {
        state.is_current_complete = false;
        effects.push(NavigatorEffect::NavigationComplete);
    }
}

/// Walks the clustered navigation points of a piece, advancing only when
/// the live key set satisfies the match policy for the current point.
pub struct ChordNavigator {
    points: Vec<NavigationPoint>,
    policy: MatchPolicy,
    state: NavigatorState,
}

impl ChordNavigator {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            points: Vec::new(),
            policy,
            state: NavigatorState::default(),
        }
    }

    /// Cluster the score and rewind to the first point. An empty score is
    /// terminal immediately.
    pub fn load(&mut self, score: &Score) -> Vec<NavigatorEffect> {
        self.points = cluster_score(score);
        self.state = NavigatorState::for_points(self.points.len());
        debug!(points = self.points.len(), "navigator loaded score");
        if self.points.is_empty() {
            vec![NavigatorEffect::NavigationComplete]
        } else {
            vec![NavigatorEffect::ChordChanged { index: 0 }]
        }
    }

    pub fn key_event(&mut self, pitch: u8, is_down: bool) -> Vec<NavigatorEffect> {
        self.apply(NavigatorEvent::Key { pitch, is_down })
    }

    pub fn seek_to_chord(&mut self, index: usize) -> Vec<NavigatorEffect> {
        self.apply(NavigatorEvent::Seek(index))
    }

    /// Rewind to the first point. Cumulative counters are preserved; they
    /// belong to the practice session, reset them via `reset_counters`.
    pub fn reset(&mut self) -> Vec<NavigatorEffect> {
        self.apply(NavigatorEvent::Reset)
    }

    pub fn reset_counters(&mut self) {
        self.state.reset_counters();
    }

    pub fn record_error(&mut self) {
        self.state.record_error();
    }

    /// Whether a key outside the current expected set is held. Intended
    /// for hosts wiring their own mistake accounting to `record_error`.
    pub fn has_wrong_press(&self) -> bool {
        match self.current_point() {
            Some(point) => self
                .state
                .live_keys
                .iter()
                .any(|pitch| !point.pitches.contains(pitch)),
            None => false,
        }
    }

    pub fn current_point(&self) -> Option<&NavigationPoint> {
        self.points.get(self.state.current_index)
    }

    pub fn points(&self) -> &[NavigationPoint] {
        &self.points
    }

    pub fn state(&self) -> &NavigatorState {
        &self.state
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: MatchPolicy) {
        self.policy = policy;
    }

    fn apply(&mut self, event: NavigatorEvent) -> Vec<NavigatorEffect> {
        let (next, effects) = reduce(&self.state, &self.points, self.policy, event);
        self.state = next;
        effects
    }
}

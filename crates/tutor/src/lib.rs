pub mod cluster;
pub mod evaluator;
pub mod midi;
pub mod navigator;
pub mod session;
pub mod tempo;

pub use cluster::{cluster_score, NavigationPoint};
pub use evaluator::{
    Classification, Evaluation, ExpectedNote, PerformanceEvaluator, PerformanceMetrics,
    PlayedNote, ToleranceSettings,
};
pub use midi::{MidiDevice, MidiManager};
pub use navigator::{
    reduce, ChordNavigator, MatchPolicy, NavigatorEffect, NavigatorEvent, NavigatorState,
};
pub use session::{PracticeMode, PracticeSession, SessionUpdate};
pub use tempo::TempoTracker;

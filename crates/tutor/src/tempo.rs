use std::collections::VecDeque;

use klavier_domain::tempo::{MAX_BPM, MIN_BPM};

const INTERVAL_WINDOW: usize = 8;
const MIN_SAMPLES: usize = 3;
const SMOOTHING: f64 = 0.7;

/// Exponentially smoothed tempo estimate derived from recent inter-onset
/// intervals. Smoothing damps ornaments and rolled chords while still
/// following genuine drift; the estimate never jumps to a single outlier
/// interval.
#[derive(Clone, Debug)]
pub struct TempoTracker {
    nominal_bpm: f32,
    bpm: f64,
    intervals_ms: VecDeque<f64>,
    last_onset_ms: Option<f64>,
}

impl TempoTracker {
    pub fn new(nominal_bpm: f32) -> Self {
        Self {
            nominal_bpm,
            bpm: nominal_bpm as f64,
            intervals_ms: VecDeque::with_capacity(INTERVAL_WINDOW),
            last_onset_ms: None,
        }
    }

    /// Feed one note-on time and return the current estimate.
    pub fn on_onset(&mut self, at_ms: f64) -> f64 {
        if let Some(last) = self.last_onset_ms {
            let interval = at_ms - last;
            if interval > 0.0 {
                if self.intervals_ms.len() == INTERVAL_WINDOW {
                    self.intervals_ms.pop_front();
                }
                self.intervals_ms.push_back(interval);
            }
        }
        self.last_onset_ms = Some(at_ms);

        if self.intervals_ms.len() >= MIN_SAMPLES {
            let mean =
                self.intervals_ms.iter().sum::<f64>() / self.intervals_ms.len() as f64;
            let detected = (60_000.0 / mean).clamp(MIN_BPM as f64, MAX_BPM as f64);
            self.bpm = SMOOTHING * self.bpm + (1.0 - SMOOTHING) * detected;
        }
        self.bpm
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn nominal_bpm(&self) -> f32 {
        self.nominal_bpm
    }

    pub fn reset(&mut self) {
        self.bpm = self.nominal_bpm as f64;
        self.intervals_ms.clear();
        self.last_onset_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn needs_three_intervals_before_moving() {
        let mut tracker = TempoTracker::new(90.0);
        tracker.on_onset(0.0);
        tracker.on_onset(500.0);
        assert_relative_eq!(tracker.on_onset(1000.0), 90.0);
        // third interval arms the estimator
        assert!(tracker.on_onset(1500.0) > 90.0);
    }

    #[test]
    fn converges_to_steady_interval_without_overshoot() {
        let mut tracker = TempoTracker::new(90.0);
        let mut previous = 90.0_f64;
        for i in 0..40 {
            let bpm = tracker.on_onset(i as f64 * 500.0);
            // 500 ms inter-onset = 120 BPM; approach is monotone from below
            assert!(bpm >= previous - 1e-9);
            assert!(bpm <= 120.0 + 1e-9);
            previous = bpm;
        }
        assert_relative_eq!(previous, 120.0, epsilon = 0.5);
    }

    #[test]
    fn window_forgets_old_intervals() {
        let mut tracker = TempoTracker::new(120.0);
        for i in 0..20 {
            tracker.on_onset(i as f64 * 1000.0); // 60 BPM for a while
        }
        let slow = tracker.bpm();
        let mut t = 20_000.0;
        for _ in 0..20 {
            t += 250.0; // then 240 BPM
            tracker.on_onset(t);
        }
        assert!(tracker.bpm() > slow);
    }

    #[test]
    fn reset_returns_to_nominal() {
        let mut tracker = TempoTracker::new(100.0);
        for i in 0..10 {
            tracker.on_onset(i as f64 * 400.0);
        }
        tracker.reset();
        assert_relative_eq!(tracker.bpm(), 100.0);
    }
}

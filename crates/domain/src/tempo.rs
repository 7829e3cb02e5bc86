use crate::DomainError;

pub const MIN_BPM: f32 = 10.0;
pub const MAX_BPM: f32 = 400.0;

pub fn validate_bpm(bpm: f32) -> Result<f32, DomainError> {
    if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
        return Err(DomainError::validation(format!(
            "tempo bpm must be between {MIN_BPM} and {MAX_BPM}, got {bpm}"
        )));
    }
    Ok(bpm)
}

/// Milliseconds occupied by one quarter note at the given tempo.
pub fn ms_per_quarter(bpm: f32) -> f64 {
    60_000.0 / bpm as f64
}

pub fn quarters_to_ms(quarters: f64, bpm: f32) -> f64 {
    quarters * ms_per_quarter(bpm)
}

pub fn ms_to_quarters(ms: f64, bpm: f32) -> f64 {
    ms / ms_per_quarter(bpm)
}

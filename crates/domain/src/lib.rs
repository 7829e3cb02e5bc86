pub mod error;
pub mod events;
pub mod io;
pub mod score;
pub mod tempo;

pub use crate::error::DomainError;
pub use crate::events::{Dynamic, NoteEvent};
pub use crate::io::{import_score_json, sanitize, ImportedScore};
pub use crate::score::{Measure, Note, Score, ScoreMetadata};

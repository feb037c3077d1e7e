use thiserror::Error;

use crate::phase::ApplicationPhase;

/// Failures surfaced by the session state machine and its lookups.
///
/// Per-job generation failures never appear here: they are contained in the
/// record they belong to (see [`GenerationFailed`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        phase: ApplicationPhase,
        action: String,
    },
    #[error("style {id} is not in the catalogue")]
    NotFound { id: u32 },
    #[error("theme index {index} is out of range ({available} themes)")]
    ThemeNotFound { index: usize, available: usize },
    #[error("style id {id} appears more than once in the catalogue")]
    DuplicateStyle { id: u32 },
}

impl SessionError {
    pub fn invalid_transition(phase: ApplicationPhase, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            phase,
            action: action.into(),
        }
    }
}

/// A single render attempt that produced no usable image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("generation failed: {message}")]
pub struct GenerationFailed {
    pub message: String,
}

impl GenerationFailed {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let trimmed = message.trim();
        Self {
            message: if trimmed.is_empty() {
                "remote service returned no usable image".to_string()
            } else {
                trimmed.to_string()
            },
        }
    }
}

#![forbid(unsafe_code)]

//! Error types for the reactive engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// A render-phase contract breach. Never fatal: the offending call is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("changed() called outside of rendering")]
    ChangedOutsideRender,

    #[error("add_cleanup() called outside of rendering")]
    CleanupOutsideRender,

    #[error("state written while rendering")]
    WriteDuringRender,

    #[error("dispose() called while rendering")]
    DisposeDuringRender,

    #[error("set_active() called while rendering")]
    ActivateDuringRender,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("protocol violation in `{unit}`: {violation}")]
    Protocol { unit: String, violation: Violation },

    #[error("render of `{unit}` failed: {message}")]
    Render { unit: String, message: String },

    #[error("unit `{unit}` has been disposed")]
    Disposed { unit: String },
}

impl EngineError {
    #[must_use]
    pub fn violation(&self) -> Option<Violation> {
        match self {
            Self::Protocol { violation, .. } => Some(*violation),
            _ => None,
        }
    }
}

/// Failure reported by a render callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RenderError {
    message: String,
}

impl RenderError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for RenderError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for RenderError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#![forbid(unsafe_code)]

use thiserror::Error;
use trellis_runtime::EngineError;

use crate::module::ModuleId;

pub type Result<T> = std::result::Result<T, BenchError>;

/// Failure reported by a module's own `start()`.
pub type ModuleError = Box<dyn std::error::Error + 'static>;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("failed to load configuration from {origin}: {source}")]
    ConfigLoad {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration from {origin} is not valid JSON: {source}")]
    ConfigParse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration from {origin} must be a JSON object, found {found}")]
    ConfigShape { origin: String, found: &'static str },

    #[error("module `{id}` failed to start: {source}")]
    ModuleStart {
        id: ModuleId,
        #[source]
        source: ModuleError,
    },

    #[error("module `{id}` is already wired")]
    AlreadyWired { id: ModuleId },

    #[error("bench has already been started")]
    AlreadyStarted,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl BenchError {
    /// Id of the module the error is about, if any.
    #[must_use]
    pub fn module(&self) -> Option<&ModuleId> {
        match self {
            Self::ModuleStart { id, .. } | Self::AlreadyWired { id } => Some(id),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. } | Self::ConfigParse { .. } | Self::ConfigShape { .. }
        )
    }
}

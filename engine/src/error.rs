//! Engine error types.
//!
//! ERROR HANDLING
//! ==============
//! Every error enum implements [`ErrorCode`] so log lines and the runner can
//! report a stable, grepable code (`E_UNKNOWN_COMPONENT`, ...) alongside the
//! human-readable message. Listener failures never surface here: the bus logs
//! and swallows them (see [`crate::bus`]).

use tree::{NodeId, TreeError};

use crate::behavior::ListenerError;
use crate::registry::RegistryError;

/// Stable machine-readable code for an error value.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown component: <{0}>")]
    UnknownComponent(String),
    #[error("not a live instance: {0}")]
    UnknownInstance(NodeId),
    #[error("instance {0} finalized before setup")]
    NotSetUp(NodeId),
    #[error("instance {0} was already finalized")]
    FinalizeAlreadyCompleted(NodeId),
    #[error("component configuration error: {0}")]
    Configuration(String),
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),
    #[error("init failed for {instance}: {source}")]
    Init { instance: String, source: ListenerError },
}

impl From<RegistryError> for EngineError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(name) => Self::UnknownComponent(name),
        }
    }
}

impl ErrorCode for EngineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownComponent(_) => "E_UNKNOWN_COMPONENT",
            Self::UnknownInstance(_) => "E_UNKNOWN_INSTANCE",
            Self::NotSetUp(_) => "E_NOT_SET_UP",
            Self::FinalizeAlreadyCompleted(_) => "E_FINALIZE_COMPLETED",
            Self::Configuration(_) => "E_CONFIGURATION",
            Self::Tree(_) => "E_TREE",
            Self::Init { .. } => "E_INIT",
        }
    }
}

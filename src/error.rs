//! Error taxonomy for the bridge
//!
//! Initialization errors are delivered to every waiter of the shared
//! initialization task, so `BridgeError` is `Clone`. Errors coming from the
//! pattern runtime are kept as the original `anyhow::Error` behind an `Arc`.

use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to load module '{module}': {message}")]
    ModuleLoad { module: &'static str, message: String },

    #[error("Audio context unavailable: {0}")]
    AudioContext(String),

    #[error("Failed to register {what}: {message}")]
    SoundRegistration { what: &'static str, message: String },

    #[error("Failed to load sample bank {url}: {message}")]
    SampleBank { url: String, message: String },

    #[error("Failed to load alias bank {url}: {message}")]
    AliasBank { url: String, message: String },

    #[error("Failed to register eval scope: {0}")]
    Scope(String),

    #[error("Failed to create REPL: {0}")]
    Repl(String),

    #[error("Initialization task aborted: {0}")]
    InitTaskAborted(String),

    #[error("Strudel REPL is not initialized.")]
    NotInitialized,

    #[error("{0}")]
    Eval(Arc<anyhow::Error>),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// The error raised by the pattern runtime, untouched
    pub fn eval_error(&self) -> Option<&anyhow::Error> {
        match self {
            BridgeError::Eval(err) => Some(err),
            _ => None,
        }
    }

    /// Whether this error came from the initialization sequence
    pub fn is_init_failure(&self) -> bool {
        !matches!(
            self,
            BridgeError::NotInitialized | BridgeError::Eval(_) | BridgeError::Config(_)
        )
    }
}

/// Error shape handed to the host shell
#[derive(Debug, Clone, Serialize)]
pub struct CommandError {
    pub message: String,
    pub kind: &'static str,
}

impl From<BridgeError> for CommandError {
    fn from(err: BridgeError) -> Self {
        let kind = match &err {
            BridgeError::NotInitialized => "not_initialized",
            BridgeError::Eval(_) => "eval",
            BridgeError::Config(_) => "config",
            _ => "init",
        };
        CommandError {
            message: err.to_string(),
            kind,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

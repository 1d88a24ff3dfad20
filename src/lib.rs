//! Strudel session bridge
//!
//! Brings the Strudel live coding runtime up lazily inside a host shell and
//! exposes three operations: initialize, evaluate code, and hush.
//!
//! Initialization is single-flight. The first caller starts it; everyone who
//! arrives while it runs, or later, shares the same task and outcome. The
//! runtime itself (pattern core, mini notation, transpiler, synthesis) sits
//! behind the traits in [`modules`]; [`native`] provides the audio output
//! module natively.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strudel_bridge::{BridgeConfig, Session, StaticModules};
//!
//! # async fn run(modules: StaticModules) -> strudel_bridge::Result<()> {
//! let (config, _sources) = BridgeConfig::load()?;
//! let session = Session::new(Arc::new(modules), config);
//!
//! session.evaluate(r#"s("bd sd")"#).await?;
//! session.hush().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod loggerbridge;
pub mod modules;
pub mod native;
pub mod scope;
pub mod session;
pub mod tasks;

#[cfg(feature = "tauri")]
pub mod commands;

pub use config::{BridgeConfig, RetryPolicy, SampleBankSource};
pub use error::{BridgeError, CommandError, Result};
pub use modules::{ExportTable, ModuleLoader, ModuleSet, StaticModules};
pub use native::NativeWebAudio;
pub use scope::{EvalScope, MethodBinding, ScopeBindings};
pub use session::{InitReport, Session, SessionState};

/// Re-export the native collaborators
pub use strudel_audio;

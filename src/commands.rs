//! Tauri commands exposing the session to the webview
//!
//! The webview calls `strudel_init`, `strudel_eval` and `strudel_hush`; the
//! session behind them is managed state registered by [`plugin`].

use crate::error::CommandError;
use crate::loggerbridge::{init_tracing, Logger};
use crate::session::{InitReport, Session, SessionState};
use tauri::plugin::{Builder, TauriPlugin};
use tauri::{command, Manager, Runtime, State};

/// Start (or join) initialization
#[command]
pub async fn strudel_init(session: State<'_, Session>) -> Result<InitReport, CommandError> {
    let report = session.ensure_initialized().await?;
    Ok(InitReport::clone(&report))
}

/// Evaluate pattern code
#[command]
pub async fn strudel_eval(code: String, session: State<'_, Session>) -> Result<(), CommandError> {
    session.evaluate(&code).await?;
    Ok(())
}

/// Stop all playback
#[command]
pub async fn strudel_hush(session: State<'_, Session>) -> Result<(), CommandError> {
    session.hush().await;
    Ok(())
}

#[command]
pub fn strudel_state(session: State<'_, Session>) -> SessionState {
    session.state()
}

/// Plugin registering the commands with `session` as managed state.
///
/// Warnings and errors are forwarded to the webview as `log-event`.
pub fn plugin<R: Runtime>(session: Session) -> TauriPlugin<R> {
    Builder::new("strudel")
        .invoke_handler(tauri::generate_handler![
            strudel_init,
            strudel_eval,
            strudel_hush,
            strudel_state
        ])
        .setup(move |app, _api| {
            init_tracing(
                &session.config().log_level,
                Some(Logger { app: app.clone() }),
            );
            app.manage(session);
            Ok(())
        })
        .build()
}

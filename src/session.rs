//! Lazy, single-flight session
//!
//! A [`Session`] brings the pattern runtime up the first time anything needs
//! it. Every caller that arrives while that is in flight, or afterwards,
//! shares the same initialization task and sees the same outcome.

use crate::config::{BridgeConfig, RetryPolicy};
use crate::error::{BridgeError, Result};
use crate::modules::{AudioContext, ModuleLoader, ModuleSet, Repl, ReplOptions, TimeSource};
use crate::scope::ScopeBindings;
use crate::tasks::{run_all, AbsorbedFailure, InitTask};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use strudel_audio::ContextState;

type InitHandle = Shared<BoxFuture<'static, Result<Arc<InitReport>>>>;

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("panicked with message \"{}\"", message)
}

/// Where the session is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "error")]
pub enum SessionState {
    Empty,
    Initializing,
    Ready,
    Failed(String),
}

/// Summary of a successful initialization
#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    pub modules: Vec<String>,
    /// Manifest URLs of the registered sample banks
    pub sample_banks: Vec<String>,
    pub alias_bank: Option<String>,
    pub scope: ScopeBindings,
    /// Best-effort steps that failed without failing initialization
    pub absorbed: Vec<AbsorbedFailure>,
}

/// Handle to a shared session. Clones share the same state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    loader: Arc<dyn ModuleLoader>,
    config: BridgeConfig,
    init: Mutex<Option<InitHandle>>,
    status: RwLock<SessionState>,
    audio_context: RwLock<Option<Arc<dyn AudioContext>>>,
    repl: RwLock<Option<Arc<dyn Repl>>>,
}

impl Session {
    pub fn new(loader: Arc<dyn ModuleLoader>, config: BridgeConfig) -> Self {
        Session {
            inner: Arc::new(Inner {
                loader,
                config,
                init: Mutex::new(None),
                status: RwLock::new(SessionState::Empty),
                audio_context: RwLock::new(None),
                repl: RwLock::new(None),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        self.inner.status.read().clone()
    }

    /// The audio context, once initialization has created it
    pub fn audio_context(&self) -> Option<Arc<dyn AudioContext>> {
        self.inner.audio_context.read().clone()
    }

    fn repl(&self) -> Option<Arc<dyn Repl>> {
        self.inner.repl.read().clone()
    }

    /// Start initialization if nothing has, and wait for it.
    ///
    /// Must be called from within a tokio runtime. The work runs on a spawned
    /// task, so it completes even if every caller stops waiting.
    pub async fn ensure_initialized(&self) -> Result<Arc<InitReport>> {
        self.init_handle().await
    }

    fn init_handle(&self) -> InitHandle {
        let mut slot = self.inner.init.lock();

        if let Some(handle) = slot.as_ref() {
            let failed = matches!(*self.inner.status.read(), SessionState::Failed(_));
            if !(failed && self.inner.config.retry == RetryPolicy::AfterFailure) {
                return handle.clone();
            }
            tracing::info!("previous initialization failed, retrying");
        }

        *self.inner.status.write() = SessionState::Initializing;
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            match AssertUnwindSafe(Arc::clone(&inner).initialize())
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(&*panic);
                    Err(inner.fail(BridgeError::InitTaskAborted(message)))
                }
            }
        });
        let inner = Arc::clone(&self.inner);
        let handle = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(inner.fail(BridgeError::InitTaskAborted(e.to_string()))),
            }
        }
        .boxed()
        .shared();

        *slot = Some(handle.clone());
        handle
    }

    /// Evaluate pattern code, initializing first if needed.
    ///
    /// A suspended audio context is resumed; if it still is not running a
    /// warning is logged and evaluation goes ahead. Errors from the code are
    /// returned as [`BridgeError::Eval`] holding the original error.
    pub async fn evaluate(&self, code: &str) -> Result<()> {
        self.ensure_initialized().await?;

        if let Some(ctx) = self.audio_context() {
            let state = match ctx.state() {
                ContextState::Suspended => match ctx.resume().await {
                    Ok(state) => Some(state),
                    Err(err) => {
                        tracing::warn!(error = %err, "[audio] resume failed");
                        None
                    }
                },
                state => Some(state),
            };
            if let Some(state) = state.filter(|s| *s != ContextState::Running) {
                tracing::warn!(%state, "[audio] context state: {}", state);
            }
        }

        let repl = self.repl().ok_or(BridgeError::NotInitialized)?;
        if let Err(err) = repl.evaluate(code).await {
            tracing::error!(error = %err, "[strudel] eval error");
            return Err(BridgeError::Eval(Arc::new(err)));
        }
        Ok(())
    }

    /// Silence everything. Never fails.
    pub async fn hush(&self) {
        if let Err(err) = self.ensure_initialized().await {
            tracing::warn!(error = %err, "hush: session not initialized");
        }

        let Some(repl) = self.repl() else {
            tracing::debug!("hush: no REPL, nothing to stop");
            return;
        };

        if let Err(err) = repl.evaluate(&self.inner.config.silence_command).await {
            tracing::warn!(error = %err, "hush: silence command failed");
        }
        repl.stop();
    }
}

impl Inner {
    async fn initialize(self: Arc<Self>) -> Result<Arc<InitReport>> {
        let result = self.run_setup().await;
        *self.status.write() = match &result {
            Ok(_) => SessionState::Ready,
            Err(err) => SessionState::Failed(err.to_string()),
        };
        match &result {
            Ok(report) => tracing::info!(
                modules = report.modules.len(),
                sample_banks = report.sample_banks.len(),
                "strudel session ready"
            ),
            Err(err) => tracing::error!(error = %err, "strudel session failed to initialize"),
        }
        result
    }

    /// Record a failure that bypassed `initialize`
    fn fail(&self, err: BridgeError) -> BridgeError {
        tracing::error!(error = %err, "strudel session failed to initialize");
        *self.status.write() = SessionState::Failed(err.to_string());
        err
    }

    async fn run_setup(&self) -> Result<Arc<InitReport>> {
        tracing::info!("initializing strudel session");
        let modules = ModuleSet::load(self.loader.as_ref()).await?;

        let ctx = modules
            .webaudio
            .audio_context()
            .map_err(|e| BridgeError::AudioContext(format!("{:#}", e)))?;
        *self.audio_context.write() = Some(Arc::clone(&ctx));
        modules.webaudio.init_audio_on_first_interaction();

        let eval_scope = modules.eval_scope();
        modules
            .core
            .register_scope(&eval_scope)
            .map_err(|e| BridgeError::Scope(format!("{:#}", e)))?;
        tracing::debug!(names = eval_scope.len(), "eval scope registered");

        let scope = ScopeBindings::resolve(&modules.core.pattern_methods());

        let banks = self.config.resolved_sample_banks();
        let tasks = self.setup_tasks(&modules, &banks);
        let report = run_all(tasks).await?;

        let alias_loader = modules
            .webaudio
            .alias_bank_loader()
            .or_else(|| modules.superdough.alias_bank_loader());
        let alias_bank = match (alias_loader, self.config.resolved_alias_manifest()) {
            (Some(loader), Some(url)) => {
                loader.load(&url).await.map_err(|e| BridgeError::AliasBank {
                    url: url.clone(),
                    message: format!("{:#}", e),
                })?;
                Some(url)
            }
            _ => None,
        };

        let clock = Arc::clone(&ctx);
        let get_time: TimeSource = Arc::new(move || clock.current_time());
        let repl = modules
            .core
            .repl(ReplOptions {
                output: modules.webaudio.output(),
                get_time,
                transpiler: Arc::clone(&modules.transpiler),
                scope: scope.clone(),
            })
            .map_err(|e| BridgeError::Repl(format!("{:#}", e)))?;
        *self.repl.write() = Some(repl);

        Ok(Arc::new(InitReport {
            modules: modules.names(),
            sample_banks: banks.into_iter().map(|(manifest, _)| manifest).collect(),
            alias_bank,
            scope,
            absorbed: report.absorbed,
        }))
    }

    fn setup_tasks(&self, modules: &ModuleSet, banks: &[(String, Option<String>)]) -> Vec<InitTask> {
        let mut tasks = Vec::new();

        if self.config.soundfonts {
            let loader = Arc::clone(&self.loader);
            tasks.push(InitTask::best_effort("soundfonts", async move {
                let registrar = loader.load_soundfonts().await.map_err(|e| BridgeError::ModuleLoad {
                    module: crate::modules::SOUNDFONTS,
                    message: format!("{:#}", e),
                })?;
                if let Some(registrar) = registrar {
                    registrar
                        .register_soundfonts()
                        .await
                        .map_err(|e| BridgeError::SoundRegistration {
                            what: "soundfonts",
                            message: format!("{:#}", e),
                        })?;
                }
                Ok(())
            }));
        }

        if self.config.synth_sounds {
            let webaudio = Arc::clone(&modules.webaudio);
            tasks.push(InitTask::required("synth sounds", async move {
                webaudio
                    .register_synth_sounds()
                    .await
                    .map_err(|e| BridgeError::SoundRegistration {
                        what: "synth sounds",
                        message: format!("{:#}", e),
                    })
            }));
            let webaudio = Arc::clone(&modules.webaudio);
            tasks.push(InitTask::required("zzfx sounds", async move {
                webaudio
                    .register_zzfx_sounds()
                    .await
                    .map_err(|e| BridgeError::SoundRegistration {
                        what: "zzfx sounds",
                        message: format!("{:#}", e),
                    })
            }));
        }

        for (manifest, base) in banks {
            let samples = modules.webaudio.sample_loader();
            let manifest = manifest.clone();
            let base = base.clone();
            tasks.push(InitTask::required(manifest.clone(), async move {
                samples
                    .load(&manifest, base.as_deref())
                    .await
                    .map_err(|e| BridgeError::SampleBank {
                        url: manifest.clone(),
                        message: format!("{:#}", e),
                    })
            }));
        }

        tasks
    }
}

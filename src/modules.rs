//! Collaborator seams
//!
//! The pattern runtime is a set of library modules the bridge never looks
//! inside. Each trait here is the slice of a module the session needs while
//! bringing the runtime up; everything else a module offers is only visible
//! to pattern code through its exported names.

use crate::error::{BridgeError, Result};
use crate::scope::{EvalScope, ScopeBindings};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use strudel_audio::ContextState;

pub const CORE: &str = "@strudel/core";
pub const MINI: &str = "@strudel/mini";
pub const WEBAUDIO: &str = "@strudel/webaudio";
pub const TONAL: &str = "@strudel/tonal";
pub const TRANSPILER: &str = "@strudel/transpiler";
pub const SUPERDOUGH: &str = "superdough";
pub const DRAW: &str = "@strudel/draw";
pub const SOUNDFONTS: &str = "@strudel/soundfonts";

/// Playback clock handed to the REPL, in audio context seconds
pub type TimeSource = Arc<dyn Fn() -> f64 + Send + Sync>;

/// A loaded library module
pub trait Module: Send + Sync {
    fn name(&self) -> &str;

    /// Names pattern code may reference once the module is in scope
    fn exports(&self) -> Vec<String>;
}

/// The shared audio output context
#[async_trait]
pub trait AudioContext: Send + Sync {
    fn state(&self) -> ContextState;

    /// Try to resume, returning the state afterwards
    async fn resume(&self) -> anyhow::Result<ContextState>;

    /// Current playback time in seconds
    fn current_time(&self) -> f64;
}

#[async_trait]
pub trait SampleBankLoader: Send + Sync {
    /// Fetch a sample map and register its sounds
    async fn load(&self, manifest_url: &str, base: Option<&str>) -> anyhow::Result<()>;
}

#[async_trait]
pub trait AliasBankLoader: Send + Sync {
    async fn load(&self, manifest_url: &str) -> anyhow::Result<()>;
}

/// Destination for events produced by the scheduler
pub trait OutputSink: Send + Sync {
    fn trigger(&self, value: &serde_json::Value, time: f64) -> anyhow::Result<()>;
}

/// The web audio output driver
#[async_trait]
pub trait AudioOutput: Module {
    /// Obtain (or create) the shared audio context
    fn audio_context(&self) -> anyhow::Result<Arc<dyn AudioContext>>;

    /// Resume the context on the first user interaction
    fn init_audio_on_first_interaction(&self);

    async fn register_synth_sounds(&self) -> anyhow::Result<()>;

    async fn register_zzfx_sounds(&self) -> anyhow::Result<()>;

    fn sample_loader(&self) -> Arc<dyn SampleBankLoader>;

    fn alias_bank_loader(&self) -> Option<Arc<dyn AliasBankLoader>>;

    fn output(&self) -> Arc<dyn OutputSink>;
}

/// The low-level synthesis engine
pub trait Synth: Module {
    fn alias_bank_loader(&self) -> Option<Arc<dyn AliasBankLoader>>;
}

/// Rewrites user code into something the evaluator can run
pub trait Transpiler: Module {
    fn transpile(&self, code: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait SoundfontRegistrar: Send + Sync {
    async fn register_soundfonts(&self) -> anyhow::Result<()>;
}

/// Everything the REPL is bound to
pub struct ReplOptions {
    pub output: Arc<dyn OutputSink>,
    pub get_time: TimeSource,
    pub transpiler: Arc<dyn Transpiler>,
    /// Which `scope` implementation pattern code gets under each name
    pub scope: ScopeBindings,
}

/// Running evaluator session
#[async_trait]
pub trait Repl: Send + Sync {
    async fn evaluate(&self, code: &str) -> anyhow::Result<()>;

    /// Halt the scheduler
    fn stop(&self);
}

/// The pattern core
pub trait PatternCore: Module {
    /// Make every module's exports visible to pattern code
    fn register_scope(&self, scope: &EvalScope) -> anyhow::Result<()>;

    /// Methods the pattern base type already exposes
    fn pattern_methods(&self) -> BTreeSet<String>;

    fn repl(&self, options: ReplOptions) -> anyhow::Result<Arc<dyn Repl>>;
}

/// Loads the library bundles of the pattern runtime
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load_core(&self) -> anyhow::Result<Arc<dyn PatternCore>>;
    async fn load_mini(&self) -> anyhow::Result<Arc<dyn Module>>;
    async fn load_webaudio(&self) -> anyhow::Result<Arc<dyn AudioOutput>>;
    async fn load_tonal(&self) -> anyhow::Result<Arc<dyn Module>>;
    async fn load_transpiler(&self) -> anyhow::Result<Arc<dyn Transpiler>>;
    async fn load_superdough(&self) -> anyhow::Result<Arc<dyn Synth>>;
    async fn load_draw(&self) -> anyhow::Result<Arc<dyn Module>>;

    /// The optional soundfont module; `None` if it has no registrar
    async fn load_soundfonts(&self) -> anyhow::Result<Option<Arc<dyn SoundfontRegistrar>>>;
}

/// The required modules, loaded
#[derive(Clone)]
pub struct ModuleSet {
    pub core: Arc<dyn PatternCore>,
    pub mini: Arc<dyn Module>,
    pub webaudio: Arc<dyn AudioOutput>,
    pub tonal: Arc<dyn Module>,
    pub transpiler: Arc<dyn Transpiler>,
    pub superdough: Arc<dyn Synth>,
    pub draw: Arc<dyn Module>,
}

fn module_error(module: &'static str) -> impl Fn(anyhow::Error) -> BridgeError {
    move |e| BridgeError::ModuleLoad {
        module,
        message: format!("{:#}", e),
    }
}

impl ModuleSet {
    /// Load every required module concurrently
    pub async fn load(loader: &dyn ModuleLoader) -> Result<Self> {
        let (core, mini, webaudio, tonal, transpiler, superdough, draw) = tokio::try_join!(
            async { loader.load_core().await.map_err(module_error(CORE)) },
            async { loader.load_mini().await.map_err(module_error(MINI)) },
            async { loader.load_webaudio().await.map_err(module_error(WEBAUDIO)) },
            async { loader.load_tonal().await.map_err(module_error(TONAL)) },
            async { loader.load_transpiler().await.map_err(module_error(TRANSPILER)) },
            async { loader.load_superdough().await.map_err(module_error(SUPERDOUGH)) },
            async { loader.load_draw().await.map_err(module_error(DRAW)) },
        )?;
        Ok(ModuleSet {
            core,
            mini,
            webaudio,
            tonal,
            transpiler,
            superdough,
            draw,
        })
    }

    pub fn names(&self) -> Vec<String> {
        vec![
            self.core.name().to_string(),
            self.mini.name().to_string(),
            self.webaudio.name().to_string(),
            self.tonal.name().to_string(),
            self.transpiler.name().to_string(),
            self.superdough.name().to_string(),
            self.draw.name().to_string(),
        ]
    }

    /// The eval scope: core, mini, webaudio, tonal and draw, in that order
    pub fn eval_scope(&self) -> EvalScope {
        let mut scope = EvalScope::new();
        scope.extend(self.core.name(), self.core.exports());
        scope.extend(self.mini.name(), self.mini.exports());
        scope.extend(self.webaudio.name(), self.webaudio.exports());
        scope.extend(self.tonal.name(), self.tonal.exports());
        scope.extend(self.draw.name(), self.draw.exports());
        scope
    }
}

/// A module loader over modules that already exist
///
/// Lets a host wire native or foreign modules without writing a loader.
#[derive(Clone)]
pub struct StaticModules {
    pub modules: ModuleSet,
    pub soundfonts: Option<Arc<dyn SoundfontRegistrar>>,
}

#[async_trait]
impl ModuleLoader for StaticModules {
    async fn load_core(&self) -> anyhow::Result<Arc<dyn PatternCore>> {
        Ok(Arc::clone(&self.modules.core))
    }

    async fn load_mini(&self) -> anyhow::Result<Arc<dyn Module>> {
        Ok(Arc::clone(&self.modules.mini))
    }

    async fn load_webaudio(&self) -> anyhow::Result<Arc<dyn AudioOutput>> {
        Ok(Arc::clone(&self.modules.webaudio))
    }

    async fn load_tonal(&self) -> anyhow::Result<Arc<dyn Module>> {
        Ok(Arc::clone(&self.modules.tonal))
    }

    async fn load_transpiler(&self) -> anyhow::Result<Arc<dyn Transpiler>> {
        Ok(Arc::clone(&self.modules.transpiler))
    }

    async fn load_superdough(&self) -> anyhow::Result<Arc<dyn Synth>> {
        Ok(Arc::clone(&self.modules.superdough))
    }

    async fn load_draw(&self) -> anyhow::Result<Arc<dyn Module>> {
        Ok(Arc::clone(&self.modules.draw))
    }

    async fn load_soundfonts(&self) -> anyhow::Result<Option<Arc<dyn SoundfontRegistrar>>> {
        Ok(self.soundfonts.clone())
    }
}

/// A module that only contributes names to the eval scope
#[derive(Debug, Clone)]
pub struct ExportTable {
    name: String,
    exports: Vec<String>,
}

impl ExportTable {
    pub fn new<I, S>(name: &str, exports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ExportTable {
            name: name.to_string(),
            exports: exports.into_iter().map(Into::into).collect(),
        }
    }
}

impl Module for ExportTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn exports(&self) -> Vec<String> {
        self.exports.clone()
    }
}

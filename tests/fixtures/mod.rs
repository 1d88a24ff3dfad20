//! In-memory stand-ins for the pattern runtime modules.
//!
//! One `FakeRuntime` backs every fake module so tests can count how often
//! each collaborator was touched.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strudel_bridge::modules::{
    AliasBankLoader, AudioContext, AudioOutput, Module, ModuleLoader, OutputSink, PatternCore,
    Repl, ReplOptions, SampleBankLoader, SoundfontRegistrar, Synth, TimeSource, Transpiler,
};
use strudel_bridge::strudel_audio::ContextState;
use strudel_bridge::{BridgeConfig, EvalScope, ScopeBindings, Session};

/// Knobs for how the fake runtime behaves
#[derive(Clone)]
pub struct Behavior {
    /// Delay before every module load and sample fetch
    pub delay: Duration,
    /// Fail this many core loads before succeeding
    pub core_failures: usize,
    /// Panic in this many core loads before succeeding
    pub core_panics: usize,
    /// Fail sample fetches whose URL contains this
    pub failing_bank: Option<String>,
    pub soundfonts_fail: bool,
    pub core_methods: BTreeSet<String>,
    /// State the context ends up in after `resume`
    pub resume_to: ContextState,
    pub resume_errors: bool,
    pub webaudio_alias: bool,
    pub superdough_alias: bool,
    /// Evaluation fails when the code contains this
    pub failing_code: Option<String>,
    pub clock: f64,
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior {
            delay: Duration::from_millis(0),
            core_failures: 0,
            core_panics: 0,
            failing_bank: None,
            soundfonts_fail: false,
            core_methods: BTreeSet::new(),
            resume_to: ContextState::Running,
            resume_errors: false,
            webaudio_alias: true,
            superdough_alias: false,
            failing_code: None,
            clock: 0.0,
        }
    }
}

#[derive(Default)]
pub struct Counters {
    pub core_loads: AtomicUsize,
    pub module_loads: AtomicUsize,
    pub context_creations: AtomicUsize,
    pub interaction_arms: AtomicUsize,
    pub synth_registrations: AtomicUsize,
    pub soundfont_registrations: AtomicUsize,
    pub repl_builds: AtomicUsize,
    pub resumes: AtomicUsize,
    pub stops: AtomicUsize,
}

pub struct FakeRuntime {
    pub behavior: Behavior,
    pub counters: Counters,
    pub sample_fetches: Mutex<Vec<(String, Option<String>)>>,
    pub alias_fetches: Mutex<Vec<String>>,
    pub evaluated: Mutex<Vec<String>>,
    pub registered_scope: Mutex<Option<EvalScope>>,
    pub repl_scope: Mutex<Option<ScopeBindings>>,
    pub repl_clock: Mutex<Option<TimeSource>>,
    context: Arc<FakeContext>,
}

impl FakeRuntime {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        let context = Arc::new(FakeContext {
            state: Mutex::new(ContextState::Suspended),
            resume_to: behavior.resume_to,
            resume_errors: behavior.resume_errors,
            clock: behavior.clock,
            resumes: AtomicUsize::new(0),
        });
        Arc::new(FakeRuntime {
            behavior,
            counters: Counters::default(),
            sample_fetches: Mutex::new(Vec::new()),
            alias_fetches: Mutex::new(Vec::new()),
            evaluated: Mutex::new(Vec::new()),
            registered_scope: Mutex::new(None),
            repl_scope: Mutex::new(None),
            repl_clock: Mutex::new(None),
            context,
        })
    }

    pub fn session(self: &Arc<Self>, config: BridgeConfig) -> Session {
        Session::new(Arc::new(FakeLoader(Arc::clone(self))), config)
    }

    pub fn context(&self) -> Arc<FakeContext> {
        Arc::clone(&self.context)
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if !self.behavior.delay.is_zero() {
            tokio::time::sleep(self.behavior.delay).await;
        }
    }
}

pub struct FakeContext {
    state: Mutex<ContextState>,
    resume_to: ContextState,
    resume_errors: bool,
    clock: f64,
    pub resumes: AtomicUsize,
}

#[async_trait]
impl AudioContext for FakeContext {
    fn state(&self) -> ContextState {
        *self.state.lock()
    }

    async fn resume(&self) -> anyhow::Result<ContextState> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        if self.resume_errors {
            anyhow::bail!("resume blocked by autoplay policy");
        }
        *self.state.lock() = self.resume_to;
        Ok(self.resume_to)
    }

    fn current_time(&self) -> f64 {
        self.clock
    }
}

struct FakeLoader(Arc<FakeRuntime>);

#[async_trait]
impl ModuleLoader for FakeLoader {
    async fn load_core(&self) -> anyhow::Result<Arc<dyn PatternCore>> {
        self.0.pause().await;
        self.0.counters.module_loads.fetch_add(1, Ordering::SeqCst);
        let attempt = self.0.counters.core_loads.fetch_add(1, Ordering::SeqCst);
        if attempt < self.0.behavior.core_panics {
            panic!("core bundle exploded");
        }
        if attempt < self.0.behavior.core_failures {
            anyhow::bail!("core bundle unavailable");
        }
        Ok(Arc::new(FakeModule(Arc::clone(&self.0), "@strudel/core")))
    }

    async fn load_mini(&self) -> anyhow::Result<Arc<dyn Module>> {
        self.0.counters.module_loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeModule(Arc::clone(&self.0), "@strudel/mini")))
    }

    async fn load_webaudio(&self) -> anyhow::Result<Arc<dyn AudioOutput>> {
        self.0.counters.module_loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeModule(Arc::clone(&self.0), "@strudel/webaudio")))
    }

    async fn load_tonal(&self) -> anyhow::Result<Arc<dyn Module>> {
        self.0.counters.module_loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeModule(Arc::clone(&self.0), "@strudel/tonal")))
    }

    async fn load_transpiler(&self) -> anyhow::Result<Arc<dyn Transpiler>> {
        self.0.counters.module_loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeModule(Arc::clone(&self.0), "@strudel/transpiler")))
    }

    async fn load_superdough(&self) -> anyhow::Result<Arc<dyn Synth>> {
        self.0.counters.module_loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeModule(Arc::clone(&self.0), "superdough")))
    }

    async fn load_draw(&self) -> anyhow::Result<Arc<dyn Module>> {
        self.0.counters.module_loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeModule(Arc::clone(&self.0), "@strudel/draw")))
    }

    async fn load_soundfonts(&self) -> anyhow::Result<Option<Arc<dyn SoundfontRegistrar>>> {
        Ok(Some(Arc::new(FakeModule(Arc::clone(&self.0), "@strudel/soundfonts"))))
    }
}

/// Every fake module is the same type, told apart by name
struct FakeModule(Arc<FakeRuntime>, &'static str);

impl Module for FakeModule {
    fn name(&self) -> &str {
        self.1
    }

    fn exports(&self) -> Vec<String> {
        let names: &[&str] = match self.1 {
            "@strudel/core" => &["sequence", "stack", "note", "hush"],
            "@strudel/mini" => &["mini", "m"],
            "@strudel/webaudio" => &["samples", "webaudioOutput"],
            "@strudel/tonal" => &["scale", "voicing", "note"],
            "@strudel/draw" => &["pianoroll"],
            _ => &[],
        };
        names.iter().map(|s| s.to_string()).collect()
    }
}

impl PatternCore for FakeModule {
    fn register_scope(&self, scope: &EvalScope) -> anyhow::Result<()> {
        *self.0.registered_scope.lock() = Some(scope.clone());
        Ok(())
    }

    fn pattern_methods(&self) -> BTreeSet<String> {
        self.0.behavior.core_methods.clone()
    }

    fn repl(&self, options: ReplOptions) -> anyhow::Result<Arc<dyn Repl>> {
        self.0.counters.repl_builds.fetch_add(1, Ordering::SeqCst);
        *self.0.repl_scope.lock() = Some(options.scope.clone());
        *self.0.repl_clock.lock() = Some(Arc::clone(&options.get_time));
        Ok(Arc::new(FakeRepl(Arc::clone(&self.0))))
    }
}

#[async_trait]
impl AudioOutput for FakeModule {
    fn audio_context(&self) -> anyhow::Result<Arc<dyn AudioContext>> {
        self.0.counters.context_creations.fetch_add(1, Ordering::SeqCst);
        let context: Arc<dyn AudioContext> = self.0.context();
        Ok(context)
    }

    fn init_audio_on_first_interaction(&self) {
        self.0.counters.interaction_arms.fetch_add(1, Ordering::SeqCst);
    }

    async fn register_synth_sounds(&self) -> anyhow::Result<()> {
        self.0.counters.synth_registrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn register_zzfx_sounds(&self) -> anyhow::Result<()> {
        self.0.counters.synth_registrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn sample_loader(&self) -> Arc<dyn SampleBankLoader> {
        Arc::new(FakeModule(Arc::clone(&self.0), "samples"))
    }

    fn alias_bank_loader(&self) -> Option<Arc<dyn AliasBankLoader>> {
        if self.0.behavior.webaudio_alias {
            Some(Arc::new(FakeModule(Arc::clone(&self.0), "webaudio alias")))
        } else {
            None
        }
    }

    fn output(&self) -> Arc<dyn OutputSink> {
        Arc::new(FakeModule(Arc::clone(&self.0), "output"))
    }
}

impl Synth for FakeModule {
    fn alias_bank_loader(&self) -> Option<Arc<dyn AliasBankLoader>> {
        if self.0.behavior.superdough_alias {
            Some(Arc::new(FakeModule(Arc::clone(&self.0), "superdough alias")))
        } else {
            None
        }
    }
}

impl Transpiler for FakeModule {
    fn transpile(&self, code: &str) -> anyhow::Result<String> {
        Ok(code.to_string())
    }
}

#[async_trait]
impl SoundfontRegistrar for FakeModule {
    async fn register_soundfonts(&self) -> anyhow::Result<()> {
        self.0.counters.soundfont_registrations.fetch_add(1, Ordering::SeqCst);
        if self.0.behavior.soundfonts_fail {
            anyhow::bail!("soundfont index unreachable");
        }
        Ok(())
    }
}

#[async_trait]
impl SampleBankLoader for FakeModule {
    async fn load(&self, manifest_url: &str, base: Option<&str>) -> anyhow::Result<()> {
        self.0.pause().await;
        self.0
            .sample_fetches
            .lock()
            .push((manifest_url.to_string(), base.map(str::to_string)));
        if let Some(failing) = &self.0.behavior.failing_bank {
            if manifest_url.contains(failing.as_str()) {
                anyhow::bail!("HTTP 503");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AliasBankLoader for FakeModule {
    async fn load(&self, manifest_url: &str) -> anyhow::Result<()> {
        self.0
            .alias_fetches
            .lock()
            .push(format!("{}: {}", self.1, manifest_url));
        Ok(())
    }
}

impl OutputSink for FakeModule {
    fn trigger(&self, _value: &serde_json::Value, _time: f64) -> anyhow::Result<()> {
        Ok(())
    }
}

struct FakeRepl(Arc<FakeRuntime>);

#[async_trait]
impl Repl for FakeRepl {
    async fn evaluate(&self, code: &str) -> anyhow::Result<()> {
        self.0.evaluated.lock().push(code.to_string());
        if let Some(failing) = &self.0.behavior.failing_code {
            if code.contains(failing.as_str()) {
                anyhow::bail!("SyntaxError: unexpected token in `{}`", code);
            }
        }
        Ok(())
    }

    fn stop(&self) {
        self.0.counters.stops.fetch_add(1, Ordering::SeqCst);
    }
}

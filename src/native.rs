//! Native audio output module
//!
//! Implements the output driver seam with `strudel-audio`: a native audio
//! context, HTTP sample and alias loading into a shared registry, and a sound
//! router whose triggers go to the host's playback consumer.

use crate::modules::{
    AliasBankLoader, AudioContext, AudioOutput, Module, OutputSink, SampleBankLoader, WEBAUDIO,
};
use async_trait::async_trait;
use std::sync::Arc;
use strudel_audio::{
    register_synth_sounds, register_zzfx_sounds, AliasLoader, ContextState, NativeAudioContext,
    SampleLoader, SampleRegistry, SoundRouter, Trigger,
};
use tokio::sync::mpsc;

#[async_trait]
impl AudioContext for NativeAudioContext {
    fn state(&self) -> ContextState {
        NativeAudioContext::state(self)
    }

    async fn resume(&self) -> anyhow::Result<ContextState> {
        Ok(NativeAudioContext::resume(self)?)
    }

    fn current_time(&self) -> f64 {
        NativeAudioContext::current_time(self)
    }
}

#[async_trait]
impl SampleBankLoader for SampleLoader {
    async fn load(&self, manifest_url: &str, base: Option<&str>) -> anyhow::Result<()> {
        SampleLoader::load(self, manifest_url, base).await?;
        Ok(())
    }
}

#[async_trait]
impl AliasBankLoader for AliasLoader {
    async fn load(&self, manifest_url: &str) -> anyhow::Result<()> {
        AliasLoader::load(self, manifest_url).await?;
        Ok(())
    }
}

impl OutputSink for SoundRouter {
    fn trigger(&self, value: &serde_json::Value, time: f64) -> anyhow::Result<()> {
        SoundRouter::trigger(self, value, time)?;
        Ok(())
    }
}

/// Native implementation of the web audio output module
pub struct NativeWebAudio {
    context: Arc<NativeAudioContext>,
    registry: Arc<SampleRegistry>,
    samples: Arc<SampleLoader>,
    aliases: Arc<AliasLoader>,
    router: Arc<SoundRouter>,
}

impl NativeWebAudio {
    /// Create the module with a clock-only context.
    ///
    /// The receiver yields every event the REPL triggers.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Trigger>) {
        Self::with_context(NativeAudioContext::new())
    }

    /// Create the module with a context driven by the default output device
    #[cfg(feature = "device")]
    pub fn with_device() -> anyhow::Result<(Self, mpsc::UnboundedReceiver<Trigger>)> {
        Ok(Self::with_context(NativeAudioContext::with_device()?))
    }

    fn with_context(context: NativeAudioContext) -> (Self, mpsc::UnboundedReceiver<Trigger>) {
        let registry = Arc::new(SampleRegistry::new());
        let (router, triggers) = SoundRouter::new(Arc::clone(&registry));
        let module = NativeWebAudio {
            context: Arc::new(context),
            samples: Arc::new(SampleLoader::new(Arc::clone(&registry))),
            aliases: Arc::new(AliasLoader::new(Arc::clone(&registry))),
            router: Arc::new(router),
            registry,
        };
        (module, triggers)
    }

    pub fn registry(&self) -> Arc<SampleRegistry> {
        Arc::clone(&self.registry)
    }

    /// The concrete context, for hosts that forward user interactions
    pub fn context(&self) -> Arc<NativeAudioContext> {
        Arc::clone(&self.context)
    }
}

impl Module for NativeWebAudio {
    fn name(&self) -> &str {
        WEBAUDIO
    }

    fn exports(&self) -> Vec<String> {
        [
            "getAudioContext",
            "initAudioOnFirstClick",
            "samples",
            "aliasBank",
            "registerSynthSounds",
            "registerZZFXSounds",
            "webaudioOutput",
        ]
        .into_iter()
        .map(str::to_string)
        .collect()
    }
}

#[async_trait]
impl AudioOutput for NativeWebAudio {
    fn audio_context(&self) -> anyhow::Result<Arc<dyn AudioContext>> {
        let context: Arc<dyn AudioContext> = self.context.clone();
        Ok(context)
    }

    fn init_audio_on_first_interaction(&self) {
        self.context.arm_on_first_interaction();
    }

    async fn register_synth_sounds(&self) -> anyhow::Result<()> {
        let count = register_synth_sounds(&self.registry);
        tracing::debug!(count, "synth sounds registered");
        Ok(())
    }

    async fn register_zzfx_sounds(&self) -> anyhow::Result<()> {
        let count = register_zzfx_sounds(&self.registry);
        tracing::debug!(count, "zzfx sounds registered");
        Ok(())
    }

    fn sample_loader(&self) -> Arc<dyn SampleBankLoader> {
        self.samples.clone()
    }

    fn alias_bank_loader(&self) -> Option<Arc<dyn AliasBankLoader>> {
        Some(self.aliases.clone())
    }

    fn output(&self) -> Arc<dyn OutputSink> {
        self.router.clone()
    }
}

//! Native collaborators for the Strudel bridge
//!
//! This crate provides the pieces of the audio side that make sense to run
//! natively next to the host shell:
//! - An audio output context with a playback clock and suspended/running state
//! - Sample bank manifests fetched over HTTP and registered by sound name
//! - Alias banks mapping alternate bank names to canonical ones
//! - Built-in synth and ZZFX sound names
//! - A sound router that resolves triggered events against the registry

pub mod context;
#[cfg(feature = "device")]
pub mod engine;
pub mod output;
pub mod samples;
pub mod synth;

pub use context::{ContextState, NativeAudioContext};
#[cfg(feature = "device")]
pub use engine::AudioEngine;
pub use output::{SoundRouter, Trigger};
pub use samples::{
    AliasLoader, SampleLoader, SampleManifest, SampleRegistry, SoundSource,
};
pub use synth::{register_synth_sounds, register_zzfx_sounds, SYNTH_WAVEFORMS, ZZFX_SOUNDS};

/// Audio collaborator errors
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Audio device error: {0}")]
    DeviceError(String),

    #[error("Audio context is closed")]
    ContextClosed,

    #[error("Sound not found: {0}")]
    SoundNotFound(String),

    #[error("Invalid sample manifest {url}: {message}")]
    InvalidManifest { url: String, message: String },

    #[error("Failed to load {url}: {message}")]
    HttpError { url: String, message: String },

    #[error("Output channel closed")]
    OutputClosed,
}

pub type Result<T> = std::result::Result<T, AudioError>;

//! Built-in synth and ZZFX sounds
//!
//! These need no assets; registering them only makes their names resolvable.

use crate::{SampleRegistry, SoundSource};

/// Oscillator and noise sources, as (name, waveform)
pub const SYNTH_WAVEFORMS: &[(&str, &str)] = &[
    ("sine", "sine"),
    ("sin", "sine"),
    ("square", "square"),
    ("sqr", "square"),
    ("triangle", "triangle"),
    ("tri", "triangle"),
    ("sawtooth", "sawtooth"),
    ("saw", "sawtooth"),
    ("white", "white"),
    ("pink", "pink"),
    ("brown", "brown"),
];

pub const ZZFX_SOUNDS: &[&str] = &[
    "zzfx",
    "z_sine",
    "z_sawtooth",
    "z_triangle",
    "z_square",
    "z_tan",
    "z_noise",
];

/// Register oscillator and noise sounds, returning how many were added
pub fn register_synth_sounds(registry: &SampleRegistry) -> usize {
    for (name, waveform) in SYNTH_WAVEFORMS {
        registry.register(
            *name,
            SoundSource::Synth {
                waveform: waveform.to_string(),
            },
        );
    }
    SYNTH_WAVEFORMS.len()
}

/// Register the ZZFX sounds, returning how many were added
pub fn register_zzfx_sounds(registry: &SampleRegistry) -> usize {
    for name in ZZFX_SOUNDS {
        registry.register(*name, SoundSource::Zzfx);
    }
    ZZFX_SOUNDS.len()
}

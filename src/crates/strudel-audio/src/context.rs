//! Audio output context
//!
//! The shared handle for the audio rendering pipeline and its playback clock.
//! Like a browser audio context it starts suspended and has to be resumed,
//! usually on the first user interaction.

use crate::{AudioError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[cfg(feature = "device")]
use crate::AudioEngine;

/// Lifecycle state of an audio context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

impl std::fmt::Display for ContextState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ContextState::Suspended => "suspended",
            ContextState::Running => "running",
            ContextState::Closed => "closed",
        };
        f.write_str(name)
    }
}

struct Clock {
    state: ContextState,
    /// Running time accumulated before the last suspend
    accumulated: Duration,
    running_since: Option<Instant>,
}

impl Clock {
    fn elapsed(&self) -> Duration {
        self.accumulated + self.running_since.map(|t| t.elapsed()).unwrap_or_default()
    }
}

/// Native audio context
///
/// Without the `device` feature the clock is the monotonic time spent in the
/// running state. With a device attached the clock is the amount of audio the
/// device has rendered.
pub struct NativeAudioContext {
    clock: Mutex<Clock>,
    /// Resume on the next `notify_interaction`
    armed: AtomicBool,
    #[cfg(feature = "device")]
    engine: Option<AudioEngine>,
}

impl NativeAudioContext {
    /// Create a clock-only context in the suspended state
    pub fn new() -> Self {
        NativeAudioContext {
            clock: Mutex::new(Clock {
                state: ContextState::Suspended,
                accumulated: Duration::ZERO,
                running_since: None,
            }),
            armed: AtomicBool::new(false),
            #[cfg(feature = "device")]
            engine: None,
        }
    }

    /// Create a context driven by the default output device
    #[cfg(feature = "device")]
    pub fn with_device() -> Result<Self> {
        let mut context = Self::new();
        context.engine = Some(AudioEngine::new()?);
        Ok(context)
    }

    /// Current lifecycle state
    pub fn state(&self) -> ContextState {
        self.clock.lock().state
    }

    /// Current playback time in seconds
    pub fn current_time(&self) -> f64 {
        #[cfg(feature = "device")]
        if let Some(engine) = &self.engine {
            return engine.current_time();
        }
        self.clock.lock().elapsed().as_secs_f64()
    }

    /// Move to the running state. Resuming a running context is a no-op.
    pub fn resume(&self) -> Result<ContextState> {
        let mut clock = self.clock.lock();
        match clock.state {
            ContextState::Closed => return Err(AudioError::ContextClosed),
            ContextState::Running => return Ok(ContextState::Running),
            ContextState::Suspended => {}
        }

        #[cfg(feature = "device")]
        if let Some(engine) = &self.engine {
            engine.play()?;
        }

        clock.state = ContextState::Running;
        clock.running_since = Some(Instant::now());
        tracing::debug!("audio context resumed");
        Ok(clock.state)
    }

    /// Freeze the clock and move to the suspended state
    pub fn suspend(&self) -> Result<ContextState> {
        let mut clock = self.clock.lock();
        match clock.state {
            ContextState::Closed => return Err(AudioError::ContextClosed),
            ContextState::Suspended => return Ok(ContextState::Suspended),
            ContextState::Running => {}
        }

        #[cfg(feature = "device")]
        if let Some(engine) = &self.engine {
            engine.pause()?;
        }

        clock.accumulated = clock.elapsed();
        clock.running_since = None;
        clock.state = ContextState::Suspended;
        Ok(clock.state)
    }

    /// Close the context. A closed context cannot be resumed.
    pub fn close(&self) {
        let mut clock = self.clock.lock();
        if clock.state == ContextState::Running {
            #[cfg(feature = "device")]
            if let Some(engine) = &self.engine {
                let _ = engine.pause();
            }
            clock.accumulated = clock.elapsed();
            clock.running_since = None;
        }
        clock.state = ContextState::Closed;
        self.armed.store(false, Ordering::SeqCst);
    }

    /// Resume automatically on the next user interaction
    pub fn arm_on_first_interaction(&self) {
        if self.state() == ContextState::Suspended {
            self.armed.store(true, Ordering::SeqCst);
        }
    }

    /// Whether a resume is pending on the next interaction
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Report a user interaction from the host shell.
    ///
    /// Returns `true` if this interaction resumed the context.
    pub fn notify_interaction(&self) -> Result<bool> {
        if !self.armed.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        self.resume()?;
        Ok(true)
    }
}

impl Default for NativeAudioContext {
    fn default() -> Self {
        Self::new()
    }
}

//! Audio output engine using cpal
//!
//! Owns the output device on a dedicated thread (cpal streams are not `Send`
//! on every platform) and counts rendered frames so the context clock follows
//! the device rather than the wall clock.

use crate::{AudioError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

enum EngineCommand {
    Play(mpsc::Sender<Result<()>>),
    Pause(mpsc::Sender<Result<()>>),
    Shutdown,
}

/// Audio output engine bound to the default output device
pub struct AudioEngine {
    commands: Mutex<mpsc::Sender<EngineCommand>>,
    /// Frames rendered since the stream was first started
    frames: Arc<AtomicU64>,
    sample_rate: u32,
    channels: u16,
}

impl AudioEngine {
    /// Open the default output device. The stream is built paused.
    pub fn new() -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<EngineCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(u32, u16)>>();
        let frames = Arc::new(AtomicU64::new(0));
        let thread_frames = Arc::clone(&frames);

        thread::Builder::new()
            .name("strudel-audio-output".to_string())
            .spawn(move || run_device(command_rx, ready_tx, thread_frames))
            .map_err(|e| AudioError::DeviceError(format!("Failed to spawn audio thread: {}", e)))?;

        let (sample_rate, channels) = ready_rx
            .recv()
            .map_err(|_| AudioError::DeviceError("Audio thread exited during setup".to_string()))??;

        Ok(AudioEngine {
            commands: Mutex::new(command_tx),
            frames,
            sample_rate,
            channels,
        })
    }

    /// Get the sample rate of the output device
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the channel count of the output device
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Seconds of audio rendered by the device so far
    pub fn current_time(&self) -> f64 {
        self.frames.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }

    /// Start (or restart) the output stream
    pub fn play(&self) -> Result<()> {
        self.round_trip(EngineCommand::Play)
    }

    /// Pause the output stream, freezing the clock
    pub fn pause(&self) -> Result<()> {
        self.round_trip(EngineCommand::Pause)
    }

    fn round_trip(&self, make: fn(mpsc::Sender<Result<()>>) -> EngineCommand) -> Result<()> {
        let (tx, rx) = mpsc::channel();
        self.commands
            .lock()
            .send(make(tx))
            .map_err(|_| AudioError::DeviceError("Audio thread is gone".to_string()))?;
        rx.recv()
            .map_err(|_| AudioError::DeviceError("Audio thread is gone".to_string()))?
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        let _ = self.commands.lock().send(EngineCommand::Shutdown);
    }
}

fn run_device(
    commands: mpsc::Receiver<EngineCommand>,
    ready: mpsc::Sender<Result<(u32, u16)>>,
    frames: Arc<AtomicU64>,
) {
    let host = cpal::default_host();
    let setup = host
        .default_output_device()
        .ok_or_else(|| AudioError::DeviceError("No output device available".to_string()))
        .and_then(|device| {
            let config = device.default_output_config().map_err(|e| {
                AudioError::DeviceError(format!("Failed to get default config: {}", e))
            })?;
            let sample_rate = config.sample_rate().0;
            let channels = config.channels();
            let config: cpal::StreamConfig = config.into();
            let counter = Arc::clone(&frames);
            let stream = device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        // Synthesis happens in the pattern runtime; the native
                        // stream only keeps the device awake and the clock moving.
                        data.fill(0.0);
                        counter.fetch_add((data.len() / channels as usize) as u64, Ordering::Relaxed);
                    },
                    |err| {
                        tracing::error!("Audio stream error: {}", err);
                    },
                    None,
                )
                .map_err(|e| AudioError::DeviceError(format!("Failed to build stream: {}", e)))?;
            park_stream(&stream, &frames)?;
            Ok((stream, sample_rate, channels))
        });

    let stream = match setup {
        Ok((stream, sample_rate, channels)) => {
            let _ = ready.send(Ok((sample_rate, channels)));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    while let Ok(command) = commands.recv() {
        match command {
            EngineCommand::Play(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| AudioError::DeviceError(format!("Failed to play stream: {}", e)));
                let _ = reply.send(result);
            }
            EngineCommand::Pause(reply) => {
                let result = stream
                    .pause()
                    .map_err(|e| AudioError::DeviceError(format!("Failed to pause stream: {}", e)));
                let _ = reply.send(result);
            }
            EngineCommand::Shutdown => break,
        }
    }
}

/// Some backends start a stream as soon as it is built. Pause it and drop any
/// frames it rendered so the clock stays at zero until the first `play`.
fn park_stream<S: StreamTrait>(stream: &S, frames: &AtomicU64) -> Result<()> {
    stream
        .pause()
        .map_err(|e| AudioError::DeviceError(format!("Failed to pause stream: {}", e)))?;
    frames.store(0, Ordering::Relaxed);
    Ok(())
}

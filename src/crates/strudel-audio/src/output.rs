//! Output sink that routes triggered events to registered sounds

use crate::{AudioError, Result, SampleRegistry, SoundSource};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A sound resolved against the registry, ready for playback
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    /// Canonical sound name after alias resolution
    pub sound: String,
    pub index: usize,
    pub source: SoundSource,
    /// Sample file to play, if the source is sample based
    pub url: Option<String>,
    /// Context time the event should start at
    pub time: f64,
    /// The full event value, for parameters the router does not interpret
    pub value: Value,
}

/// Resolves event values to sounds and hands them to the playback consumer
pub struct SoundRouter {
    registry: Arc<SampleRegistry>,
    sender: mpsc::UnboundedSender<Trigger>,
}

impl SoundRouter {
    /// Create a router and the receiving end for the playback consumer
    pub fn new(registry: Arc<SampleRegistry>) -> (Self, mpsc::UnboundedReceiver<Trigger>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (SoundRouter { registry, sender }, receiver)
    }

    /// Resolve an event value and forward it.
    ///
    /// Accepts `"bd"`, `"bd:3"` or an object with `s`/`sound`, optional `n`
    /// and optional `bank`.
    pub fn trigger(&self, value: &Value, time: f64) -> Result<Trigger> {
        let (name, index) = sound_name(value)
            .ok_or_else(|| AudioError::SoundNotFound(value.to_string()))?;

        let (sound, source) = self
            .registry
            .resolve(&name)
            .ok_or_else(|| AudioError::SoundNotFound(name.clone()))?;

        let trigger = Trigger {
            url: source.sample_url(index).map(str::to_string),
            sound,
            index,
            source,
            time,
            value: value.clone(),
        };

        self.sender
            .send(trigger.clone())
            .map_err(|_| AudioError::OutputClosed)?;
        Ok(trigger)
    }
}

fn sound_name(value: &Value) -> Option<(String, usize)> {
    match value {
        Value::String(s) => Some(split_index(s)),
        Value::Object(map) => {
            let sound = map
                .get("s")
                .or_else(|| map.get("sound"))
                .and_then(Value::as_str)?;
            let (sound, mut index) = split_index(sound);
            if let Some(n) = map.get("n").and_then(Value::as_f64) {
                index = n.max(0.0).floor() as usize;
            }
            let name = match map.get("bank").and_then(Value::as_str) {
                Some(bank) => format!("{}_{}", bank, sound),
                None => sound,
            };
            Some((name, index))
        }
        _ => None,
    }
}

fn split_index(s: &str) -> (String, usize) {
    match s.split_once(':') {
        Some((name, idx)) => (name.to_string(), idx.parse::<usize>().unwrap_or(0)),
        None => (s.to_string(), 0),
    }
}

//! Sample bank manifests and the sound registry
//!
//! Sample banks are described by strudel sample maps: JSON objects whose keys
//! are sound names and whose values are a path, a list of paths, or an object
//! mapping note names to paths. Loading a bank only registers where the audio
//! lives; decoding is left to the playback side.

use crate::{AudioError, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Where a registered sound comes from
#[derive(Debug, Clone, PartialEq)]
pub enum SoundSource {
    /// Indexed sample files (`bd:0`, `bd:1`, ...)
    Samples { urls: Vec<String> },
    /// Sample files keyed by note name, for pitched instruments
    Pitched { notes: BTreeMap<String, Vec<String>> },
    /// Built-in oscillator or noise source
    Synth { waveform: String },
    /// ZZFX procedural sound
    Zzfx,
}

impl SoundSource {
    /// Pick the sample URL for an index, wrapping if out of bounds
    pub fn sample_url(&self, index: usize) -> Option<&str> {
        match self {
            SoundSource::Samples { urls } if !urls.is_empty() => {
                Some(urls[index % urls.len()].as_str())
            }
            SoundSource::Pitched { notes } => notes
                .values()
                .next()
                .and_then(|urls| urls.first())
                .map(String::as_str),
            _ => None,
        }
    }
}

/// A parsed sample map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleManifest {
    /// Base URL every relative path was joined to
    pub base: String,
    pub sounds: BTreeMap<String, SoundSource>,
}

impl SampleManifest {
    /// Parse a sample map.
    ///
    /// The base path is `base` if given, else the map's `_base` key, else the
    /// directory the manifest was fetched from.
    pub fn parse(manifest_url: &str, json: &Value, base: Option<&str>) -> Result<Self> {
        let invalid = |message: &str| AudioError::InvalidManifest {
            url: manifest_url.to_string(),
            message: message.to_string(),
        };

        let map = json.as_object().ok_or_else(|| invalid("expected a JSON object"))?;

        let base = base
            .map(str::to_string)
            .or_else(|| map.get("_base").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| parent_url(manifest_url));

        let mut sounds = BTreeMap::new();
        for (name, entry) in map {
            if name.starts_with('_') {
                continue;
            }
            let source = match entry {
                Value::String(path) => SoundSource::Samples {
                    urls: vec![join_url(&base, path)],
                },
                Value::Array(paths) => SoundSource::Samples {
                    urls: string_list(paths, &base),
                },
                Value::Object(notes) => SoundSource::Pitched {
                    notes: notes
                        .iter()
                        .map(|(note, paths)| {
                            let urls = match paths {
                                Value::String(path) => vec![join_url(&base, path)],
                                Value::Array(paths) => string_list(paths, &base),
                                _ => Vec::new(),
                            };
                            (note.clone(), urls)
                        })
                        .filter(|(_, urls)| !urls.is_empty())
                        .collect(),
                },
                _ => return Err(invalid(&format!("unsupported entry for sound '{}'", name))),
            };
            sounds.insert(name.clone(), source);
        }

        Ok(SampleManifest { base, sounds })
    }
}

fn string_list(paths: &[Value], base: &str) -> Vec<String> {
    paths
        .iter()
        .filter_map(Value::as_str)
        .map(|path| join_url(base, path))
        .collect()
}

fn parent_url(url: &str) -> String {
    match url.rfind('/') {
        Some(idx) => url[..=idx].to_string(),
        None => String::new(),
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") || base.is_empty() {
        return path.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Thread-safe registry of every sound a pattern can reference
#[derive(Default)]
pub struct SampleRegistry {
    sounds: RwLock<HashMap<String, SoundSource>>,
    /// Alternate bank name -> canonical bank name
    aliases: RwLock<HashMap<String, String>>,
}

impl SampleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a sound
    pub fn register(&self, name: impl Into<String>, source: SoundSource) {
        self.sounds.write().insert(name.into(), source);
    }

    /// Register every sound of a manifest, returning the registered names
    pub fn register_manifest(&self, manifest: SampleManifest) -> Vec<String> {
        let mut sounds = self.sounds.write();
        manifest
            .sounds
            .into_iter()
            .map(|(name, source)| {
                sounds.insert(name.clone(), source);
                name
            })
            .collect()
    }

    /// Map an alternate bank name onto a canonical one
    pub fn register_alias(&self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.aliases.write().insert(alias.into(), canonical.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.sounds.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.read().is_empty()
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.read().len()
    }

    /// Sorted names of every registered sound
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sounds.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up a sound, following bank aliases.
    ///
    /// `name` may be a plain sound (`bd`), an alias of a bank (`808`) or a
    /// bank-prefixed sound (`808_bd`). Returns the canonical name with the
    /// source.
    pub fn resolve(&self, name: &str) -> Option<(String, SoundSource)> {
        let sounds = self.sounds.read();
        if let Some(source) = sounds.get(name) {
            return Some((name.to_string(), source.clone()));
        }

        let aliases = self.aliases.read();
        let canonical = match name.split_once('_') {
            Some((bank, sound)) => {
                let bank = aliases.get(bank)?;
                format!("{}_{}", bank, sound)
            }
            None => aliases.get(name)?.clone(),
        };
        sounds
            .get(&canonical)
            .map(|source| (canonical.clone(), source.clone()))
    }
}

/// Fetches sample maps over HTTP and registers them
pub struct SampleLoader {
    client: reqwest::Client,
    registry: Arc<SampleRegistry>,
}

impl SampleLoader {
    pub fn new(registry: Arc<SampleRegistry>) -> Self {
        SampleLoader {
            client: reqwest::Client::new(),
            registry,
        }
    }

    pub fn registry(&self) -> Arc<SampleRegistry> {
        Arc::clone(&self.registry)
    }

    /// Fetch a sample map and register its sounds.
    ///
    /// Returns the names that were registered.
    pub async fn load(&self, manifest_url: &str, base: Option<&str>) -> Result<Vec<String>> {
        let json = fetch_json(&self.client, manifest_url).await?;
        let manifest = SampleManifest::parse(manifest_url, &json, base)?;
        let names = self.registry.register_manifest(manifest);
        tracing::debug!(url = manifest_url, sounds = names.len(), "sample bank registered");
        Ok(names)
    }
}

/// Fetches alias manifests (`{ "CanonicalBank": ["alias", ...] }`)
pub struct AliasLoader {
    client: reqwest::Client,
    registry: Arc<SampleRegistry>,
}

impl AliasLoader {
    pub fn new(registry: Arc<SampleRegistry>) -> Self {
        AliasLoader {
            client: reqwest::Client::new(),
            registry,
        }
    }

    /// Fetch an alias manifest and register every alias, returning how many
    pub async fn load(&self, url: &str) -> Result<usize> {
        let json = fetch_json(&self.client, url).await?;
        let map = json.as_object().ok_or_else(|| AudioError::InvalidManifest {
            url: url.to_string(),
            message: "expected a JSON object".to_string(),
        })?;

        let mut count = 0;
        for (canonical, aliases) in map {
            let aliases: Vec<&str> = match aliases {
                Value::String(alias) => vec![alias.as_str()],
                Value::Array(list) => list.iter().filter_map(Value::as_str).collect(),
                _ => continue,
            };
            for alias in aliases {
                self.registry.register_alias(alias, canonical.as_str());
                count += 1;
            }
        }
        tracing::debug!(url, aliases = count, "alias bank registered");
        Ok(count)
    }
}

async fn fetch_json(client: &reqwest::Client, url: &str) -> Result<Value> {
    let http_error = |e: reqwest::Error| AudioError::HttpError {
        url: url.to_string(),
        message: e.to_string(),
    };
    client
        .get(url)
        .send()
        .await
        .map_err(http_error)?
        .error_for_status()
        .map_err(http_error)?
        .json::<Value>()
        .await
        .map_err(http_error)
}

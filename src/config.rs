//! Bridge configuration
//!
//! Files are loaded in order (later wins):
//! 1. `~/.config/strudel-bridge/config.toml` (user)
//! 2. `./strudel-bridge.toml` (local override)
//! 3. Environment variables (`STRUDEL_BRIDGE_*`)
//!
//! Sample bank URLs may use the `{cdn}` and `{dough}` placeholders, which
//! expand to `cdn_base` and `dough_samples_base`, so pointing the bridge at a
//! mirror only takes one setting.
//!
//! ```toml
//! cdn_base = "https://strudel.b-cdn.net"
//! retry = "after_failure"
//!
//! [[sample_banks]]
//! manifest = "{cdn}/piano.json"
//! base = "{cdn}/piano/"
//! ```

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CDN: &str = "https://strudel.b-cdn.net";
pub const DEFAULT_DOUGH_SAMPLES: &str = "https://raw.githubusercontent.com/felixroos/dough-samples/main";

/// What happens when `init` is called after a failed initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// The failure is kept for the lifetime of the session
    #[default]
    Never,
    /// The next call after a completed failure starts a fresh initialization
    AfterFailure,
}

impl FromStr for RetryPolicy {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(RetryPolicy::Never),
            "after_failure" | "after-failure" => Ok(RetryPolicy::AfterFailure),
            other => Err(BridgeError::Config(format!("unknown retry policy '{}'", other))),
        }
    }
}

/// A sample bank manifest and the optional base path of its assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleBankSource {
    pub manifest: String,
    #[serde(default)]
    pub base: Option<String>,
}

impl SampleBankSource {
    pub fn new(manifest: &str, base: Option<&str>) -> Self {
        SampleBankSource {
            manifest: manifest.to_string(),
            base: base.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub cdn_base: String,
    pub dough_samples_base: String,
    pub sample_banks: Vec<SampleBankSource>,
    /// Alias manifest applied after the banks, if an alias loader exists
    pub alias_manifest: Option<String>,
    /// Code evaluated by `hush`
    pub silence_command: String,
    /// Register built-in synth and ZZFX sounds
    pub synth_sounds: bool,
    /// Try the optional soundfont module
    pub soundfonts: bool,
    pub retry: RetryPolicy,
    pub log_level: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            cdn_base: DEFAULT_CDN.to_string(),
            dough_samples_base: DEFAULT_DOUGH_SAMPLES.to_string(),
            sample_banks: vec![
                SampleBankSource::new(
                    "{cdn}/tidal-drum-machines.json",
                    Some("{cdn}/tidal-drum-machines/machines/"),
                ),
                SampleBankSource::new("{cdn}/piano.json", Some("{cdn}/piano/")),
                SampleBankSource::new("{dough}/Dirt-Samples.json", None),
                SampleBankSource::new("{cdn}/vcsl.json", Some("{cdn}/VCSL/")),
                SampleBankSource::new("{cdn}/mridangam.json", Some("{cdn}/mrid/")),
                SampleBankSource::new("{cdn}/uzu-drumkit.json", Some("{cdn}/uzu-drumkit/")),
                SampleBankSource::new("{cdn}/uzu-wavetables.json", Some("{cdn}/uzu-wavetables/")),
            ],
            alias_manifest: Some("{cdn}/tidal-drum-machines-alias.json".to_string()),
            silence_command: "hush()".to_string(),
            synth_sounds: true,
            soundfonts: true,
            retry: RetryPolicy::Never,
            log_level: "info".to_string(),
        }
    }
}

/// Where the loaded values came from
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub files: Vec<PathBuf>,
    pub env_overrides: Vec<String>,
}

impl BridgeConfig {
    /// Load from the standard locations and the process environment
    pub fn load() -> Result<(Self, ConfigSources)> {
        let files = discover_config_files();
        let mut config = Self::load_from(&files)?;
        let env_overrides = config.apply_env(|key| std::env::var(key).ok())?;
        Ok((config, ConfigSources { files, env_overrides }))
    }

    /// Load from explicit files, later files overriding earlier keys
    pub fn load_from(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = toml::Table::new();
        for path in paths {
            merge_tables(&mut merged, read_table(path)?);
        }
        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| BridgeError::Config(e.to_string()))
    }

    /// Overlay `STRUDEL_BRIDGE_*` variables, returning the names that applied
    pub fn apply_env<F>(&mut self, var: F) -> Result<Vec<String>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();
        if let Some(v) = var("STRUDEL_BRIDGE_CDN") {
            self.cdn_base = v;
            applied.push("STRUDEL_BRIDGE_CDN".to_string());
        }
        if let Some(v) = var("STRUDEL_BRIDGE_DOUGH_SAMPLES") {
            self.dough_samples_base = v;
            applied.push("STRUDEL_BRIDGE_DOUGH_SAMPLES".to_string());
        }
        if let Some(v) = var("STRUDEL_BRIDGE_LOG_LEVEL") {
            self.log_level = v;
            applied.push("STRUDEL_BRIDGE_LOG_LEVEL".to_string());
        }
        if let Some(v) = var("STRUDEL_BRIDGE_RETRY") {
            self.retry = v.parse()?;
            applied.push("STRUDEL_BRIDGE_RETRY".to_string());
        }
        Ok(applied)
    }

    /// Expand `{cdn}` and `{dough}` in a configured URL
    pub fn expand(&self, url: &str) -> String {
        url.replace("{cdn}", self.cdn_base.trim_end_matches('/'))
            .replace("{dough}", self.dough_samples_base.trim_end_matches('/'))
    }

    /// Sample banks with placeholders expanded, as (manifest, base)
    pub fn resolved_sample_banks(&self) -> Vec<(String, Option<String>)> {
        self.sample_banks
            .iter()
            .map(|bank| (self.expand(&bank.manifest), bank.base.as_deref().map(|b| self.expand(b))))
            .collect()
    }

    pub fn resolved_alias_manifest(&self) -> Option<String> {
        self.alias_manifest.as_deref().map(|url| self.expand(url))
    }
}

/// Config files that exist, in load order
pub fn discover_config_files() -> Vec<PathBuf> {
    let mut files = Vec::new();

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("strudel-bridge/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    let local = PathBuf::from("strudel-bridge.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| BridgeError::Config(format!("failed to read {}: {}", path.display(), e)))?;
    contents
        .parse::<toml::Table>()
        .map_err(|e| BridgeError::Config(format!("failed to parse {}: {}", path.display(), e)))
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

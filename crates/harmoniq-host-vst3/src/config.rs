use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// What to do with a plugin that reports a protocol value this host does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnknownProtocolPolicy {
    /// Deliver discrete note events as if the capability were absent.
    #[default]
    FallbackToLegacy,
    /// Do not deliver MIDI input to the plugin at all.
    Ignore,
}

/// Runtime options when instantiating a VST3 host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostOptions {
    /// Events per process call, reserved once for the input and output lists.
    pub event_list_capacity: usize,
    /// Pending MIDI messages between the MIDI thread and the audio thread.
    pub input_queue_capacity: usize,
    /// UMP group stamped on packets built from MIDI 1.0 input (0-15).
    pub ump_group: u8,
    pub event_bus: i32,
    pub unknown_protocol: UnknownProtocolPolicy,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            event_list_capacity: 512,
            input_queue_capacity: 1024,
            ump_group: 0,
            event_bus: 0,
            unknown_protocol: UnknownProtocolPolicy::default(),
        }
    }
}

impl HostOptions {
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read host options from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse host options in {}", path.display()))
    }

    /// Reads `path`, falling back to defaults when it is missing or malformed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(options) => options,
            Err(err) => {
                tracing::debug!(?err, "using default VST3 MIDI options");
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("failed to encode host options")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write host options to {}", path.display()))
    }
}

const SETTINGS_DIR: &str = "HarmoniqStudio";
const SETTINGS_FILE: &str = "vst3-midi.json";

/// Where the host keeps its persisted options, if the platform has a config directory.
pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
}

/// Options persisted under the user's config directory, or defaults.
pub fn load() -> HostOptions {
    settings_path()
        .map(|path| HostOptions::load_or_default(&path))
        .unwrap_or_default()
}

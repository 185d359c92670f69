//! Configuration management for MidiDaemon
//!
//! Handles loading, defaulting, validation and saving of the YAML (or JSON)
//! configuration. The dispatcher consumes the result as an immutable value.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::midi::EventKind;

/// Channel filter value meaning "accept every channel"
pub const ALL_CHANNELS: i8 = -1;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub mappings: Vec<Mapping>,
}

/// MIDI input configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Input port name (substring match). The first available port is used when absent or blank.
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub input_port: Option<String>,
    /// MIDI channel 0-15, or -1 for all channels
    #[serde(default = "default_channel")]
    pub channel: i8,
}

/// General daemon settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Restart the dispatch loop when the transport fails
    #[serde(default)]
    pub auto_restart: bool,
    /// Pause between matched mappings of the same event
    #[serde(default = "default_action_delay_ms", alias = "action_delay")]
    pub action_delay_ms: u64,
}

/// A configured (event filter, action, enabled) triple
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Mapping {
    pub name: String,
    pub event: EventFilter,
    pub action: Action,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Which events a mapping reacts to
///
/// `velocity` (note events) and `value` (control change) are minimum
/// thresholds; 0 disables the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventFilter {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub note: u8,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub controller: u8,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub program: u8,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub velocity: u8,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub value: u8,
}

/// Loosely-typed parameter bag of an action
pub type Params = HashMap<String, Value>;

/// A system action: executor type plus its parameters
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: Params,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            input_port: None,
            channel: ALL_CHANNELS,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            auto_restart: false,
            action_delay_ms: default_action_delay_ms(),
        }
    }
}

impl MidiConfig {
    /// Whether an event on `channel` passes the channel filter
    pub fn accepts_channel(&self, channel: u8) -> bool {
        self.channel == ALL_CHANNELS || i16::from(self.channel) == i16::from(channel)
    }
}

impl GeneralConfig {
    pub fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }
}

impl EventFilter {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            note: 0,
            controller: 0,
            program: 0,
            velocity: 0,
            value: 0,
        }
    }

    /// Note filter; `min_velocity` 0 matches any velocity
    pub fn note_on(note: u8, min_velocity: u8) -> Self {
        Self { note, velocity: min_velocity, ..Self::new(EventKind::NoteOn) }
    }

    pub fn note_off(note: u8) -> Self {
        Self { note, ..Self::new(EventKind::NoteOff) }
    }

    /// Control change filter; `min_value` 0 matches any value
    pub fn control_change(controller: u8, min_value: u8) -> Self {
        Self { controller, value: min_value, ..Self::new(EventKind::ControlChange) }
    }

    pub fn program_change(program: u8) -> Self {
        Self { program, ..Self::new(EventKind::ProgramChange) }
    }
}

impl Action {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            parameters: Params::new(),
        }
    }

    /// Builder-style parameter insertion
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

impl Mapping {
    pub fn new(name: impl Into<String>, event: EventFilter, action: Action) -> Self {
        Self {
            name: name.into(),
            event,
            action,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl AppConfig {
    /// Load configuration from file with validation.
    ///
    /// `.json` files are parsed as JSON, everything else as YAML.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = if is_json(path) {
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        } else {
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        };

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = if is_json(path) {
            serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?
        } else {
            serde_yaml::to_string(self).context("Failed to serialize config to YAML")?
        };

        fs::write(path, contents)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if !(ALL_CHANNELS..=15).contains(&self.midi.channel) {
            bail!(
                "Invalid MIDI channel {} (must be -1 for all channels or 0-15)",
                self.midi.channel
            );
        }

        for (idx, mapping) in self.mappings.iter().enumerate() {
            validate_mapping(mapping)
                .with_context(|| format!("Invalid mapping {} ('{}')", idx, mapping.name))?;
        }

        Ok(())
    }

    /// Ready-to-edit configuration written by `--generate-config`
    pub fn example() -> Self {
        Self {
            midi: MidiConfig::default(),
            general: GeneralConfig::default(),
            mappings: vec![
                Mapping::new(
                    "Volume up",
                    EventFilter::control_change(7, 64),
                    Action::new("volume")
                        .with_param("direction", "up")
                        .with_param("percent", 5),
                ),
                Mapping::new(
                    "Volume down",
                    EventFilter::control_change(8, 64),
                    Action::new("volume")
                        .with_param("direction", "down")
                        .with_param("percent", 5),
                ),
                Mapping::new(
                    "Mute",
                    EventFilter::note_on(60, 0),
                    Action::new("volume").with_param("direction", "mute"),
                ),
                Mapping::new(
                    "Open terminal",
                    EventFilter::note_on(61, 0),
                    Action::new("app_start").with_param("path", "terminal"),
                ),
                Mapping::new(
                    "Copy",
                    EventFilter::note_on(62, 0),
                    Action::new("key_combination").with_param("keys", vec!["CTRL", "C"]),
                ),
                Mapping::new(
                    "Next audio output",
                    EventFilter::program_change(1),
                    Action::new("audio_source").with_param("type", "cycle"),
                )
                .disabled(),
            ],
        }
    }
}

fn validate_mapping(mapping: &Mapping) -> Result<()> {
    let event = &mapping.event;
    let check = |field: &str, value: u8| -> Result<()> {
        if value > 127 {
            bail!("Event {} {} out of range (must be 0-127)", field, value);
        }
        Ok(())
    };

    match event.kind {
        EventKind::NoteOn | EventKind::NoteOff => {
            check("note", event.note)?;
            check("velocity", event.velocity)?;
        }
        EventKind::ControlChange => {
            check("controller", event.controller)?;
            check("value", event.value)?;
        }
        EventKind::ProgramChange => check("program", event.program)?,
        EventKind::Unknown => bail!("Unknown event type"),
    }

    let action = &mapping.action;
    if action.action_type.trim().is_empty() {
        bail!("Action type cannot be empty");
    }

    // Built-in executors validate the full parameter shape; the loader only
    // insists on the one parameter each of them cannot do without.
    let required = match action.action_type.as_str() {
        "app_start" => Some("path"),
        "key_combination" => Some("keys"),
        "audio_source" => match action.parameters.get("type").and_then(Value::as_str) {
            Some("cycle") => None,
            _ => Some("source"),
        },
        _ => None,
    };
    if let Some(param) = required {
        if !action.parameters.contains_key(param) {
            bail!("{} action requires '{}' parameter", action.action_type, param);
        }
    }

    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let port = Option::<String>::deserialize(deserializer)?;
    Ok(port.filter(|port| !port.trim().is_empty()))
}

// Default value functions
fn default_channel() -> i8 { ALL_CHANNELS }
fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_action_delay_ms() -> u64 { 100 }
fn is_zero(value: &u8) -> bool { *value == 0 }

//! `audio_source` action: switch, mute and level audio outputs

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::params::{Keyword, ParamError, ParamReader};
use super::{Executor, Outcome};
use crate::config::{Action, Params};
use crate::platform::{AudioController, AudioSource};

pub const ACTION_TYPE: &str = "audio_source";

pub const DEFAULT_SOURCE_VOLUME: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    Switch,
    Mute,
    Unmute,
    Volume,
    /// Move the default to the next available output
    Cycle,
}

impl Keyword for AudioMode {
    const ALLOWED: &'static [&'static str] = &["switch", "mute", "unmute", "volume", "cycle"];

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "switch" => Some(AudioMode::Switch),
            "mute" => Some(AudioMode::Mute),
            "unmute" => Some(AudioMode::Unmute),
            "volume" => Some(AudioMode::Volume),
            "cycle" => Some(AudioMode::Cycle),
            _ => None,
        }
    }
}

/// Decoded `audio_source` parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCommand {
    pub mode: AudioMode,
    /// Target output; `None` only for cycle
    pub source: Option<String>,
    pub volume: u8,
}

impl AudioCommand {
    pub fn decode(params: &Params) -> Result<Self, ParamError> {
        let p = ParamReader::new(params);
        let mode = p.keyword::<AudioMode>("type")?.unwrap_or(AudioMode::Switch);

        let source = match mode {
            AudioMode::Cycle => None,
            _ => Some(p.required_str("source")?.to_string()),
        };

        Ok(Self {
            mode,
            source,
            volume: p.percent("volume", 0)?.unwrap_or(DEFAULT_SOURCE_VOLUME),
        })
    }
}

/// Output following `current_id`, wrapping around. Falls back to the first
/// output when the current one is not listed.
pub fn next_source<'a>(sources: &'a [AudioSource], current_id: &str) -> Option<&'a AudioSource> {
    let next = sources
        .iter()
        .position(|s| s.id == current_id)
        .map(|idx| (idx + 1) % sources.len())
        .unwrap_or(0);
    sources.get(next)
}

/// Executes `audio_source` actions
pub struct AudioSourceExecutor {
    controller: Arc<dyn AudioController>,
}

impl AudioSourceExecutor {
    pub fn new(controller: Arc<dyn AudioController>) -> Self {
        Self { controller }
    }

    async fn cycle(&self) -> Result<String> {
        let sources = self.controller.sources().await?;
        if sources.is_empty() {
            bail!("No audio sources available");
        }

        let current = self.controller.default_source().await?;
        let Some(next) = next_source(&sources, &current.id) else {
            bail!("No audio sources available");
        };
        self.controller.set_default_source(&next.id).await?;
        Ok(next.name.clone())
    }
}

#[async_trait]
impl Executor for AudioSourceExecutor {
    fn name(&self) -> &str {
        ACTION_TYPE
    }

    async fn execute(&self, action: &Action) -> Result<Outcome> {
        let command = AudioCommand::decode(&action.parameters)?;
        let source = command.source.as_deref().unwrap_or_default();

        match command.mode {
            AudioMode::Switch => {
                self.controller.set_default_source(source).await?;
                info!("🎧 Switched output to {}", source);
            }
            AudioMode::Mute => {
                self.controller.mute_source(source).await?;
                info!("🔇 Muted {}", source);
            }
            AudioMode::Unmute => {
                self.controller.unmute_source(source).await?;
                info!("🔈 Unmuted {}", source);
            }
            AudioMode::Volume => {
                self.controller.set_source_volume(source, command.volume).await?;
                info!("🎚️  {} volume set to {}%", source, command.volume);
            }
            AudioMode::Cycle => {
                let name = self.cycle().await?;
                info!("🎧 Cycled output to {}", name);
            }
        }

        Ok(Outcome::Completed)
    }

    /// Also checks that a named output exists, when outputs can be listed
    async fn validate(&self, action: &Action) -> Result<(), ParamError> {
        let command = AudioCommand::decode(&action.parameters)?;
        let Some(source) = command.source else {
            return Ok(());
        };

        match self.controller.sources().await {
            Ok(sources) if !sources.iter().any(|s| s.is_named(&source)) => Err(ParamError::Invalid {
                name: "source",
                reason: format!("audio source '{}' not found", source),
            }),
            Ok(_) => Ok(()),
            Err(e) => {
                debug!("Skipping audio source check, outputs unavailable: {:#}", e);
                Ok(())
            }
        }
    }
}

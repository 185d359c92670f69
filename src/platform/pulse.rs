//! PulseAudio / PipeWire control through `pactl`

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use super::{AudioController, AudioSource, VolumeController};

const DEFAULT_SINK: &str = "@DEFAULT_SINK@";

/// Volume and output device control via the `pactl` CLI
pub struct PulseAudio {
    pactl: PathBuf,
}

impl PulseAudio {
    pub fn new(pactl: impl Into<PathBuf>) -> Self {
        Self { pactl: pactl.into() }
    }

    async fn pactl(&self, args: &[&str]) -> Result<String> {
        debug!(args = ?args, "pactl");
        let output = Command::new(&self.pactl)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.pactl.display()))?;

        if !output.status.success() {
            bail!(
                "pactl {} failed ({}): {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn default_sink_name(&self) -> Result<String> {
        Ok(self.pactl(&["get-default-sink"]).await?.trim().to_string())
    }

    /// Resolve a display name to the sink name pactl expects
    async fn resolve(&self, source: &str) -> Result<String> {
        let sources = self.sources().await?;
        Ok(sources
            .into_iter()
            .find(|s| s.is_named(source))
            .map(|s| s.id)
            .unwrap_or_else(|| source.to_string()))
    }
}

/// First percentage in `pactl get-sink-volume` output
fn parse_volume_percent(output: &str) -> Option<u8> {
    output
        .split_whitespace()
        .find_map(|token| token.strip_suffix('%'))
        .and_then(|n| n.parse::<u16>().ok())
        .map(|n| n.min(100) as u8)
}

/// Sinks from `pactl list short sinks`: `index  name  driver  spec  state`
fn parse_short_sinks(output: &str, default_sink: &str) -> Vec<AudioSource> {
    output
        .lines()
        .filter_map(|line| {
            let name = line.split('\t').nth(1)?.trim();
            if name.is_empty() {
                return None;
            }
            let mut source = AudioSource::new(name, name);
            source.is_default = name == default_sink;
            Some(source)
        })
        .collect()
}

#[async_trait]
impl VolumeController for PulseAudio {
    async fn volume(&self) -> Result<u8> {
        let output = self.pactl(&["get-sink-volume", DEFAULT_SINK]).await?;
        match parse_volume_percent(&output) {
            Some(volume) => Ok(volume),
            None => bail!("Could not read volume from pactl output: {}", output.trim()),
        }
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        let level = format!("{}%", volume.min(100));
        self.pactl(&["set-sink-volume", DEFAULT_SINK, &level]).await?;
        Ok(())
    }
}

#[async_trait]
impl AudioController for PulseAudio {
    async fn sources(&self) -> Result<Vec<AudioSource>> {
        let default_sink = self.default_sink_name().await?;
        let output = self.pactl(&["list", "short", "sinks"]).await?;
        Ok(parse_short_sinks(&output, &default_sink))
    }

    async fn default_source(&self) -> Result<AudioSource> {
        let default_sink = self.default_sink_name().await?;
        let mut source = AudioSource::new(default_sink.clone(), default_sink);
        source.is_default = true;
        Ok(source)
    }

    async fn set_default_source(&self, source: &str) -> Result<()> {
        let sink = self.resolve(source).await?;
        self.pactl(&["set-default-sink", &sink]).await?;
        Ok(())
    }

    async fn mute_source(&self, source: &str) -> Result<()> {
        let sink = self.resolve(source).await?;
        self.pactl(&["set-sink-mute", &sink, "1"]).await?;
        Ok(())
    }

    async fn unmute_source(&self, source: &str) -> Result<()> {
        let sink = self.resolve(source).await?;
        self.pactl(&["set-sink-mute", &sink, "0"]).await?;
        Ok(())
    }

    async fn set_source_volume(&self, source: &str, volume: u8) -> Result<()> {
        let sink = self.resolve(source).await?;
        let level = format!("{}%", volume.min(100));
        self.pactl(&["set-sink-volume", &sink, &level]).await?;
        Ok(())
    }
}

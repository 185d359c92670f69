//! Console platform - logs every capability call against an in-memory model
//!
//! Used for `--dry-run`, as the fallback when no system tool is available,
//! and by tests which inspect [`ConsolePlatform::calls`].

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::info;

use super::{
    AudioController, AudioSource, KeyboardController, LaunchRequest, ProcessLauncher, VolumeController,
};

const INITIAL_VOLUME: u8 = 50;
const FIRST_FAKE_PID: u32 = 10_000;

/// A recorded capability call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCall {
    SetVolume(u8),
    SendKey(String),
    SendCombination(Vec<String>),
    SendText(String),
    HoldKey(String, Duration),
    SetDefaultSource(String),
    MuteSource(String),
    UnmuteSource(String),
    SetSourceVolume(String, u8),
    Launch { program: String, args: Vec<String> },
}

struct ConsoleState {
    volume: u8,
    sources: Vec<AudioSource>,
    calls: Vec<ConsoleCall>,
}

/// Logging implementation of every platform capability
pub struct ConsolePlatform {
    state: Mutex<ConsoleState>,
    next_pid: AtomicU32,
}

impl Default for ConsolePlatform {
    fn default() -> Self {
        Self::new()
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

impl ConsolePlatform {
    /// Volume 50%, one default output named "default"
    pub fn new() -> Self {
        let mut speakers = AudioSource::new("default", "Default Output");
        speakers.is_default = true;
        Self::with_sources(vec![speakers])
    }

    /// Model the given outputs. The first one flagged default (or the first
    /// one at all) becomes the default output.
    pub fn with_sources(mut sources: Vec<AudioSource>) -> Self {
        if !sources.iter().any(|s| s.is_default) {
            if let Some(first) = sources.first_mut() {
                first.is_default = true;
            }
        }

        Self {
            state: Mutex::new(ConsoleState {
                volume: INITIAL_VOLUME,
                sources,
                calls: Vec::new(),
            }),
            next_pid: AtomicU32::new(FIRST_FAKE_PID),
        }
    }

    /// Every effectful call so far, in order
    pub fn calls(&self) -> Vec<ConsoleCall> {
        self.state.lock().calls.clone()
    }

    fn record(&self, call: ConsoleCall) {
        self.state.lock().calls.push(call);
    }

    fn with_source<T>(&self, query: &str, f: impl FnOnce(&mut AudioSource) -> T) -> Result<T> {
        let mut state = self.state.lock();
        state
            .sources
            .iter_mut()
            .find(|s| s.is_named(query))
            .map(f)
            .ok_or_else(|| anyhow!("Audio source '{}' not found", query))
    }
}

#[async_trait]
impl VolumeController for ConsolePlatform {
    async fn volume(&self) -> Result<u8> {
        Ok(self.state.lock().volume)
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        let volume = volume.min(100);
        {
            let mut state = self.state.lock();
            state.volume = volume;
            state.calls.push(ConsoleCall::SetVolume(volume));
        }
        info!("🔊 [{}] volume → {}%", timestamp(), volume);
        Ok(())
    }
}

#[async_trait]
impl KeyboardController for ConsolePlatform {
    async fn send_key(&self, key: &str) -> Result<()> {
        self.record(ConsoleCall::SendKey(key.to_string()));
        info!("⌨️  [{}] key {}", timestamp(), key);
        Ok(())
    }

    async fn send_combination(&self, keys: &[String]) -> Result<()> {
        self.record(ConsoleCall::SendCombination(keys.to_vec()));
        info!("⌨️  [{}] combination {}", timestamp(), keys.join("+"));
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.record(ConsoleCall::SendText(text.to_string()));
        info!("⌨️  [{}] text {:?}", timestamp(), text);
        Ok(())
    }

    async fn hold_key(&self, key: &str, duration: Duration) -> Result<()> {
        self.record(ConsoleCall::HoldKey(key.to_string(), duration));
        info!("⌨️  [{}] hold {} for {:?}", timestamp(), key, duration);
        Ok(())
    }
}

#[async_trait]
impl AudioController for ConsolePlatform {
    async fn sources(&self) -> Result<Vec<AudioSource>> {
        Ok(self.state.lock().sources.clone())
    }

    async fn default_source(&self) -> Result<AudioSource> {
        self.state
            .lock()
            .sources
            .iter()
            .find(|s| s.is_default)
            .cloned()
            .ok_or_else(|| anyhow!("No default audio source"))
    }

    async fn set_default_source(&self, source: &str) -> Result<()> {
        {
            let mut state = self.state.lock();
            if !state.sources.iter().any(|s| s.is_named(source)) {
                return Err(anyhow!("Audio source '{}' not found", source));
            }
            for s in state.sources.iter_mut() {
                s.is_default = s.is_named(source);
            }
            state.calls.push(ConsoleCall::SetDefaultSource(source.to_string()));
        }
        info!("🎧 [{}] default output → {}", timestamp(), source);
        Ok(())
    }

    async fn mute_source(&self, source: &str) -> Result<()> {
        self.with_source(source, |s| s.is_muted = true)?;
        self.record(ConsoleCall::MuteSource(source.to_string()));
        info!("🔇 [{}] mute {}", timestamp(), source);
        Ok(())
    }

    async fn unmute_source(&self, source: &str) -> Result<()> {
        self.with_source(source, |s| s.is_muted = false)?;
        self.record(ConsoleCall::UnmuteSource(source.to_string()));
        info!("🔈 [{}] unmute {}", timestamp(), source);
        Ok(())
    }

    async fn set_source_volume(&self, source: &str, volume: u8) -> Result<()> {
        let volume = volume.min(100);
        self.with_source(source, |s| s.volume = volume)?;
        self.record(ConsoleCall::SetSourceVolume(source.to_string(), volume));
        info!("🎚️  [{}] {} volume → {}%", timestamp(), source, volume);
        Ok(())
    }
}

#[async_trait]
impl ProcessLauncher for ConsolePlatform {
    async fn launch(&self, request: &LaunchRequest) -> Result<u32> {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.record(ConsoleCall::Launch {
            program: request.program.clone(),
            args: request.args.clone(),
        });
        info!(
            "🚀 [{}] launch {} {} (pid {})",
            timestamp(),
            request.program,
            request.args.join(" "),
            pid
        );
        Ok(pid)
    }
}

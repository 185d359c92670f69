//! OS capabilities used by the built-in executors
//!
//! Each capability is a trait so executors stay platform-neutral. A
//! [`Platform`] bundles one implementation of each:
//! - [`ConsolePlatform`] logs every call and keeps an in-memory model (dry runs, tests)
//! - [`PulseAudio`] drives volume and output devices through `pactl`
//! - [`Xdotool`] synthesises keystrokes through `xdotool`
//! - [`SystemLauncher`] spawns detached child processes

pub mod console;
pub mod launcher;
pub mod pulse;
pub mod xdotool;

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use console::{ConsoleCall, ConsolePlatform};
pub use launcher::SystemLauncher;
pub use pulse::PulseAudio;
pub use xdotool::Xdotool;

/// Master output volume
///
/// Volumes are percentages 0-100.
#[async_trait]
pub trait VolumeController: Send + Sync {
    async fn volume(&self) -> Result<u8>;

    async fn set_volume(&self, volume: u8) -> Result<()>;

    /// Raise by `percent`, clamped to 100. Returns the new volume.
    async fn increase(&self, percent: u8) -> Result<u8> {
        let current = self.volume().await?;
        let target = current.saturating_add(percent).min(100);
        self.set_volume(target).await?;
        Ok(target)
    }

    /// Lower by `percent`, clamped to 0. Returns the new volume.
    async fn decrease(&self, percent: u8) -> Result<u8> {
        let current = self.volume().await?;
        let target = current.saturating_sub(percent);
        self.set_volume(target).await?;
        Ok(target)
    }
}

/// Keystroke synthesis. Key names are upper-case (`CTRL`, `F5`) or single characters.
#[async_trait]
pub trait KeyboardController: Send + Sync {
    /// Press and release one key
    async fn send_key(&self, key: &str) -> Result<()>;

    /// Press all keys together, release in reverse order
    async fn send_combination(&self, keys: &[String]) -> Result<()>;

    /// Type literal text
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Hold a key down for `duration`
    async fn hold_key(&self, key: &str, duration: Duration) -> Result<()>;
}

/// An audio output device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSource {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub is_muted: bool,
    pub volume: u8,
}

impl AudioSource {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_default: false,
            is_muted: false,
            volume: 100,
        }
    }

    /// Whether `query` names this source, by id or display name
    pub fn is_named(&self, query: &str) -> bool {
        self.id == query || self.name == query
    }
}

/// Audio output device management
#[async_trait]
pub trait AudioController: Send + Sync {
    async fn sources(&self) -> Result<Vec<AudioSource>>;

    async fn default_source(&self) -> Result<AudioSource>;

    async fn set_default_source(&self, source: &str) -> Result<()>;

    async fn mute_source(&self, source: &str) -> Result<()>;

    async fn unmute_source(&self, source: &str) -> Result<()>;

    async fn set_source_volume(&self, source: &str, volume: u8) -> Result<()>;
}

/// What to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

/// Detached process launching
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn the process without waiting for it. Returns its process id.
    async fn launch(&self, request: &LaunchRequest) -> Result<u32>;
}

/// One implementation of every capability
#[derive(Clone)]
pub struct Platform {
    pub volume: Arc<dyn VolumeController>,
    pub keyboard: Arc<dyn KeyboardController>,
    pub audio: Arc<dyn AudioController>,
    pub launcher: Arc<dyn ProcessLauncher>,
}

impl Platform {
    /// Every capability backed by the same console model
    pub fn console(console: Arc<ConsolePlatform>) -> Self {
        Self {
            volume: console.clone(),
            keyboard: console.clone(),
            audio: console.clone(),
            launcher: console,
        }
    }

    /// Pick implementations for this machine.
    ///
    /// `dry_run` forces the console model for everything. Otherwise each
    /// capability uses its system tool when it is installed and falls back
    /// to the console model with a warning.
    pub fn detect(dry_run: bool) -> Self {
        let console = Arc::new(ConsolePlatform::new());
        if dry_run {
            info!("🧪 Dry run: actions are logged, not performed");
            return Self::console(console);
        }

        let mut platform = Self::console(console);
        platform.launcher = Arc::new(SystemLauncher::new());

        if cfg!(target_os = "linux") {
            match which::which("pactl") {
                Ok(path) => {
                    info!("🔊 Using PulseAudio control via {}", path.display());
                    let pulse = Arc::new(PulseAudio::new(path));
                    platform.volume = pulse.clone();
                    platform.audio = pulse;
                }
                Err(_) => warn!("⚠️  pactl not found, volume and audio actions will only be logged"),
            }

            match which::which("xdotool") {
                Ok(path) => {
                    info!("⌨️  Using keystroke synthesis via {}", path.display());
                    platform.keyboard = Arc::new(Xdotool::new(path));
                }
                Err(_) => warn!("⚠️  xdotool not found, key actions will only be logged"),
            }
        } else {
            warn!(
                "⚠️  No native volume/keyboard/audio control on {}, those actions will only be logged",
                std::env::consts::OS
            );
        }

        platform
    }
}

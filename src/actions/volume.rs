//! `volume` action: adjust the master output volume

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::params::{Keyword, ParamError, ParamReader};
use super::{Executor, Outcome};
use crate::config::{Action, Params};
use crate::platform::VolumeController;

pub const ACTION_TYPE: &str = "volume";

/// Step used by up/down when `percent` is absent
pub const DEFAULT_STEP: u8 = 5;

/// Level restored by `unmute`
pub const UNMUTE_LEVEL: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
    Set,
    Mute,
    Unmute,
}

impl Keyword for Direction {
    const ALLOWED: &'static [&'static str] = &["up", "increase", "down", "decrease", "set", "mute", "unmute"];

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "up" | "increase" => Some(Direction::Up),
            "down" | "decrease" => Some(Direction::Down),
            "set" => Some(Direction::Set),
            "mute" => Some(Direction::Mute),
            "unmute" => Some(Direction::Unmute),
            _ => None,
        }
    }
}

/// Decoded `volume` parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeCommand {
    Up(u8),
    Down(u8),
    Set(u8),
    Mute,
    Unmute,
}

impl VolumeCommand {
    pub fn decode(params: &Params) -> Result<Self, ParamError> {
        let p = ParamReader::new(params);
        let direction = p.keyword::<Direction>("direction")?.unwrap_or(Direction::Up);
        let step = p.percent("percent", 1)?.unwrap_or(DEFAULT_STEP);

        Ok(match direction {
            Direction::Up => VolumeCommand::Up(step),
            Direction::Down => VolumeCommand::Down(step),
            Direction::Set => VolumeCommand::Set(p.percent("volume", 0)?.ok_or(ParamError::Missing("volume"))?),
            Direction::Mute => VolumeCommand::Mute,
            Direction::Unmute => VolumeCommand::Unmute,
        })
    }
}

/// Executes `volume` actions
///
/// Read-modify-write steps are serialised so concurrent up/down events do
/// not lose updates.
pub struct VolumeExecutor {
    controller: Arc<dyn VolumeController>,
    adjust: Mutex<()>,
}

impl VolumeExecutor {
    pub fn new(controller: Arc<dyn VolumeController>) -> Self {
        Self {
            controller,
            adjust: Mutex::new(()),
        }
    }

    pub async fn current_volume(&self) -> Result<u8> {
        self.controller.volume().await
    }
}

#[async_trait]
impl Executor for VolumeExecutor {
    fn name(&self) -> &str {
        ACTION_TYPE
    }

    async fn execute(&self, action: &Action) -> Result<Outcome> {
        let command = VolumeCommand::decode(&action.parameters)?;
        let _guard = self.adjust.lock().await;

        match command {
            VolumeCommand::Up(step) => {
                let volume = self.controller.increase(step).await?;
                info!("🔊 Volume +{}% → {}%", step, volume);
            }
            VolumeCommand::Down(step) => {
                let volume = self.controller.decrease(step).await?;
                info!("🔉 Volume -{}% → {}%", step, volume);
            }
            VolumeCommand::Set(volume) => {
                self.controller.set_volume(volume).await?;
                info!("🔊 Volume set to {}%", volume);
            }
            VolumeCommand::Mute => {
                self.controller.set_volume(0).await?;
                info!("🔇 Volume muted");
            }
            VolumeCommand::Unmute => {
                self.controller.set_volume(UNMUTE_LEVEL).await?;
                info!("🔈 Volume unmuted ({}%)", UNMUTE_LEVEL);
            }
        }

        Ok(Outcome::Completed)
    }

    async fn validate(&self, action: &Action) -> Result<(), ParamError> {
        VolumeCommand::decode(&action.parameters).map(|_| ())
    }
}

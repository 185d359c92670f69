//! `key_combination` action: synthesise keystrokes

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::params::{Keyword, ParamError, ParamReader};
use super::{Executor, Outcome};
use crate::config::{Action, Params};
use crate::platform::KeyboardController;

pub const ACTION_TYPE: &str = "key_combination";

pub const DEFAULT_SEQUENCE_DELAY: Duration = Duration::from_millis(50);
pub const DEFAULT_HOLD_DURATION: Duration = Duration::from_secs(1);

/// Multi-character key names. Single characters are always accepted.
pub const NAMED_KEYS: &[&str] = &[
    "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
    "CTRL", "ALT", "SHIFT", "WIN", "SUPER",
    "UP", "DOWN", "LEFT", "RIGHT", "HOME", "END", "PAGEUP", "PAGEDOWN",
    "ENTER", "ESC", "TAB", "SPACE", "BACKSPACE", "DELETE", "INSERT",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// All keys together
    Combination,
    /// One key after another
    Sequence,
    /// A single key held down
    Hold,
    /// Keys typed as literal text
    Text,
}

impl Keyword for KeyMode {
    const ALLOWED: &'static [&'static str] = &["combination", "sequence", "hold", "text"];

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "combination" => Some(KeyMode::Combination),
            "sequence" => Some(KeyMode::Sequence),
            "hold" => Some(KeyMode::Hold),
            "text" => Some(KeyMode::Text),
            _ => None,
        }
    }
}

/// Decoded `key_combination` parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCommand {
    pub keys: Vec<String>,
    pub mode: KeyMode,
    /// Pause between keys of a sequence
    pub delay: Duration,
    /// How long a hold lasts
    pub duration: Duration,
}

pub fn is_valid_key(key: &str) -> bool {
    key.chars().count() == 1 || NAMED_KEYS.iter().any(|named| named.eq_ignore_ascii_case(key))
}

impl KeyCommand {
    pub fn decode(params: &Params) -> Result<Self, ParamError> {
        let p = ParamReader::new(params);

        let keys = p.string_list("keys")?.ok_or(ParamError::Missing("keys"))?;
        if keys.is_empty() {
            return Err(ParamError::Empty("keys"));
        }

        let mode = p.keyword::<KeyMode>("type")?.unwrap_or(KeyMode::Combination);
        if mode != KeyMode::Text {
            if let Some(bad) = keys.iter().find(|k| !is_valid_key(k)) {
                return Err(ParamError::Invalid {
                    name: "keys",
                    reason: format!("unknown key '{}'", bad),
                });
            }
        }
        if mode == KeyMode::Hold && keys.len() != 1 {
            return Err(ParamError::Invalid {
                name: "keys",
                reason: format!("hold takes exactly one key, got {}", keys.len()),
            });
        }

        Ok(Self {
            keys,
            mode,
            delay: p.duration("delay")?.unwrap_or(DEFAULT_SEQUENCE_DELAY),
            duration: p.duration("duration")?.unwrap_or(DEFAULT_HOLD_DURATION),
        })
    }
}

/// Executes `key_combination` actions
pub struct KeyCombinationExecutor {
    keyboard: Arc<dyn KeyboardController>,
}

impl KeyCombinationExecutor {
    pub fn new(keyboard: Arc<dyn KeyboardController>) -> Self {
        Self { keyboard }
    }
}

#[async_trait]
impl Executor for KeyCombinationExecutor {
    fn name(&self) -> &str {
        ACTION_TYPE
    }

    async fn execute(&self, action: &Action) -> Result<Outcome> {
        let command = KeyCommand::decode(&action.parameters)?;

        match command.mode {
            KeyMode::Combination => {
                self.keyboard.send_combination(&command.keys).await?;
                info!("⌨️  Sent {}", command.keys.join("+"));
            }
            KeyMode::Sequence => {
                for (i, key) in command.keys.iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(command.delay).await;
                    }
                    self.keyboard.send_key(key).await?;
                }
                info!("⌨️  Sent sequence {}", command.keys.join(", "));
            }
            KeyMode::Hold => {
                let key = &command.keys[0];
                self.keyboard.hold_key(key, command.duration).await?;
                info!("⌨️  Held {} for {:?}", key, command.duration);
            }
            KeyMode::Text => {
                let text = command.keys.concat();
                self.keyboard.send_text(&text).await?;
                info!("⌨️  Typed {} characters", text.chars().count());
            }
        }

        Ok(Outcome::Completed)
    }

    async fn validate(&self, action: &Action) -> Result<(), ParamError> {
        KeyCommand::decode(&action.parameters).map(|_| ())
    }
}

//! Keystroke synthesis through `xdotool` (X11)

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::KeyboardController;

pub struct Xdotool {
    xdotool: PathBuf,
}

/// Map a key name to its X keysym
fn keysym(key: &str) -> String {
    let named = match key.to_ascii_uppercase().as_str() {
        "CTRL" => "ctrl",
        "ALT" => "alt",
        "SHIFT" => "shift",
        "WIN" | "SUPER" => "super",
        "ENTER" => "Return",
        "ESC" => "Escape",
        "TAB" => "Tab",
        "SPACE" => "space",
        "BACKSPACE" => "BackSpace",
        "DELETE" => "Delete",
        "INSERT" => "Insert",
        "HOME" => "Home",
        "END" => "End",
        "PAGEUP" => "Page_Up",
        "PAGEDOWN" => "Page_Down",
        "UP" => "Up",
        "DOWN" => "Down",
        "LEFT" => "Left",
        "RIGHT" => "Right",
        _ => "",
    };

    if !named.is_empty() {
        return named.to_string();
    }
    let upper = key.to_ascii_uppercase();
    if upper.starts_with('F') && upper[1..].parse::<u8>().is_ok() {
        return upper;
    }
    key.to_lowercase()
}

impl Xdotool {
    pub fn new(xdotool: impl Into<PathBuf>) -> Self {
        Self { xdotool: xdotool.into() }
    }

    async fn run(&self, args: &[&str]) -> Result<()> {
        debug!(args = ?args, "xdotool");
        let output = Command::new(&self.xdotool)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.xdotool.display()))?;

        if !output.status.success() {
            bail!(
                "xdotool {} failed ({}): {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl KeyboardController for Xdotool {
    async fn send_key(&self, key: &str) -> Result<()> {
        self.run(&["key", &keysym(key)]).await
    }

    async fn send_combination(&self, keys: &[String]) -> Result<()> {
        let chord = keys.iter().map(|k| keysym(k)).collect::<Vec<_>>().join("+");
        self.run(&["key", &chord]).await
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.run(&["type", "--delay", "0", "--", text]).await
    }

    async fn hold_key(&self, key: &str, duration: Duration) -> Result<()> {
        let sym = keysym(key);
        self.run(&["keydown", &sym]).await?;
        tokio::time::sleep(duration).await;
        self.run(&["keyup", &sym]).await
    }
}

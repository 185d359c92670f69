//! Detached process launching via tokio::process

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{LaunchRequest, ProcessLauncher};

/// Spawns real processes. Children are reaped in the background.
#[derive(Debug, Default)]
pub struct SystemLauncher;

impl SystemLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessLauncher for SystemLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<u32> {
        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = &request.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to start '{}'", request.program))?;
        let pid = child
            .id()
            .ok_or_else(|| anyhow!("'{}' exited before its pid was read", request.program))?;

        let program = request.program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!(pid, program = %program, %status, "Launched process exited"),
                Err(e) => warn!(pid, program = %program, "Failed to wait for launched process: {}", e),
            }
        });

        Ok(pid)
    }
}

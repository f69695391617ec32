//! External process execution

use crate::domain::ports::{ProcessOutput, ProcessRunner};
use crate::error::Result;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::trace;

/// Runs commands on the host with tokio's process support
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<ProcessOutput> {
        trace!(program, ?args, "Spawning process");

        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

use anyhow::{bail, Context};
use std::process::{Command, Output};

pub trait CommandExt {
    /// Runs command to completion, failing unless it exits successfully.
    /// On failure, captured output is logged.
    fn try_exec_with_output(&mut self) -> anyhow::Result<Output>;
}

impl CommandExt for Command {
    fn try_exec_with_output(&mut self) -> anyhow::Result<Output> {
        let output = self
            .output()
            .with_context(|| format!("failed to start {:?}", self))?;
        if output.status.success() {
            Ok(output)
        } else {
            log::error!("stdout: {}", String::from_utf8_lossy(&output.stdout));
            log::error!("stderr: {}", String::from_utf8_lossy(&output.stderr));
            bail!("child command {:?} failed: {}", self, output.status)
        }
    }
}

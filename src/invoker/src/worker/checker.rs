//! Checker dispatch
use crate::{
    config::InvokerConfig,
    interpolate::{interpolate_command, interpolate_string, InterpolateError},
    pipes::{run_with_pipes, Input, Output, PipeRequest},
};
use anyhow::Context;
use invoker_api::checker_proto::{self, SubtaskContext, SubtaskResponse};
use log::debug;
use std::{collections::HashMap, process::Command, time::Duration};
use util::cmd::CommandExt;

/// Checker process, ready to be launched
#[derive(Debug, Clone)]
pub(crate) struct Checker {
    argv: Vec<String>,
}

impl Checker {
    fn from_template(template: &[String], dict: &HashMap<&str, String>) -> Result<Checker, InterpolateError> {
        let argv = template
            .iter()
            .map(|arg| interpolate_string(arg, dict))
            .collect::<Result<Vec<_>, _>>()?;
        if argv.is_empty() {
            return Err(InterpolateError::EmptyCommand);
        }
        Ok(Checker { argv })
    }

    pub(crate) fn builtin(cfg: &InvokerConfig) -> Result<Checker, InterpolateError> {
        Checker::from_template(&cfg.commands.builtin_checker, &HashMap::new())
    }

    pub(crate) fn special(cfg: &InvokerConfig) -> Result<Checker, InterpolateError> {
        let mut dict = HashMap::new();
        dict.insert("CheckerExe", cfg.checker_exe_path.display().to_string());
        Checker::from_template(&cfg.commands.special_checker, &dict)
    }

    /// Sends context to the checker and reads its response.
    /// Any misbehavior of the checker is an error.
    pub(crate) fn check(
        &self,
        cx: &SubtaskContext,
        output_limit: u64,
        timeout: Option<Duration>,
    ) -> anyhow::Result<SubtaskResponse> {
        let request = checker_proto::encode(cx).context("failed to encode checker request")?;
        let mut response = Vec::new();
        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..]);
        debug!("Starting checker: {:?}", cmd);
        let outcome = run_with_pipes(
            &mut cmd,
            PipeRequest {
                stdin: Input::Bytes(&request),
                stdout: Output::capture_limited(&mut response, output_limit),
                stderr: Output::Inherit,
                timeout,
                ..Default::default()
            },
        )
        .context("failed to run checker")?;
        if !outcome.status.success() {
            anyhow::bail!("checker exited abnormally: {}", outcome.status);
        }
        if outcome.stdout.overflow {
            anyhow::bail!("checker response exceeds {} bytes", output_limit);
        }
        checker_proto::decode(&response).context("failed to parse checker response")
    }
}

/// Writes custom comparator source to disk and compiles it.
pub(crate) fn compile_special(cfg: &InvokerConfig, source: &str) -> anyhow::Result<()> {
    std::fs::write(&cfg.checker_source_path, source).with_context(|| {
        format!(
            "failed to write checker source to {}",
            cfg.checker_source_path.display()
        )
    })?;
    let mut dict = HashMap::new();
    dict.insert("Source", cfg.checker_source_path.display().to_string());
    dict.insert("Output", cfg.checker_exe_path.display().to_string());
    let mut cmd = interpolate_command(&cfg.commands.compile_checker, &dict)
        .context("config specifies incorrect checker compile command")?;
    debug!("Compiling checker: {:?}", cmd);
    cmd.try_exec_with_output()?;
    Ok(())
}

use crate::{
    config::InvokerConfig,
    interpolate::interpolate_command,
    judge::{CompileLog, CompileOutcome},
    pipes::{run_with_pipes, Journal, Output, PipeRequest},
};
use anyhow::Context;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::{borrow::Cow, collections::HashMap, io, os::unix::process::CommandExt, time::Instant};

/// Journal tag of compiler diagnostics
pub(crate) const COMPILE_TAG: &str = "COMPILE";

static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    // pattern is constant
    Regex::new(r"(\x9B|\x1B\[)[0-?]*[ -/]*[@-~]").unwrap()
});

pub(crate) fn strip_ansi(text: &str) -> Cow<str> {
    ANSI_ESCAPE.replace_all(text, "")
}

fn limit_address_space(bytes: u64) -> io::Result<()> {
    let lim = libc::rlimit {
        rlim_cur: bytes as libc::rlim_t,
        rlim_max: bytes as libc::rlim_t,
    };
    // SAFETY: `lim` is valid for the duration of the call
    if unsafe { libc::setrlimit(libc::RLIMIT_AS, &lim) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Compiler turns submission source into program
pub(crate) struct Compiler<'a> {
    pub(crate) cfg: &'a InvokerConfig,
    pub(crate) journal: &'a mut Journal,
}

impl<'a> Compiler<'a> {
    pub(crate) fn compile(&mut self) -> anyhow::Result<CompileOutcome> {
        let cfg = self.cfg;
        let mut dict = HashMap::new();
        dict.insert("Source", cfg.source_file_name.clone());
        dict.insert("Output", cfg.program_path.clone());
        dict.insert("Cwd", cfg.sandbox_dir.display().to_string());
        let mut cmd = interpolate_command(&cfg.commands.compile, &dict)
            .context("config specifies incorrect compile command")?;
        cmd.current_dir(&cfg.sandbox_dir);
        let memory_limit = cfg.compile_memory_limit;
        // SAFETY: hook only calls setrlimit, which is async-signal-safe
        unsafe {
            cmd.pre_exec(move || limit_address_space(memory_limit));
        }

        debug!("Starting compiler: {:?}", cmd);
        let started = Instant::now();
        let outcome = self.journal.capture(COMPILE_TAG, |log| {
            let req = PipeRequest {
                stderr: Output::capture_limited(log, cfg.compile_output_limit),
                timeout: cfg.hard_timeout(),
                ..Default::default()
            };
            run_with_pipes(&mut cmd, req).context("failed to run compiler")
        })?;
        debug!(
            "Compiler finished after {:.0?}: {}",
            started.elapsed(),
            outcome.status
        );

        let raw = self
            .journal
            .dump(COMPILE_TAG)
            .context("failed to read compiler diagnostics")?;
        let text = String::from_utf8_lossy(&raw);
        for line in text.lines() {
            debug!("COMPILE >>> {}", line);
        }
        Ok(CompileOutcome {
            success: outcome.status.success(),
            log: CompileLog {
                text: strip_ansi(&text).into_owned(),
                truncated: outcome.stderr.overflow,
            },
        })
    }
}

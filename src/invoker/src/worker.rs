//! Judge driver that talks to the real compiler, sandbox and checkers
mod checker;
mod compiler;

use crate::{
    config::InvokerConfig,
    judge::{CompileOutcome, JudgeDriver},
    pipes::Journal,
};
use anyhow::Context;
use checker::Checker;
use compiler::Compiler;
use exec_test::TestExecutor;
use invoker_api::TaskResult;
use log::debug;
use pom::{TaskDef, TestdataPaths};
use std::fs;

#[derive(Debug)]
pub struct SandboxDriver<'a> {
    cfg: &'a InvokerConfig,
    journal: Journal,
    checker: Checker,
}

impl<'a> SandboxDriver<'a> {
    pub fn new(cfg: &'a InvokerConfig) -> anyhow::Result<SandboxDriver<'a>> {
        fs::create_dir_all(&cfg.sandbox_dir).with_context(|| {
            format!("failed to create sandbox dir {}", cfg.sandbox_dir.display())
        })?;
        let journal = Journal::create(&cfg.compile_log_path).with_context(|| {
            format!(
                "failed to create compile log {}",
                cfg.compile_log_path.display()
            )
        })?;
        let checker =
            Checker::builtin(cfg).context("config specifies incorrect builtin checker command")?;
        Ok(SandboxDriver {
            cfg,
            journal,
            checker,
        })
    }
}

impl JudgeDriver for SandboxDriver<'_> {
    fn write_source(&mut self, source: &str) -> anyhow::Result<()> {
        let path = self.cfg.sandbox_dir.join(&self.cfg.source_file_name);
        fs::write(&path, source).with_context(|| format!("failed to write {}", path.display()))?;
        debug!("Written {} byte(s) to {}", source.len(), path.display());
        Ok(())
    }

    fn compile(&mut self) -> anyhow::Result<CompileOutcome> {
        Compiler {
            cfg: self.cfg,
            journal: &mut self.journal,
        }
        .compile()
    }

    fn compile_checker(&mut self, source: &str) -> anyhow::Result<()> {
        checker::compile_special(self.cfg, source)?;
        self.checker = Checker::special(self.cfg)
            .context("config specifies incorrect special checker command")?;
        Ok(())
    }

    fn run_task(&mut self, task: &TaskDef, paths: &TestdataPaths) -> TaskResult {
        TestExecutor {
            cfg: self.cfg,
            checker: &self.checker,
            task,
            paths,
        }
        .exec()
    }
}

//! Judging state machine.
//!
//! `Judge` is pure: all interaction with compilers, the sandbox and checkers
//! goes through `JudgeDriver`.

#[cfg(test)]
mod tests;

use anyhow::Context;
use invoker_api::{Summary, TaskResult, Verdict};
use log::{debug, info, warn};
use pom::{TaskDef, TaskSpec, TestdataPaths};
use serde::{Deserialize, Serialize};
use svaluer::{GroupOutcome, SimpleValuer};

/// Compiler diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileLog {
    /// ANSI-stripped compiler stderr
    pub text: String,
    /// Compiler said more than was kept
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutcome {
    pub success: bool,
    pub log: CompileLog,
}

pub trait JudgeDriver {
    /// Puts submission source where compiler expects it
    fn write_source(&mut self, source: &str) -> anyhow::Result<()>;
    /// Compiles submission. Errors mean judge fault, not CE.
    fn compile(&mut self) -> anyhow::Result<CompileOutcome>;
    /// Builds custom comparator of the problem
    fn compile_checker(&mut self, source: &str) -> anyhow::Result<()>;
    /// Runs compiled program on one task. Faults are reported as SERR.
    fn run_task(&mut self, task: &TaskDef, paths: &TestdataPaths) -> TaskResult;
}

#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub source: &'a str,
    /// Custom comparator source, if problem has one
    pub checker: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeReport {
    pub summary: Summary,
    pub score: u64,
    /// Samples, then subtasks
    pub results: Vec<TaskResult>,
    pub groups: Vec<GroupOutcome>,
    pub compile_log: Option<CompileLog>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    WriteSource,
    Compile,
    CompileChecker,
    Samples,
    Subtasks,
    Finished,
}

pub struct Judge<'a> {
    driver: &'a mut dyn JudgeDriver,
    spec: &'a TaskSpec,
    testdata: &'a [TestdataPaths],
    submission: Submission<'a>,
    phase: Phase,
    results: Vec<TaskResult>,
    groups: Vec<GroupOutcome>,
    score: u64,
    compile_log: Option<CompileLog>,
}

impl<'a> Judge<'a> {
    /// `testdata` has paths for samples followed by subtasks.
    pub fn new(
        driver: &'a mut dyn JudgeDriver,
        spec: &'a TaskSpec,
        testdata: &'a [TestdataPaths],
        submission: Submission<'a>,
    ) -> anyhow::Result<Judge<'a>> {
        if testdata.len() != spec.task_count() {
            anyhow::bail!(
                "got test data for {} tasks, but problem has {}",
                testdata.len(),
                spec.task_count()
            );
        }
        Ok(Judge {
            driver,
            spec,
            testdata,
            submission,
            phase: Phase::WriteSource,
            results: Vec::with_capacity(testdata.len()),
            groups: Vec::new(),
            score: 0,
            compile_log: None,
        })
    }

    /// Executes one phase and returns next one
    fn step(&mut self) -> anyhow::Result<Phase> {
        debug!("Entering phase {:?}", self.phase);
        match self.phase {
            Phase::WriteSource => {
                info!("Writing code to disk");
                self.driver
                    .write_source(self.submission.source)
                    .context("failed to write source")?;
                Ok(Phase::Compile)
            }
            Phase::Compile => {
                info!("Compiling");
                let outcome = self.driver.compile().context("failed to run compiler")?;
                self.compile_log = Some(outcome.log);
                if !outcome.success {
                    info!("Compilation failed, filling all tasks with CE");
                    let ce = TaskResult::new(Verdict::CompilationError, 0, 0);
                    self.results = vec![ce; self.spec.task_count()];
                    return Ok(Phase::Finished);
                }
                if self.submission.checker.is_some() {
                    Ok(Phase::CompileChecker)
                } else {
                    Ok(Phase::Samples)
                }
            }
            Phase::CompileChecker => {
                info!("Special judge. Compiling checker");
                if let Some(source) = self.submission.checker {
                    self.driver
                        .compile_checker(source)
                        .context("failed to compile checker")?;
                }
                Ok(Phase::Samples)
            }
            Phase::Samples => Ok(self.judge_samples()),
            Phase::Subtasks => {
                self.judge_subtasks()?;
                Ok(Phase::Finished)
            }
            Phase::Finished => Ok(Phase::Finished),
        }
    }

    fn run_task(&mut self, task: &TaskDef, paths: &TestdataPaths) -> TaskResult {
        let res = self.driver.run_task(task, paths);
        info!(
            "Task {}: {} (time {:?} ms, memory {:?})",
            task.label, res.verdict, res.time_ms, res.memory_kib
        );
        self.results.push(res);
        res
    }

    fn judge_samples(&mut self) -> Phase {
        let (spec, testdata) = (self.spec, self.testdata);
        for (i, task) in spec.samples.iter().enumerate() {
            info!(
                "------ Start judge sample {}/{}: {} ------",
                i + 1,
                spec.samples.len(),
                task.label
            );
            let res = self.run_task(task, &testdata[i]);
            if res.verdict == Verdict::SystemError {
                warn!("System error while running samples, halting");
                let skipped = spec.task_count() - self.results.len();
                self.results
                    .extend(std::iter::repeat(TaskResult::unknown(Verdict::Other)).take(skipped));
                return Phase::Finished;
            }
        }
        Phase::Subtasks
    }

    fn judge_subtasks(&mut self) -> anyhow::Result<()> {
        let (spec, testdata) = (self.spec, self.testdata);
        let offset = spec.samples.len();
        let mut valuer = SimpleValuer::new(&spec.task_groups);
        for (i, task) in spec.subtasks.iter().enumerate() {
            if let Some((group, pos, count)) = valuer.position() {
                info!(
                    "------ Start judge subtask ({}, {}/{}): {} ------",
                    group, pos, count, task.label
                );
            }
            let res = self.run_task(task, &testdata[offset + i]);
            valuer
                .add(res.verdict, task.fallthrough)
                .context("subtasks do not match groups")?;
        }
        let valuation = valuer.finish().context("subtasks do not match groups")?;
        self.score = valuation.score;
        self.groups = valuation.groups;
        Ok(())
    }

    /// Runs to judging completion
    pub fn exec(mut self) -> anyhow::Result<JudgeReport> {
        while self.phase != Phase::Finished {
            self.phase = self.step()?;
        }
        let summary = Summary::of(&self.results);
        info!(
            "Judging finished: {}, score {}/{}",
            summary.verdict,
            self.score,
            self.spec.max_score()
        );
        Ok(JudgeReport {
            summary,
            score: self.score,
            results: self.results,
            groups: self.groups,
            compile_log: self.compile_log,
        })
    }
}

//! Judging core: compiles a submission, runs it on every task of the problem
//! and values the results.
pub mod config;
pub mod interpolate;
pub mod judge;
pub mod pipes;
pub mod stat_log;
pub mod worker;

pub use config::InvokerConfig;

use anyhow::Context;
use invoker_api::Verdict;
use judge::{Judge, JudgeDriver, JudgeReport, Submission};
use log::{error, info};
use pom::{TaskSpec, Testdata};
use serde::{Deserialize, Serialize};
use std::{
    convert::TryFrom,
    path::{Path, PathBuf},
};

/// Descriptor table, either as text or as rows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableSource {
    Text(String),
    Rows(Vec<Vec<i64>>),
}

impl TableSource {
    pub fn rows(&self) -> Result<Vec<Vec<i64>>, pom::table::TableError> {
        match self {
            TableSource::Text(text) => pom::table::parse(text),
            TableSource::Rows(rows) => Ok(rows.clone()),
        }
    }
}

/// Submission to judge, as read from a task file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvokeTask {
    pub problem_id: String,
    pub testdata: TableSource,
    /// Path to submission source
    pub source: PathBuf,
    /// Path to custom comparator source
    #[serde(default)]
    pub checker: Option<PathBuf>,
}

#[derive(Debug)]
pub enum InvokeOutcome {
    Judged(JudgeReport),
    /// Submission could not be judged at all
    Fault { message: String },
}

/// Fields of the stored submission that judging updates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub status: Verdict,
    /// `-1` if submission was not judged
    pub score: i64,
    /// Total time, `-1` if unknown
    pub time: i64,
    /// Peak memory
    pub memory: u64,
    /// `[verdict, time, memory]` per task
    pub result: Vec<[i64; 3]>,
    /// Source length in bytes
    pub len: usize,
    pub error: Option<String>,
    /// Compiler said more than `error` holds
    pub truncated: bool,
}

impl InvokeOutcome {
    pub fn score(&self) -> i64 {
        match self {
            InvokeOutcome::Judged(report) => i64::try_from(report.score).unwrap_or(i64::MAX),
            InvokeOutcome::Fault { .. } => -1,
        }
    }

    pub fn update_record(&self, source_len: usize) -> UpdateRecord {
        match self {
            InvokeOutcome::Judged(report) => UpdateRecord {
                status: report.summary.verdict,
                score: self.score(),
                time: report.summary.time_ms.map_or(-1, |t| t as i64),
                memory: report.summary.memory_kib,
                result: report.results.iter().map(|r| r.to_row()).collect(),
                len: source_len,
                error: report.compile_log.as_ref().map(|log| log.text.clone()),
                truncated: report.compile_log.as_ref().map_or(false, |log| log.truncated),
            },
            InvokeOutcome::Fault { message } => UpdateRecord {
                status: Verdict::Pending,
                score: self.score(),
                time: -1,
                memory: 0,
                result: Vec::new(),
                len: source_len,
                error: Some(message.clone()),
                truncated: false,
            },
        }
    }
}

fn try_judge(
    driver: &mut dyn JudgeDriver,
    testdata_root: &Path,
    problem_id: &str,
    table: &[Vec<i64>],
    submission: Submission,
) -> anyhow::Result<JudgeReport> {
    let spec = TaskSpec::parse(table).context("malformed test data descriptor")?;
    info!("Checking test data");
    let testdata = Testdata::new(testdata_root, problem_id)
        .collect(spec.all_tasks())
        .context("failed to collect test data, refusing to continue")?;
    Judge::new(driver, &spec, &testdata, submission)?.exec()
}

/// Judges one submission of problem `problem_id`.
pub fn judge_submission(
    driver: &mut dyn JudgeDriver,
    testdata_root: &Path,
    problem_id: &str,
    table: &[Vec<i64>],
    submission: Submission,
) -> InvokeOutcome {
    match try_judge(driver, testdata_root, problem_id, table, submission) {
        Ok(report) => InvokeOutcome::Judged(report),
        Err(err) => {
            error!("Judging failed: {:#}", err);
            InvokeOutcome::Fault {
                message: util::error_chain(&err),
            }
        }
    }
}

fn read_file(path: &Path, what: &str) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {} from {}", what, path.display()))
}

/// Judges submission described by `task` using the real sandbox.
/// Returns outcome and size of the submission source.
pub fn invoke(cfg: &InvokerConfig, task: &InvokeTask) -> (InvokeOutcome, usize) {
    let prepared = (|| -> anyhow::Result<_> {
        let table = task.testdata.rows().context("bad test data table")?;
        let source = read_file(&task.source, "source")?;
        let checker = match &task.checker {
            Some(path) => Some(read_file(path, "checker source")?),
            None => None,
        };
        let driver = worker::SandboxDriver::new(cfg).context("failed to prepare sandbox")?;
        Ok((table, source, checker, driver))
    })();
    let (table, source, checker, mut driver) = match prepared {
        Ok(p) => p,
        Err(err) => {
            error!("Judging failed: {:#}", err);
            let fault = InvokeOutcome::Fault {
                message: util::error_chain(&err),
            };
            return (fault, 0);
        }
    };
    let submission = Submission {
        source: &source,
        checker: checker.as_deref(),
    };
    let outcome = judge_submission(
        &mut driver,
        &cfg.testdata_dir,
        &task.problem_id,
        &table,
        submission,
    );
    (outcome, source.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use invoker_api::TaskResult;
    use judge::{CompileLog, CompileOutcome};
    use pom::{TaskDef, TestdataPaths};
    use std::fs;

    struct AcceptAll;

    impl JudgeDriver for AcceptAll {
        fn write_source(&mut self, _source: &str) -> anyhow::Result<()> {
            Ok(())
        }

        fn compile(&mut self) -> anyhow::Result<CompileOutcome> {
            Ok(CompileOutcome {
                success: true,
                log: CompileLog {
                    text: "warning: unused variable".to_string(),
                    truncated: false,
                },
            })
        }

        fn compile_checker(&mut self, _source: &str) -> anyhow::Result<()> {
            Ok(())
        }

        fn run_task(&mut self, task: &TaskDef, _paths: &TestdataPaths) -> TaskResult {
            TaskResult::new(Verdict::Accepted, u64::from(task.time_limit_ms) / 100, 300)
        }
    }

    const SUBMISSION: Submission<'static> = Submission {
        source: "int main() {}",
        checker: None,
    };

    fn table() -> Vec<Vec<i64>> {
        pom::table::parse("1 1\n500 65536\n2 0 50\n500 65536\n500 65536\n").unwrap()
    }

    #[test]
    fn judged() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("1001");
        fs::create_dir(&dir).unwrap();
        for label in &["0", "1-1", "1-2"] {
            fs::write(dir.join(format!("{}.in", label)), "").unwrap();
            fs::write(dir.join(format!("{}.out", label)), "").unwrap();
        }
        let outcome = judge_submission(&mut AcceptAll, root.path(), "1001", &table(), SUBMISSION);
        assert_eq!(outcome.score(), 50);
        let record = outcome.update_record(13);
        assert_eq!(
            record,
            UpdateRecord {
                status: Verdict::Accepted,
                score: 50,
                time: 15,
                memory: 300,
                result: vec![[1, 5, 300]; 3],
                len: 13,
                error: Some("warning: unused variable".to_string()),
                truncated: false,
            }
        );
    }

    #[test]
    fn missing_testdata_is_fault() {
        let root = tempfile::tempdir().unwrap();
        let outcome = judge_submission(&mut AcceptAll, root.path(), "1001", &table(), SUBMISSION);
        assert_eq!(outcome.score(), -1);
        let record = outcome.update_record(13);
        assert_eq!(record.status, Verdict::Pending);
        assert!(record.result.is_empty());
        assert!(record.error.unwrap().contains("refusing to continue"));
    }

    #[test]
    fn truncated_compile_log_is_recorded() {
        let report = JudgeReport {
            summary: invoker_api::Summary::of(&Vec::<TaskResult>::new()),
            score: 0,
            results: Vec::new(),
            groups: Vec::new(),
            compile_log: Some(CompileLog {
                text: "x".repeat(10),
                truncated: true,
            }),
        };
        let record = InvokeOutcome::Judged(report).update_record(0);
        assert_eq!(record.error.as_deref(), Some("xxxxxxxxxx"));
        assert!(record.truncated);
    }

    #[test]
    fn huge_header_counts_are_fault() {
        let root = tempfile::tempdir().unwrap();
        for header in &[vec![i64::MAX, 0], vec![0, i64::MAX], vec![1 << 40, 1 << 40]] {
            let outcome =
                judge_submission(&mut AcceptAll, root.path(), "1001", &[header.clone()], SUBMISSION);
            assert_eq!(outcome.score(), -1);
            assert!(matches!(outcome, InvokeOutcome::Fault { .. }));
        }
    }

    #[test]
    fn malformed_table_is_fault() {
        let root = tempfile::tempdir().unwrap();
        let outcome =
            judge_submission(&mut AcceptAll, root.path(), "1001", &[vec![1, 1]], SUBMISSION);
        assert!(matches!(outcome, InvokeOutcome::Fault { .. }));
    }

    #[test]
    fn task_file() {
        let task: InvokeTask = serde_json::from_str(
            r#"{"problem_id": "1001", "testdata": "0 1\n1 0 100\n1000 1024\n", "source": "a.cpp"}"#,
        )
        .unwrap();
        assert_eq!(task.testdata.rows().unwrap().len(), 3);
        assert_eq!(task.checker, None);
        let task: InvokeTask = serde_json::from_str(
            r#"{"problem_id": "1001", "testdata": [[0, 0]], "source": "a.cpp", "checker": "c.cpp"}"#,
        )
        .unwrap();
        assert_eq!(task.testdata.rows().unwrap(), vec![vec![0, 0]]);
        assert_eq!(task.checker, Some(PathBuf::from("c.cpp")));
    }

    #[test]
    fn unreadable_source_is_fault() {
        let task = InvokeTask {
            problem_id: "1001".to_string(),
            testdata: TableSource::Rows(table()),
            source: "/nonexistent/source.cpp".into(),
            checker: None,
        };
        let (outcome, len) = invoke(&InvokerConfig::default(), &task);
        assert_eq!(outcome.score(), -1);
        assert_eq!(len, 0);
    }
}

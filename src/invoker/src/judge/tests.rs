use super::*;
use std::{collections::HashMap, path::PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Source(String),
    Compile,
    CompileChecker(String),
    Run(String),
}

/// Driver that replays prepared verdicts
#[derive(Default)]
struct MockDriver {
    compile_ok: bool,
    verdicts: HashMap<String, Verdict>,
    events: Vec<Event>,
}

impl MockDriver {
    fn new() -> Self {
        MockDriver {
            compile_ok: true,
            ..Default::default()
        }
    }

    fn verdict(&mut self, label: &str, verdict: Verdict) -> &mut Self {
        self.verdicts.insert(label.to_string(), verdict);
        self
    }

    fn runs(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|ev| match ev {
                Event::Run(label) => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl JudgeDriver for MockDriver {
    fn write_source(&mut self, source: &str) -> anyhow::Result<()> {
        self.events.push(Event::Source(source.to_string()));
        Ok(())
    }

    fn compile(&mut self) -> anyhow::Result<CompileOutcome> {
        self.events.push(Event::Compile);
        Ok(CompileOutcome {
            success: self.compile_ok,
            log: CompileLog {
                text: if self.compile_ok {
                    String::new()
                } else {
                    "test-file.cpp:1:1: error: expected unqualified-id".to_string()
                },
                truncated: false,
            },
        })
    }

    fn compile_checker(&mut self, source: &str) -> anyhow::Result<()> {
        self.events.push(Event::CompileChecker(source.to_string()));
        Ok(())
    }

    fn run_task(&mut self, task: &TaskDef, paths: &TestdataPaths) -> TaskResult {
        assert_eq!(paths.input, PathBuf::from(format!("{}.in", task.label)));
        self.events.push(Event::Run(task.label.clone()));
        let verdict = self
            .verdicts
            .get(&task.label)
            .copied()
            .unwrap_or(Verdict::Accepted);
        TaskResult::new(verdict, u64::from(task.time_limit_ms) / 10, 1024)
    }
}

fn spec(table: &[&[i64]]) -> TaskSpec {
    let rows: Vec<Vec<i64>> = table.iter().map(|row| row.to_vec()).collect();
    TaskSpec::parse(&rows).unwrap()
}

fn paths(spec: &TaskSpec) -> Vec<TestdataPaths> {
    spec.all_tasks()
        .map(|task| TestdataPaths {
            input: format!("{}.in", task.label).into(),
            answer: format!("{}.out", task.label).into(),
        })
        .collect()
}

fn run(driver: &mut MockDriver, spec: &TaskSpec, checker: Option<&str>) -> JudgeReport {
    simple_logger::SimpleLogger::new().init().ok();
    let testdata = paths(spec);
    let submission = Submission {
        source: "int main() {}",
        checker,
    };
    Judge::new(driver, spec, &testdata, submission)
        .unwrap()
        .exec()
        .unwrap()
}

const SCENARIO: &[&[i64]] = &[&[1, 1], &[500, 65536], &[2, 0, 50], &[500, 65536], &[500, 65536]];

#[test]
fn all_accepted() {
    let spec = spec(SCENARIO);
    let mut driver = MockDriver::new();
    let report = run(&mut driver, &spec, None);
    assert_eq!(report.score, 50);
    assert_eq!(report.summary.verdict, Verdict::Accepted);
    assert_eq!(report.summary.time_ms, Some(150));
    assert_eq!(report.summary.memory_kib, 1024);
    assert_eq!(report.results.len(), 3);
    assert_eq!(report.groups.len(), 1);
    assert!(report.groups[0].accepted);
    assert_eq!(report.compile_log, Some(CompileLog::default()));
    assert_eq!(
        driver.events[..2],
        [Event::Source("int main() {}".to_string()), Event::Compile]
    );
    assert_eq!(driver.runs(), ["0", "1-1", "1-2"]);
}

#[test]
fn wrong_answer_rejects_group() {
    let spec = spec(SCENARIO);
    let mut driver = MockDriver::new();
    driver.verdict("1-2", Verdict::WrongAnswer);
    let report = run(&mut driver, &spec, None);
    assert_eq!(report.score, 0);
    assert_eq!(report.summary.verdict, Verdict::WrongAnswer);
    assert_eq!(report.results[2].verdict, Verdict::WrongAnswer);
}

#[test]
fn compilation_error() {
    let spec = spec(SCENARIO);
    let mut driver = MockDriver::new();
    driver.compile_ok = false;
    let report = run(&mut driver, &spec, Some("checker source"));
    assert_eq!(report.score, 0);
    assert_eq!(report.summary.verdict, Verdict::CompilationError);
    assert_eq!(
        report.results,
        vec![TaskResult::new(Verdict::CompilationError, 0, 0); 3]
    );
    assert!(report.compile_log.unwrap().text.contains("error"));
    // neither checker nor tasks were touched
    assert_eq!(driver.events.len(), 2);
}

#[test]
fn sample_system_error_halts() {
    let spec = spec(&[&[2, 1], &[1000, 1024], &[1000, 1024], &[1, 0, 100], &[1000, 1024]]);
    let mut driver = MockDriver::new();
    driver.verdict("0-1", Verdict::SystemError);
    let report = run(&mut driver, &spec, None);
    assert_eq!(driver.runs(), ["0-1"]);
    assert_eq!(report.score, 0);
    assert_eq!(report.summary.verdict, Verdict::SystemError);
    assert_eq!(report.summary.time_ms, None);
    assert_eq!(
        report.results[1..],
        [
            TaskResult::unknown(Verdict::Other),
            TaskResult::unknown(Verdict::Other)
        ]
    );
    assert!(report.groups.is_empty());
}

#[test]
fn failed_sample_is_not_fatal() {
    let spec = spec(SCENARIO);
    let mut driver = MockDriver::new();
    driver.verdict("0", Verdict::WrongAnswer);
    let report = run(&mut driver, &spec, None);
    assert_eq!(report.score, 50);
    assert_eq!(report.summary.verdict, Verdict::WrongAnswer);
}

#[test]
fn ocen_does_not_block_group() {
    let spec = spec(&[
        &[0, 2],
        &[2, 1, 30],
        &[100, 1024],
        &[200, 1024],
        &[300, 1024],
        &[1, 0, 70],
        &[400, 1024],
    ]);
    let mut driver = MockDriver::new();
    driver
        .verdict("1-ocen", Verdict::TimeLimitExceeded)
        .verdict("2", Verdict::RuntimeError);
    let report = run(&mut driver, &spec, None);
    assert_eq!(driver.runs(), ["1-ocen", "1-1", "1-2", "2"]);
    assert_eq!(report.score, 30);
    assert_eq!(report.summary.verdict, Verdict::RuntimeError);
    assert_eq!(report.groups.len(), 2);
    assert!(report.groups[0].accepted);
    assert!(!report.groups[1].accepted);
}

#[test]
fn subtask_system_error_is_contained() {
    let spec = spec(&[&[0, 2], &[1, 0, 40], &[100, 1024], &[1, 0, 60], &[100, 1024]]);
    let mut driver = MockDriver::new();
    driver.verdict("1", Verdict::SystemError);
    let report = run(&mut driver, &spec, None);
    assert_eq!(driver.runs(), ["1", "2"]);
    assert_eq!(report.score, 60);
    assert_eq!(report.summary.verdict, Verdict::SystemError);
}

#[test]
fn special_checker_is_compiled() {
    let spec = spec(SCENARIO);
    let mut driver = MockDriver::new();
    run(&mut driver, &spec, Some("int main() { return 1; }"));
    assert_eq!(
        driver.events[2],
        Event::CompileChecker("int main() { return 1; }".to_string())
    );
    assert_eq!(driver.runs().len(), 3);
}

#[test]
fn testdata_must_match() {
    let spec = spec(SCENARIO);
    let mut driver = MockDriver::new();
    let submission = Submission {
        source: "",
        checker: None,
    };
    assert!(Judge::new(&mut driver, &spec, &[], submission).is_err());
}

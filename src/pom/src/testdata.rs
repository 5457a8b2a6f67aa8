use crate::TaskDef;
use std::path::{Path, PathBuf};

/// Input and reference output of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestdataPaths {
    pub input: PathBuf,
    pub answer: PathBuf,
}

#[derive(Debug, thiserror::Error)]
#[error("{} test data file(s) are missing, first is {}", .missing.len(), .missing[0].display())]
pub struct TestdataMissing {
    pub missing: Vec<PathBuf>,
}

/// Test data of one problem, laid out as `<root>/<problem>/<label>.{in,out}`.
#[derive(Debug, Clone)]
pub struct Testdata {
    problem_dir: PathBuf,
}

impl Testdata {
    pub fn new(root: &Path, problem_id: &str) -> Testdata {
        Testdata {
            problem_dir: root.join(problem_id),
        }
    }

    pub fn paths(&self, task: &TaskDef) -> TestdataPaths {
        TestdataPaths {
            input: self.problem_dir.join(format!("{}.in", task.label)),
            answer: self.problem_dir.join(format!("{}.out", task.label)),
        }
    }

    /// Resolves paths for all `tasks`, in order.
    /// Fails if any of the files does not exist.
    pub fn collect<'a>(
        &self,
        tasks: impl IntoIterator<Item = &'a TaskDef>,
    ) -> Result<Vec<TestdataPaths>, TestdataMissing> {
        let mut missing = Vec::new();
        let mut out = Vec::new();
        for task in tasks {
            let paths = self.paths(task);
            for p in &[&paths.input, &paths.answer] {
                if !p.is_file() {
                    log::error!("{} is not ready", p.display());
                    missing.push(p.to_path_buf());
                }
            }
            out.push(paths);
        }
        if missing.is_empty() {
            Ok(out)
        } else {
            Err(TestdataMissing { missing })
        }
    }
}

//! Problem object model
//!
//! A problem is described by a compact integer table (see [`table`]), which is
//! turned into a [`TaskSpec`] by [`TaskSpec::parse`].
pub mod table;
mod testdata;

pub use testdata::{Testdata, TestdataMissing, TestdataPaths};

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// One gradable unit: a single test case with its own limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDef {
    /// Used to locate `<label>.in` and `<label>.out`
    pub label: String,
    pub time_limit_ms: u32,
    pub mem_limit_kib: u64,
    /// If set, a failure on this task does not reject its group ("ocen" tasks).
    pub fallthrough: bool,
}

/// `count` consecutive entries of [`TaskSpec::subtasks`], worth `score` points
/// if all of them are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroup {
    pub count: usize,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Judged first and never scored
    pub samples: Vec<TaskDef>,
    /// Flattened across all groups, in table order
    pub subtasks: Vec<TaskDef>,
    pub task_groups: Vec<TaskGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedTable {
    #[error("table has {rows} rows, but its header counts declare more")]
    Truncated { rows: usize },
    #[error("row {row} has {found} fields, expected {expected}")]
    ShortRow {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("row {row}: {field} must be {requirement}, got {value}")]
    BadValue {
        row: usize,
        field: &'static str,
        requirement: &'static str,
        value: i64,
    },
}

/// Memory limits are handed to the sandbox in bytes
const MAX_MEM_LIMIT_KIB: u64 = u64::MAX / 1024;

/// Forward-only reader over table rows.
struct Cursor<'a> {
    rows: &'a [Vec<i64>],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn next_row(&mut self, expected: usize) -> Result<(usize, &'a [i64]), MalformedTable> {
        let row = self.rows.get(self.pos).ok_or(MalformedTable::Truncated {
            rows: self.rows.len(),
        })?;
        self.pos += 1;
        if row.len() < expected {
            return Err(MalformedTable::ShortRow {
                row: self.pos,
                found: row.len(),
                expected,
            });
        }
        Ok((self.pos, &row[..expected]))
    }

    fn next_limits(&mut self) -> Result<(u32, u64), MalformedTable> {
        let (row, fields) = self.next_row(2)?;
        let time = u32::try_from(fields[0])
            .ok()
            .filter(|&t| t > 0)
            .ok_or(MalformedTable::BadValue {
                row,
                field: "time limit",
                requirement: "a positive number of milliseconds",
                value: fields[0],
            })?;
        let mem = u64::try_from(fields[1])
            .ok()
            .filter(|&m| m > 0 && m <= MAX_MEM_LIMIT_KIB)
            .ok_or(MalformedTable::BadValue {
                row,
                field: "memory limit",
                requirement: "a positive number of KiB that fits in bytes",
                value: fields[1],
            })?;
        Ok((time, mem))
    }
}

fn count_field(row: usize, field: &'static str, value: i64) -> Result<usize, MalformedTable> {
    usize::try_from(value).map_err(|_| MalformedTable::BadValue {
        row,
        field,
        requirement: "non-negative",
        value,
    })
}

/// `"{prefix}"` for a single item, `"{prefix}-{index}"` otherwise.
fn make_label(prefix: usize, index: usize, total: usize) -> String {
    if total == 1 {
        prefix.to_string()
    } else {
        format!("{}-{}", prefix, index)
    }
}

impl TaskSpec {
    /// Parses descriptor table.
    ///
    /// Layout:
    /// - `<samples> <groups>`
    /// - for each sample: `<time limit ms> <memory limit KiB>`
    /// - for each group: `<tests> <has ocen test> <score>`, then one limits row for the ocen
    ///   test (if present), then one limits row per test.
    pub fn parse(table: &[Vec<i64>]) -> Result<TaskSpec, MalformedTable> {
        let mut cur = Cursor {
            rows: table,
            pos: 0,
        };
        let (row, header) = cur.next_row(2)?;
        let num_samples = count_field(row, "sample count", header[0])?;
        let num_groups = count_field(row, "group count", header[1])?;

        // counts are untrusted, so nothing is preallocated from them
        let mut samples = Vec::new();
        for i in 1..=num_samples {
            let (time_limit_ms, mem_limit_kib) = cur.next_limits()?;
            samples.push(TaskDef {
                label: make_label(0, i, num_samples),
                time_limit_ms,
                mem_limit_kib,
                fallthrough: false,
            });
        }

        let mut subtasks = Vec::new();
        let mut task_groups = Vec::new();
        for g in 1..=num_groups {
            let (row, group_header) = cur.next_row(3)?;
            let num_small = count_field(row, "test count", group_header[0])?;
            let has_ocen = match group_header[1] {
                0 => false,
                1 => true,
                other => {
                    return Err(MalformedTable::BadValue {
                        row,
                        field: "ocen flag",
                        requirement: "0 or 1",
                        value: other,
                    })
                }
            };
            let score = u32::try_from(group_header[2]).map_err(|_| MalformedTable::BadValue {
                row,
                field: "score",
                requirement: "non-negative",
                value: group_header[2],
            })?;

            if has_ocen {
                let (time_limit_ms, mem_limit_kib) = cur.next_limits()?;
                subtasks.push(TaskDef {
                    label: format!("{}-ocen", g),
                    time_limit_ms,
                    mem_limit_kib,
                    fallthrough: true,
                });
            }
            task_groups.push(TaskGroup {
                count: num_small + has_ocen as usize,
                score,
            });
            for j in 1..=num_small {
                let (time_limit_ms, mem_limit_kib) = cur.next_limits()?;
                subtasks.push(TaskDef {
                    label: make_label(g, j, num_small),
                    time_limit_ms,
                    mem_limit_kib,
                    fallthrough: false,
                });
            }
        }
        if cur.pos < table.len() {
            log::warn!(
                "ignoring {} trailing row(s) of descriptor table",
                table.len() - cur.pos
            );
        }

        Ok(TaskSpec {
            samples,
            subtasks,
            task_groups,
        })
    }

    /// Samples followed by subtasks, i.e. the order tasks are judged in.
    pub fn all_tasks(&self) -> impl Iterator<Item = &TaskDef> + '_ {
        self.samples.iter().chain(self.subtasks.iter())
    }

    pub fn task_count(&self) -> usize {
        self.samples.len() + self.subtasks.len()
    }

    /// Sum of all group scores, i.e. score of a fully accepted submission.
    pub fn max_score(&self) -> u64 {
        self.task_groups.iter().map(|g| u64::from(g.score)).sum()
    }
}

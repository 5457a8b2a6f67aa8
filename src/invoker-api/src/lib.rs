pub mod checker_proto;

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use strum_macros::{Display, EnumString};

/// Outcome of judging one task or a whole submission.
///
/// Numeric codes (see [`Verdict::code`]) are what gets stored and sent over
/// the checker protocol; they follow declaration order.
#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum Verdict {
    /// Not judged yet. Never produced by judging logic.
    #[strum(serialize = "PENDING")]
    Pending,
    #[strum(serialize = "AC")]
    Accepted,
    #[strum(serialize = "RE")]
    RuntimeError,
    #[strum(serialize = "CE")]
    CompilationError,
    #[strum(serialize = "TLE")]
    TimeLimitExceeded,
    #[strum(serialize = "MLE")]
    MemoryLimitExceeded,
    #[strum(serialize = "WA")]
    WrongAnswer,
    #[strum(serialize = "PE")]
    PresentationError,
    #[strum(serialize = "OLE")]
    OutputLimitExceeded,
    #[strum(serialize = "OTHER")]
    Other,
    /// Sandbox or checker malfunction
    #[strum(serialize = "SERR")]
    SystemError,
    /// Restricted function
    #[strum(serialize = "RF")]
    RestrictedFunction,
}

impl Verdict {
    pub const ALL: [Verdict; 12] = [
        Verdict::Pending,
        Verdict::Accepted,
        Verdict::RuntimeError,
        Verdict::CompilationError,
        Verdict::TimeLimitExceeded,
        Verdict::MemoryLimitExceeded,
        Verdict::WrongAnswer,
        Verdict::PresentationError,
        Verdict::OutputLimitExceeded,
        Verdict::Other,
        Verdict::SystemError,
        Verdict::RestrictedFunction,
    ];

    /// All verdicts, from the least severe to the most severe.
    pub const BY_SEVERITY: [Verdict; 12] = [
        Verdict::Accepted,
        Verdict::WrongAnswer,
        Verdict::PresentationError,
        Verdict::MemoryLimitExceeded,
        Verdict::TimeLimitExceeded,
        Verdict::OutputLimitExceeded,
        Verdict::RuntimeError,
        Verdict::CompilationError,
        Verdict::Other,
        Verdict::RestrictedFunction,
        Verdict::SystemError,
        Verdict::Pending,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Verdict> {
        Verdict::ALL.iter().copied().find(|v| v.code() == code)
    }

    /// Position in [`Verdict::BY_SEVERITY`]
    pub fn rank(self) -> usize {
        match self {
            Verdict::Accepted => 0,
            Verdict::WrongAnswer => 1,
            Verdict::PresentationError => 2,
            Verdict::MemoryLimitExceeded => 3,
            Verdict::TimeLimitExceeded => 4,
            Verdict::OutputLimitExceeded => 5,
            Verdict::RuntimeError => 6,
            Verdict::CompilationError => 7,
            Verdict::Other => 8,
            Verdict::RestrictedFunction => 9,
            Verdict::SystemError => 10,
            Verdict::Pending => 11,
        }
    }

    /// Returns the more severe of two verdicts.
    pub fn worst(self, other: Verdict) -> Verdict {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    pub fn is_accepted(self) -> bool {
        self == Verdict::Accepted
    }
}

impl From<Verdict> for i32 {
    fn from(v: Verdict) -> i32 {
        v.code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown verdict code {0}")]
pub struct UnknownVerdict(pub i32);

impl TryFrom<i32> for Verdict {
    type Error = UnknownVerdict;

    fn try_from(code: i32) -> Result<Verdict, UnknownVerdict> {
        Verdict::from_code(code).ok_or(UnknownVerdict(code))
    }
}

/// Result of one task. `None` means the value is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub verdict: Verdict,
    pub time_ms: Option<u64>,
    pub memory_kib: Option<u64>,
}

impl TaskResult {
    pub fn new(verdict: Verdict, time_ms: u64, memory_kib: u64) -> TaskResult {
        TaskResult {
            verdict,
            time_ms: Some(time_ms),
            memory_kib: Some(memory_kib),
        }
    }

    /// Result without usage information, e.g. for tasks that were never run.
    pub fn unknown(verdict: Verdict) -> TaskResult {
        TaskResult {
            verdict,
            time_ms: None,
            memory_kib: None,
        }
    }

    /// `[verdict code, time, memory]`, unknown values encoded as `-1`.
    pub fn to_row(&self) -> [i64; 3] {
        fn or_unknown(v: Option<u64>) -> i64 {
            v.map_or(-1, |v| v as i64)
        }
        [
            i64::from(self.verdict.code()),
            or_unknown(self.time_ms),
            or_unknown(self.memory_kib),
        ]
    }
}

/// Aggregate over all task results of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Most severe verdict
    pub verdict: Verdict,
    /// Total time. Unknown if any task's time is unknown.
    pub time_ms: Option<u64>,
    /// Peak memory among tasks with known usage
    pub memory_kib: u64,
}

impl Summary {
    pub fn of<'a>(results: impl IntoIterator<Item = &'a TaskResult>) -> Summary {
        let mut sum = Summary {
            verdict: Verdict::Accepted,
            time_ms: Some(0),
            memory_kib: 0,
        };
        for res in results {
            sum.verdict = sum.verdict.worst(res.verdict);
            sum.time_ms = match (sum.time_ms, res.time_ms) {
                (Some(total), Some(t)) => Some(total + t),
                _ => None,
            };
            if let Some(mem) = res.memory_kib {
                sum.memory_kib = sum.memory_kib.max(mem);
            }
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_table_matches_rank() {
        for (i, v) in Verdict::BY_SEVERITY.iter().enumerate() {
            assert_eq!(v.rank(), i, "{}", v);
        }
        for (i, v) in Verdict::ALL.iter().enumerate() {
            assert_eq!(v.code(), i as i32);
            assert_eq!(Verdict::from_code(i as i32), Some(*v));
        }
        assert_eq!(Verdict::from_code(12), None);
        assert_eq!(Verdict::from_code(-1), None);
    }

    #[test]
    fn worst_laws() {
        for &a in &Verdict::ALL {
            assert_eq!(Verdict::Accepted.worst(a), a);
            assert_eq!(a.worst(Verdict::Accepted), a);
            if a != Verdict::Pending {
                assert_eq!(Verdict::SystemError.worst(a), Verdict::SystemError);
            }
            for &b in &Verdict::ALL {
                assert_eq!(a.worst(b), b.worst(a));
                for &c in &Verdict::ALL {
                    assert_eq!(a.worst(b).worst(c), a.worst(b.worst(c)));
                }
            }
        }
    }

    #[test]
    fn worst_picks_by_severity_not_code() {
        assert_eq!(
            Verdict::WrongAnswer.worst(Verdict::RuntimeError),
            Verdict::RuntimeError
        );
        assert_eq!(
            Verdict::OutputLimitExceeded.worst(Verdict::TimeLimitExceeded),
            Verdict::OutputLimitExceeded
        );
        assert_eq!(
            Verdict::MemoryLimitExceeded.worst(Verdict::PresentationError),
            Verdict::MemoryLimitExceeded
        );
    }

    #[test]
    fn display_and_parse() {
        assert_eq!(Verdict::SystemError.to_string(), "SERR");
        assert_eq!("TLE".parse::<Verdict>().unwrap(), Verdict::TimeLimitExceeded);
        assert_eq!(serde_json::to_string(&Verdict::WrongAnswer).unwrap(), "6");
        assert!(serde_json::from_str::<Verdict>("42").is_err());
    }

    #[test]
    fn summary() {
        let results = vec![
            TaskResult::new(Verdict::Accepted, 10, 300),
            TaskResult::new(Verdict::WrongAnswer, 25, 1200),
            TaskResult::new(Verdict::Accepted, 5, 800),
        ];
        assert_eq!(
            Summary::of(&results),
            Summary {
                verdict: Verdict::WrongAnswer,
                time_ms: Some(40),
                memory_kib: 1200,
            }
        );

        let with_unknown = vec![
            TaskResult::new(Verdict::Accepted, 10, 300),
            TaskResult::unknown(Verdict::Other),
            TaskResult::new(Verdict::Accepted, 10, 500),
        ];
        assert_eq!(
            Summary::of(&with_unknown),
            Summary {
                verdict: Verdict::Other,
                time_ms: None,
                memory_kib: 500,
            }
        );

        assert_eq!(Summary::of(&[]).verdict, Verdict::Accepted);
    }

    #[test]
    fn rows() {
        assert_eq!(
            TaskResult::new(Verdict::CompilationError, 0, 0).to_row(),
            [3, 0, 0]
        );
        assert_eq!(TaskResult::unknown(Verdict::Other).to_row(), [9, -1, -1]);
    }
}

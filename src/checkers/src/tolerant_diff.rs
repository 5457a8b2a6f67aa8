use invoker_api::checker_proto::{SubtaskContext, SubtaskResponse};
use log::debug;
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Match,
    /// 1-based number of the first differing line
    Mismatch { lineno: i64 },
}

fn trim(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., last] = line {
        if !last.is_ascii_whitespace() {
            break;
        }
        line = rest;
    }
    while let [first, rest @ ..] = line {
        if !first.is_ascii_whitespace() {
            break;
        }
        line = rest;
    }
    line
}

/// Compares outputs line by line, ignoring leading and trailing whitespace
/// of each line. Line counts must agree, except that the final newline is optional.
pub fn compare(mut expected: impl BufRead, mut actual: impl BufRead) -> io::Result<Comparison> {
    let mut exp_line = Vec::new();
    let mut act_line = Vec::new();
    let mut lineno = 1;
    loop {
        exp_line.clear();
        act_line.clear();
        let exp_len = expected.read_until(b'\n', &mut exp_line)?;
        let act_len = actual.read_until(b'\n', &mut act_line)?;
        match (exp_len, act_len) {
            (0, 0) => return Ok(Comparison::Match),
            (0, _) | (_, 0) => return Ok(Comparison::Mismatch { lineno }),
            _ => {
                if trim(&exp_line) != trim(&act_line) {
                    return Ok(Comparison::Mismatch { lineno });
                }
            }
        }
        lineno += 1;
    }
}

pub fn check(cx: &SubtaskContext) -> io::Result<SubtaskResponse> {
    let expected = BufReader::new(File::open(&cx.subtask.output_path)?);
    let actual = BufReader::new(File::open(&cx.subtask.output_user_path)?);
    let comparison = compare(expected, actual)?;
    debug!("diff result: {:?}", comparison);
    Ok(match comparison {
        Comparison::Match => SubtaskResponse::new(invoker_api::Verdict::Accepted),
        Comparison::Mismatch { lineno } => SubtaskResponse::wrong_answer(lineno),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use invoker_api::{
        checker_proto::{SubtaskSpec, SubtaskStat},
        Verdict,
    };

    fn cmp(expected: &str, actual: &str) -> Comparison {
        compare(expected.as_bytes(), actual.as_bytes()).unwrap()
    }

    #[test]
    fn whitespace_is_tolerated() {
        assert_eq!(cmp("1 2\n3\n", "1 2\n3\n"), Comparison::Match);
        assert_eq!(cmp("1 2\n3\n", "  1 2  \r\n3\t\n"), Comparison::Match);
        assert_eq!(cmp("1 2\n3\n", "1 2\n3"), Comparison::Match);
        assert_eq!(cmp("", ""), Comparison::Match);
    }

    #[test]
    fn differences() {
        assert_eq!(cmp("1 2\n3\n", "1 2\n4\n"), Comparison::Mismatch { lineno: 2 });
        assert_eq!(cmp("1\n", "2\n"), Comparison::Mismatch { lineno: 1 });
        assert_eq!(cmp("1  2\n", "1 2\n"), Comparison::Mismatch { lineno: 1 });
        assert_eq!(cmp("1\n2\n", "1\n"), Comparison::Mismatch { lineno: 2 });
        assert_eq!(cmp("1\n", "1\n\n"), Comparison::Mismatch { lineno: 2 });
        assert_eq!(cmp("", "\n"), Comparison::Mismatch { lineno: 1 });
    }

    #[test]
    fn check_files() {
        let dir = tempfile::tempdir().unwrap();
        let answer = dir.path().join("1.out");
        let output = dir.path().join("test");
        std::fs::write(&answer, "42\n43\n").unwrap();
        let cx = SubtaskContext {
            subtask: SubtaskSpec {
                time_limit_ms: 1000,
                mem_limit_kib: 1024,
                input_path: dir.path().join("1.in"),
                output_path: answer,
                output_user_path: output.clone(),
            },
            stat: SubtaskStat {
                time_used_ms: 1,
                mem_used_kib: 1,
            },
            log: Default::default(),
        };

        std::fs::write(&output, "42\n43").unwrap();
        assert_eq!(check(&cx).unwrap(), SubtaskResponse::new(Verdict::Accepted));

        std::fs::write(&output, "42\n44\n").unwrap();
        let resp = check(&cx).unwrap();
        assert_eq!(resp.verdict, Verdict::WrongAnswer);
        assert_eq!(resp.lineno(), 2);

        std::fs::remove_file(&output).unwrap();
        assert!(check(&cx).is_err());
    }
}

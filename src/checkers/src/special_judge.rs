//! Wrapper around testlib-style custom comparators.
//!
//! Many such comparators hardcode file names, so input, user output and
//! reference output are linked as `in.txt`, `out.txt` and `ans.txt` into
//! the link directory, which also becomes comparator's working directory.
use anyhow::Context;
use invoker_api::{
    checker_proto::{SubtaskContext, SubtaskResponse},
    Verdict,
};
use log::{debug, error, info};
use std::{
    fs, io,
    os::unix::fs::symlink,
    path::Path,
    process::{Command, Stdio},
};

pub const DEFAULT_LINK_DIR: &str = "/run/shm";

/// Creates symlink `dest` pointing to `src`, replacing existing `dest`.
pub fn symlink_force(src: &Path, dest: &Path) -> io::Result<()> {
    match symlink(src, dest) {
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            fs::remove_file(dest)?;
            symlink(src, dest)
        }
        res => res,
    }
}

pub fn verdict_of_exit_code(code: Option<i32>) -> Verdict {
    match code {
        Some(1) => Verdict::Accepted,
        Some(6) => Verdict::WrongAnswer,
        Some(7) => Verdict::PresentationError,
        _ => Verdict::SystemError,
    }
}

fn link(src: &Path, dest: &Path) -> anyhow::Result<()> {
    let src = fs::canonicalize(src).with_context(|| format!("{} not found", src.display()))?;
    symlink_force(&src, dest)
        .with_context(|| format!("failed to link {} to {}", src.display(), dest.display()))
}

/// Runs comparator `checker_exe` on files of `cx`.
/// Comparator failures are reported as `SystemError` verdict.
pub fn judge(
    cx: &SubtaskContext,
    checker_exe: &Path,
    link_dir: &Path,
) -> anyhow::Result<SubtaskResponse> {
    let input = link_dir.join("in.txt");
    let output = link_dir.join("out.txt");
    let answer = link_dir.join("ans.txt");
    link(&cx.subtask.input_path, &input)?;
    link(&cx.subtask.output_user_path, &output)?;
    link(&cx.subtask.output_path, &answer)?;

    let checker_exe = fs::canonicalize(checker_exe).unwrap_or_else(|_| checker_exe.to_path_buf());
    let mut cmd = Command::new(&checker_exe);
    cmd.arg(&input)
        .arg(&output)
        .arg(&answer)
        .current_dir(link_dir)
        .stdin(Stdio::null());
    debug!("Starting comparator: {:?}", cmd);
    let code = match cmd.output() {
        Ok(out) => {
            for line in String::from_utf8_lossy(&out.stdout)
                .lines()
                .chain(String::from_utf8_lossy(&out.stderr).lines())
            {
                debug!("CHECKER >>> {}", line);
            }
            info!("Result: {}", out.status);
            out.status.code()
        }
        Err(err) => {
            error!("failed to launch {}: {}", checker_exe.display(), err);
            None
        }
    };
    let verdict = verdict_of_exit_code(code);
    if verdict == Verdict::SystemError {
        error!("Unknown return code from comparator: {:?}", code);
    }
    Ok(SubtaskResponse::new(verdict))
}

//! Checkers speaking invoker's checker protocol: a process reads one
//! `SubtaskContext` from stdin and writes one `SubtaskResponse` to stdout.
pub mod special_judge;
pub mod tolerant_diff;

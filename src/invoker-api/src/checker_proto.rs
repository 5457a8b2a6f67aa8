//! Messages exchanged between invoker and checker processes.
//!
//! The invoker writes one [`SubtaskContext`] to checker's stdin and closes it.
//! Checker writes one [`SubtaskResponse`] to its stdout and exits with code 0.
//! Both are encoded with bincode (big endian, fixed-width integers).
use crate::Verdict;
use bincode::Options;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    io::{Read, Write},
    path::PathBuf,
};

/// Key of [`SubtaskResponse::meta`]: 1-based number of the first differing line.
pub const META_LINENO: &str = "lineno";

const MESSAGE_SIZE_LIMIT: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskSpec {
    pub time_limit_ms: u32,
    pub mem_limit_kib: u64,
    /// Test input
    pub input_path: PathBuf,
    /// Reference output
    pub output_path: PathBuf,
    /// Output produced by the solution
    pub output_user_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskStat {
    pub time_used_ms: u64,
    pub mem_used_kib: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskContext {
    pub subtask: SubtaskSpec,
    pub stat: SubtaskStat,
    /// All key/value pairs reported by the sandbox
    pub log: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskResponse {
    pub verdict: Verdict,
    pub meta: BTreeMap<String, i64>,
}

impl SubtaskResponse {
    pub fn new(verdict: Verdict) -> SubtaskResponse {
        SubtaskResponse {
            verdict,
            meta: BTreeMap::new(),
        }
    }

    pub fn wrong_answer(lineno: i64) -> SubtaskResponse {
        let mut resp = SubtaskResponse::new(Verdict::WrongAnswer);
        resp.meta.insert(META_LINENO.to_string(), lineno);
        resp
    }

    /// Only meaningful for WA responses; `-1` if the checker did not report it.
    pub fn lineno(&self) -> i64 {
        self.meta.get(META_LINENO).copied().unwrap_or(-1)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("failed to encode or decode message")]
    Codec(#[from] bincode::Error),
    #[error("i/o error")]
    Io(#[from] std::io::Error),
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
        .with_limit(MESSAGE_SIZE_LIMIT)
}

pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtoError> {
    Ok(options().serialize(msg)?)
}

/// Decodes exactly one message; trailing bytes are an error.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, ProtoError> {
    Ok(options().deserialize(data)?)
}

/// Reads the reader to the end and decodes one message.
pub fn read_message<T: DeserializeOwned>(mut reader: impl Read) -> Result<T, ProtoError> {
    let mut buf = Vec::new();
    reader
        .by_ref()
        .take(MESSAGE_SIZE_LIMIT)
        .read_to_end(&mut buf)?;
    decode(&buf)
}

pub fn write_message<T: Serialize>(mut writer: impl Write, msg: &T) -> Result<(), ProtoError> {
    let data = encode(msg)?;
    writer.write_all(&data)?;
    writer.flush()?;
    Ok(())
}

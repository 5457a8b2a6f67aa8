use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom},
    path::Path,
};

/// Region of the journal file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u64,
    pub len: u64,
}

#[derive(Debug)]
enum State {
    Idle,
    Capturing { tag: String, start: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("cannot begin {requested}: still capturing {active}")]
    Busy { active: String, requested: String },
    #[error("no capture in progress")]
    NotCapturing,
    #[error("unknown journal tag {0}")]
    UnknownTag(String),
    #[error("journal i/o failed")]
    Io(#[from] io::Error),
}

/// Append-only file holding several tagged logs.
///
/// Only one tag may be captured at a time. Everything written through
/// `file()` between `begin` and `end` belongs to that tag.
#[derive(Debug)]
pub struct Journal {
    file: File,
    state: State,
    spans: HashMap<String, Span>,
}

impl Journal {
    pub fn new(file: File) -> Journal {
        Journal {
            file,
            state: State::Idle,
            spans: HashMap::new(),
        }
    }

    /// Creates (or truncates) journal at `path`
    pub fn create(path: &Path) -> Result<Journal, JournalError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Journal::new(file))
    }

    pub fn file(&mut self) -> &mut File {
        &mut self.file
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.state, State::Capturing { .. })
    }

    pub fn begin(&mut self, tag: &str) -> Result<(), JournalError> {
        if let State::Capturing { tag: active, .. } = &self.state {
            return Err(JournalError::Busy {
                active: active.clone(),
                requested: tag.to_string(),
            });
        }
        let start = self.file.seek(SeekFrom::End(0))?;
        self.state = State::Capturing {
            tag: tag.to_string(),
            start,
        };
        Ok(())
    }

    pub fn end(&mut self) -> Result<Span, JournalError> {
        let (tag, start) = match std::mem::replace(&mut self.state, State::Idle) {
            State::Capturing { tag, start } => (tag, start),
            State::Idle => return Err(JournalError::NotCapturing),
        };
        let end = self.file.seek(SeekFrom::End(0))?;
        let span = Span {
            start,
            len: end - start,
        };
        self.spans.insert(tag, span);
        Ok(span)
    }

    pub fn span(&self, tag: &str) -> Option<Span> {
        self.spans.get(tag).copied()
    }

    /// Reads contents of `tag`. File position is left untouched.
    pub fn dump(&mut self, tag: &str) -> Result<Vec<u8>, JournalError> {
        let span = self
            .span(tag)
            .ok_or_else(|| JournalError::UnknownTag(tag.to_string()))?;
        let pos = self.file.seek(SeekFrom::Current(0))?;
        let mut data = vec![0; span.len as usize];
        self.file.seek(SeekFrom::Start(span.start))?;
        let res = self.file.read_exact(&mut data);
        self.file.seek(SeekFrom::Start(pos))?;
        res?;
        Ok(data)
    }

    /// Runs `f` as the `tag` capture. Capture is ended even if `f` fails.
    pub fn capture<T, E>(
        &mut self,
        tag: &str,
        f: impl FnOnce(&mut File) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<JournalError>,
    {
        self.begin(tag)?;
        let res = f(&mut self.file);
        let ended = self.end();
        let value = res?;
        ended?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn journal() -> Journal {
        Journal::new(tempfile::tempfile().unwrap())
    }

    #[test]
    fn spans_are_separated() {
        let mut j = journal();
        j.file().write_all(b"prologue\n").unwrap();
        j.begin("first").unwrap();
        j.file().write_all(b"hello ").unwrap();
        j.file().write_all(b"world").unwrap();
        assert_eq!(j.end().unwrap(), Span { start: 9, len: 11 });
        j.begin("second").unwrap();
        j.file().write_all(b"bye").unwrap();
        j.end().unwrap();

        assert_eq!(j.dump("first").unwrap(), b"hello world");
        assert_eq!(j.dump("second").unwrap(), b"bye");
        assert!(matches!(j.dump("third"), Err(JournalError::UnknownTag(_))));
    }

    #[test]
    fn dump_keeps_position() {
        let mut j = journal();
        j.begin("a").unwrap();
        j.file().write_all(b"aaaa").unwrap();
        j.end().unwrap();
        j.begin("b").unwrap();
        j.file().write_all(b"bb").unwrap();
        assert_eq!(j.dump("a").unwrap(), b"aaaa");
        j.file().write_all(b"b").unwrap();
        j.end().unwrap();
        assert_eq!(j.dump("b").unwrap(), b"bbb");
        assert_eq!(j.file().seek(SeekFrom::Current(0)).unwrap(), 7);
    }

    #[test]
    fn one_capture_at_a_time() {
        let mut j = journal();
        assert!(matches!(j.end(), Err(JournalError::NotCapturing)));
        j.begin("a").unwrap();
        assert!(matches!(j.begin("b"), Err(JournalError::Busy { .. })));
        assert!(j.is_capturing());
        j.end().unwrap();
        assert!(!j.is_capturing());
        j.begin("b").unwrap();
    }

    #[test]
    fn capture_ends_on_error() {
        let mut j = journal();
        let res: anyhow::Result<()> = j.capture("COMPILE", |f| {
            f.write_all(b"partial")?;
            anyhow::bail!("compiler vanished")
        });
        assert!(res.is_err());
        assert!(!j.is_capturing());
        assert_eq!(j.dump("COMPILE").unwrap(), b"partial");

        let n: Result<usize, JournalError> = j.capture("again", |f| {
            f.write_all(b"ok")?;
            Ok(2)
        });
        assert_eq!(n.unwrap(), 2);
    }
}

//! Runs child process, multiplexing its stdio through size-capped sinks.
//!
//! All pipe ends are serviced from one `poll(2)` loop, so a child that floods
//! one stream cannot starve the other one or deadlock the parent.
//! When a sink is full, the stream is read once more: if the child still has
//! something to say, the stream is flagged as overflowed and closed.
mod journal;

pub use journal::{Journal, JournalError, Span};

use log::debug;
use nix::{
    errno::Errno,
    fcntl::{fcntl, FcntlArg, FdFlag, OFlag},
    poll::{poll, PollFd, PollFlags},
};
use std::{
    fs::File,
    io::{self, Read, Write},
    os::unix::{
        io::{AsRawFd, FromRawFd, IntoRawFd, RawFd},
        process::CommandExt,
    },
    process::{Child, Command, ExitStatus, Stdio},
    time::{Duration, Instant},
};

/// Size of one read from the child
pub const PIPE_BUFFER_SIZE: usize = 64 * 1024;
/// Max size of one write to the child
const PIPE_WRITE_CHUNK: usize = 4096;

/// What child gets on stdin
pub enum Input<'a> {
    Null,
    File(File),
    /// Streamed to the child as it becomes ready to consume it
    Bytes(&'a [u8]),
}

/// Where child's stdout or stderr goes
pub enum Output<'a> {
    Null,
    Inherit,
    Capture {
        sink: &'a mut dyn Write,
        limit: Option<u64>,
    },
}

impl<'a> Output<'a> {
    pub fn capture(sink: &'a mut dyn Write) -> Output<'a> {
        Output::Capture { sink, limit: None }
    }

    pub fn capture_limited(sink: &'a mut dyn Write, limit: u64) -> Output<'a> {
        Output::Capture {
            sink,
            limit: Some(limit),
        }
    }

    fn stdio(&self) -> Stdio {
        match self {
            Output::Null => Stdio::null(),
            Output::Inherit => Stdio::inherit(),
            Output::Capture { .. } => Stdio::piped(),
        }
    }
}

pub struct PipeRequest<'a> {
    pub stdin: Input<'a>,
    pub stdout: Output<'a>,
    pub stderr: Output<'a>,
    /// Descriptors that must stay open in the child
    pub inherit_fds: Vec<RawFd>,
    /// Child is killed if it is still alive after this period
    pub timeout: Option<Duration>,
}

impl Default for PipeRequest<'_> {
    fn default() -> Self {
        PipeRequest {
            stdin: Input::Null,
            stdout: Output::Null,
            stderr: Output::Null,
            inherit_fds: Vec::new(),
            timeout: None,
        }
    }
}

/// Per-stream accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamReport {
    /// Bytes that landed in the sink
    pub written: u64,
    /// Child produced more than `limit` bytes
    pub overflow: bool,
}

#[derive(Debug)]
pub struct PipeOutcome {
    pub status: ExitStatus,
    pub stdout: StreamReport,
    pub stderr: StreamReport,
}

impl PipeOutcome {
    pub fn overflow(&self) -> bool {
        self.stdout.overflow || self.stderr.overflow
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    #[error("failed to spawn {program}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("child was killed after {timeout:?}")]
    Expired {
        timeout: Duration,
        stdout: StreamReport,
        stderr: StreamReport,
    },
    #[error("i/o error while talking to child")]
    Io(#[from] io::Error),
    #[error("system call failed")]
    Sys(#[from] Errno),
}

fn make_nonblocking(fd: RawFd) -> Result<(), Errno> {
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

fn into_file(fd: impl IntoRawFd) -> File {
    // SAFETY: fd is freshly released by its previous owner
    unsafe { File::from_raw_fd(fd.into_raw_fd()) }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Reading side of one captured stream
struct Drain<'a> {
    pipe: Option<File>,
    sink: &'a mut dyn Write,
    limit: Option<u64>,
    report: StreamReport,
}

impl<'a> Drain<'a> {
    fn open(pipe: Option<impl IntoRawFd>, spec: Output<'a>) -> Result<Option<Drain<'a>>, PipeError> {
        let (sink, limit) = match spec {
            Output::Capture { sink, limit } => (sink, limit),
            _ => return Ok(None),
        };
        let pipe = match pipe {
            Some(p) => into_file(p),
            None => return Ok(None),
        };
        make_nonblocking(pipe.as_raw_fd())?;
        Ok(Some(Drain {
            pipe: Some(pipe),
            sink,
            limit,
            report: StreamReport::default(),
        }))
    }

    fn fd(&self) -> Option<RawFd> {
        self.pipe.as_ref().map(AsRawFd::as_raw_fd)
    }

    /// Services one readiness event with a single bounded read.
    fn pump(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let pipe = match &mut self.pipe {
            Some(p) => p,
            None => return Ok(()),
        };
        let room = match self.limit {
            Some(limit) => limit.saturating_sub(self.report.written),
            None => u64::MAX,
        };
        if room == 0 {
            let mut extra = [0; 1];
            match pipe.read(&mut extra) {
                Ok(0) => {}
                Ok(_) => self.report.overflow = true,
                Err(err) if is_transient(&err) => return Ok(()),
                Err(err) => return Err(err),
            }
            self.pipe = None;
            return Ok(());
        }
        let len = std::cmp::min(buf.len() as u64, room) as usize;
        match pipe.read(&mut buf[..len]) {
            Ok(0) => self.pipe = None,
            Ok(cnt) => {
                self.sink.write_all(&buf[..cnt])?;
                self.report.written += cnt as u64;
            }
            Err(err) if is_transient(&err) => {}
            Err(err) => return Err(err),
        }
        Ok(())
    }
}

/// Writing side of child's stdin
struct Feeder<'a> {
    pipe: Option<File>,
    data: &'a [u8],
}

impl<'a> Feeder<'a> {
    fn open(pipe: Option<impl IntoRawFd>, data: &'a [u8]) -> Result<Feeder<'a>, PipeError> {
        let pipe = match pipe {
            Some(p) if !data.is_empty() => {
                let file = into_file(p);
                make_nonblocking(file.as_raw_fd())?;
                Some(file)
            }
            // dropping the pipe gives child EOF at once
            _ => None,
        };
        Ok(Feeder { pipe, data })
    }

    fn fd(&self) -> Option<RawFd> {
        self.pipe.as_ref().map(AsRawFd::as_raw_fd)
    }

    fn pump(&mut self) -> io::Result<()> {
        let pipe = match &mut self.pipe {
            Some(p) => p,
            None => return Ok(()),
        };
        let len = std::cmp::min(self.data.len(), PIPE_WRITE_CHUNK);
        match pipe.write(&self.data[..len]) {
            Ok(cnt) => self.data = &self.data[cnt..],
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                debug!("child closed stdin with {} bytes unsent", self.data.len());
                self.data = &[];
            }
            Err(err) if is_transient(&err) => {}
            Err(err) => return Err(err),
        }
        if self.data.is_empty() {
            self.pipe = None;
        }
        Ok(())
    }
}

fn report(drains: &[Option<Drain<'_>>; 2], i: usize) -> StreamReport {
    drains[i].as_ref().map(|d| d.report).unwrap_or_default()
}

#[derive(Clone, Copy)]
enum Slot {
    Stdin,
    Out(usize),
}

fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|d| d.saturating_duration_since(Instant::now()))
}

fn kill(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!("kill failed (child probably exited): {}", err);
    }
    if let Err(err) = child.wait() {
        debug!("failed to reap killed child: {}", err);
    }
}

/// Waits for child, killing it when deadline passes.
/// Returns None if child was killed.
fn wait_child(child: &mut Child, deadline: Option<Instant>) -> io::Result<Option<ExitStatus>> {
    let deadline = match deadline {
        Some(d) => d,
        None => return child.wait().map(Some),
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            kill(child);
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Runs `cmd` to completion according to `req`.
///
/// Stdio settings of `cmd` are overridden.
pub fn run_with_pipes(cmd: &mut Command, req: PipeRequest<'_>) -> Result<PipeOutcome, PipeError> {
    let PipeRequest {
        stdin,
        stdout,
        stderr,
        inherit_fds,
        timeout,
    } = req;

    let mut input: &[u8] = &[];
    match stdin {
        Input::Null => cmd.stdin(Stdio::null()),
        Input::File(file) => cmd.stdin(Stdio::from(file)),
        Input::Bytes(data) => {
            input = data;
            cmd.stdin(Stdio::piped())
        }
    };
    cmd.stdout(stdout.stdio());
    cmd.stderr(stderr.stdio());
    if !inherit_fds.is_empty() {
        // SAFETY: hook only calls fcntl, which is async-signal-safe
        unsafe {
            cmd.pre_exec(move || {
                for &fd in &inherit_fds {
                    fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty()))?;
                }
                Ok(())
            });
        }
    }

    let mut child = cmd.spawn().map_err(|source| PipeError::Spawn {
        program: cmd.get_program().to_string_lossy().into_owned(),
        source,
    })?;
    let deadline = timeout.map(|t| Instant::now() + t);

    let mut feeder = Feeder::open(child.stdin.take(), input)?;
    let mut drains = [
        Drain::open(child.stdout.take(), stdout)?,
        Drain::open(child.stderr.take(), stderr)?,
    ];
    let mut buf = vec![0; PIPE_BUFFER_SIZE];
    loop {
        let mut fds = Vec::with_capacity(3);
        let mut slots = Vec::with_capacity(3);
        if let Some(fd) = feeder.fd() {
            fds.push(PollFd::new(fd, PollFlags::POLLOUT));
            slots.push(Slot::Stdin);
        }
        for (i, drain) in drains.iter().enumerate() {
            if let Some(fd) = drain.as_ref().and_then(Drain::fd) {
                fds.push(PollFd::new(fd, PollFlags::POLLIN));
                slots.push(Slot::Out(i));
            }
        }
        if fds.is_empty() {
            break;
        }
        let wait_ms = match remaining(deadline) {
            None => -1,
            Some(left) if left == Duration::from_secs(0) => {
                kill(&mut child);
                return Err(PipeError::Expired {
                    timeout: timeout.unwrap_or_default(),
                    stdout: report(&drains, 0),
                    stderr: report(&drains, 1),
                });
            }
            Some(left) => std::cmp::min(left.as_millis(), i32::MAX as u128) as i32,
        };
        match poll(&mut fds, wait_ms) {
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(err) => {
                kill(&mut child);
                return Err(err.into());
            }
        }
        for (pfd, slot) in fds.iter().zip(slots) {
            let ready = pfd.revents().map_or(false, |ev| !ev.is_empty());
            if !ready {
                continue;
            }
            let res = match slot {
                Slot::Stdin => feeder.pump(),
                Slot::Out(i) => match &mut drains[i] {
                    Some(drain) => drain.pump(&mut buf),
                    None => Ok(()),
                },
            };
            if let Err(err) = res {
                kill(&mut child);
                return Err(err.into());
            }
        }
    }

    let stdout = report(&drains, 0);
    let stderr = report(&drains, 1);
    drop(drains);
    drop(feeder);
    match wait_child(&mut child, deadline)? {
        Some(status) => Ok(PipeOutcome {
            status,
            stdout,
            stderr,
        }),
        None => Err(PipeError::Expired {
            timeout: timeout.unwrap_or_default(),
            stdout,
            stderr,
        }),
    }
}

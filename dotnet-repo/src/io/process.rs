//! Process execution engine.
//!
//! Every run gets three helper threads: one line reader per output pipe and
//! one exit watcher. The readers start right after spawn, before anything
//! waits on the child, so a child filling either pipe can never deadlock
//! against a parent blocked on exit. Whichever of the three finishes last
//! settles the run and fulfills its [`Completion`] exactly once. A cancelled
//! or timed-out run settles as soon as the child is killed.

use std::io::{self, BufRead, BufReader, Read};
use std::panic::{self, AssertUnwindSafe};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::io::cancel::CancelToken;
use crate::io::completion::Completion;
use crate::io::invocation::{Invocation, LineSink};

/// How often the exit watcher checks for cancellation or an expired deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exit code reported when the OS provides none (e.g. killed by a signal).
const UNKNOWN_EXIT_CODE: i32 = -1;

/// Outcome of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout_lines: Vec<String>,
    pub stderr_lines: Vec<String>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("unable to locate '{name}' on the system PATH")]
    ToolNotFound { name: String },
    #[error("failed to start '{command_line}': {source}")]
    StartFailure {
        command_line: String,
        #[source]
        source: io::Error,
    },
    #[error("command '{command_line}' failed with exit code {exit_code}")]
    NonZeroExit { exit_code: i32, command_line: String },
    #[error("command '{command_line}' was cancelled")]
    Cancelled { command_line: String },
    #[error("command '{command_line}' timed out after {timeout:?}")]
    TimedOut {
        command_line: String,
        timeout: Duration,
    },
    #[error("i/o error while running '{command_line}': {source}")]
    Io {
        command_line: String,
        #[source]
        source: io::Error,
    },
}

/// Lifecycle of a started run, as seen through [`RunningProcess::state`].
///
/// The two pre-running states have no variant: `NotStarted` is an
/// [`Invocation`] not yet passed to [`ProcessRunner::start`], and `StartFailed`
/// is `Err(ProcessError::StartFailure)` from `start`, which never reaches
/// `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Running,
    /// Exit code 0.
    Succeeded,
    /// Non-zero exit, whether reported as a result or as `NonZeroExit`.
    FailedExit,
    Cancelled,
    TimedOut,
    /// Stream or wait failure after the process started.
    Errored,
}

pub type Outcome = Result<ExecutionResult, ProcessError>;

/// Handle to a process that the OS has confirmed as started.
#[derive(Debug)]
pub struct RunningProcess {
    pid: u32,
    command_line: String,
    completion: Arc<Completion<Outcome>>,
}

impl RunningProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn is_finished(&self) -> bool {
        self.completion.is_fulfilled()
    }

    pub fn state(&self) -> ExecState {
        self.completion
            .peek(classify)
            .unwrap_or(ExecState::Running)
    }

    /// Block until the process exited and both output streams are drained.
    pub fn wait(self) -> Outcome {
        self.completion.wait()
    }
}

fn classify(outcome: &Outcome) -> ExecState {
    match outcome {
        Ok(result) if result.success() => ExecState::Succeeded,
        Ok(_) | Err(ProcessError::NonZeroExit { .. }) => ExecState::FailedExit,
        Err(ProcessError::Cancelled { .. }) => ExecState::Cancelled,
        Err(ProcessError::TimedOut { .. }) => ExecState::TimedOut,
        Err(_) => ExecState::Errored,
    }
}

/// Spawns invocations. Holds no per-run state; one runner can serve any
/// number of concurrent runs.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    default_timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeout applied to invocations that do not set their own.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Run `invocation` and wait for its single outcome.
    pub fn execute(&self, invocation: &Invocation) -> Outcome {
        self.start(invocation)?.wait()
    }

    /// Spawn `invocation` and return once the OS confirmed the process exists.
    #[instrument(skip_all, fields(program = %invocation.tool().name()))]
    pub fn start(&self, invocation: &Invocation) -> Result<RunningProcess, ProcessError> {
        let snapshot = invocation.clone();
        let command_line = snapshot.command_line();
        let timeout = snapshot.timeout_duration().or(self.default_timeout);
        let cancel = snapshot.cancel_token().cloned();

        if cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            debug!(command = %command_line, "cancelled before start");
            return Err(ProcessError::Cancelled { command_line });
        }

        info!("Running '{command_line}'");
        let mut child = build_command(&snapshot).spawn().map_err(|source| {
            error!(err = %source, command = %command_line, "failed to spawn command");
            ProcessError::StartFailure {
                command_line: command_line.clone(),
                source,
            }
        })?;
        let pid = child.id();

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                reap(&mut child);
                return Err(ProcessError::Io {
                    command_line,
                    source: io::Error::other("stdout/stderr were not piped"),
                });
            }
        };

        let completion = Arc::new(Completion::new());
        let tracker = Arc::new(Tracker::new(
            command_line.clone(),
            snapshot.fails_on_non_zero_exit(),
            timeout,
            completion.clone(),
        ));

        spawn_reader(Stream::Stdout, stdout, snapshot.stdout_sink().cloned(), &tracker);
        spawn_reader(Stream::Stderr, stderr, snapshot.stderr_sink().cloned(), &tracker);

        let deadline = timeout.map(|t| Instant::now() + t);
        let watcher = tracker.clone();
        thread::spawn(move || {
            let event = watch_exit(child, cancel.as_ref(), deadline);
            watcher.arrive(Arrival::Exit(event));
        });

        debug!(pid, "process started");
        Ok(RunningProcess {
            pid,
            command_line,
            completion,
        })
    }
}

fn build_command(invocation: &Invocation) -> Command {
    let tool = invocation.tool();
    let mut cmd = if tool.launch_via_shell() {
        let mut shell = shell_command();
        shell.arg(tool.path());
        shell
    } else {
        Command::new(tool.path())
    };
    cmd.args(invocation.arguments())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = invocation.working_dir() {
        cmd.current_dir(dir);
    }
    cmd
}

#[cfg(windows)]
fn shell_command() -> Command {
    let comspec = std::env::var_os("ComSpec").unwrap_or_else(|| "cmd.exe".into());
    let mut cmd = Command::new(comspec);
    cmd.arg("/C");
    cmd
}

#[cfg(not(windows))]
fn shell_command() -> Command {
    Command::new("sh")
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn as_str(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

#[derive(Debug)]
enum ExitEvent {
    Exited(i32),
    Cancelled,
    TimedOut,
    WaitFailed(io::Error),
}

enum Arrival {
    Stdout(io::Result<Vec<String>>),
    Stderr(io::Result<Vec<String>>),
    Exit(ExitEvent),
}

#[derive(Default)]
struct Pending {
    stdout: Option<io::Result<Vec<String>>>,
    stderr: Option<io::Result<Vec<String>>>,
    exit: Option<ExitEvent>,
}

/// Collects the three independent end-of-run events of one process.
struct Tracker {
    command_line: String,
    fail_on_non_zero_exit: bool,
    timeout: Option<Duration>,
    pending: Mutex<Pending>,
    completion: Arc<Completion<Outcome>>,
}

impl Tracker {
    fn new(
        command_line: String,
        fail_on_non_zero_exit: bool,
        timeout: Option<Duration>,
        completion: Arc<Completion<Outcome>>,
    ) -> Self {
        Self {
            command_line,
            fail_on_non_zero_exit,
            timeout,
            pending: Mutex::new(Pending::default()),
            completion,
        }
    }

    fn arrive(&self, arrival: Arrival) {
        // A killed child may leave grandchildren holding the pipes open, so an
        // interrupted run settles without waiting for the readers.
        let arrival = match arrival {
            Arrival::Exit(event @ (ExitEvent::Cancelled | ExitEvent::TimedOut)) => {
                let outcome = self.settle(Ok(Vec::new()), Ok(Vec::new()), event);
                self.finish(outcome);
                return;
            }
            other => other,
        };

        let ready = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            match arrival {
                Arrival::Stdout(lines) => pending.stdout = Some(lines),
                Arrival::Stderr(lines) => pending.stderr = Some(lines),
                Arrival::Exit(event) => pending.exit = Some(event),
            }
            if pending.stdout.is_some() && pending.stderr.is_some() && pending.exit.is_some() {
                Some(std::mem::take(&mut *pending))
            } else {
                None
            }
        };

        if let Some(Pending {
            stdout: Some(stdout),
            stderr: Some(stderr),
            exit: Some(exit),
        }) = ready
        {
            let outcome = self.settle(stdout, stderr, exit);
            self.finish(outcome);
        }
    }

    fn finish(&self, outcome: Outcome) {
        if !self.completion.fulfill(outcome) {
            debug!(command = %self.command_line, "completion already fulfilled");
        }
    }

    fn settle(
        &self,
        stdout: io::Result<Vec<String>>,
        stderr: io::Result<Vec<String>>,
        exit: ExitEvent,
    ) -> Outcome {
        let command_line = self.command_line.clone();
        let exit_code = match exit {
            ExitEvent::Exited(code) => code,
            ExitEvent::Cancelled => return Err(ProcessError::Cancelled { command_line }),
            ExitEvent::TimedOut => {
                return Err(ProcessError::TimedOut {
                    command_line,
                    timeout: self.timeout.unwrap_or_default(),
                });
            }
            ExitEvent::WaitFailed(source) => {
                return Err(ProcessError::Io {
                    command_line,
                    source,
                });
            }
        };

        let stdout_lines = stdout.map_err(|source| ProcessError::Io {
            command_line: command_line.clone(),
            source,
        })?;
        let stderr_lines = stderr.map_err(|source| ProcessError::Io {
            command_line: command_line.clone(),
            source,
        })?;

        debug!("'{command_line}' exited with code {exit_code}");
        if exit_code != 0 && self.fail_on_non_zero_exit {
            return Err(ProcessError::NonZeroExit {
                exit_code,
                command_line,
            });
        }
        Ok(ExecutionResult {
            exit_code,
            stdout_lines,
            stderr_lines,
        })
    }
}

fn spawn_reader<R>(stream: Stream, pipe: R, sink: Option<LineSink>, tracker: &Arc<Tracker>)
where
    R: Read + Send + 'static,
{
    let tracker = tracker.clone();
    thread::spawn(move || {
        let lines = panic::catch_unwind(AssertUnwindSafe(|| read_lines(stream, pipe, sink)))
            .unwrap_or_else(|_| Err(io::Error::other("output line handler panicked")));
        if let Err(err) = &lines {
            warn!(stream = stream.as_str(), err = %err, "output reader failed");
        }
        tracker.arrive(match stream {
            Stream::Stdout => Arrival::Stdout(lines),
            Stream::Stderr => Arrival::Stderr(lines),
        });
    });
}

/// Read `pipe` to end of stream, one line at a time.
///
/// Each line is buffered, handed to `sink`, then logged, before the next line
/// is read.
fn read_lines<R: Read>(
    stream: Stream,
    pipe: R,
    sink: Option<LineSink>,
) -> io::Result<Vec<String>> {
    let mut reader = BufReader::new(pipe);
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        lines.push(decode_line(&buf));
        if let Some(line) = lines.last() {
            if let Some(sink) = &sink {
                sink(line.as_str());
            }
            debug!(stream = stream.as_str(), "{line}");
        }
    }
    Ok(lines)
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

fn watch_exit(
    mut child: Child,
    cancel: Option<&CancelToken>,
    deadline: Option<Instant>,
) -> ExitEvent {
    if cancel.is_none() && deadline.is_none() {
        return match child.wait() {
            Ok(status) => ExitEvent::Exited(status.code().unwrap_or(UNKNOWN_EXIT_CODE)),
            Err(err) => ExitEvent::WaitFailed(err),
        };
    }

    loop {
        match child.wait_timeout(POLL_INTERVAL) {
            Ok(Some(status)) => {
                return ExitEvent::Exited(status.code().unwrap_or(UNKNOWN_EXIT_CODE));
            }
            Ok(None) => {}
            Err(err) => return ExitEvent::WaitFailed(err),
        }
        if cancel.is_some_and(CancelToken::is_cancelled) {
            warn!(pid = child.id(), "cancellation requested, killing");
            reap(&mut child);
            return ExitEvent::Cancelled;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            warn!(pid = child.id(), "command timed out, killing");
            reap(&mut child);
            return ExitEvent::TimedOut;
        }
    }
}

fn reap(child: &mut Child) {
    if let Err(err) = child.kill() {
        warn!(err = %err, "failed to kill child process");
    }
    if let Err(err) = child.wait() {
        warn!(err = %err, "failed to wait for killed child process");
    }
}

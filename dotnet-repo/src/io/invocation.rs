//! Description of a single process run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::core::command_line::format_command_line;
use crate::io::cancel::CancelToken;
use crate::io::tool::Tool;

/// Per-line output callback. Invoked on a reader thread.
pub type LineSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Builder-style description of one process run.
///
/// The engine clones the invocation when the run starts, so changes made to a
/// builder afterwards never reach a process that is already running.
#[derive(Clone)]
pub struct Invocation {
    tool: Tool,
    arguments: Vec<String>,
    working_dir: Option<PathBuf>,
    on_stdout: Option<LineSink>,
    on_stderr: Option<LineSink>,
    fail_on_non_zero_exit: bool,
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
}

impl Invocation {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            arguments: Vec::new(),
            working_dir: None,
            on_stdout: None,
            on_stderr: None,
            fail_on_non_zero_exit: false,
            timeout: None,
            cancel: None,
        }
    }

    pub fn arg(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn args<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    /// Run in `dir` instead of the current working directory.
    pub fn in_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn on_stdout_line<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_stdout = Some(Arc::new(sink));
        self
    }

    pub fn on_stderr_line<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_stderr = Some(Arc::new(sink));
        self
    }

    /// Report a non-zero exit as `ProcessError::NonZeroExit` instead of a result.
    pub fn fail_on_non_zero_exit(mut self) -> Self {
        self.fail_on_non_zero_exit = true;
        self
    }

    /// Kill the process if it is still running after `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Kill the process once `token` is cancelled.
    pub fn cancel_on(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }

    /// `cancel_on` for callers that may or may not hold a token.
    pub fn cancel_on_opt(self, token: Option<&CancelToken>) -> Self {
        match token {
            Some(token) => self.cancel_on(token),
            None => self,
        }
    }

    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn stdout_sink(&self) -> Option<&LineSink> {
        self.on_stdout.as_ref()
    }

    pub fn stderr_sink(&self) -> Option<&LineSink> {
        self.on_stderr.as_ref()
    }

    pub fn fails_on_non_zero_exit(&self) -> bool {
        self.fail_on_non_zero_exit
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    /// Display form used in logs and failures, e.g. `git "commit" "-F" "msg.txt"`.
    pub fn command_line(&self) -> String {
        format_command_line(self.tool.path(), &self.arguments)
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("tool", &self.tool)
            .field("arguments", &self.arguments)
            .field("working_dir", &self.working_dir)
            .field("on_stdout", &self.on_stdout.is_some())
            .field("on_stderr", &self.on_stderr.is_some())
            .field("fail_on_non_zero_exit", &self.fail_on_non_zero_exit)
            .field("timeout", &self.timeout)
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

//! Per-platform executable candidates probed by the tool locator.

/// How a located executable must be launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Native executable, spawned directly.
    Direct,
    /// Script launcher (`.cmd`/`.bat`, or a plain script), spawned through the shell.
    Shell,
}

/// One filename pattern to test inside a search-path directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub suffix: &'static str,
    pub launch: LaunchMode,
}

impl Candidate {
    pub fn file_name(&self, name: &str) -> String {
        format!("{name}{}", self.suffix)
    }
}

/// Platform families that differ in how executables are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Distinguishes native executables from script launchers by extension.
    Windows,
    /// A tool is a file named exactly after it.
    Unix,
}

const WINDOWS_CANDIDATES: &[Candidate] = &[
    Candidate {
        suffix: ".exe",
        launch: LaunchMode::Direct,
    },
    Candidate {
        suffix: ".cmd",
        launch: LaunchMode::Shell,
    },
    Candidate {
        suffix: ".bat",
        launch: LaunchMode::Shell,
    },
];

const UNIX_CANDIDATES: &[Candidate] = &[Candidate {
    suffix: "",
    launch: LaunchMode::Direct,
}];

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    /// Candidates in priority order.
    pub fn candidates(self) -> &'static [Candidate] {
        match self {
            Platform::Windows => WINDOWS_CANDIDATES,
            Platform::Unix => UNIX_CANDIDATES,
        }
    }
}

//! Locating external tools on the search path.

use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::core::candidates::{LaunchMode, Platform};
use crate::core::command_line::program_name;
use crate::io::invocation::Invocation;
use crate::io::process::ProcessError;

/// A resolved, runnable executable.
///
/// The path is never re-validated after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    path: PathBuf,
    launch: LaunchMode,
}

impl Tool {
    pub fn new(path: impl Into<PathBuf>, launch: LaunchMode) -> Self {
        Self {
            path: path.into(),
            launch,
        }
    }

    /// A tool spawned directly, bypassing the locator.
    pub fn direct(path: impl Into<PathBuf>) -> Self {
        Self::new(path, LaunchMode::Direct)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn launch_mode(&self) -> LaunchMode {
        self.launch
    }

    pub fn launch_via_shell(&self) -> bool {
        self.launch == LaunchMode::Shell
    }

    /// Program name without directory or extension.
    pub fn name(&self) -> String {
        program_name(&self.path)
    }

    /// Start building an invocation of this tool with `arguments`.
    pub fn invocation<I, S>(&self, arguments: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new(self.clone()).args(arguments)
    }
}

/// Resolves tool names against an ordered list of directories.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    search_path: Vec<PathBuf>,
    platform: Platform,
}

impl ToolLocator {
    pub fn new(search_path: Vec<PathBuf>, platform: Platform) -> Self {
        Self {
            search_path,
            platform,
        }
    }

    /// Snapshot the `PATH` of the current process.
    pub fn from_env() -> Self {
        let search_path = env::var_os("PATH")
            .map(|raw| env::split_paths(&raw).collect())
            .unwrap_or_default();
        Self::new(search_path, Platform::current())
    }

    /// Find `name` in the first directory that holds any candidate for it.
    ///
    /// Within a directory, candidates are tried in platform priority order.
    /// Returns `None` when nothing matches.
    #[instrument(skip(self), fields(platform = ?self.platform))]
    pub fn locate(&self, name: &str) -> Option<Tool> {
        for dir in &self.search_path {
            // Empty entries would resolve relative to the working directory.
            if dir.as_os_str().is_empty() {
                continue;
            }
            for candidate in self.platform.candidates() {
                let path = dir.join(candidate.file_name(name));
                if path.is_file() {
                    debug!(path = %path.display(), launch = ?candidate.launch, "located tool");
                    return Some(Tool::new(path, candidate.launch));
                }
            }
        }
        debug!("tool not found on search path");
        None
    }
}

/// Locate `name` using the process `PATH` as it is right now.
pub fn locate(name: &str) -> Option<Tool> {
    ToolLocator::from_env().locate(name)
}

/// The external tools the scaffolder depends on, located once.
#[derive(Debug, Clone)]
pub struct ToolSet {
    dotnet: Option<Tool>,
    git: Option<Tool>,
}

impl ToolSet {
    pub fn locate(locator: &ToolLocator) -> Self {
        Self {
            dotnet: locator.locate("dotnet"),
            git: locator.locate("git"),
        }
    }

    pub fn dotnet(&self) -> Result<&Tool, ProcessError> {
        self.dotnet.as_ref().ok_or_else(|| ProcessError::ToolNotFound {
            name: "dotnet".to_string(),
        })
    }

    pub fn git(&self) -> Option<&Tool> {
        self.git.as_ref()
    }
}

//! Version control for freshly scaffolded repositories.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::cancel::CancelToken;
use crate::io::process::{ProcessError, ProcessRunner};
use crate::io::templates::{Template, TemplateStore};
use crate::io::tool::{Tool, ToolSet};

/// Name that disables version control.
pub const NONE: &str = "none";
pub const GIT: &str = "git";

/// A version control backend.
#[derive(Debug, Clone)]
pub enum VersionControl {
    /// Git, through the `git` CLI. `None` when git is not installed.
    Git(Option<Tool>),
    /// Version control disabled; every operation succeeds without effect.
    NoOp,
}

impl VersionControl {
    /// Pick a backend by name.
    ///
    /// An uninstalled git degrades to [`VersionControl::NoOp`] with a warning;
    /// an unknown name is an error.
    pub fn resolve(name: &str, tools: &ToolSet) -> Result<Self> {
        let vcs = match name {
            GIT => VersionControl::Git(tools.git().cloned()),
            NONE => VersionControl::NoOp,
            other => return Err(anyhow!("Unknown version control system: {other}")),
        };
        if !vcs.is_installed() {
            warn!("Version control system '{name}' is not installed.");
            return Ok(VersionControl::NoOp);
        }
        Ok(vcs)
    }

    pub fn name(&self) -> &'static str {
        match self {
            VersionControl::Git(_) => GIT,
            VersionControl::NoOp => NONE,
        }
    }

    pub fn is_installed(&self) -> bool {
        match self {
            VersionControl::Git(tool) => tool.is_some(),
            VersionControl::NoOp => true,
        }
    }

    /// Create a repository in `root` and drop the `.gitignore` template.
    ///
    /// Returns `Ok(false)` when the backend refused to initialize (non-zero
    /// exit); nothing else is written in that case.
    #[instrument(skip_all, fields(vcs = self.name(), root = %root.display()))]
    pub fn initialize(
        &self,
        root: &Path,
        runner: &ProcessRunner,
        templates: &TemplateStore,
        cancel: Option<&CancelToken>,
    ) -> Result<bool> {
        let git = match self {
            VersionControl::NoOp => return Ok(true),
            VersionControl::Git(git) => require_git(git.as_ref())?,
        };

        let init = git
            .invocation(["init"])
            .in_directory(root)
            .cancel_on_opt(cancel);
        let result = runner.execute(&init)?;
        if !result.success() {
            warn!(exit_code = result.exit_code, "git init failed");
            return Ok(false);
        }

        let gitignore = root.join(".gitignore");
        fs::write(&gitignore, templates.raw(Template::GitIgnore))
            .with_context(|| format!("write file {}", gitignore.display()))?;
        debug!(path = %gitignore.display(), "wrote .gitignore");
        Ok(true)
    }

    /// Commit in `root` with `message`, staging everything first when `add_all`.
    ///
    /// The message goes through a temporary file (`git commit -F`) so it is not
    /// subject to command-line length or newline quoting limits. The file is
    /// removed on every exit path.
    #[instrument(skip_all, fields(vcs = self.name(), root = %root.display(), add_all))]
    pub fn commit(
        &self,
        root: &Path,
        message: &str,
        add_all: bool,
        runner: &ProcessRunner,
        cancel: Option<&CancelToken>,
    ) -> Result<()> {
        let git = match self {
            VersionControl::NoOp => return Ok(()),
            VersionControl::Git(git) => require_git(git.as_ref())?,
        };

        let mut message_file = tempfile::Builder::new()
            .prefix("dotnet-repo-commit-")
            .suffix(".txt")
            .tempfile()
            .context("create commit message file")?;
        message_file
            .write_all(message.as_bytes())
            .context("write commit message file")?;
        message_file.flush().context("flush commit message file")?;
        debug!(path = %message_file.path().display(), "wrote commit message");

        if add_all {
            let add = git
                .invocation(["add", "-A"])
                .in_directory(root)
                .fail_on_non_zero_exit()
                .cancel_on_opt(cancel);
            runner.execute(&add)?;
        }

        let commit = git
            .invocation(["commit", "-F"])
            .arg(message_file.path().display().to_string())
            .in_directory(root)
            .fail_on_non_zero_exit()
            .cancel_on_opt(cancel);
        runner.execute(&commit)?;
        info!("Committed '{}'", message.lines().next().unwrap_or_default());
        Ok(())
    }
}

fn require_git(git: Option<&Tool>) -> Result<&Tool, ProcessError> {
    git.ok_or_else(|| ProcessError::ToolNotFound {
        name: GIT.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::candidates::Platform;
    use crate::io::tool::ToolLocator;

    fn empty_tool_set() -> (tempfile::TempDir, ToolSet) {
        let temp = tempfile::tempdir().expect("tempdir");
        let tools = ToolSet::locate(&ToolLocator::new(
            vec![temp.path().to_path_buf()],
            Platform::Unix,
        ));
        (temp, tools)
    }

    #[test]
    fn resolve_rejects_unknown_system() {
        let (_temp, tools) = empty_tool_set();
        let err = VersionControl::resolve("svn", &tools).unwrap_err();
        assert!(err.to_string().contains("Unknown version control system: svn"));
    }

    #[test]
    fn resolve_falls_back_to_no_op_when_git_is_missing() {
        let (_temp, tools) = empty_tool_set();
        let vcs = VersionControl::resolve("git", &tools).expect("resolve");
        assert!(matches!(vcs, VersionControl::NoOp));
        assert_eq!(vcs.name(), "none");
    }

    #[test]
    fn no_op_does_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let templates = TemplateStore::embedded().expect("store");
        let runner = ProcessRunner::new();
        let vcs = VersionControl::NoOp;

        assert!(vcs.is_installed());
        assert!(
            vcs.initialize(temp.path(), &runner, &templates, None)
                .expect("initialize")
        );
        vcs.commit(temp.path(), "msg", true, &runner, None)
            .expect("commit");
        assert_eq!(fs::read_dir(temp.path()).expect("read dir").count(), 0);
    }

    #[test]
    fn uninstalled_git_reports_tool_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = VersionControl::Git(None)
            .commit(temp.path(), "msg", false, &ProcessRunner::new(), None)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProcessError>(),
            Some(ProcessError::ToolNotFound { .. })
        ));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use crate::test_support::FakeTools;

        /// Records each call; `commit -F <file>` also records the message file
        /// path and its content.
        const FAKE_GIT: &str = r#"
if [ "$1" = "commit" ]; then
  echo "file:$3" >> "$FAKE_TOOLS_DIR/git.files"
  cat "$3" >> "$FAKE_TOOLS_DIR/git.messages"
fi
"#;

        fn message_file(fake: &FakeTools) -> std::path::PathBuf {
            let files = fs::read_to_string(fake.dir().join("git.files")).expect("files log");
            let line = files.lines().next().expect("one commit");
            std::path::PathBuf::from(line.trim_start_matches("file:"))
        }

        #[test]
        fn commit_stages_before_committing_and_removes_message_file() {
            let fake = FakeTools::new().expect("fake tools");
            let git = fake.install("git", FAKE_GIT).expect("install");
            let repo = tempfile::tempdir().expect("tempdir");

            VersionControl::Git(Some(git))
                .commit(
                    repo.path(),
                    "Initial template\n\nBody line",
                    true,
                    &ProcessRunner::new(),
                    None,
                )
                .expect("commit");

            let calls = fake.calls("git").expect("calls");
            assert_eq!(calls.len(), 2);
            assert_eq!(calls[0], "add -A");
            assert!(calls[1].starts_with("commit -F "));

            let messages =
                fs::read_to_string(fake.dir().join("git.messages")).expect("messages log");
            assert_eq!(messages, "Initial template\n\nBody line");
            assert!(!message_file(&fake).exists());
        }

        #[test]
        fn commit_without_add_all_only_commits() {
            let fake = FakeTools::new().expect("fake tools");
            let git = fake.install("git", FAKE_GIT).expect("install");
            let repo = tempfile::tempdir().expect("tempdir");

            VersionControl::Git(Some(git))
                .commit(repo.path(), "msg", false, &ProcessRunner::new(), None)
                .expect("commit");

            let calls = fake.calls("git").expect("calls");
            assert_eq!(calls.len(), 1);
            assert!(calls[0].starts_with("commit -F "));
        }

        #[test]
        fn failed_commit_still_removes_message_file() {
            let fake = FakeTools::new().expect("fake tools");
            let body = format!("{FAKE_GIT}\n[ \"$1\" = \"commit\" ] && exit 1\nexit 0\n");
            let git = fake.install("git", &body).expect("install");
            let repo = tempfile::tempdir().expect("tempdir");

            let err = VersionControl::Git(Some(git))
                .commit(repo.path(), "msg", true, &ProcessRunner::new(), None)
                .unwrap_err();
            match err.downcast_ref::<ProcessError>() {
                Some(ProcessError::NonZeroExit {
                    exit_code,
                    command_line,
                }) => {
                    assert_eq!(*exit_code, 1);
                    assert!(command_line.starts_with("git \"commit\" \"-F\" \""));
                }
                other => panic!("unexpected error: {other:?}"),
            }
            assert!(!message_file(&fake).exists());
        }

        #[test]
        fn initialize_runs_git_init_and_writes_gitignore() {
            let fake = FakeTools::new().expect("fake tools");
            let git = fake.install("git", "").expect("install");
            let repo = tempfile::tempdir().expect("tempdir");
            let templates = TemplateStore::embedded().expect("store");

            let initialized = VersionControl::Git(Some(git))
                .initialize(repo.path(), &ProcessRunner::new(), &templates, None)
                .expect("initialize");

            assert!(initialized);
            assert_eq!(fake.calls("git").expect("calls"), vec!["init"]);
            let gitignore = fs::read_to_string(repo.path().join(".gitignore")).expect("read");
            assert_eq!(gitignore, templates.raw(Template::GitIgnore));
        }

        #[test]
        fn failed_init_skips_gitignore() {
            let fake = FakeTools::new().expect("fake tools");
            let git = fake.install("git", "exit 128").expect("install");
            let repo = tempfile::tempdir().expect("tempdir");
            let templates = TemplateStore::embedded().expect("store");

            let initialized = VersionControl::Git(Some(git))
                .initialize(repo.path(), &ProcessRunner::new(), &templates, None)
                .expect("initialize");

            assert!(!initialized);
            assert!(!repo.path().join(".gitignore").exists());
        }

        #[test]
        fn cancelled_token_stops_commit_before_any_git_call() {
            let fake = FakeTools::new().expect("fake tools");
            let git = fake.install("git", FAKE_GIT).expect("install");
            let repo = tempfile::tempdir().expect("tempdir");
            let token = CancelToken::new();
            token.cancel();

            let err = VersionControl::Git(Some(git))
                .commit(repo.path(), "msg", true, &ProcessRunner::new(), Some(&token))
                .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ProcessError>(),
                Some(ProcessError::Cancelled { .. })
            ));
            assert!(fake.calls("git").expect("calls").is_empty());
        }
    }
}

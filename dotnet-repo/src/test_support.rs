//! Test-only helpers: fake `dotnet`/`git` executables in a scratch directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::core::candidates::Platform;
use crate::io::tool::{Tool, ToolLocator};

/// A directory of shell-script stand-ins for external tools.
///
/// Every installed script appends its arguments (`$*`) as one line to
/// `<dir>/<name>.calls` before running its body, and sees its own directory
/// as `$FAKE_TOOLS_DIR`.
#[derive(Debug)]
pub struct FakeTools {
    dir: TempDir,
}

impl FakeTools {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create fake tools directory")?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// A locator that searches only the fake tools directory.
    pub fn locator(&self) -> ToolLocator {
        ToolLocator::new(vec![self.dir().to_path_buf()], Platform::Unix)
    }

    /// Install an executable script `name` running `body`.
    #[cfg(unix)]
    pub fn install(&self, name: &str, body: &str) -> Result<Tool> {
        use std::os::unix::fs::PermissionsExt;

        let path = self.dir().join(name);
        let script = format!(
            "#!/bin/sh\nFAKE_TOOLS_DIR='{dir}'\nprintf '%s\\n' \"$*\" >> \"$FAKE_TOOLS_DIR/{name}.calls\"\n{body}\n",
            dir = self.dir().display(),
        );
        fs::write(&path, script).with_context(|| format!("write {}", path.display()))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .with_context(|| format!("chmod {}", path.display()))?;
        Ok(Tool::direct(path))
    }

    /// Argument lines recorded by `name`, oldest first.
    pub fn calls(&self, name: &str) -> Result<Vec<String>> {
        let path = self.dir().join(format!("{name}.calls"));
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        Ok(raw.lines().map(str::to_string).collect())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::io::process::ProcessRunner;

    #[test]
    fn installed_tool_records_calls_and_is_locatable() {
        let fake = FakeTools::new().expect("fake tools");
        let tool = fake.install("dotnet", "echo ran").expect("install");
        assert_eq!(fake.locator().locate("dotnet").as_ref(), Some(&tool));

        let result = ProcessRunner::new()
            .execute(&tool.invocation(["new", "sln"]))
            .expect("execute");
        assert_eq!(result.stdout_lines, vec!["ran"]);
        assert_eq!(fake.calls("dotnet").expect("calls"), vec!["new sln"]);
        assert!(fake.calls("git").expect("calls").is_empty());
    }
}

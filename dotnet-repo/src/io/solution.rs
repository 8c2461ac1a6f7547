//! Solution and project scaffolding through the `dotnet` CLI.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::cancel::CancelToken;
use crate::io::process::ProcessRunner;
use crate::io::tool::Tool;

/// Drives `dotnet new` / `dotnet sln`.
#[derive(Debug)]
pub struct SolutionManager<'a> {
    dotnet: &'a Tool,
    runner: &'a ProcessRunner,
    cancel: Option<&'a CancelToken>,
}

impl<'a> SolutionManager<'a> {
    pub fn new(dotnet: &'a Tool, runner: &'a ProcessRunner) -> Self {
        Self {
            dotnet,
            runner,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: Option<&'a CancelToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Create an empty solution at `path`, which must end in `.sln`.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn create_solution(&self, path: &Path) -> Result<()> {
        if path.extension().is_none_or(|ext| ext != "sln") {
            return Err(anyhow!("solution path must end in '.sln': {}", path.display()));
        }
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .with_context(|| format!("solution path has no file name: {}", path.display()))?;
        let dir = parent_dir(path);

        let invocation = self
            .dotnet
            .invocation(["new", "sln", "--name", name.as_str()])
            .in_directory(dir)
            .fail_on_non_zero_exit()
            .cancel_on_opt(self.cancel);
        self.runner.execute(&invocation)?;
        Ok(())
    }

    /// Expand `template` into `<group>/<project>` next to the solution and add
    /// the project to the solution if a `.csproj` was produced.
    ///
    /// Returns the project file when it was added.
    #[instrument(skip_all, fields(group = project_group, project = project_name, template = template))]
    pub fn add_new_project(
        &self,
        solution_path: &Path,
        project_group: &str,
        project_name: &str,
        template: &str,
    ) -> Result<Option<PathBuf>> {
        let group_dir = parent_dir(solution_path).join(project_group);
        if !group_dir.exists() {
            debug!(directory = %group_dir.display(), "Creating directory");
            fs::create_dir_all(&group_dir)
                .with_context(|| format!("create directory {}", group_dir.display()))?;
        }

        info!("Creating project '{project_group}/{project_name}' using template '{template}'");
        let expand = self
            .dotnet
            .invocation(["new", template, "--name", project_name])
            .in_directory(&group_dir)
            .cancel_on_opt(self.cancel);
        let result = self.runner.execute(&expand)?;
        if !result.success() {
            warn!(exit_code = result.exit_code, "project template expansion failed");
        }

        // Only C# projects are wired into the solution.
        let project = group_dir
            .join(project_name)
            .join(format!("{project_name}.csproj"));
        if !project.is_file() {
            warn!(project = %project.display(), "no project file produced, not adding to solution");
            return Ok(None);
        }
        self.add_project(solution_path, &project)?;
        Ok(Some(project))
    }

    fn add_project(&self, solution_path: &Path, project: &Path) -> Result<()> {
        info!(
            "Adding '{}' to solution '{}'",
            project.display(),
            solution_path.display()
        );
        let invocation = self
            .dotnet
            .invocation([
                "sln".to_string(),
                solution_path.display().to_string(),
                "add".to_string(),
                project.display().to_string(),
            ])
            .fail_on_non_zero_exit()
            .cancel_on_opt(self.cancel);
        self.runner.execute(&invocation)?;
        Ok(())
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

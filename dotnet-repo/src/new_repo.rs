//! Orchestration for `dotnet-repo new`.
//!
//! Creating a repository: lay out a solution with a first project, install the
//! build system and its modules, then put everything under version control
//! with an initial commit.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

use crate::io::build::{
    SOURCE_LINK_MODULE, STRONG_NAME_MODULE, install_build_system, install_source_link_module,
    install_strong_name_module, module_dir,
};
use crate::io::cancel::CancelToken;
use crate::io::config::RepoConfig;
use crate::io::process::ProcessRunner;
use crate::io::solution::SolutionManager;
use crate::io::templates::TemplateStore;
use crate::io::tool::{ToolLocator, ToolSet};
use crate::io::vcs::VersionControl;

/// Arguments of `dotnet-repo new`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewOptions {
    pub name: String,
    /// Overrides `default_vcs` from the config.
    pub vcs: Option<String>,
    /// Repository root; `<cwd>/<name>` when absent.
    pub path: Option<PathBuf>,
}

/// Outcome of `dotnet-repo new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutcome {
    pub root: PathBuf,
    pub solution: PathBuf,
    /// First project, when the template produced one and it joined the solution.
    pub project: Option<PathBuf>,
    pub vcs: &'static str,
    pub committed: bool,
}

/// Everything the command needs, built once by the binary.
#[derive(Debug)]
pub struct Services {
    pub config: RepoConfig,
    pub templates: TemplateStore,
    pub tools: ToolSet,
    pub runner: ProcessRunner,
    /// Forwarded to every invocation. `None` lets runs without a timeout
    /// block on exit instead of polling.
    pub cancel: Option<CancelToken>,
}

impl Services {
    pub fn new(config: RepoConfig, locator: &ToolLocator) -> Result<Self> {
        let templates = TemplateStore::embedded()?;
        let tools = ToolSet::locate(locator);
        let runner = ProcessRunner::new().with_default_timeout(config.process.timeout());
        Ok(Self {
            config,
            templates,
            tools,
            runner,
            cancel: None,
        })
    }
}

/// Create a new repository named `options.name`.
///
/// Fails before touching the filesystem when `dotnet` is missing, the version
/// control system is unknown, or the target directory already exists.
#[instrument(skip_all, fields(name = %options.name))]
pub fn create_repository(
    services: &Services,
    options: &NewOptions,
    cwd: &Path,
) -> Result<NewOutcome> {
    let name = options.name.trim();
    if name.is_empty() {
        return Err(anyhow!("repository name must not be empty"));
    }

    let dotnet = services.tools.dotnet()?;
    let vcs_name = options
        .vcs
        .as_deref()
        .unwrap_or(services.config.default_vcs.as_str());
    let vcs = VersionControl::resolve(vcs_name, &services.tools)?;
    debug!(vcs = vcs.name(), dotnet = %dotnet.path().display(), "resolved tools");

    let root = match &options.path {
        Some(path) => cwd.join(path),
        None => cwd.join(name),
    };
    if root.exists() {
        return Err(anyhow!("Directory already exists: {}", root.display()));
    }

    info!("Creating .NET Project Repository at {}", root.display());
    fs::create_dir_all(&root).with_context(|| format!("create directory {}", root.display()))?;

    let solution = root.join(format!("{name}.sln"));
    let manager =
        SolutionManager::new(dotnet, &services.runner).with_cancel(services.cancel.as_ref());
    info!("Creating solution '{}'", solution.display());
    manager.create_solution(&solution)?;
    let project = manager.add_new_project(
        &solution,
        &services.config.project.group,
        name,
        &services.config.project.template,
    )?;

    install_build_system(&root, &services.templates)?;
    install_strong_name_module(
        &module_dir(&root, STRONG_NAME_MODULE),
        &services.templates,
        services.config.strong_name.key_bits,
    )?;
    install_source_link_module(
        &module_dir(&root, SOURCE_LINK_MODULE),
        &services.templates,
        &services.config.source_link,
    )?;

    let mut committed = false;
    if !matches!(vcs, VersionControl::NoOp) {
        info!("Initializing {} repository...", vcs.name());
        let initialized = vcs.initialize(
            &root,
            &services.runner,
            &services.templates,
            services.cancel.as_ref(),
        )?;
        if initialized {
            vcs.commit(
                &root,
                &services.config.initial_commit_message,
                true,
                &services.runner,
                services.cancel.as_ref(),
            )?;
            committed = true;
        }
    }

    info!("Repository created at {}", root.display());
    Ok(NewOutcome {
        root,
        solution,
        project,
        vcs: vcs.name(),
        committed,
    })
}

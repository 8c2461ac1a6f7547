//! Build configuration: root MSBuild files and the build modules under `build/modules/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use minijinja::context;
use tracing::{debug, info};

use crate::io::config::SourceLinkConfig;
use crate::io::signing::generate_strong_name_key;
use crate::io::templates::{Template, TemplateStore};

pub const STRONG_NAME_MODULE: &str = "StrongName";
pub const SOURCE_LINK_MODULE: &str = "SourceLink";

/// Directory of the build module `name` inside a repository.
pub fn module_dir(root: &Path, name: &str) -> PathBuf {
    root.join("build").join("modules").join(name)
}

/// Drop `Directory.Build.props` and `Directory.Build.targets` into `root`.
pub fn install_build_system(root: &Path, templates: &TemplateStore) -> Result<()> {
    info!("Installing build scripts...");
    write_file(
        &root.join("Directory.Build.props"),
        templates.raw(Template::DirectoryBuildProps).as_bytes(),
    )?;
    write_file(
        &root.join("Directory.Build.targets"),
        templates.raw(Template::DirectoryBuildTargets).as_bytes(),
    )
}

/// Install the strong naming module: props, README and a fresh signing key.
pub fn install_strong_name_module(
    module_dir: &Path,
    templates: &TemplateStore,
    key_bits: u32,
) -> Result<()> {
    info!("Installing Strong Naming build module...");
    create_dir(module_dir)?;

    debug!(key_bits, "Generating strong name key...");
    let key = generate_strong_name_key(key_bits)?;

    write_file(
        &module_dir.join("module.props"),
        templates.raw(Template::StrongNameModuleProps).as_bytes(),
    )?;
    write_file(
        &module_dir.join("README.md"),
        templates.raw(Template::StrongNameReadme).as_bytes(),
    )?;
    write_file(&module_dir.join("StrongNameKey.snk"), &key)
}

/// Install the SourceLink module with the configured package reference.
pub fn install_source_link_module(
    module_dir: &Path,
    templates: &TemplateStore,
    source_link: &SourceLinkConfig,
) -> Result<()> {
    info!("Installing SourceLink build module...");
    create_dir(module_dir)?;

    let props = templates.render(
        Template::SourceLinkModuleProps,
        context! {
            package_id => &source_link.package_id,
            package_version => &source_link.package_version,
        },
    )?;
    write_file(&module_dir.join("module.props"), props.as_bytes())
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

//! Scaffolder configuration loaded from `dotnet-repo.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

/// File looked up in the current directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "dotnet-repo.toml";

/// Scaffolder configuration (TOML).
///
/// Every field is optional in the file; missing fields take the defaults the
/// tool has always used.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RepoConfig {
    /// Version control system used when `--vcs` is not given.
    pub default_vcs: String,

    /// Message of the commit made right after scaffolding.
    pub initial_commit_message: String,

    pub project: ProjectConfig,
    pub strong_name: StrongNameConfig,
    pub source_link: SourceLinkConfig,
    pub process: ProcessConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectConfig {
    /// Directory (relative to the repository root) holding the first project.
    pub group: String,
    /// `dotnet new` template for the first project.
    pub template: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StrongNameConfig {
    pub key_bits: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceLinkConfig {
    pub package_id: String,
    pub package_version: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProcessConfig {
    /// Kill any external tool still running after this many seconds.
    pub timeout_secs: Option<u64>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_vcs: "git".to_string(),
            initial_commit_message: "Initial template".to_string(),
            project: ProjectConfig::default(),
            strong_name: StrongNameConfig::default(),
            source_link: SourceLinkConfig::default(),
            process: ProcessConfig::default(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            group: "src".to_string(),
            template: "classlib".to_string(),
        }
    }
}

impl Default for StrongNameConfig {
    fn default() -> Self {
        Self { key_bits: 4096 }
    }
}

impl Default for SourceLinkConfig {
    fn default() -> Self {
        Self {
            package_id: "Microsoft.SourceLink.GitHub".to_string(),
            package_version: "1.0.0-beta-63127-02".to_string(),
        }
    }
}

impl ProcessConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl RepoConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_vcs.trim().is_empty() {
            return Err(anyhow!("default_vcs must not be empty"));
        }
        if self.initial_commit_message.trim().is_empty() {
            return Err(anyhow!("initial_commit_message must not be empty"));
        }
        if self.project.group.trim().is_empty() {
            return Err(anyhow!("project.group must not be empty"));
        }
        if self.project.template.trim().is_empty() {
            return Err(anyhow!("project.template must not be empty"));
        }
        if self.strong_name.key_bits < 512 || self.strong_name.key_bits % 16 != 0 {
            return Err(anyhow!(
                "strong_name.key_bits must be a multiple of 16 and at least 512"
            ));
        }
        if self.source_link.package_id.trim().is_empty()
            || self.source_link.package_version.trim().is_empty()
        {
            return Err(anyhow!(
                "source_link.package_id and source_link.package_version must not be empty"
            ));
        }
        if self.process.timeout_secs == Some(0) {
            return Err(anyhow!("process.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RepoConfig::default()`.
pub fn load_config(path: &Path) -> Result<RepoConfig> {
    if !path.exists() {
        let cfg = RepoConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RepoConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RepoConfig::default());
        assert_eq!(cfg.strong_name.key_bits, 4096);
        assert_eq!(cfg.process.timeout(), None);
    }

    #[test]
    fn full_file_overrides_every_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"default_vcs = "none"
initial_commit_message = "Scaffold"

[project]
group = "lib"
template = "console"

[strong_name]
key_bits = 2048

[source_link]
package_id = "Microsoft.SourceLink.GitLab"
package_version = "8.0.0"

[process]
timeout_secs = 600
"#,
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(
            cfg,
            RepoConfig {
                default_vcs: "none".to_string(),
                initial_commit_message: "Scaffold".to_string(),
                project: ProjectConfig {
                    group: "lib".to_string(),
                    template: "console".to_string(),
                },
                strong_name: StrongNameConfig { key_bits: 2048 },
                source_link: SourceLinkConfig {
                    package_id: "Microsoft.SourceLink.GitLab".to_string(),
                    package_version: "8.0.0".to_string(),
                },
                process: ProcessConfig {
                    timeout_secs: Some(600),
                },
            }
        );
        assert_eq!(cfg.process.timeout(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("dotnet-repo.toml");
        fs::write(
            &path,
            "default_vcs = \"none\"\n\n[strong_name]\nkey_bits = 1024\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.default_vcs, "none");
        assert_eq!(cfg.strong_name.key_bits, 1024);
        assert_eq!(cfg.project, ProjectConfig::default());
        assert_eq!(cfg.initial_commit_message, "Initial template");
    }

    #[test]
    fn rejects_key_bits_not_multiple_of_16() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("dotnet-repo.toml");
        fs::write(&path, "[strong_name]\nkey_bits = 1000\n").expect("write");

        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("key_bits"));
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut cfg = RepoConfig::default();
        cfg.process.timeout_secs = Some(0);
        assert!(cfg.validate().is_err());
    }
}

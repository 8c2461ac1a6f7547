//! Embedded template store.
//!
//! Templates are compiled into the binary. A single [`TemplateStore`] is built
//! at startup and passed by reference to everything that writes them.

use anyhow::{Context, Result};
use minijinja::Environment;
use serde::Serialize;

/// Every template shipped with the scaffolder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    DirectoryBuildProps,
    DirectoryBuildTargets,
    StrongNameModuleProps,
    StrongNameReadme,
    SourceLinkModuleProps,
    GitIgnore,
}

impl Template {
    pub const ALL: [Template; 6] = [
        Template::DirectoryBuildProps,
        Template::DirectoryBuildTargets,
        Template::StrongNameModuleProps,
        Template::StrongNameReadme,
        Template::SourceLinkModuleProps,
        Template::GitIgnore,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Template::DirectoryBuildProps => "Directory.Build.props",
            Template::DirectoryBuildTargets => "Directory.Build.targets",
            Template::StrongNameModuleProps => "modules/StrongName/module.props",
            Template::StrongNameReadme => "modules/StrongName/README.md",
            Template::SourceLinkModuleProps => "modules/SourceLink/module.props",
            Template::GitIgnore => "VisualStudio.gitignore",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Template::DirectoryBuildProps => include_str!("templates/Directory.Build.props"),
            Template::DirectoryBuildTargets => include_str!("templates/Directory.Build.targets"),
            Template::StrongNameModuleProps => {
                include_str!("templates/modules/StrongName/module.props")
            }
            Template::StrongNameReadme => include_str!("templates/modules/StrongName/README.md"),
            Template::SourceLinkModuleProps => {
                include_str!("templates/modules/SourceLink/module.props")
            }
            Template::GitIgnore => include_str!("templates/VisualStudio.gitignore"),
        }
    }

    /// Templates with placeholders; the rest are written verbatim.
    fn is_rendered(self) -> bool {
        matches!(self, Template::SourceLinkModuleProps)
    }
}

/// Owns the embedded templates and the engine that renders placeholders.
#[derive(Debug)]
pub struct TemplateStore {
    env: Environment<'static>,
}

impl TemplateStore {
    /// Load the templates compiled into the binary.
    pub fn embedded() -> Result<Self> {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        for template in Template::ALL.into_iter().filter(|t| t.is_rendered()) {
            env.add_template(template.name(), template.source())
                .with_context(|| format!("compile template {}", template.name()))?;
        }
        Ok(Self { env })
    }

    /// Template content as shipped.
    pub fn raw(&self, template: Template) -> &'static str {
        template.source()
    }

    /// Render `template` with `ctx`. Verbatim templates are returned as-is.
    pub fn render<S: Serialize>(&self, template: Template, ctx: S) -> Result<String> {
        if !template.is_rendered() {
            return Ok(template.source().to_string());
        }
        let compiled = self
            .env
            .get_template(template.name())
            .with_context(|| format!("load template {}", template.name()))?;
        compiled
            .render(ctx)
            .with_context(|| format!("render template {}", template.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn every_template_is_non_empty() {
        let store = TemplateStore::embedded().expect("store");
        for template in Template::ALL {
            assert!(
                !store.raw(template).trim().is_empty(),
                "{} is empty",
                template.name()
            );
        }
    }

    #[test]
    fn source_link_placeholders_are_substituted() {
        let store = TemplateStore::embedded().expect("store");
        let rendered = store
            .render(
                Template::SourceLinkModuleProps,
                context! { package_id => "Microsoft.SourceLink.GitHub", package_version => "1.2.3" },
            )
            .expect("render");
        assert!(rendered.contains(
            "<PackageReference Include=\"Microsoft.SourceLink.GitHub\" Version=\"1.2.3\""
        ));
        assert!(!rendered.contains("{{"));
        assert!(rendered.ends_with('\n'));
    }

    #[test]
    fn verbatim_templates_render_unchanged() {
        let store = TemplateStore::embedded().expect("store");
        let rendered = store
            .render(Template::GitIgnore, context! {})
            .expect("render");
        assert_eq!(rendered, store.raw(Template::GitIgnore));
    }
}

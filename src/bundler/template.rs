//! Launcher template rendering.
//!
//! Launcher scripts are embedded at compile time and rendered with
//! Handlebars. HTML escaping is disabled since the output is shell/cmd text.

use crate::bundler::error::Result;
use crate::bundler::platform::LauncherTemplate;
use handlebars::Handlebars;
use serde::Serialize;

const SHELL_LAUNCHER: &str = include_str!("resources/launchers/launcher.sh.hbs");
const CMD_LAUNCHER: &str = include_str!("resources/launchers/launcher.cmd.hbs");

/// Variables available to launcher templates.
#[derive(Debug, Clone, Serialize)]
pub struct LauncherVars {
    /// Project name, used in the script header.
    pub project_name: String,
    /// Extra runtime flags, flattened into one space-separated string.
    pub flags: String,
}

impl LauncherVars {
    /// Flattens `flags` and captures the project name.
    pub fn new(project_name: &str, flags: &[String]) -> Self {
        Self {
            project_name: project_name.to_string(),
            flags: flags
                .iter()
                .map(|flag| flag.trim())
                .filter(|flag| !flag.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Renders launcher scripts.
pub trait TemplateRenderer: Send + Sync {
    /// Renders `template` with `vars`.
    fn render(&self, template: LauncherTemplate, vars: &LauncherVars) -> Result<String>;
}

/// [`TemplateRenderer`] over the embedded Handlebars templates.
#[derive(Debug)]
pub struct HandlebarsRenderer {
    registry: Handlebars<'static>,
}

impl HandlebarsRenderer {
    /// Registers the embedded launcher templates.
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_template_string(LauncherTemplate::Shell.name(), SHELL_LAUNCHER)?;
        registry.register_template_string(LauncherTemplate::Cmd.name(), CMD_LAUNCHER)?;
        Ok(Self { registry })
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn render(&self, template: LauncherTemplate, vars: &LauncherVars) -> Result<String> {
        Ok(self.registry.render(template.name(), vars)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_flattened() {
        let vars = LauncherVars::new(
            "app",
            &["--max-old-space-size=4096".to_string(), " ".to_string(), "--no-warnings".to_string()],
        );
        assert_eq!(vars.flags, "--max-old-space-size=4096 --no-warnings");
    }

    #[test]
    fn test_shell_launcher() {
        let renderer = HandlebarsRenderer::new().unwrap();
        let vars = LauncherVars::new("app", &["--enable-source-maps".to_string()]);
        let script = renderer.render(LauncherTemplate::Shell, &vars).unwrap();

        assert!(script.starts_with("#!/bin/sh"));
        assert!(script.contains(r#""$DIR/node" --enable-source-maps "$DIR/project" "$@""#));
    }

    #[test]
    fn test_cmd_launcher_keeps_quotes_unescaped() {
        let renderer = HandlebarsRenderer::new().unwrap();
        let vars = LauncherVars::new("app", &["--title=\"my app\"".to_string()]);
        let script = renderer.render(LauncherTemplate::Cmd, &vars).unwrap();

        assert!(script.starts_with("@echo off"));
        assert!(script.contains("node.exe"));
        assert!(script.contains("--title=\"my app\""));
        assert!(script.contains("%*"));
    }
}

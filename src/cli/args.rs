//! Command line argument parsing and validation.
//!
//! Every option has a default, so pointing the tool at a project directory
//! is enough to bundle it for the host platform.

use crate::bundler::{
    BundlerOptions, DEFAULT_COPY_CONCURRENCY, DEFAULT_FILES, DEFAULT_RELEASE_BASE_URL,
    PackagingRequest, RequestBuilder,
};
use clap::Parser;
use std::path::PathBuf;

/// Environment variable naming an alternative release host.
pub const MIRROR_ENV: &str = "NODE_PACKAGER_MIRROR";

/// Package a Node.js project with a portable runtime
#[derive(Parser, Debug, Clone)]
#[command(
    name = "kodegen_bundler_node",
    version,
    about = "Package a Node.js project with a portable runtime",
    long_about = "Bundle a Node.js project together with an official Node.js release for a
chosen platform, so it runs on machines without Node.js installed.

Usage:
  kodegen_bundler_node
  kodegen_bundler_node ./my-app --target-platform win32 --target-arch x64
  kodegen_bundler_node ./my-app --target-version 20.11.1 --no-zip --out-dir dist

Dependencies are installed with the target's own npm, so a Windows target
built on Linux or macOS (or the reverse) is bundled without node_modules."
)]
pub struct Args {
    /// Project directory to package
    #[arg(index = 1, value_name = "PROJECT", default_value = ".")]
    pub project: PathBuf,

    /// Project name (default: `name` from package.json, else the directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Project version (default: `version` from package.json)
    #[arg(long = "project-version", value_name = "VERSION")]
    pub project_version: Option<String>,

    /// Glob selecting the project files to include
    #[arg(long, value_name = "GLOB", default_value = DEFAULT_FILES)]
    pub files: String,

    /// Node.js version to bundle (default: version of the `node` on PATH)
    #[arg(long = "target-version", value_name = "VERSION")]
    pub target_version: Option<String>,

    /// Target platform: linux, darwin or win32 (default: host)
    #[arg(long = "target-platform", value_name = "PLATFORM")]
    pub target_platform: Option<String>,

    /// Target architecture, e.g. x64 or arm64 (default: host)
    #[arg(long = "target-arch", value_name = "ARCH")]
    pub target_arch: Option<String>,

    /// Directory receiving the artifact
    #[arg(long = "out-dir", value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Artifact base name (default: name-version-runtime-platform-arch)
    #[arg(long = "out-name", value_name = "NAME")]
    pub out_name: Option<String>,

    /// Runtime flag passed by the launcher, repeatable (e.g. --flag=--max-old-space-size=4096)
    #[arg(long = "flag", value_name = "FLAG", allow_hyphen_values = true)]
    pub flags: Vec<String>,

    /// Write a directory instead of a .zip archive
    #[arg(long = "no-zip")]
    pub no_zip: bool,

    /// Base URL of the Node.js release host
    #[arg(long, value_name = "URL", env = MIRROR_ENV, default_value = DEFAULT_RELEASE_BASE_URL)]
    pub mirror: String,

    /// Keep the temporary workspace for debugging
    #[arg(long = "keep-temp")]
    pub keep_temp: bool,

    /// Maximum number of project files copied concurrently
    #[arg(long = "copy-concurrency", value_name = "N", default_value_t = DEFAULT_COPY_CONCURRENCY)]
    pub copy_concurrency: usize,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.copy_concurrency == 0 {
            return Err("--copy-concurrency must be at least 1".to_string());
        }
        if self.files.trim().is_empty() {
            return Err("--files must not be empty".to_string());
        }
        if let Some(name) = &self.out_name
            && name.trim().is_empty()
        {
            return Err("--out-name must not be empty".to_string());
        }
        if url::Url::parse(&self.mirror).is_err() {
            return Err(format!("--mirror '{}' is not a URL", self.mirror));
        }
        Ok(())
    }

    /// Builds the packaging request, filling defaults from the project and host.
    pub fn to_request(&self) -> crate::error::Result<PackagingRequest> {
        let mut builder = RequestBuilder::new()
            .project_dir(&self.project)
            .files(self.files.clone())
            .out_dir(&self.out_dir)
            .launcher_flags(self.flags.clone())
            .should_zip(!self.no_zip);

        if let Some(name) = &self.name {
            builder = builder.project_name(name.clone());
        }
        if let Some(version) = &self.project_version {
            builder = builder.project_version(version.clone());
        }
        if let Some(version) = &self.target_version {
            builder = builder.target_version(version.clone());
        }
        if let Some(platform) = &self.target_platform {
            builder = builder.target_platform(platform.clone());
        }
        if let Some(arch) = &self.target_arch {
            builder = builder.target_arch(arch.clone());
        }
        if let Some(name) = &self.out_name {
            builder = builder.target_name(name.clone());
        }

        builder.build()
    }

    /// Bundler tunables taken from the command line.
    pub fn bundler_options(&self) -> BundlerOptions {
        BundlerOptions {
            release_base_url: self.mirror.clone(),
            copy_concurrency: self.copy_concurrency,
            keep_workspace: self.keep_temp,
            ..Default::default()
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
}

impl RuntimeConfig {
    /// Create runtime configuration
    pub fn new() -> Self {
        Self {
            output: super::OutputManager::new(),
        }
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        self.output.warn(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print progress message
    pub fn progress_println(&self, message: &str) {
        self.output.progress(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        self.output.success(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        self.output.indent(message);
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

//! Error types for packaging runs.
//!
//! Every failure of the pipeline surfaces as one [`PackError`] naming the stage
//! that failed and carrying the underlying cause. Workspace cleanup problems
//! are not errors: they are logged and never replace the run's result.

use crate::bundler;
use thiserror::Error;

/// Result type alias for packaging operations
pub type Result<T> = std::result::Result<T, PackError>;

/// Terminal error of a packaging run
#[derive(Error, Debug)]
pub enum PackError {
    /// The request is unusable (missing project directory, bad glob, ...)
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// Reason for the error
        reason: String,
    },

    /// No runtime release exists for the requested platform/architecture
    #[error("Unsupported platform '{platform}' with architecture '{arch}'")]
    UnsupportedPlatform {
        /// Requested platform identifier
        platform: String,
        /// Requested architecture identifier
        arch: String,
    },

    /// The temporary workspace could not be created
    #[error("Workspace error: {0}")]
    Workspace(#[source] bundler::Error),

    /// Downloading the runtime release failed
    #[error("Fetch error: {0}")]
    Fetch(#[source] bundler::Error),

    /// Unpacking the runtime release failed
    #[error("Extract error: {0}")]
    Extract(#[source] bundler::Error),

    /// Assembling the bundle tree failed
    #[error("Staging failed: {0}")]
    StagingFailed(#[source] bundler::Error),

    /// The package manager could not install production dependencies
    #[error("Dependency install failed: {source}")]
    DependencyInstallFailed {
        /// Exit code of the package manager, if it ran and exited
        code: Option<i32>,
        /// Underlying error
        #[source]
        source: bundler::Error,
    },

    /// Writing the final artifact failed
    #[error("Packaging failed: {0}")]
    PackagingFailed(#[source] bundler::Error),

    /// The bundler itself could not be set up
    #[error("Setup error: {0}")]
    Setup(#[from] bundler::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackError {
    /// Name of the pipeline stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            PackError::InvalidInput { .. } => "input",
            PackError::UnsupportedPlatform { .. } => "platform",
            PackError::Workspace(_) => "workspace",
            PackError::Fetch(_) => "fetch",
            PackError::Extract(_) => "extract",
            PackError::StagingFailed(_) => "staging",
            PackError::DependencyInstallFailed { .. } => "dependency install",
            PackError::PackagingFailed(_) => "packaging",
            PackError::Setup(_) => "setup",
            PackError::Io(_) => "io",
        }
    }

    /// Wraps a dependency installation failure, keeping the exit code
    pub(crate) fn dependency_install(source: bundler::Error) -> Self {
        PackError::DependencyInstallFailed {
            code: source.exit_code(),
            source,
        }
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PackError::InvalidInput { .. } => vec![
                "Check that the project path exists and is a directory".to_string(),
                "Pass --target-version if node is not installed on this machine".to_string(),
            ],
            PackError::UnsupportedPlatform { .. } => vec![
                "Supported platforms: linux, darwin, win32".to_string(),
                "Supported architectures: x64, arm64 (plus armv7l, ppc64le, s390x on linux and x86 on win32)"
                    .to_string(),
            ],
            PackError::Fetch(_) => vec![
                "Verify the runtime version exists on the release host".to_string(),
                "Use --mirror to download from a different release host".to_string(),
            ],
            PackError::Extract(bundler::Error::ToolNotFound { .. }) => vec![
                "Install 7-Zip (p7zip) and make sure 7za, 7z or 7zz is on PATH".to_string(),
                format!(
                    "Or point {} at a 7-Zip executable",
                    bundler::utils::process::SEVEN_ZIP_ENV
                ),
            ],
            PackError::DependencyInstallFailed { .. } => vec![
                "Run `npm install --omit=dev` in the project to reproduce the failure".to_string(),
                "Check package.json and package-lock.json for errors".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}

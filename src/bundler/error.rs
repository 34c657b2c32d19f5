//! Error types for bundler operations.
//!
//! Provides contextual error chaining, filesystem errors that carry the
//! offending path, and command errors that carry the full command line.
//!
//! # Features
//!
//! - **Context trait**: Add context to errors similar to anyhow
//! - **ErrorExt trait**: Filesystem operations with automatic path context
//! - **bail! macro**: Early return with formatted error messages
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_node::bundler::{Context, Error, ErrorExt, Result};
//! use std::path::Path;
//!
//! fn read_manifest(path: &Path) -> Result<serde_json::Value> {
//!     let contents = std::fs::read_to_string(path)
//!         .fs_context("reading manifest", path)?;
//!
//!     let manifest = serde_json::from_str::<serde_json::Value>(&contents)
//!         .map_err(Error::from)
//!         .context("parsing package.json")?;
//!
//!     Ok(manifest)
//! }
//! ```

use std::{
    fmt::Display,
    io,
    path::{self, PathBuf},
};
use thiserror::Error as DeriveError;

/// Errors returned by the bundler.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Error with context. Created by the [`Context`] trait.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// File system error with path context.
    ///
    /// Created by the [`ErrorExt`] trait's `fs_context` method.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g., "copying project file")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// A child process could not be started.
    #[error("failed to run command {command}: {error}")]
    CommandFailed {
        /// Command that failed to execute
        command: String,
        /// The underlying error
        error: io::Error,
    },

    /// A child process ran but exited unsuccessfully.
    ///
    /// `code` is `None` when the process was terminated by a signal.
    #[error("command {command} exited with {}", describe_exit(.code))]
    NonZeroExit {
        /// Command line that was executed
        command: String,
        /// Exit code reported by the operating system
        code: Option<i32>,
    },

    /// A required external tool was not found.
    #[error("could not find {tool}: {hint}")]
    ToolNotFound {
        /// Tool name
        tool: String,
        /// How to make the tool available
        hint: String,
    },

    /// The runtime release host answered with a non-success status.
    #[error("bad status code {status} for {url}")]
    HttpStatus {
        /// URL that was requested
        url: String,
        /// Response status
        status: reqwest::StatusCode,
    },

    /// The requested platform/architecture combination has no runtime release.
    #[error("unsupported platform {platform} ({arch})")]
    UnsupportedPlatform {
        /// Platform identifier as requested
        platform: String,
        /// Architecture identifier as requested
        arch: String,
    },

    /// Generic I/O error.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Error walking a directory tree.
    #[error("{0}")]
    WalkdirError(#[from] walkdir::Error),

    /// Path prefix stripping error.
    #[error("{0}")]
    StripError(#[from] path::StripPrefixError),

    /// ZIP archive creation error.
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    /// Handlebars template rendering error.
    #[error("{0}")]
    HandleBarsError(#[from] handlebars::RenderError),

    /// Handlebars template parsing error.
    #[error("{0}")]
    Template(#[from] handlebars::TemplateError),

    /// JSON deserialization error (package.json).
    #[error("{0}")]
    JsonError(#[from] serde_json::error::Error),

    /// HTTP client error (downloading the runtime release).
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("{0}")]
    UrlParse(#[from] url::ParseError),

    /// Invalid file selection pattern.
    #[error("{0}")]
    GlobPattern(#[from] glob::PatternError),

    /// Runtime version is not a semantic version.
    #[error("{0}")]
    SemverError(#[from] semver::Error),

    /// A spawned task panicked or was cancelled.
    #[error("task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    /// Generic error with custom message.
    #[error("{0}")]
    GenericError(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl Error {
    /// Exit code of the failed child process, looking through context layers.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::NonZeroExit { code, .. } => *code,
            Error::Context(_, inner) => inner.exit_code(),
            _ => None,
        }
    }
}

/// Convenient type alias for Result.
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for adding context to errors.
///
/// Similar to `anyhow::Context` but integrated with bundler's Error type.
/// Works with both `Result<T, E>` and `Option<T>`.
pub trait Context<T> {
    /// Add context to an error.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Add context to an error using a closure (lazy evaluation).
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Extension trait for filesystem operations with automatic path context.
///
/// ```no_run
/// use kodegen_bundler_node::bundler::{ErrorExt, Result};
/// use std::path::Path;
///
/// fn create_stage_dir(path: &Path) -> Result<()> {
///     std::fs::create_dir_all(path)
///         .fs_context("creating stage directory", path)?;
///     Ok(())
/// }
/// ```
pub trait ErrorExt<T> {
    /// Add filesystem context to an I/O error.
    ///
    /// The `context` should be a present-tense verb phrase describing the operation,
    /// e.g., "reading file", "creating directory", "copying binary".
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Macro for early return with error.
///
/// Converts the message into a [`Error::GenericError`] and returns immediately.
///
/// ```ignore
/// bail!("operation failed");
/// bail!("invalid value: {}", value);
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::bundler::Error::GenericError(format!($msg)))
    };
    ($err:expr $(,)?) => {
        return Err($crate::bundler::Error::GenericError($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::bundler::Error::GenericError(format!($fmt, $($arg)*)))
    };
}

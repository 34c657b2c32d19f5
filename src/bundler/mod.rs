//! Portable Node.js bundle assembler.
//!
//! Packages a Node.js project together with an official runtime release for a
//! chosen platform and architecture, so the result runs on a machine without
//! Node.js installed.
//!
//! # Output layout
//!
//! ```text
//! <target-name>/
//! └── bundle/
//!     ├── project/      selected project files plus fresh node_modules
//!     ├── node          runtime executable (node.exe on Windows)
//!     └── <launcher>    shell script, or <name>.cmd on Windows
//! ```
//!
//! The tree is written to the output directory either as `<target-name>.zip`
//! or as a plain directory.
//!
//! # Supported targets
//!
//! | Platform | Architectures | Release archive |
//! |----------|---------------|-----------------|
//! | linux | x64, arm64, armv7l, ppc64le, s390x | .tar.xz |
//! | darwin | x64, arm64 | .tar.xz |
//! | win32 | x64, x86, arm64 | .7z |
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_node::bundler::{Bundler, RequestBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let request = RequestBuilder::new()
//!     .project_dir("./my-app")
//!     .target_platform("win32")
//!     .target_arch("x64")
//!     .target_version("20.11.1")
//!     .build()?;
//!
//! let artifact = Bundler::new()?.bundle(&request).await?;
//! println!("{}", artifact.path.display());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod builder;
mod error;
mod extract;
mod install;
mod package;
pub mod platform;
mod settings;
mod stage;
mod template;
pub mod utils;
mod workspace;

// Public re-exports
pub use builder::{Bundler, BundlerOptions, calculate_sha256};
pub use error::{Context, Error, ErrorExt, Result};
pub use extract::{extract_runtime, unpack_tar};
pub use install::{INSTALL_ARGS, install_dependencies};
pub use package::{package, write_zip};
pub use platform::{ExtractionMethod, LauncherTemplate, PlatformProfile};
pub use settings::{DEFAULT_FILES, MANIFEST_FILE, PackagingRequest, RequestBuilder};
pub use stage::{
    DEFAULT_COPY_CONCURRENCY, DEPENDENCY_DIR, StagedBundle, assemble, select_project_files,
};
pub use template::{HandlebarsRenderer, LauncherVars, TemplateRenderer};
pub use utils::http::{DEFAULT_RELEASE_BASE_URL, HttpFetcher, ReleaseFetcher};
pub use utils::process::{CommandRunner, ProcessRunner};
pub use workspace::{WORKSPACE_PREFIX, Workspace};

/// Form of a produced artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// `<target-name>.zip` in the output directory.
    Archive,
    /// `<target-name>/` in the output directory.
    Directory,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Archive => write!(f, "zip archive"),
            ArtifactKind::Directory => write!(f, "directory"),
        }
    }
}

/// A produced bundle.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_node::bundler::{Bundler, PackagingRequest};
///
/// # async fn example(request: PackagingRequest) -> kodegen_bundler_node::error::Result<()> {
/// let artifact = Bundler::new()?.bundle(&request).await?;
/// println!("Created {} ({}): {} bytes", artifact.path.display(), artifact.kind, artifact.size);
/// println!("SHA256: {}", artifact.checksum);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BundledArtifact {
    /// Location of the artifact in the output directory.
    pub path: std::path::PathBuf,

    /// Whether the artifact is an archive or a directory.
    pub kind: ArtifactKind,

    /// Size in bytes; for directories, the sum of regular file sizes.
    pub size: u64,

    /// SHA-256 checksum of the artifact.
    ///
    /// Directories are hashed over sorted relative paths and file contents.
    pub checksum: String,
}

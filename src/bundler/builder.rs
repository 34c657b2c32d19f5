//! Packaging pipeline orchestration.
//!
//! [`Bundler`] drives one request through every stage in order:
//!
//! 1. Resolve the platform profile (no side effects yet)
//! 2. Create the temporary [`Workspace`]
//! 3. Download the runtime release
//! 4. Extract it
//! 5. Stage project files, runtime and launcher
//! 6. Install production dependencies into the staged project, when the
//!    host can run the target's package manager
//! 7. Write the artifact and compute its checksum
//!
//! The workspace is removed when the run ends, whatever the outcome. A
//! failure surfaces as one [`PackError`] naming its stage.
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_node::bundler::{Bundler, RequestBuilder};
//!
//! # async fn example() -> kodegen_bundler_node::error::Result<()> {
//! let request = RequestBuilder::new()
//!     .project_dir("./my-app")
//!     .target_version("20.11.1")
//!     .target_platform("linux")
//!     .target_arch("x64")
//!     .build()?;
//!
//! let artifact = Bundler::new()?.bundle(&request).await?;
//! println!("Created {} ({} bytes)", artifact.path.display(), artifact.size);
//! println!("SHA256: {}", artifact.checksum);
//! # Ok(())
//! # }
//! ```

use crate::bundler::{
    error::{Error, ErrorExt, Result},
    extract, install, package, platform,
    platform::PlatformProfile,
    settings::PackagingRequest,
    stage::{self, DEFAULT_COPY_CONCURRENCY},
    template::{HandlebarsRenderer, TemplateRenderer},
    utils::{
        http::{self, DEFAULT_RELEASE_BASE_URL, HttpFetcher, ReleaseFetcher},
        process::{self, CommandRunner, ProcessRunner},
    },
    workspace::Workspace,
    ArtifactKind, BundledArtifact,
};
use crate::error::PackError;
use std::path::{Path, PathBuf};

/// Tunables for a [`Bundler`] that are not part of a request.
#[derive(Debug, Clone)]
pub struct BundlerOptions {
    /// Base URL of the runtime release host.
    pub release_base_url: String,
    /// Bound on concurrent project file copies.
    pub copy_concurrency: usize,
    /// Leave the workspace on disk after the run.
    pub keep_workspace: bool,
    /// 7-Zip executable; discovered on `PATH` when unset.
    pub seven_zip: Option<PathBuf>,
    /// Parent of the workspace; the system temp directory when unset.
    pub temp_root: Option<PathBuf>,
}

impl Default for BundlerOptions {
    fn default() -> Self {
        Self {
            release_base_url: DEFAULT_RELEASE_BASE_URL.to_string(),
            copy_concurrency: DEFAULT_COPY_CONCURRENCY,
            keep_workspace: false,
            seven_zip: None,
            temp_root: None,
        }
    }
}

/// Packaging pipeline.
///
/// Generic over its three side-effecting seams so tests can run it without
/// network access or external tools.
pub struct Bundler<F = HttpFetcher, R = CommandRunner, T = HandlebarsRenderer> {
    fetcher: F,
    runner: R,
    renderer: T,
    options: BundlerOptions,
}

impl<F, R, T> std::fmt::Debug for Bundler<F, R, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Bundler {
    /// Creates a bundler that downloads over HTTPS and runs real processes.
    pub fn new() -> Result<Self> {
        Ok(Self::with_parts(
            HttpFetcher::new(),
            CommandRunner,
            HandlebarsRenderer::new()?,
        ))
    }
}

impl<F, R, T> Bundler<F, R, T>
where
    F: ReleaseFetcher,
    R: ProcessRunner,
    T: TemplateRenderer,
{
    /// Creates a bundler from explicit collaborators with default options.
    pub fn with_parts(fetcher: F, runner: R, renderer: T) -> Self {
        Self {
            fetcher,
            runner,
            renderer,
            options: BundlerOptions::default(),
        }
    }

    /// Replaces the bundler options.
    pub fn options(mut self, options: BundlerOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs the full pipeline for `request`.
    ///
    /// # Errors
    ///
    /// The [`PackError`] variant names the failing stage. The output
    /// directory is untouched by any failure before the packaging stage.
    pub async fn bundle(&self, request: &PackagingRequest) -> crate::error::Result<BundledArtifact> {
        let profile = platform::resolve(
            request.target_platform(),
            request.target_arch(),
            request.target_version(),
            request.project_name(),
        )
        .map_err(unsupported_platform)?;

        let seven_zip = match &self.options.seven_zip {
            Some(path) => path.clone(),
            None => process::find_seven_zip().map_err(PackError::Extract)?,
        };

        let workspace = match &self.options.temp_root {
            Some(root) => Workspace::create_in(root),
            None => Workspace::create(),
        }
        .map_err(PackError::Workspace)?;

        let result = self.run(&workspace, &profile, &seven_zip, request).await;

        if self.options.keep_workspace {
            workspace.keep();
        }
        result
    }

    async fn run(
        &self,
        workspace: &Workspace,
        profile: &PlatformProfile,
        seven_zip: &Path,
        request: &PackagingRequest,
    ) -> crate::error::Result<BundledArtifact> {
        let download_dir = workspace.download_dir();
        let archive = download_dir.join(&profile.archive_name);

        let url = http::release_url(
            &self.options.release_base_url,
            request.target_version(),
            &profile.archive_name,
        )
        .map_err(PackError::Fetch)?;
        self.fetcher
            .fetch(&url, &archive)
            .await
            .map_err(PackError::Fetch)?;

        let runtime_root = extract::extract_runtime(&self.runner, seven_zip, profile, &download_dir)
            .await
            .map_err(PackError::Extract)?;

        log::info!("Assembling {}", request.target_name());
        let staged = stage::assemble(
            workspace,
            profile,
            request,
            &runtime_root,
            &self.renderer,
            self.options.copy_concurrency,
        )
        .await
        .map_err(PackError::StagingFailed)?;

        if profile.package_manager_runs_on_host() {
            let package_manager = runtime_root.join(&profile.package_manager_path);
            install::install_dependencies(&self.runner, &package_manager, &staged.project_dir)
                .await
                .map_err(PackError::dependency_install)?;
        } else {
            log::warn!(
                "Skipping dependency install: {} cannot run on this host, the {} bundle has no {}",
                profile.package_manager_path.display(),
                request.target_platform(),
                stage::DEPENDENCY_DIR
            );
        }

        let path = package::package(&staged.root, request)
            .await
            .map_err(PackError::PackagingFailed)?;

        describe_artifact(path, request.should_zip())
            .await
            .map_err(PackError::PackagingFailed)
    }
}

fn unsupported_platform(error: Error) -> PackError {
    match error {
        Error::UnsupportedPlatform { platform, arch } => {
            PackError::UnsupportedPlatform { platform, arch }
        }
        other => PackError::InvalidInput {
            reason: other.to_string(),
        },
    }
}

async fn describe_artifact(path: PathBuf, archived: bool) -> Result<BundledArtifact> {
    let (kind, size) = if archived {
        let metadata = tokio::fs::metadata(&path)
            .await
            .fs_context("reading artifact metadata", &path)?;
        (ArtifactKind::Archive, metadata.len())
    } else {
        (ArtifactKind::Directory, directory_size(&path)?)
    };
    let checksum = calculate_sha256(&path).await?;

    Ok(BundledArtifact {
        path,
        kind,
        size,
        checksum,
    })
}

fn directory_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in walkdir::WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// Calculates the SHA-256 checksum of a file or directory tree.
///
/// Files are read in 8KB chunks. Directories are hashed by
/// [`calculate_directory_sha256`].
pub async fn calculate_sha256(path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};
    use tokio::io::AsyncReadExt;

    let metadata = tokio::fs::metadata(path)
        .await
        .fs_context("reading metadata of", path)?;

    if metadata.is_file() {
        let mut file = tokio::fs::File::open(path)
            .await
            .fs_context("opening file for hashing", path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 8192];

        loop {
            let n = file
                .read(&mut buffer)
                .await
                .fs_context("reading file for hash calculation", path)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    } else if metadata.is_dir() {
        calculate_directory_sha256(path).await
    } else {
        crate::bail!("Path is neither file nor directory: {}", path.display())
    }
}

/// Calculates the SHA-256 checksum of a directory tree.
///
/// Each regular file contributes its `/`-separated relative path followed by
/// its content, in sorted path order, so the result does not depend on the
/// host or on traversal order.
async fn calculate_directory_sha256(dir_path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};
    use tokio::io::AsyncReadExt;

    let mut entries = Vec::new();
    for entry in walkdir::WalkDir::new(dir_path).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let relative = entry
                .path()
                .strip_prefix(dir_path)?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            entries.push((relative, entry.into_path()));
        }
    }
    entries.sort();

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    for (relative, path) in entries {
        hasher.update(relative.as_bytes());

        let mut file = tokio::fs::File::open(&path)
            .await
            .fs_context("opening file for hashing", &path)?;
        loop {
            let n = file
                .read(&mut buffer)
                .await
                .fs_context("reading file for hash calculation", &path)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}

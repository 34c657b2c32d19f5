//! Packaging request and its builder.
//!
//! A [`PackagingRequest`] is the immutable input of one packaging run. It is
//! only created through [`RequestBuilder::build`], which fills in defaults
//! (from `package.json`, the project directory name and the host) and checks
//! that the project directory exists.

use crate::bundler::platform;
use crate::error::{PackError, Result};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// Default file selection pattern.
pub const DEFAULT_FILES: &str = "**/*";

/// Project manifest file name.
pub const MANIFEST_FILE: &str = "package.json";

/// Immutable input of a packaging run.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_node::bundler::RequestBuilder;
///
/// let request = RequestBuilder::new()
///     .project_dir("./app")
///     .target_version("v20.0.0")
///     .target_platform("linux")
///     .target_arch("x64")
///     .build()?;
///
/// assert_eq!(request.files(), "**/*");
/// # Ok::<(), kodegen_bundler_node::PackError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PackagingRequest {
    project_dir: PathBuf,
    project_name: String,
    project_version: Option<String>,
    files: String,
    target_version: String,
    target_platform: String,
    target_arch: String,
    out_dir: PathBuf,
    target_name: String,
    launcher_flags: Vec<String>,
    should_zip: bool,
}

impl PackagingRequest {
    /// Canonical project source directory.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Project name, also the launcher's base name.
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Project version, if known.
    pub fn project_version(&self) -> Option<&str> {
        self.project_version.as_deref()
    }

    /// Glob selecting project files, relative to the project directory.
    pub fn files(&self) -> &str {
        &self.files
    }

    /// Runtime version with a leading `v`.
    pub fn target_version(&self) -> &str {
        &self.target_version
    }

    /// Target platform identifier.
    pub fn target_platform(&self) -> &str {
        &self.target_platform
    }

    /// Target architecture identifier.
    pub fn target_arch(&self) -> &str {
        &self.target_arch
    }

    /// Directory receiving the artifact.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Artifact base name.
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Extra runtime flags baked into the launcher.
    pub fn launcher_flags(&self) -> &[String] {
        &self.launcher_flags
    }

    /// Whether to produce a `.zip` (`true`) or a plain directory (`false`).
    pub fn should_zip(&self) -> bool {
        self.should_zip
    }

    /// Final artifact path inside [`out_dir`](Self::out_dir).
    pub fn artifact_path(&self) -> PathBuf {
        if self.should_zip {
            self.out_dir.join(format!("{}.zip", self.target_name))
        } else {
            self.out_dir.join(&self.target_name)
        }
    }
}

/// Fields of `package.json` used for defaults.
#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
    name: Option<String>,
    version: Option<String>,
}

/// Builder for [`PackagingRequest`].
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    project_dir: Option<PathBuf>,
    project_name: Option<String>,
    project_version: Option<String>,
    files: Option<String>,
    target_version: Option<String>,
    target_platform: Option<String>,
    target_arch: Option<String>,
    out_dir: Option<PathBuf>,
    target_name: Option<String>,
    launcher_flags: Vec<String>,
    should_zip: Option<bool>,
}

impl RequestBuilder {
    /// Creates a new request builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the project source directory.
    ///
    /// Default: current directory
    pub fn project_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.project_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the project name.
    ///
    /// Default: `name` from `package.json`, else the directory name
    pub fn project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    /// Sets the project version.
    ///
    /// Default: `version` from `package.json`
    pub fn project_version(mut self, version: impl Into<String>) -> Self {
        self.project_version = Some(version.into());
        self
    }

    /// Sets the file selection glob.
    ///
    /// Default: `**/*`
    pub fn files(mut self, pattern: impl Into<String>) -> Self {
        self.files = Some(pattern.into());
        self
    }

    /// Sets the runtime version (`20.0.0` or `v20.0.0`).
    ///
    /// Default: version of the `node` found on `PATH`
    pub fn target_version(mut self, version: impl Into<String>) -> Self {
        self.target_version = Some(version.into());
        self
    }

    /// Sets the target platform (`linux`, `darwin`, `win32`).
    ///
    /// Default: host platform
    pub fn target_platform(mut self, platform: impl Into<String>) -> Self {
        self.target_platform = Some(platform.into());
        self
    }

    /// Sets the target architecture (`x64`, `arm64`, ...).
    ///
    /// Default: host architecture
    pub fn target_arch(mut self, arch: impl Into<String>) -> Self {
        self.target_arch = Some(arch.into());
        self
    }

    /// Sets the output directory.
    ///
    /// Default: current directory
    pub fn out_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.out_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the artifact base name.
    ///
    /// Default: `<name>-<project version>-<runtime version>-<platform>-<arch>`,
    /// skipping unknown parts
    pub fn target_name(mut self, name: impl Into<String>) -> Self {
        self.target_name = Some(name.into());
        self
    }

    /// Adds a runtime flag to the launcher.
    pub fn launcher_flag(mut self, flag: impl Into<String>) -> Self {
        self.launcher_flags.push(flag.into());
        self
    }

    /// Replaces the launcher flags.
    pub fn launcher_flags(mut self, flags: Vec<String>) -> Self {
        self.launcher_flags = flags;
        self
    }

    /// Chooses between a `.zip` archive and a plain directory.
    ///
    /// Default: `true`
    pub fn should_zip(mut self, zip: bool) -> Self {
        self.should_zip = Some(zip);
        self
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// [`PackError::InvalidInput`] when the project directory is missing or not
    /// a directory, `package.json` is malformed, the glob is invalid, or no
    /// runtime version/platform/architecture is given nor detectable, or the
    /// project or target name is not a plain file name.
    ///
    /// Without a target version this runs `node --version` synchronously; call
    /// it from `spawn_blocking` inside an async runtime.
    pub fn build(self) -> Result<PackagingRequest> {
        let requested_dir = self.project_dir.unwrap_or_else(|| PathBuf::from("."));
        let project_dir = requested_dir.canonicalize().map_err(|e| invalid(format!(
            "project path {} cannot be resolved: {e}",
            requested_dir.display()
        )))?;
        if !project_dir.is_dir() {
            return Err(invalid(format!(
                "project path {} is not a directory",
                project_dir.display()
            )));
        }

        let manifest = if self.project_name.is_none() || self.project_version.is_none() {
            read_manifest(&project_dir)?
        } else {
            PackageManifest::default()
        };

        let project_name = self
            .project_name
            .or(manifest.name)
            .or_else(|| {
                project_dir
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .map(|name| sanitize_name(&name))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| invalid("could not determine a project name; pass --name"))?;
        if !is_file_name(&project_name) {
            return Err(invalid(format!(
                "project name '{project_name}' cannot be used as a file name; pass --name"
            )));
        }

        let project_version = self
            .project_version
            .or(manifest.version)
            .filter(|version| !version.trim().is_empty());

        let files = self.files.unwrap_or_else(|| DEFAULT_FILES.to_string());
        glob::Pattern::new(&files)
            .map_err(|e| invalid(format!("invalid file pattern '{files}': {e}")))?;

        let target_version = match self.target_version {
            Some(version) => platform::normalize_version(&version),
            None => detect_host_runtime_version()?,
        };
        semver::Version::parse(target_version.trim_start_matches('v')).map_err(|e| {
            invalid(format!("runtime version '{target_version}' is not a version: {e}"))
        })?;

        let target_platform = match self.target_platform {
            Some(requested) => platform::canonical_platform(&requested)
                .map(str::to_string)
                .unwrap_or(requested),
            None => platform::host_platform()
                .map(str::to_string)
                .ok_or_else(|| invalid("host platform has no runtime release; pass --target-platform"))?,
        };

        let target_arch = match self.target_arch {
            Some(arch) => arch,
            None => platform::host_arch()
                .map(str::to_string)
                .ok_or_else(|| invalid("host architecture has no runtime release; pass --target-arch"))?,
        };

        let out_dir = self.out_dir.unwrap_or_else(|| PathBuf::from("."));
        let out_dir = std::path::absolute(&out_dir).map_err(|e| {
            invalid(format!("output path {} cannot be resolved: {e}", out_dir.display()))
        })?;

        let target_name = self.target_name.unwrap_or_else(|| {
            [
                Some(project_name.as_str()),
                project_version.as_deref(),
                Some(target_version.as_str()),
                Some(target_platform.as_str()),
                Some(target_arch.as_str()),
            ]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-")
        });
        if !is_file_name(&target_name) {
            return Err(invalid(format!("invalid output name '{target_name}'")));
        }

        Ok(PackagingRequest {
            project_dir,
            project_name,
            project_version,
            files,
            target_version,
            target_platform,
            target_arch,
            out_dir,
            target_name,
            launcher_flags: self.launcher_flags,
            should_zip: self.should_zip.unwrap_or(true),
        })
    }
}

fn invalid(reason: impl Into<String>) -> PackError {
    PackError::InvalidInput {
        reason: reason.into(),
    }
}

/// Reads `package.json` if present. Absence yields empty defaults.
fn read_manifest(project_dir: &Path) -> Result<PackageManifest> {
    let path = project_dir.join(MANIFEST_FILE);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PackageManifest::default()),
        Err(e) => return Err(PackError::Io(e)),
    };

    serde_json::from_str(&contents)
        .map_err(|e| invalid(format!("{} is not valid: {e}", path.display())))
}

/// Makes an npm package name usable as a file name (`@scope/pkg` → `scope-pkg`).
fn sanitize_name(name: &str) -> String {
    name.trim()
        .trim_start_matches('@')
        .replace(['/', '\\'], "-")
}

/// Whether `name` is a single plain path component (no separators, not `.` or `..`).
fn is_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(first)), None) if first == name
    ) && !name.contains(['/', '\\'])
}

/// Version of the `node` executable on `PATH`, e.g. `v20.11.1`.
fn detect_host_runtime_version() -> Result<String> {
    let node = which::which("node")
        .map_err(|_| invalid("no runtime version given and no node found on PATH; pass --target-version"))?;

    let output = std::process::Command::new(&node).arg("--version").output()?;
    if !output.status.success() {
        return Err(invalid(format!(
            "{} --version exited with {:?}; pass --target-version",
            node.display(),
            output.status.code()
        )));
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    log::debug!("Detected host runtime {} at {}", version, node.display());
    Ok(platform::normalize_version(&version))
}

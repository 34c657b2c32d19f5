//! Platform resolution for runtime releases.
//!
//! Maps a target (platform, architecture, runtime version) triple onto a
//! [`PlatformProfile`]: which release archive to fetch, how to extract it,
//! where the runtime and package manager live inside it, and which launcher
//! to generate.
//!
//! # Supported Platforms
//!
//! | Platform | Archive | Extraction | Launcher | Module |
//! |----------|---------|------------|----------|--------|
//! | linux, darwin | `.tar.xz` | 7-Zip + tar | shell script | [`unix`] |
//! | win32 | `.7z` | 7-Zip | `.cmd` script | [`windows`] |
//!
//! Resolution is a table lookup from platform identifier to a profile
//! builder, one builder per platform family. The resolver never touches the
//! filesystem or the network.

pub mod unix;
pub mod windows;

use crate::bundler::error::{Error, Result};
use std::fmt;
use std::path::PathBuf;

/// How a downloaded runtime archive is unpacked.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ExtractionMethod {
    /// Outer compression layer removed by 7-Zip, inner `.tar` unpacked in-process.
    TwoStage,
    /// Archive unpacked by 7-Zip in one step.
    SingleStage,
}

/// Launcher script flavour written next to the bundled runtime.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LauncherTemplate {
    /// POSIX shell script.
    Shell,
    /// Windows command interpreter script.
    Cmd,
}

impl LauncherTemplate {
    /// Template registry name.
    pub fn name(&self) -> &'static str {
        match self {
            LauncherTemplate::Shell => "shell-launcher",
            LauncherTemplate::Cmd => "cmd-launcher",
        }
    }
}

impl fmt::Display for LauncherTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Everything platform-specific about one packaging run.
///
/// Produced once per request by [`resolve`] and read-only afterwards.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlatformProfile {
    /// Release archive file name, e.g. `node-v20.0.0-linux-x64.tar.xz`.
    pub archive_name: String,
    /// Top-level directory inside the archive, e.g. `node-v20.0.0-linux-x64`.
    pub archive_root: String,
    /// Extraction procedure for the archive.
    pub extraction: ExtractionMethod,
    /// Runtime executable, relative to `archive_root`.
    pub runtime_path: PathBuf,
    /// Package manager executable, relative to `archive_root`.
    pub package_manager_path: PathBuf,
    /// File name of the runtime inside the bundle.
    pub runtime_name: String,
    /// Launcher flavour to render.
    pub launcher: LauncherTemplate,
    /// File name of the rendered launcher.
    pub launcher_name: String,
    /// Whether staged executables need the executable permission bit.
    pub needs_exec_bit: bool,
}

impl PlatformProfile {
    /// Whether this host can execute the release's package manager.
    ///
    /// `npm.cmd` needs a Windows host and the Unix `bin/npm` script needs a
    /// non-Windows one.
    pub fn package_manager_runs_on_host(&self) -> bool {
        (self.launcher == LauncherTemplate::Cmd) == cfg!(windows)
    }
}

/// Resolved target triple handed to the profile builders.
#[derive(Clone, Debug)]
pub struct Target<'a> {
    /// Runtime version with a leading `v`.
    pub version: &'a str,
    /// Canonical platform identifier (`linux`, `darwin`, `win32`).
    pub platform: &'a str,
    /// Architecture identifier as used by the release host.
    pub arch: &'a str,
    /// Project name, used to name the launcher.
    pub project_name: &'a str,
}

type ProfileBuilder = fn(&Target<'_>) -> Result<PlatformProfile>;

/// Platform identifier (and aliases) to canonical identifier and family builder.
const PLATFORMS: &[(&str, &str, ProfileBuilder)] = &[
    ("linux", "linux", unix::profile),
    ("darwin", "darwin", unix::profile),
    ("macos", "darwin", unix::profile),
    ("win32", "win32", windows::profile),
    ("windows", "win32", windows::profile),
    ("win", "win32", windows::profile),
];

/// Returns the canonical platform identifier for `platform`, if supported.
pub fn canonical_platform(platform: &str) -> Option<&'static str> {
    PLATFORMS
        .iter()
        .find(|(id, _, _)| id.eq_ignore_ascii_case(platform))
        .map(|(_, canonical, _)| *canonical)
}

/// Resolves the platform profile for a target.
///
/// `version` may be given with or without the leading `v`.
///
/// # Errors
///
/// [`Error::UnsupportedPlatform`] when the platform identifier is unknown or
/// the family has no release for the architecture.
///
/// # Examples
///
/// ```
/// use kodegen_bundler_node::bundler::platform::{resolve, ExtractionMethod};
///
/// let profile = resolve("linux", "x64", "v20.0.0", "app").unwrap();
/// assert_eq!(profile.archive_name, "node-v20.0.0-linux-x64.tar.xz");
/// assert_eq!(profile.archive_root, "node-v20.0.0-linux-x64");
/// assert_eq!(profile.extraction, ExtractionMethod::TwoStage);
/// ```
pub fn resolve(
    platform: &str,
    arch: &str,
    version: &str,
    project_name: &str,
) -> Result<PlatformProfile> {
    let unsupported = || Error::UnsupportedPlatform {
        platform: platform.to_string(),
        arch: arch.to_string(),
    };

    let (_, canonical, builder) = PLATFORMS
        .iter()
        .find(|(id, _, _)| id.eq_ignore_ascii_case(platform))
        .ok_or_else(unsupported)?;

    let version = normalize_version(version);
    let target = Target {
        version: &version,
        platform: canonical,
        arch,
        project_name,
    };

    log::debug!("Resolving runtime profile for {canonical}/{arch} {version}");
    builder(&target)
}

/// Prefixes a bare version number with `v`, the form used by release names.
pub fn normalize_version(version: &str) -> String {
    let version = version.trim();
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{version}")
    }
}

/// Strips a known archive suffix, yielding the archive's root directory name.
///
/// The extraction tools do not report what they created, so the directory
/// name is always derived from the archive name.
pub(crate) fn strip_archive_suffix(archive_name: &str, suffix: &str) -> Result<String> {
    archive_name
        .strip_suffix(suffix)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::GenericError(format!(
                "archive {archive_name} does not end with {suffix}"
            ))
        })
}

/// Host platform identifier in release-host terms.
pub fn host_platform() -> Option<&'static str> {
    match std::env::consts::OS {
        "linux" => Some("linux"),
        "macos" => Some("darwin"),
        "windows" => Some("win32"),
        _ => None,
    }
}

/// Host architecture identifier in release-host terms.
pub fn host_arch() -> Option<&'static str> {
    match std::env::consts::ARCH {
        "x86_64" => Some("x64"),
        "x86" => Some("x86"),
        "aarch64" => Some("arm64"),
        "arm" => Some("armv7l"),
        "powerpc64" => Some("ppc64le"),
        "s390x" => Some("s390x"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_profile() {
        let profile = resolve("linux", "x64", "v20.0.0", "app").unwrap();
        assert_eq!(profile.archive_name, "node-v20.0.0-linux-x64.tar.xz");
        assert_eq!(profile.archive_root, "node-v20.0.0-linux-x64");
        assert_eq!(profile.extraction, ExtractionMethod::TwoStage);
        assert_eq!(profile.runtime_path, PathBuf::from("bin").join("node"));
        assert_eq!(profile.package_manager_path, PathBuf::from("bin").join("npm"));
        assert_eq!(profile.runtime_name, "node");
        assert_eq!(profile.launcher, LauncherTemplate::Shell);
        assert_eq!(profile.launcher_name, "app");
        assert!(profile.needs_exec_bit);
    }

    #[test]
    fn test_darwin_alias() {
        let darwin = resolve("darwin", "arm64", "20.1.0", "app").unwrap();
        let macos = resolve("macos", "arm64", "v20.1.0", "app").unwrap();
        assert_eq!(darwin, macos);
        assert_eq!(darwin.archive_name, "node-v20.1.0-darwin-arm64.tar.xz");
    }

    #[test]
    fn test_windows_profile() {
        let profile = resolve("win32", "x64", "v20.0.0", "app").unwrap();
        assert_eq!(profile.archive_name, "node-v20.0.0-win-x64.7z");
        assert_eq!(profile.archive_root, "node-v20.0.0-win-x64");
        assert_eq!(profile.extraction, ExtractionMethod::SingleStage);
        assert_eq!(profile.runtime_path, PathBuf::from("node.exe"));
        assert_eq!(profile.package_manager_path, PathBuf::from("npm.cmd"));
        assert_eq!(profile.runtime_name, "node.exe");
        assert_eq!(profile.launcher, LauncherTemplate::Cmd);
        assert_eq!(profile.launcher_name, "app.cmd");
        assert!(!profile.needs_exec_bit);
    }

    #[test]
    fn test_archive_root_is_archive_name_without_suffix() {
        let targets = [
            ("linux", "x64"),
            ("linux", "arm64"),
            ("linux", "armv7l"),
            ("linux", "ppc64le"),
            ("linux", "s390x"),
            ("darwin", "x64"),
            ("darwin", "arm64"),
            ("win32", "x64"),
            ("win32", "x86"),
            ("win32", "arm64"),
        ];

        for (platform, arch) in targets {
            let profile = resolve(platform, arch, "v18.19.1", "app").unwrap();
            assert!(profile.archive_name.starts_with(&profile.archive_root));
            assert!(profile.archive_name.contains("v18.19.1"));
            assert!(profile.archive_name.ends_with(&format!("-{arch}.tar.xz"))
                || profile.archive_name.ends_with(&format!("-{arch}.7z")));
        }
    }

    #[test]
    fn test_unsupported_platform() {
        let err = resolve("plan9", "x64", "v20.0.0", "app").unwrap_err();
        assert!(matches!(err, Error::UnsupportedPlatform { .. }));
    }

    #[test]
    fn test_unsupported_arch() {
        assert!(matches!(
            resolve("darwin", "s390x", "v20.0.0", "app"),
            Err(Error::UnsupportedPlatform { .. })
        ));
        assert!(matches!(
            resolve("win32", "armv7l", "v20.0.0", "app"),
            Err(Error::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    fn test_package_manager_host_compatibility() {
        let linux = resolve("linux", "x64", "v20.0.0", "app").unwrap();
        let darwin = resolve("darwin", "arm64", "v20.0.0", "app").unwrap();
        let windows = resolve("win32", "x64", "v20.0.0", "app").unwrap();

        assert_eq!(linux.package_manager_runs_on_host(), !cfg!(windows));
        assert_eq!(darwin.package_manager_runs_on_host(), !cfg!(windows));
        assert_eq!(windows.package_manager_runs_on_host(), cfg!(windows));
    }

    #[test]
    fn test_normalize_version() {
        assert_eq!(normalize_version("20.0.0"), "v20.0.0");
        assert_eq!(normalize_version("v20.0.0"), "v20.0.0");
        assert_eq!(normalize_version(" v20.0.0\n"), "v20.0.0");
    }
}

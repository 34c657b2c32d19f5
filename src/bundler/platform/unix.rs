//! Linux and macOS runtime releases.
//!
//! Releases ship as `.tar.xz` tarballs with the executables under `bin/`.
//! The launcher is a POSIX shell script named after the project.

use super::{strip_archive_suffix, ExtractionMethod, LauncherTemplate, PlatformProfile, Target};
use crate::bundler::error::{Error, Result};
use std::path::Path;

const ARCHIVE_SUFFIX: &str = ".tar.xz";

/// Architectures published per platform.
fn supports(platform: &str, arch: &str) -> bool {
    match platform {
        "linux" => matches!(arch, "x64" | "arm64" | "armv7l" | "ppc64le" | "s390x"),
        "darwin" => matches!(arch, "x64" | "arm64"),
        _ => false,
    }
}

/// Builds the profile for a Unix-like target.
pub fn profile(target: &Target<'_>) -> Result<PlatformProfile> {
    if !supports(target.platform, target.arch) {
        return Err(Error::UnsupportedPlatform {
            platform: target.platform.to_string(),
            arch: target.arch.to_string(),
        });
    }

    let archive_name = format!(
        "node-{}-{}-{}{ARCHIVE_SUFFIX}",
        target.version, target.platform, target.arch
    );
    let archive_root = strip_archive_suffix(&archive_name, ARCHIVE_SUFFIX)?;

    Ok(PlatformProfile {
        archive_name,
        archive_root,
        extraction: ExtractionMethod::TwoStage,
        runtime_path: Path::new("bin").join("node"),
        package_manager_path: Path::new("bin").join("npm"),
        runtime_name: "node".to_string(),
        launcher: LauncherTemplate::Shell,
        launcher_name: target.project_name.to_string(),
        needs_exec_bit: true,
    })
}

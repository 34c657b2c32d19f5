//! Windows runtime releases.
//!
//! Releases ship as `.7z` archives with `node.exe` and `npm.cmd` at the
//! archive root. Release names use `win` rather than `win32`.

use super::{strip_archive_suffix, ExtractionMethod, LauncherTemplate, PlatformProfile, Target};
use crate::bundler::error::{Error, Result};
use std::path::PathBuf;

const ARCHIVE_SUFFIX: &str = ".7z";

/// Builds the profile for a Windows target.
pub fn profile(target: &Target<'_>) -> Result<PlatformProfile> {
    if !matches!(target.arch, "x64" | "x86" | "arm64") {
        return Err(Error::UnsupportedPlatform {
            platform: target.platform.to_string(),
            arch: target.arch.to_string(),
        });
    }

    let archive_name = format!("node-{}-win-{}{ARCHIVE_SUFFIX}", target.version, target.arch);
    let archive_root = strip_archive_suffix(&archive_name, ARCHIVE_SUFFIX)?;

    Ok(PlatformProfile {
        archive_name,
        archive_root,
        extraction: ExtractionMethod::SingleStage,
        runtime_path: PathBuf::from("node.exe"),
        package_manager_path: PathBuf::from("npm.cmd"),
        runtime_name: "node.exe".to_string(),
        launcher: LauncherTemplate::Cmd,
        launcher_name: format!("{}.cmd", target.project_name),
        needs_exec_bit: false,
    })
}

//! File system utilities for bundling.
//!
//! Provides file operations with automatic directory creation and path-aware
//! error reporting.

use crate::bundler::error::{Error, ErrorExt, Result};
use std::path::Path;
use tokio::fs;

/// Removes the directory and its contents if it exists.
///
/// Absence is not an error.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).fs_context("removing directory", path),
    }
}

/// Removes whatever is at `path`, file or directory tree.
///
/// Absence is not an error.
pub async fn remove_path(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).fs_context("inspecting", path),
    };

    if metadata.is_dir() {
        remove_dir_all(path).await
    } else {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).fs_context("removing file", path),
        }
    }
}

/// Copies a regular file from one path to another, creating any parent
/// directories of the destination path as necessary.
///
/// Fails if the source path is a directory or doesn't exist.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    let metadata = fs::metadata(from)
        .await
        .fs_context("reading metadata of", from)?;
    if !metadata.is_file() {
        return Err(Error::GenericError(format!("{from:?} is not a file")));
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir)
            .await
            .fs_context("creating directory", dest_dir)?;
    }
    fs::copy(from, to).await.fs_context("copying file to", to)?;
    Ok(())
}

/// Recursively copies a directory from one path to another, creating any
/// parent directories of the destination path as necessary.
///
/// Preserves symlinks on Unix. Elsewhere the link target is copied.
pub async fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    if !from.is_dir() {
        return Err(Error::GenericError(format!("{from:?} is not a directory")));
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .await
            .fs_context("creating directory", parent)?;
    }

    for entry in walkdir::WalkDir::new(from) {
        let entry = entry?;
        let rel_path = entry.path().strip_prefix(from)?;
        let dest_path = to.join(rel_path);

        if entry.file_type().is_symlink() {
            copy_symlink(entry.path(), &dest_path).await?;
        } else if entry.file_type().is_dir() {
            fs::create_dir_all(&dest_path)
                .await
                .fs_context("creating directory", &dest_path)?;
        } else {
            fs::copy(entry.path(), &dest_path)
                .await
                .fs_context("copying file to", &dest_path)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
async fn copy_symlink(link: &Path, dest: &Path) -> Result<()> {
    let target = fs::read_link(link).await.fs_context("reading symlink", link)?;
    fs::symlink(&target, dest)
        .await
        .fs_context("creating symlink", dest)
}

#[cfg(not(unix))]
async fn copy_symlink(link: &Path, dest: &Path) -> Result<()> {
    if link.is_dir() {
        Box::pin(copy_dir(link, dest)).await
    } else {
        fs::copy(link, dest)
            .await
            .fs_context("copying file to", dest)?;
        Ok(())
    }
}

/// Moves a directory tree to `to`, falling back to copy-and-delete when a
/// rename is not possible (e.g. across file systems).
pub async fn move_dir(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) => {
            log::debug!(
                "Rename {} -> {} failed ({}), copying instead",
                from.display(),
                to.display(),
                e
            );
            if let Err(copy_error) = copy_dir(from, to).await {
                let _ = remove_path(to).await;
                return Err(copy_error);
            }
            remove_dir_all(from).await
        }
    }
}

/// Marks a file as executable (`0o755`). No-op on non-Unix hosts.
pub async fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .await
            .fs_context("setting executable permission", path)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Whether the file at `path` already has an executable bit set.
pub async fn is_executable(path: &Path) -> Result<bool> {
    let metadata = fs::metadata(path)
        .await
        .fs_context("reading metadata of", path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        Ok(metadata.permissions().mode() & 0o111 != 0)
    }
    #[cfg(not(unix))]
    {
        Ok(metadata.is_file())
    }
}

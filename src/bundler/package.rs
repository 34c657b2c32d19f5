//! Final artifact production.
//!
//! A staged bundle leaves the workspace either as a zip archive whose single
//! top-level entry is the target name, or as a directory moved into the
//! output directory. An existing artifact at the destination is replaced as
//! a whole; nothing is merged into it.

use crate::bundler::{
    error::{ErrorExt, Result},
    settings::PackagingRequest,
    utils::fs,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

/// Suffix of the in-progress archive, renamed into place once complete.
const PARTIAL_SUFFIX: &str = "partial";

/// Moves or archives the staged tree at `staged_root` into the output
/// directory and returns the artifact path.
pub async fn package(staged_root: &Path, request: &PackagingRequest) -> Result<PathBuf> {
    let out_dir = request.out_dir();
    tokio::fs::create_dir_all(out_dir)
        .await
        .fs_context("creating output directory", out_dir)?;

    let dest = request.artifact_path();
    if request.should_zip() {
        write_zip(staged_root, &dest, request.target_name()).await?;
    } else {
        fs::remove_path(&dest).await?;
        fs::move_dir(staged_root, &dest).await?;
    }

    log::info!("Wrote {}", dest.display());
    Ok(dest)
}

/// Archives `source` into `dest` with every entry under `root_name/`.
///
/// The archive is written next to `dest` and renamed over it on success, so
/// a failed run never leaves a truncated archive behind.
pub async fn write_zip(source: &Path, dest: &Path, root_name: &str) -> Result<()> {
    let partial = dest.with_extension(format!("zip.{PARTIAL_SUFFIX}"));

    let written = {
        let source = source.to_path_buf();
        let partial = partial.clone();
        let root_name = root_name.to_string();
        tokio::task::spawn_blocking(move || zip_tree(&source, &partial, &root_name)).await?
    };

    if let Err(e) = written {
        let _ = fs::remove_path(&partial).await;
        return Err(e);
    }

    fs::remove_path(dest).await?;
    tokio::fs::rename(&partial, dest)
        .await
        .fs_context("moving archive into place", dest)?;
    Ok(())
}

fn zip_tree(source: &Path, dest: &Path, root_name: &str) -> Result<()> {
    let file = File::create(dest).fs_context("creating archive", dest)?;
    let mut writer = zip::ZipWriter::new(BufWriter::new(file));
    let base = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .large_file(true);

    let walker = walkdir::WalkDir::new(source)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry?;
        let relative = entry.path().strip_prefix(source)?;
        let mut name = root_name.to_string();
        for component in relative.components() {
            name.push('/');
            name.push_str(&component.as_os_str().to_string_lossy());
        }

        let options = base.unix_permissions(unix_mode(&entry)?);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            let target = std::fs::read_link(entry.path())
                .fs_context("reading symlink", entry.path())?;
            writer.add_symlink(name, target.to_string_lossy(), options)?;
        } else if file_type.is_dir() {
            writer.add_directory(name, options)?;
        } else {
            writer.start_file(name, options)?;
            let mut input =
                File::open(entry.path()).fs_context("opening file for archiving", entry.path())?;
            std::io::copy(&mut input, &mut writer)
                .fs_context("archiving file", entry.path())?;
        }
    }

    let mut inner = writer.finish()?;
    inner.flush().fs_context("flushing archive", dest)?;
    Ok(())
}

#[cfg(unix)]
fn unix_mode(entry: &walkdir::DirEntry) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = entry.metadata()?;
    Ok(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn unix_mode(entry: &walkdir::DirEntry) -> Result<u32> {
    Ok(if entry.file_type().is_dir() { 0o755 } else { 0o644 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn staged_tree(root: &Path) {
        std::fs::create_dir_all(root.join("bundle/project/lib")).unwrap();
        std::fs::write(root.join("bundle/node"), "runtime").unwrap();
        std::fs::write(root.join("bundle/project/index.js"), "console.log(1)").unwrap();
        std::fs::write(root.join("bundle/project/lib/a.js"), "a").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(
                root.join("bundle/node"),
                std::fs::Permissions::from_mode(0o755),
            )
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_zip_entries_are_rooted_at_target_name() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("stage/app");
        staged_tree(&staged);
        let dest = dir.path().join("out/app.zip");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();

        write_zip(&staged, &dest, "app").await.unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert!(names.iter().all(|n| n.starts_with("app/")));
        assert!(names.contains(&"app/bundle/project/lib/a.js".to_string()));

        let mut content = String::new();
        archive
            .by_name("app/bundle/project/index.js")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "console.log(1)");

        #[cfg(unix)]
        {
            let node = archive.by_name("app/bundle/node").unwrap();
            assert_eq!(node.unix_mode().unwrap() & 0o111, 0o111);
        }

        assert!(!dest.with_extension("zip.partial").exists());
    }

    #[tokio::test]
    async fn test_zip_replaces_existing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("app");
        staged_tree(&staged);
        let dest = dir.path().join("app.zip");
        std::fs::write(&dest, "stale").unwrap();

        write_zip(&staged, &dest, "app").await.unwrap();

        let archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        assert!(archive.len() > 1);
    }

    #[tokio::test]
    async fn test_zip_of_missing_tree_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("app.zip");

        let result = write_zip(&dir.path().join("missing"), &dest, "app").await;
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("zip.partial").exists());
    }
}

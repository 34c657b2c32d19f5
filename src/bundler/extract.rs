//! Runtime archive extraction.
//!
//! `.tar.xz` releases are unpacked in two stages: 7-Zip strips the xz layer,
//! then the `.tar` is unpacked in-process with the `tar` crate. `.7z`
//! releases are unpacked by 7-Zip directly.

use crate::bundler::{
    error::{Context, Error, ErrorExt, Result},
    platform::{ExtractionMethod, PlatformProfile},
    utils::{fs, process::ProcessRunner},
};
use std::path::{Path, PathBuf};

/// Unpacks the downloaded runtime archive inside `download_dir`.
///
/// The archive must already be fully written to
/// `download_dir/<profile.archive_name>`. Returns the extracted runtime root,
/// `download_dir/<profile.archive_root>`.
pub async fn extract_runtime<R: ProcessRunner>(
    runner: &R,
    seven_zip: &Path,
    profile: &PlatformProfile,
    download_dir: &Path,
) -> Result<PathBuf> {
    log::info!("Extracting {}", profile.archive_name);

    match profile.extraction {
        ExtractionMethod::TwoStage => {
            runner
                .run(seven_zip, &["x", "-y", profile.archive_name.as_str()], download_dir)
                .await
                .context("decompressing runtime archive")?;

            let tar_name = Path::new(&profile.archive_name)
                .file_stem()
                .context("runtime archive has no file stem")?;
            let tar_path = download_dir.join(tar_name);
            unpack_tar(&tar_path, download_dir).await?;

            tokio::fs::remove_file(&tar_path)
                .await
                .fs_context("removing intermediate tarball", &tar_path)?;
        }
        ExtractionMethod::SingleStage => {
            runner
                .run(seven_zip, &["x", "-y", profile.archive_name.as_str()], download_dir)
                .await
                .context("unpacking runtime archive")?;
        }
    }

    let runtime_root = download_dir.join(&profile.archive_root);
    if !runtime_root.is_dir() {
        return Err(Error::GenericError(format!(
            "runtime archive {} did not contain {}",
            profile.archive_name, profile.archive_root
        )));
    }

    if profile.needs_exec_bit {
        for relative in [&profile.runtime_path, &profile.package_manager_path] {
            let executable = runtime_root.join(relative);
            if !fs::is_executable(&executable).await? {
                log::debug!("Marking {} executable", executable.display());
                fs::set_executable(&executable).await?;
            }
        }
    }

    Ok(runtime_root)
}

/// Unpacks a plain tarball into `dest` on a blocking thread.
pub async fn unpack_tar(tar_path: &Path, dest: &Path) -> Result<()> {
    let tar_path = tar_path.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::open(&tar_path).fs_context("opening tarball", &tar_path)?;
        let mut archive = tar::Archive::new(file);
        archive.set_preserve_permissions(true);
        archive.set_overwrite(true);
        archive.unpack(&dest).fs_context("unpacking tarball into", &dest)?;
        Ok(())
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_tar(path: &Path, entries: &[(&str, &[u8], u32)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut builder = tar::Builder::new(file);
        for (name, data, mode) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.finish().unwrap();
    }

    #[tokio::test]
    async fn test_unpack_tar() {
        let dir = tempfile::tempdir().unwrap();
        let tar_path = dir.path().join("rt.tar");
        build_tar(
            &tar_path,
            &[("rt/bin/node", &b"binary"[..], 0o755), ("rt/README.md", &b"docs"[..], 0o644)],
        );

        unpack_tar(&tar_path, dir.path()).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("rt/bin/node")).unwrap(), b"binary");
        assert!(dir.path().join("rt/README.md").is_file());
    }

    #[tokio::test]
    async fn test_unpack_missing_tar() {
        let dir = tempfile::tempdir().unwrap();
        let err = unpack_tar(&dir.path().join("missing.tar"), dir.path()).await;
        assert!(matches!(err, Err(Error::Fs { .. })));
    }
}

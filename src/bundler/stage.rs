//! Bundle staging.
//!
//! Builds `stage/<target-name>/bundle/` inside the workspace:
//!
//! ```text
//! <target-name>/
//! └── bundle/
//!     ├── project/      files selected from the project directory
//!     ├── node          runtime executable (node.exe on Windows)
//!     └── <launcher>    rendered launcher script
//! ```
//!
//! The three parts are written concurrently since they never share a path.
//! Project files are copied with one task per file, bounded by a semaphore.

use crate::bundler::{
    error::{Context, Error, ErrorExt, Result},
    platform::PlatformProfile,
    settings::PackagingRequest,
    template::{LauncherVars, TemplateRenderer},
    utils::fs,
    workspace::Workspace,
};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Dependency directory never copied from the source project.
pub const DEPENDENCY_DIR: &str = "node_modules";

/// Default bound on concurrent file copies.
pub const DEFAULT_COPY_CONCURRENCY: usize = 64;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Paths of a staged bundle.
#[derive(Debug, Clone)]
pub struct StagedBundle {
    /// `stage/<target-name>`, the directory that gets packaged.
    pub root: PathBuf,
    /// `stage/<target-name>/bundle`.
    pub bundle_dir: PathBuf,
    /// `stage/<target-name>/bundle/project`.
    pub project_dir: PathBuf,
    /// Staged runtime executable.
    pub runtime: PathBuf,
    /// Staged launcher script.
    pub launcher: PathBuf,
    /// Number of project files copied.
    pub files_copied: usize,
}

/// Stages project files, runtime and launcher for `request`.
///
/// `runtime_root` is the extracted runtime release. Fails on the first
/// error of any subtask; remaining copies are aborted.
pub async fn assemble<T: TemplateRenderer>(
    workspace: &Workspace,
    profile: &PlatformProfile,
    request: &PackagingRequest,
    runtime_root: &Path,
    renderer: &T,
    copy_concurrency: usize,
) -> Result<StagedBundle> {
    let root = workspace.stage_dir().join(request.target_name());
    let bundle_dir = root.join("bundle");
    let project_dir = bundle_dir.join("project");

    tokio::fs::create_dir_all(&project_dir)
        .await
        .fs_context("creating staged project directory", &project_dir)?;

    let runtime = bundle_dir.join(&profile.runtime_name);
    let launcher = bundle_dir.join(&profile.launcher_name);

    let (files_copied, (), ()) = tokio::try_join!(
        async {
            copy_project_files(
                request.project_dir(),
                &project_dir,
                request.files(),
                copy_concurrency,
            )
            .await
            .context("copying project files")
        },
        async {
            stage_runtime(
                &runtime_root.join(&profile.runtime_path),
                &runtime,
                profile.needs_exec_bit,
            )
            .await
            .context("copying runtime")
        },
        async {
            write_launcher(renderer, profile, request, &launcher)
                .await
                .context("writing launcher")
        },
    )?;

    log::debug!(
        "Staged {} project files, {} and {} under {}",
        files_copied,
        profile.runtime_name,
        profile.launcher_name,
        root.display()
    );

    Ok(StagedBundle {
        root,
        bundle_dir,
        project_dir,
        runtime,
        launcher,
        files_copied,
    })
}

/// Lists files under `project_dir` matching `pattern`, as sorted relative paths.
///
/// Matching uses `/` separators regardless of host. Wildcards do not match
/// a leading dot, and the project's own dependency directory is skipped.
pub fn select_project_files(project_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = Pattern::new(pattern)?;
    let mut selected = Vec::new();

    let walker = walkdir::WalkDir::new(project_dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == DEPENDENCY_DIR)
        });

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_dir() || !entry.path().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(project_dir)?;
        let candidate = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if pattern.matches_with(&candidate, MATCH_OPTIONS) {
            selected.push(relative.to_path_buf());
        }
    }

    selected.sort();
    Ok(selected)
}

/// Copies the selected project files, preserving relative paths.
async fn copy_project_files(
    source_dir: &Path,
    dest_dir: &Path,
    pattern: &str,
    concurrency: usize,
) -> Result<usize> {
    let files = {
        let source_dir = source_dir.to_path_buf();
        let pattern = pattern.to_string();
        tokio::task::spawn_blocking(move || select_project_files(&source_dir, &pattern)).await??
    };

    log::debug!("Copying {} project files", files.len());

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for relative in &files {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| Error::GenericError(format!("copy limiter closed: {e}")))?;

        let from = source_dir.join(relative);
        let to = dest_dir.join(relative);
        tasks.spawn(async move {
            let _permit = permit;
            fs::copy_file(&from, &to).await
        });

        // Surface failures early; dropping the set aborts the rest.
        while let Some(result) = tasks.try_join_next() {
            result??;
        }
    }

    while let Some(result) = tasks.join_next().await {
        result??;
    }

    Ok(files.len())
}

async fn stage_runtime(from: &Path, to: &Path, needs_exec_bit: bool) -> Result<()> {
    fs::copy_file(from, to).await?;
    if needs_exec_bit {
        fs::set_executable(to).await?;
    }
    Ok(())
}

async fn write_launcher<T: TemplateRenderer>(
    renderer: &T,
    profile: &PlatformProfile,
    request: &PackagingRequest,
    dest: &Path,
) -> Result<()> {
    let vars = LauncherVars::new(request.project_name(), request.launcher_flags());
    let script = renderer.render(profile.launcher, &vars)?;

    tokio::fs::write(dest, script)
        .await
        .fs_context("writing launcher", dest)?;
    if profile.needs_exec_bit {
        fs::set_executable(dest).await?;
    }
    Ok(())
}

//! Production dependency installation inside the staged project.

use crate::bundler::{
    error::Result,
    settings::MANIFEST_FILE,
    stage::DEPENDENCY_DIR,
    utils::{fs, process::ProcessRunner},
};
use std::path::Path;

/// Package manager arguments for a production-only install.
pub const INSTALL_ARGS: &[&str] = &["install", "--omit=dev"];

/// Reinstalls production dependencies from a clean state.
///
/// Any `node_modules` already present in `project_dir` is removed first, so
/// the result never merges with dependencies from the source project. A
/// project without `package.json` has nothing to install and is left as is.
pub async fn install_dependencies<R: ProcessRunner>(
    runner: &R,
    package_manager: &Path,
    project_dir: &Path,
) -> Result<()> {
    fs::remove_dir_all(&project_dir.join(DEPENDENCY_DIR)).await?;

    if !project_dir.join(MANIFEST_FILE).is_file() {
        log::info!("No {} in staged project, skipping dependency install", MANIFEST_FILE);
        return Ok(());
    }

    log::info!("Installing fresh {}", DEPENDENCY_DIR);
    runner.run(package_manager, INSTALL_ARGS, project_dir).await
}

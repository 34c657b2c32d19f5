//! Command line interface for kodegen_bundler_node.

mod args;
mod output;

pub use args::{Args, MIRROR_ENV, RuntimeConfig};
pub use output::OutputManager;

use crate::bundler::{self, Bundler, PackagingRequest, platform};
use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute(&args).await
}

/// Packages the project described by `args`, returning the exit code.
pub async fn execute(args: &Args) -> Result<i32> {
    let config = RuntimeConfig::new();

    if let Err(validation_error) = args.validate() {
        config.error_println(&format!("Invalid arguments: {}", validation_error));
        return Ok(1);
    }

    let request = build_request(args).await?;
    config.progress_println(&format!(
        "Packaging {} for {}/{} with Node.js {}",
        request.project_name(),
        request.target_platform(),
        request.target_arch(),
        request.target_version()
    ));

    if let Ok(profile) = platform::resolve(
        request.target_platform(),
        request.target_arch(),
        request.target_version(),
        request.project_name(),
    ) && !profile.package_manager_runs_on_host()
    {
        config.warning_println(&format!(
            "{} cannot run on this host; the bundle will not include node_modules",
            profile.package_manager_path.display()
        ));
    }

    let bundler = Bundler::new()?.options(args.bundler_options());
    let artifact = bundler.bundle(&request).await?;

    config.success_println(&format!("Created {}", artifact.path.display()));
    config.indent(&format!("Type: {}", artifact.kind));
    config.indent(&format!("Size: {} bytes", artifact.size));
    config.indent(&format!("SHA256: {}", artifact.checksum));

    Ok(0)
}

/// Builds the request on a blocking thread.
///
/// Filling defaults reads `package.json` and may run `node --version`.
pub async fn build_request(args: &Args) -> Result<PackagingRequest> {
    let args = args.clone();
    tokio::task::spawn_blocking(move || args.to_request())
        .await
        .map_err(bundler::Error::from)?
}

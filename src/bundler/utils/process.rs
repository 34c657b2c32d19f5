//! Child process execution.
//!
//! Subprocesses inherit stdout/stderr so their output is forwarded live,
//! and the calling task waits until the child exits.

use crate::bundler::error::{Error, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// Environment variable overriding 7-Zip discovery.
pub const SEVEN_ZIP_ENV: &str = "SEVEN_ZIP_PATH";

/// 7-Zip executable names, in lookup order.
const SEVEN_ZIP_NAMES: &[&str] = &["7za", "7z", "7zz"];

/// Runs external commands for the bundler.
pub trait ProcessRunner: Send + Sync {
    /// Runs `program` with `args` in `cwd`, failing on non-zero exit.
    fn run(
        &self,
        program: &Path,
        args: &[&str],
        cwd: &Path,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// [`ProcessRunner`] spawning real processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandRunner;

impl ProcessRunner for CommandRunner {
    async fn run(&self, program: &Path, args: &[&str], cwd: &Path) -> Result<()> {
        let command = command_line(program, args);
        log::debug!("Running `{}` in {}", command, cwd.display());

        let status = tokio::process::Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|error| Error::CommandFailed {
                command: command.clone(),
                error,
            })?;

        if !status.success() {
            return Err(Error::NonZeroExit {
                command,
                code: status.code(),
            });
        }

        Ok(())
    }
}

/// Renders a program and its arguments as a single line for messages.
pub fn command_line(program: &Path, args: &[&str]) -> String {
    std::iter::once(program.display().to_string())
        .chain(args.iter().map(|arg| arg.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Locates a 7-Zip executable.
///
/// Honors [`SEVEN_ZIP_ENV`] first, then searches `PATH` for `7za`, `7z` and `7zz`.
pub fn find_seven_zip() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(SEVEN_ZIP_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Ok(path);
        }
        return Err(Error::ToolNotFound {
            tool: "7-Zip".to_string(),
            hint: format!("{SEVEN_ZIP_ENV} points to {} which is not a file", path.display()),
        });
    }

    for name in SEVEN_ZIP_NAMES {
        if let Ok(path) = which::which(name) {
            log::debug!("Found 7-Zip at: {}", path.display());
            return Ok(path);
        }
    }

    Err(Error::ToolNotFound {
        tool: "7-Zip".to_string(),
        hint: format!(
            "install p7zip (7za/7z) or 7-Zip (7zz), or set {SEVEN_ZIP_ENV}"
        ),
    })
}

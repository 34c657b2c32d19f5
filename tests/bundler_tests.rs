//! End-to-end pipeline tests with a fake release host and fake processes.

use kodegen_bundler_node::bundler::{
    ArtifactKind, Bundler, BundlerOptions, Error, HandlebarsRenderer, LauncherTemplate,
    LauncherVars, PackagingRequest, ProcessRunner, ReleaseFetcher, RequestBuilder, Result,
    TemplateRenderer,
};
use kodegen_bundler_node::error::PackError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use url::Url;

/// Serves a plain tarball of a fake runtime release for any URL.
#[derive(Clone, Default)]
struct FakeFetcher {
    requests: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl ReleaseFetcher for FakeFetcher {
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<()> {
        self.requests.lock().unwrap().push(url.to_string());
        if self.fail {
            return Err(Error::GenericError(format!("404 for {url}")));
        }

        let file_name = dest.file_name().unwrap().to_string_lossy().into_owned();
        let root = file_name
            .trim_end_matches(".tar.xz")
            .trim_end_matches(".7z")
            .to_string();

        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        let mut builder = tar::Builder::new(std::fs::File::create(dest).unwrap());
        let entries: &[(&str, &[u8])] = if root.contains("-win-") {
            &[("node.exe", &b"MZ runtime"[..]), ("npm.cmd", &b"@echo npm"[..])]
        } else {
            &[("bin/node", &b"ELF runtime"[..]), ("bin/npm", &b"#!/bin/sh\n"[..])]
        };
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("{root}/{path}"), *data)
                .unwrap();
        }
        builder.finish().unwrap();
        Ok(())
    }
}

/// Plays the part of 7-Zip and npm.
#[derive(Clone, Default)]
struct FakeRunner {
    calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    extract_exit_code: Option<i32>,
    install_exit_code: Option<i32>,
}

fn exit_error(name: &str, args: &[&str], code: i32) -> Error {
    Error::NonZeroExit {
        command: format!("{name} {}", args.join(" ")),
        code: Some(code),
    }
}

/// Renderer whose every launcher fails to render.
struct FailingRenderer;

impl TemplateRenderer for FailingRenderer {
    fn render(&self, template: LauncherTemplate, _vars: &LauncherVars) -> Result<String> {
        Err(Error::GenericError(format!("cannot render {template:?} launcher")))
    }
}

impl FakeRunner {
    fn programs(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }
}

impl ProcessRunner for FakeRunner {
    async fn run(&self, program: &Path, args: &[&str], cwd: &Path) -> Result<()> {
        let name = program.file_name().unwrap().to_string_lossy().into_owned();
        self.calls
            .lock()
            .unwrap()
            .push((name.clone(), args.iter().map(|a| a.to_string()).collect()));

        match args.first().copied() {
            Some("x") => {
                if let Some(code) = self.extract_exit_code {
                    return Err(exit_error(&name, args, code));
                }
                let archive = cwd.join(args[2]);
                if args[2].ends_with(".tar.xz") {
                    // Strip the fake xz layer.
                    let tar = cwd.join(args[2].trim_end_matches(".xz"));
                    std::fs::copy(&archive, tar).unwrap();
                } else {
                    let mut unpacker = tar::Archive::new(std::fs::File::open(&archive).unwrap());
                    unpacker.unpack(cwd).unwrap();
                }
                Ok(())
            }
            Some("install") => {
                if let Some(code) = self.install_exit_code {
                    return Err(exit_error(&name, args, code));
                }
                let module = cwd.join("node_modules/left-pad");
                std::fs::create_dir_all(&module).unwrap();
                std::fs::write(module.join("index.js"), "module.exports = 1").unwrap();
                Ok(())
            }
            other => panic!("unexpected command {name} {other:?}"),
        }
    }
}

struct Fixture {
    project: tempfile::TempDir,
    out: tempfile::TempDir,
    temp_root: tempfile::TempDir,
    fetcher: FakeFetcher,
    runner: FakeRunner,
}

impl Fixture {
    fn new() -> Self {
        let project = tempfile::tempdir().unwrap();
        for (path, content) in [
            ("package.json", r#"{"name": "demo", "version": "1.0.0"}"#),
            ("index.js", "require('./lib/util')"),
            ("lib/util.js", "module.exports = {}"),
            ("README.md", "# demo"),
            ("node_modules/stale/index.js", "stale"),
        ] {
            let file = project.path().join(path);
            std::fs::create_dir_all(file.parent().unwrap()).unwrap();
            std::fs::write(file, content).unwrap();
        }

        Self {
            project,
            out: tempfile::tempdir().unwrap(),
            temp_root: tempfile::tempdir().unwrap(),
            fetcher: FakeFetcher::default(),
            runner: FakeRunner::default(),
        }
    }

    fn request(&self) -> RequestBuilder {
        RequestBuilder::new()
            .project_dir(self.project.path())
            .out_dir(self.out.path())
            .target_version("20.0.0")
            .target_platform("linux")
            .target_arch("x64")
    }

    fn bundler(&self) -> Bundler<FakeFetcher, FakeRunner, HandlebarsRenderer> {
        self.bundler_with(HandlebarsRenderer::new().unwrap())
    }

    fn bundler_with<T: TemplateRenderer>(&self, renderer: T) -> Bundler<FakeFetcher, FakeRunner, T> {
        Bundler::with_parts(self.fetcher.clone(), self.runner.clone(), renderer).options(
            BundlerOptions {
                seven_zip: Some(PathBuf::from("7z")),
                temp_root: Some(self.temp_root.path().to_path_buf()),
                ..Default::default()
            },
        )
    }

    async fn bundle(
        &self,
        request: &PackagingRequest,
    ) -> kodegen_bundler_node::error::Result<kodegen_bundler_node::BundledArtifact> {
        self.bundler().bundle(request).await
    }

    fn workspaces_left(&self) -> usize {
        std::fs::read_dir(self.temp_root.path()).unwrap().count()
    }

    fn out_entries(&self) -> usize {
        std::fs::read_dir(self.out.path()).unwrap().count()
    }
}

fn zip_names(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect()
}

#[tokio::test]
async fn test_zip_bundle_layout() {
    let fx = Fixture::new();
    let request = fx
        .request()
        .launcher_flag("--max-old-space-size=4096")
        .build()
        .unwrap();

    let artifact = fx.bundle(&request).await.unwrap();

    assert_eq!(artifact.kind, ArtifactKind::Archive);
    assert_eq!(
        artifact.path,
        fx.out.path().join("demo-1.0.0-v20.0.0-linux-x64.zip")
    );
    assert_eq!(artifact.checksum.len(), 64);
    assert_eq!(artifact.size, std::fs::metadata(&artifact.path).unwrap().len());

    let names = zip_names(&artifact.path);
    let root = "demo-1.0.0-v20.0.0-linux-x64/bundle";
    for expected in [
        "node",
        "demo",
        "project/index.js",
        "project/lib/util.js",
        "project/package.json",
        "project/node_modules/left-pad/index.js",
    ] {
        let entry = format!("{root}/{expected}");
        assert!(names.contains(&entry), "missing {entry} in {names:?}");
    }
    assert!(!names.iter().any(|n| n.contains("node_modules/stale")));

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&artifact.path).unwrap()).unwrap();
    let mut launcher = archive.by_name(&format!("{root}/demo")).unwrap();
    #[cfg(unix)]
    assert_eq!(launcher.unix_mode().unwrap() & 0o111, 0o111);
    let mut script = String::new();
    launcher.read_to_string(&mut script).unwrap();
    assert!(script.starts_with("#!/bin/sh"));
    assert!(script.contains("--max-old-space-size=4096"));

    assert_eq!(
        fx.fetcher.requests.lock().unwrap().as_slice(),
        ["https://nodejs.org/download/release/v20.0.0/node-v20.0.0-linux-x64.tar.xz"]
    );
    assert_eq!(fx.runner.programs(), ["7z", "npm"]);
    assert_eq!(fx.workspaces_left(), 0);
}

#[tokio::test]
async fn test_directory_bundle_with_file_glob() {
    let fx = Fixture::new();
    let request = fx
        .request()
        .files("**/*.js")
        .target_name("portable")
        .should_zip(false)
        .build()
        .unwrap();

    let artifact = fx.bundle(&request).await.unwrap();

    assert_eq!(artifact.kind, ArtifactKind::Directory);
    let project = fx.out.path().join("portable/bundle/project");
    assert!(project.join("index.js").is_file());
    assert!(project.join("lib/util.js").is_file());
    assert!(!project.join("README.md").exists());
    assert!(!project.join("package.json").exists());
    // Without a manifest there is nothing to install.
    assert!(!project.join("node_modules").exists());
    assert_eq!(fx.runner.programs(), ["7z"]);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let node = fx.out.path().join("portable/bundle/node");
        let mode = std::fs::metadata(node).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }
    assert_eq!(fx.workspaces_left(), 0);
}

#[tokio::test]
async fn test_windows_bundle_uses_cmd_launcher() {
    let fx = Fixture::new();
    let request = fx
        .request()
        .target_platform("win32")
        .should_zip(false)
        .build()
        .unwrap();

    let artifact = fx.bundle(&request).await.unwrap();

    let bundle = artifact.path.join("bundle");
    assert!(bundle.join("node.exe").is_file());
    let script = std::fs::read_to_string(bundle.join("demo.cmd")).unwrap();
    assert!(script.starts_with("@echo off"));
    assert!(script.contains("\r\n"));
    if cfg!(windows) {
        assert_eq!(fx.runner.programs(), ["7z", "npm.cmd"]);
    } else {
        // npm.cmd cannot run here, so the bundle ships without dependencies.
        assert_eq!(fx.runner.programs(), ["7z"]);
        assert!(!bundle.join("project/node_modules").exists());
        assert!(bundle.join("project/package.json").is_file());
    }
    assert!(
        fx.fetcher.requests.lock().unwrap()[0].ends_with("/v20.0.0/node-v20.0.0-win-x64.7z")
    );
}

#[tokio::test]
async fn test_existing_directory_artifact_is_replaced() {
    let fx = Fixture::new();
    let stale = fx.out.path().join("demo/leftover.txt");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, "old").unwrap();

    let request = fx
        .request()
        .target_name("demo")
        .should_zip(false)
        .build()
        .unwrap();
    fx.bundle(&request).await.unwrap();

    assert!(!stale.exists());
    assert!(fx.out.path().join("demo/bundle/project/index.js").is_file());
}

#[tokio::test]
async fn test_repeated_runs_produce_identical_trees() {
    let first = Fixture::new();
    let request = first.request().should_zip(false).build().unwrap();
    let a = first.bundle(&request).await.unwrap();

    let second = first.bundle(&request).await.unwrap();
    assert_eq!(a.checksum, second.checksum);
    assert_eq!(a.size, second.size);
}

#[tokio::test]
async fn test_unsupported_platform_has_no_side_effects() {
    let fx = Fixture::new();
    let request = fx
        .request()
        .target_platform("aix")
        .target_arch("ppc64")
        .build()
        .unwrap();

    let err = fx.bundle(&request).await.unwrap_err();

    assert!(matches!(err, PackError::UnsupportedPlatform { .. }));
    assert!(fx.fetcher.requests.lock().unwrap().is_empty());
    assert_eq!(fx.workspaces_left(), 0);
    assert_eq!(fx.out_entries(), 0);
}

#[tokio::test]
async fn test_unsupported_architecture() {
    let fx = Fixture::new();
    let request = fx.request().target_platform("darwin").target_arch("x86").build().unwrap();

    let err = fx.bundle(&request).await.unwrap_err();
    assert!(matches!(
        err,
        PackError::UnsupportedPlatform { ref platform, ref arch } if platform == "darwin" && arch == "x86"
    ));
}

#[tokio::test]
async fn test_fetch_failure_cleans_up() {
    let mut fx = Fixture::new();
    fx.fetcher.fail = true;
    let request = fx.request().build().unwrap();

    let err = fx.bundle(&request).await.unwrap_err();

    assert!(matches!(err, PackError::Fetch(_)));
    assert_eq!(err.stage(), "fetch");
    assert!(fx.runner.programs().is_empty());
    assert_eq!(fx.workspaces_left(), 0);
    assert_eq!(fx.out_entries(), 0);
}

#[tokio::test]
async fn test_install_failure_leaves_no_artifact() {
    let mut fx = Fixture::new();
    fx.runner.install_exit_code = Some(1);
    let request = fx.request().build().unwrap();

    let err = fx.bundle(&request).await.unwrap_err();

    assert!(matches!(
        err,
        PackError::DependencyInstallFailed { code: Some(1), .. }
    ));
    assert_eq!(fx.workspaces_left(), 0);
    assert_eq!(fx.out_entries(), 0);
    // The source project is never touched.
    assert!(fx.project.path().join("node_modules/stale/index.js").is_file());
}

#[tokio::test]
async fn test_keep_workspace() {
    let fx = Fixture::new();
    let request = fx.request().build().unwrap();
    let bundler = fx.bundler().options(BundlerOptions {
        seven_zip: Some(PathBuf::from("7z")),
        temp_root: Some(fx.temp_root.path().to_path_buf()),
        keep_workspace: true,
        ..Default::default()
    });

    bundler.bundle(&request).await.unwrap();
    assert_eq!(fx.workspaces_left(), 1);
}

#[tokio::test]
async fn test_extract_failure_cleans_up() {
    let mut fx = Fixture::new();
    fx.runner.extract_exit_code = Some(2);
    let request = fx.request().build().unwrap();

    let err = fx.bundle(&request).await.unwrap_err();

    assert!(matches!(err, PackError::Extract(_)));
    assert_eq!(err.stage(), "extract");
    assert_eq!(fx.runner.programs(), ["7z"]);
    assert_eq!(fx.workspaces_left(), 0);
    assert_eq!(fx.out_entries(), 0);
}

#[tokio::test]
async fn test_launcher_render_failure_cleans_up() {
    let fx = Fixture::new();
    let request = fx.request().build().unwrap();

    let err = fx
        .bundler_with(FailingRenderer)
        .bundle(&request)
        .await
        .unwrap_err();

    assert!(matches!(err, PackError::StagingFailed(_)));
    assert_eq!(fx.runner.programs(), ["7z"]);
    assert_eq!(fx.workspaces_left(), 0);
    assert_eq!(fx.out_entries(), 0);
}

#[tokio::test]
async fn test_output_path_that_is_a_file_fails_packaging() {
    let fx = Fixture::new();
    let blocker = fx.out.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();
    let request = fx.request().out_dir(&blocker).build().unwrap();

    let err = fx.bundle(&request).await.unwrap_err();

    assert!(matches!(err, PackError::PackagingFailed(_)));
    assert_eq!(err.stage(), "packaging");
    assert_eq!(fx.workspaces_left(), 0);
    assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "file");
}

#[tokio::test]
async fn test_dot_names_never_reach_the_output_parent() {
    let fx = Fixture::new();
    let nested_out = fx.out.path().join("dist");
    std::fs::create_dir_all(&nested_out).unwrap();

    for name in ["..", "."] {
        let err = fx
            .request()
            .out_dir(&nested_out)
            .target_name(name)
            .should_zip(false)
            .build()
            .unwrap_err();
        assert!(matches!(err, PackError::InvalidInput { .. }), "{name}");
    }

    assert!(nested_out.is_dir());
    assert!(fx.project.path().join("index.js").is_file());
    assert!(fx.fetcher.requests.lock().unwrap().is_empty());
}

#[test]
fn test_request_rejects_missing_project() {
    let dir = tempfile::tempdir().unwrap();
    let err = RequestBuilder::new()
        .project_dir(dir.path().join("missing"))
        .target_version("20.0.0")
        .build()
        .unwrap_err();
    assert!(matches!(err, PackError::InvalidInput { .. }));
}

mod cli {
    use assert_cmd::Command;
    use predicates::prelude::*;

    #[test]
    fn help_prints() {
        Command::cargo_bin("kodegen_bundler_node")
            .unwrap()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--target-platform"));
    }

    #[test]
    fn missing_project_fails() {
        let dir = tempfile::tempdir().unwrap();
        Command::cargo_bin("kodegen_bundler_node")
            .unwrap()
            .arg(dir.path().join("missing"))
            .args(["--target-version", "20.0.0"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Invalid input"));
    }

    #[test]
    fn unsupported_platform_fails_before_download() {
        let dir = tempfile::tempdir().unwrap();
        Command::cargo_bin("kodegen_bundler_node")
            .unwrap()
            .arg(dir.path())
            .args(["--name", "demo", "--target-version", "20.0.0"])
            .args(["--target-platform", "aix", "--target-arch", "ppc64"])
            .arg("--out-dir")
            .arg(dir.path())
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Unsupported platform"));
    }
}

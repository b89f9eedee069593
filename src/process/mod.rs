use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use log::{debug, info, warn};

use crate::catalog::{AppDescriptor, StoreInfo};
use crate::engine::models::Platform;
use crate::env::NATIVE_DIST_DIR;
use crate::templates;

/// Why the external packaging toolchain did not produce artifacts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NativeBuildError {
    #[error("native build disabled")]
    Disabled,
    #[error("project directory {0} not found")]
    ProjectMissing(PathBuf),
    #[error("project scaffold failed: {0}")]
    ScaffoldFailed(String),
    #[error("toolchain unavailable: {0}")]
    ToolchainMissing(String),
    #[error("`{step}` failed: {detail}")]
    BuildFailed { step: String, detail: String },
    #[error("build produced no usable output: {0}")]
    MissingOutput(String),
}

/// Runs `npm` inside an Electron project to produce real installers.
#[derive(Clone, Debug)]
pub struct NativeToolchain {
    project_dir: PathBuf,
    node: String,
    npm: String,
}

impl NativeToolchain {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            node: default_program("node"),
            npm: default_program("npm"),
        }
    }

    /// Use this `node` executable instead of the one on `PATH`.
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = node.into();
        self
    }

    pub fn with_npm(mut self, npm: impl Into<String>) -> Self {
        self.npm = npm.into();
        self
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.project_dir.join(NATIVE_DIST_DIR)
    }

    /// Write `package.json` and `main.js` for `app` unless they already exist.
    pub fn scaffold(&self, app: &AppDescriptor, store: &StoreInfo) -> Result<(), NativeBuildError> {
        fs::create_dir_all(&self.project_dir).map_err(|e| {
            NativeBuildError::ScaffoldFailed(format!(
                "unable to create project dir {}: {e}",
                self.project_dir.display()
            ))
        })?;
        let files = [
            (
                "package.json",
                templates::render_electron_package(app, store),
            ),
            ("main.js", templates::render_electron_main(app)),
        ];
        for (name, contents) in files {
            let path = self.project_dir.join(name);
            if path.exists() {
                debug!("native: keeping existing {}", path.display());
                continue;
            }
            fs::write(&path, contents).map_err(|e| {
                NativeBuildError::ScaffoldFailed(format!("failed to write {}: {e}", path.display()))
            })?;
            info!("native: scaffolded {}", path.display());
        }
        Ok(())
    }

    /// Check that both `node` and `npm` can be started and report success.
    pub fn check_tools(&self) -> Result<(), NativeBuildError> {
        for program in [&self.node, &self.npm] {
            let output = Command::new(program)
                .arg("--version")
                .stdin(Stdio::null())
                .output()
                .map_err(|e| NativeBuildError::ToolchainMissing(format!("{program}: {e}")))?;
            if !output.status.success() {
                return Err(NativeBuildError::ToolchainMissing(format!(
                    "{program} --version exited with {}",
                    output.status
                )));
            }
            debug!(
                "native: {} {}",
                program,
                String::from_utf8_lossy(&output.stdout).trim()
            );
        }
        Ok(())
    }

    /// Install dependencies and run one build script per platform.
    ///
    /// Blocks until every child exits. Returns the build output directory.
    pub fn build(&self, platforms: &[Platform]) -> Result<PathBuf, NativeBuildError> {
        if !self.project_dir.is_dir() {
            return Err(NativeBuildError::ProjectMissing(self.project_dir.clone()));
        }
        self.check_tools()?;

        if !self.project_dir.join("node_modules").exists() {
            info!("native: installing dependencies in {}", self.project_dir.display());
            self.run_npm(&["install"])?;
        }

        for platform in platforms {
            info!("native: building {} target", platform.label());
            self.run_npm(&["run", platform.npm_script()])?;
        }

        let dist = self.dist_dir();
        if !dist.is_dir() {
            return Err(NativeBuildError::MissingOutput(format!(
                "{} was not created",
                dist.display()
            )));
        }
        Ok(dist)
    }

    fn run_npm(&self, args: &[&str]) -> Result<(), NativeBuildError> {
        let step = format!("{} {}", self.npm, args.join(" "));
        debug!("native: running {} in {}", step, self.project_dir.display());
        let output = Command::new(&self.npm)
            .args(args)
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| NativeBuildError::ToolchainMissing(format!("{}: {e}", self.npm)))?;
        if !output.status.success() {
            let detail = failure_detail(&output);
            warn!("native: {} failed: {}", step, detail);
            return Err(NativeBuildError::BuildFailed { step, detail });
        }
        Ok(())
    }
}

// npm ships as a .cmd shim on Windows, which Command does not resolve by itself.
fn default_program(name: &str) -> String {
    if cfg!(target_os = "windows") && name == "npm" {
        "npm.cmd".into()
    } else {
        name.into()
    }
}

fn failure_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = if stderr.trim().is_empty() {
        stdout.trim().to_owned()
    } else {
        stderr.trim().to_owned()
    };
    if text.is_empty() {
        format!("exited with {}", output.status)
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING: &str = "appwrap-definitely-not-installed-tool";

    #[test]
    fn missing_project_dir_is_reported_first() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("absent");
        let toolchain = NativeToolchain::new(&project);
        assert_eq!(
            toolchain.build(&Platform::ALL),
            Err(NativeBuildError::ProjectMissing(project))
        );
    }

    #[test]
    fn missing_programs_mean_missing_toolchain() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = NativeToolchain::new(dir.path()).with_node(MISSING).with_npm(MISSING);
        assert!(matches!(
            toolchain.check_tools(),
            Err(NativeBuildError::ToolchainMissing(_))
        ));
        assert!(matches!(
            toolchain.build(&[Platform::Linux]),
            Err(NativeBuildError::ToolchainMissing(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn failing_version_check_means_missing_toolchain() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = NativeToolchain::new(dir.path()).with_node("true").with_npm("false");
        match toolchain.build(&[Platform::Linux]) {
            Err(NativeBuildError::ToolchainMissing(msg)) => {
                assert!(msg.contains("false --version"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_a_build_failure() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake_npm = dir.path().join("fake-npm");
        fs::write(
            &fake_npm,
            "#!/bin/sh\n[ \"$1\" = \"--version\" ] && exit 0\necho \"cannot $1\" >&2\nexit 3\n",
        )
        .unwrap();
        fs::set_permissions(&fake_npm, fs::Permissions::from_mode(0o755)).unwrap();

        let toolchain = NativeToolchain::new(dir.path())
            .with_node("true")
            .with_npm(fake_npm.to_string_lossy().into_owned());
        match toolchain.build(&[Platform::Windows]) {
            Err(NativeBuildError::BuildFailed { step, detail }) => {
                assert!(step.ends_with("install"));
                assert_eq!(detail, "cannot install");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn successful_steps_without_dist_mean_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        let toolchain = NativeToolchain::new(dir.path()).with_node("true").with_npm("true");
        assert!(matches!(
            toolchain.build(&Platform::ALL),
            Err(NativeBuildError::MissingOutput(_))
        ));

        fs::create_dir_all(dir.path().join("dist")).unwrap();
        assert_eq!(
            toolchain.build(&Platform::ALL),
            Ok(dir.path().join("dist"))
        );
    }

    #[test]
    fn scaffold_keeps_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("demo-app-electron");
        let toolchain = NativeToolchain::new(&project);
        let app = AppDescriptor::new("demo-app", "https://example.com/demo");
        let store = StoreInfo {
            store_name: "S".into(),
            publisher: "P".into(),
        };

        fs::create_dir_all(&project).unwrap();
        fs::write(project.join("main.js"), "// custom").unwrap();
        toolchain.scaffold(&app, &store).unwrap();

        assert_eq!(
            fs::read_to_string(project.join("main.js")).unwrap(),
            "// custom"
        );
        let package = fs::read_to_string(project.join("package.json")).unwrap();
        assert!(package.contains("\"build-linux\""));
    }

    #[test]
    fn scaffold_into_a_file_is_a_scaffold_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blocked"), "not a directory").unwrap();
        let toolchain = NativeToolchain::new(dir.path().join("blocked/demo-app-electron"));
        let app = AppDescriptor::new("demo-app", "https://example.com/demo");
        let store = StoreInfo {
            store_name: "S".into(),
            publisher: "P".into(),
        };
        match toolchain.scaffold(&app, &store) {
            Err(NativeBuildError::ScaffoldFailed(msg)) => {
                assert!(msg.starts_with("unable to create project dir"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn describes_errors() {
        let err = NativeBuildError::BuildFailed {
            step: "npm run build-win".into(),
            detail: "boom".into(),
        };
        assert_eq!(err.to_string(), "`npm run build-win` failed: boom");
    }
}

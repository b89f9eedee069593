use std::path::PathBuf;

/// Default root of the output directory tree, relative to the working directory.
pub const DEFAULT_DOWNLOADS_DIR: &str = "downloads";

/// Default port of the local artifact server.
pub const DEFAULT_PORT: u16 = 8000;

/// Where electron-builder places its outputs inside a project.
pub const NATIVE_DIST_DIR: &str = "dist";

/// Base URL the smoke tester fetches from when none is given.
pub fn default_server_url() -> String {
    format!("http://localhost:{DEFAULT_PORT}")
}

/// Project directory the native build uses for an app unless overridden.
pub fn default_native_project_dir(app_id: &str) -> PathBuf {
    PathBuf::from(format!("{app_id}-electron"))
}

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Mac,
    Linux,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Windows, Platform::Mac, Platform::Linux];

    /// Directory under the downloads root, also used in artifact file names.
    pub fn dir_name(self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Mac => "mac",
            Platform::Linux => "linux",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Platform::Windows => "exe",
            Platform::Mac => "dmg",
            Platform::Linux => "AppImage",
        }
    }

    pub fn launcher_name(self) -> &'static str {
        match self {
            Platform::Windows => "launcher.bat",
            Platform::Mac | Platform::Linux => "launcher.sh",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::Mac => "macOS",
            Platform::Linux => "Linux",
        }
    }

    /// npm script that asks electron-builder for this platform's target.
    pub fn npm_script(self) -> &'static str {
        match self {
            Platform::Windows => "build-win",
            Platform::Mac => "build-mac",
            Platform::Linux => "build-linux",
        }
    }

    pub fn artifact_file_name(self, app_id: &str) -> String {
        format!("{app_id}-{}.{}", self.dir_name(), self.extension())
    }

    pub fn parse(value: &str) -> Option<Platform> {
        match value.trim().to_ascii_lowercase().as_str() {
            "windows" | "win" => Some(Platform::Windows),
            "mac" | "macos" | "darwin" => Some(Platform::Mac),
            "linux" => Some(Platform::Linux),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// ZIP container wearing a native extension.
    Placeholder,
    /// Real output copied from the native build toolchain.
    Native,
}

impl ArtifactKind {
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Placeholder => "placeholder",
            ArtifactKind::Native => "native",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Artifact {
    pub app_id: String,
    pub platform: Platform,
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub size_bytes: u64,
}

use std::fmt::Write;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;

use log::{debug, info, warn};
use serde::Serialize;

use crate::catalog::AppDescriptor;
use crate::engine::models::{ArtifactKind, Platform};
use crate::networking::{NetworkClient, join_url};
use crate::packager;
use crate::storage::OutputTree;
use crate::templates::{HTML_ENTRY, README_ENTRY};

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

#[derive(Debug, Clone, Serialize)]
pub struct SmokeReport {
    pub timestamp: String,
    pub root: String,
    pub base_url: Option<String>,
    pub checks: Vec<ArtifactCheck>,
}

impl SmokeReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(ArtifactCheck::passed)
    }

    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|check| !check.passed()).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactCheck {
    pub app_id: String,
    pub platform: Platform,
    pub path: String,
    pub exists: bool,
    pub size_bytes: Option<u64>,
    /// Detected from the file header; `None` when the file is missing.
    pub kind: Option<ArtifactKind>,
    /// Archive problem for placeholders; native artifacts are never opened.
    pub archive_error: Option<String>,
    pub http: Option<HttpCheck>,
}

impl ArtifactCheck {
    pub fn local_ok(&self) -> bool {
        self.exists && self.size_bytes.is_some_and(|size| size > 0) && self.archive_error.is_none()
    }

    pub fn passed(&self) -> bool {
        self.local_ok() && self.http.as_ref().is_none_or(HttpCheck::passed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HttpCheck {
    pub url: String,
    pub status: Option<u16>,
    pub body_bytes: Option<u64>,
    pub error: Option<String>,
}

impl HttpCheck {
    pub fn passed(&self) -> bool {
        self.status == Some(200) && self.error.is_none()
    }
}

/// Verifies the artifacts a generation run should have produced.
pub struct SmokeTester {
    tree: OutputTree,
    client: NetworkClient,
}

impl SmokeTester {
    pub fn new(tree: OutputTree) -> Self {
        Self {
            tree,
            client: NetworkClient::default(),
        }
    }

    pub fn with_client(mut self, client: NetworkClient) -> Self {
        self.client = client;
        self
    }

    /// Local checks for every platform artifact of `apps`, plus HTTP checks
    /// against `base_url` when one is given.
    pub async fn run(&self, apps: &[AppDescriptor], base_url: Option<&str>) -> SmokeReport {
        info!(
            "check: verifying {} app(s) under {}",
            apps.len(),
            self.tree.root().display()
        );
        let mut checks = Vec::with_capacity(apps.len() * Platform::ALL.len());
        for app in apps {
            for platform in Platform::ALL {
                let mut check = self.check_local(&app.id, platform);
                if let Some(base) = base_url {
                    check.http = Some(self.check_http(base, &app.id, platform).await);
                }
                if !check.passed() {
                    warn!("check: {} {} failed", app.id, platform);
                }
                checks.push(check);
            }
        }
        SmokeReport {
            timestamp: format_timestamp(SystemTime::now()),
            root: self.tree.root().display().to_string(),
            base_url: base_url.map(str::to_owned),
            checks,
        }
    }

    fn check_local(&self, app_id: &str, platform: Platform) -> ArtifactCheck {
        let path = self.tree.artifact_path(app_id, platform);
        let mut check = ArtifactCheck {
            app_id: app_id.to_owned(),
            platform,
            path: path.display().to_string(),
            exists: false,
            size_bytes: None,
            kind: None,
            archive_error: None,
            http: None,
        };
        let Ok(meta) = fs::metadata(&path) else {
            debug!("check: {} missing", path.display());
            return check;
        };
        check.exists = meta.is_file();
        check.size_bytes = Some(meta.len());
        if !check.exists {
            check.archive_error = Some("not a regular file".into());
            return check;
        }

        match has_zip_magic(&path) {
            Ok(true) => {
                check.kind = Some(ArtifactKind::Placeholder);
                check.archive_error = verify_placeholder(&path, platform).err();
            }
            Ok(false) => check.kind = Some(ArtifactKind::Native),
            Err(err) => check.archive_error = Some(err),
        }
        check
    }

    async fn check_http(&self, base_url: &str, app_id: &str, platform: Platform) -> HttpCheck {
        let url = join_url(
            base_url,
            &format!(
                "{}/{}",
                platform.dir_name(),
                platform.artifact_file_name(app_id)
            ),
        );
        match self.client.fetch(&url).await {
            Ok(resp) => {
                debug!("check: {url} -> {} ({} bytes)", resp.status, resp.body_bytes);
                HttpCheck {
                    url,
                    status: Some(resp.status),
                    body_bytes: Some(resp.body_bytes),
                    error: None,
                }
            }
            Err(err) => {
                warn!("check: {err}");
                HttpCheck {
                    url,
                    status: None,
                    body_bytes: None,
                    error: Some(err),
                }
            }
        }
    }
}

fn has_zip_magic(path: &Path) -> Result<bool, String> {
    let mut file =
        fs::File::open(path).map_err(|e| format!("unable to open {}: {e}", path.display()))?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == ZIP_MAGIC),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(format!("unable to read {}: {err}", path.display())),
    }
}

/// A placeholder must hold exactly the launcher, wrapper and readme, none empty.
fn verify_placeholder(path: &Path, platform: Platform) -> Result<(), String> {
    let mut entries = packager::list_entries(path)?;
    entries.sort();
    let mut expected = vec![
        platform.launcher_name().to_owned(),
        HTML_ENTRY.to_owned(),
        README_ENTRY.to_owned(),
    ];
    expected.sort();
    if entries != expected {
        return Err(format!(
            "unexpected entries [{}], wanted [{}]",
            entries.join(", "),
            expected.join(", ")
        ));
    }
    for name in &entries {
        if packager::read_entry(path, name)?.is_empty() {
            return Err(format!("entry {name} is empty"));
        }
    }
    Ok(())
}

pub fn format_report(report: &SmokeReport) -> String {
    let mut output = String::new();

    let status = |value| if value { "OK" } else { "FAILED" };
    let size = |value: Option<u64>| value.map_or_else(|| "-".to_owned(), crate::util::format_size);

    let _ = writeln!(&mut output, "appwrap Smoke Report");
    let _ = writeln!(&mut output, "Generated: {}", report.timestamp);
    let _ = writeln!(&mut output, "Root: {}", report.root);
    let _ = writeln!(
        &mut output,
        "Server: {}",
        report.base_url.as_deref().unwrap_or("not checked")
    );
    let _ = writeln!(
        &mut output,
        "Summary: {} of {} artifact(s) passed",
        report.checks.len() - report.failed_count(),
        report.checks.len()
    );

    let mut current_app = None;
    for check in &report.checks {
        if current_app != Some(check.app_id.as_str()) {
            let _ = writeln!(&mut output, "\n=== {} ===", check.app_id);
            current_app = Some(check.app_id.as_str());
        }
        let kind = check.kind.map_or("missing", ArtifactKind::label);
        let _ = writeln!(
            &mut output,
            "{:<8} {:<6} {:>9}  {:<11} {}",
            check.platform.label(),
            status(check.local_ok()),
            size(check.size_bytes),
            kind,
            check.path
        );
        if let Some(err) = &check.archive_error {
            let _ = writeln!(&mut output, "         archive: {err}");
        }
        if let Some(http) = &check.http {
            let detail = match (&http.status, &http.error) {
                (_, Some(err)) => err.clone(),
                (Some(code), None) => format!("HTTP {code}, {}", size(http.body_bytes)),
                (None, None) => "no response".to_owned(),
            };
            let _ = writeln!(
                &mut output,
                "         http: {} {} ({detail})",
                status(http.passed()),
                http.url
            );
        }
    }

    output
}

pub fn to_json(report: &SmokeReport) -> Result<String, String> {
    serde_json::to_string_pretty(report).map_err(|e| format!("failed to encode report: {e}"))
}

fn format_timestamp(time: SystemTime) -> String {
    let dt: chrono::DateTime<chrono::Utc> = time.into();
    dt.to_rfc3339()
}

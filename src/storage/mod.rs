use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::catalog::Catalog;
use crate::engine::models::Platform;
use crate::templates;

pub const DOWNLOAD_PAGE: &str = "index.html";

/// The `downloads/{windows,mac,linux}` tree artifacts are written into.
#[derive(Clone, Debug)]
pub struct OutputTree {
    root: PathBuf,
}

impl OutputTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn platform_dir(&self, platform: Platform) -> PathBuf {
        self.root.join(platform.dir_name())
    }

    pub fn artifact_path(&self, app_id: &str, platform: Platform) -> PathBuf {
        self.platform_dir(platform)
            .join(platform.artifact_file_name(app_id))
    }

    /// Create the root and every platform folder; existing folders are kept.
    ///
    /// Every folder is attempted even when an earlier one fails, so one bad
    /// platform does not block the others. The first error is returned.
    pub fn ensure_dirs(&self) -> Result<(), String> {
        let mut first_error = None;
        for platform in Platform::ALL {
            let dir = self.platform_dir(platform);
            if let Err(e) = fs::create_dir_all(&dir) {
                warn!("storage: unable to create {}: {e}", dir.display());
                first_error
                    .get_or_insert_with(|| format!("unable to create {}: {e}", dir.display()));
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => {
                debug!("storage: output tree ready at {}", self.root.display());
                Ok(())
            }
        }
    }

    pub fn write_download_page(&self, catalog: &Catalog) -> Result<PathBuf, String> {
        fs::create_dir_all(&self.root)
            .map_err(|e| format!("unable to create {}: {e}", self.root.display()))?;
        let path = self.root.join(DOWNLOAD_PAGE);
        fs::write(&path, templates::render_download_page(catalog))
            .map_err(|e| format!("failed to write download page: {e}"))?;
        info!("storage: download page written to {}", path.display());
        Ok(path)
    }

    /// Copy real build outputs over the artifact paths of `app_id`.
    ///
    /// Every requested platform must have at least one match in `dist_dir`;
    /// otherwise nothing is copied. When several files match, the last one in
    /// path order wins.
    pub fn import_native(
        &self,
        dist_dir: &Path,
        app_id: &str,
        platforms: &[Platform],
    ) -> Result<Vec<(Platform, PathBuf, u64)>, String> {
        let mut picks = BTreeMap::new();
        for &platform in platforms {
            let matches = find_native_outputs(dist_dir, platform)?;
            let Some(source) = matches.last() else {
                return Err(format!(
                    "no {} output (*.{}) in {}",
                    platform.label(),
                    platform.extension(),
                    dist_dir.display()
                ));
            };
            if matches.len() > 1 {
                warn!(
                    "storage: {} {} outputs found, using {}",
                    matches.len(),
                    platform.label(),
                    source.display()
                );
            }
            picks.insert(platform.dir_name(), (platform, source.clone()));
        }

        self.ensure_dirs()?;
        let mut imported = Vec::with_capacity(picks.len());
        for (platform, source) in picks.into_values() {
            let dest = self.artifact_path(app_id, platform);
            let size = fs::copy(&source, &dest).map_err(|e| {
                format!(
                    "failed to copy {} to {}: {e}",
                    source.display(),
                    dest.display()
                )
            })?;
            info!("storage: imported {} -> {}", source.display(), dest.display());
            imported.push((platform, dest, size));
        }
        Ok(imported)
    }
}

/// Files below `dist_dir` whose extension matches the platform, sorted by path.
pub fn find_native_outputs(dist_dir: &Path, platform: Platform) -> Result<Vec<PathBuf>, String> {
    if !dist_dir.is_dir() {
        return Err(format!("build output directory {} not found", dist_dir.display()));
    }
    let wanted = platform.extension();
    let mut found = Vec::new();
    for entry in WalkDir::new(dist_dir) {
        let entry = entry.map_err(|e| format!("failed to scan {}: {e}", dist_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted));
        if matches {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

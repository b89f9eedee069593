use std::path::PathBuf;

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::catalog::{AppDescriptor, Catalog, StoreInfo};
use crate::engine::models::{Artifact, ArtifactKind, Platform};
use crate::engine::state::BuildStage;
use crate::packager;
use crate::process::{NativeBuildError, NativeToolchain};
use crate::storage::OutputTree;
use crate::templates;

pub mod models;
pub mod state;

/// An artifact whose generation was aborted by an I/O error.
#[derive(Clone, Debug, Serialize)]
pub struct ArtifactFailure {
    pub platform: Platform,
    pub path: PathBuf,
    pub error: String,
}

/// Placeholder results for one app; failures never stop the other platforms.
#[derive(Clone, Debug, Serialize)]
pub struct GenerationReport {
    pub app_id: String,
    pub artifacts: Vec<Artifact>,
    pub failures: Vec<ArtifactFailure>,
}

impl GenerationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What a build ended with: real installers, or placeholders and the reason.
#[derive(Clone, Debug)]
pub enum BuildOutcome {
    Native {
        app_id: String,
        artifacts: Vec<Artifact>,
    },
    Placeholder {
        reason: NativeBuildError,
        report: GenerationReport,
    },
}

impl BuildOutcome {
    pub fn app_id(&self) -> &str {
        match self {
            BuildOutcome::Native { app_id, .. } => app_id,
            BuildOutcome::Placeholder { report, .. } => &report.app_id,
        }
    }

    pub fn artifacts(&self) -> &[Artifact] {
        match self {
            BuildOutcome::Native { artifacts, .. } => artifacts,
            BuildOutcome::Placeholder { report, .. } => &report.artifacts,
        }
    }

    pub fn failures(&self) -> &[ArtifactFailure] {
        match self {
            BuildOutcome::Native { .. } => &[],
            BuildOutcome::Placeholder { report, .. } => &report.failures,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, BuildOutcome::Native { .. })
    }

    /// The stage the build finished in.
    pub fn final_stage(&self) -> BuildStage {
        match self {
            BuildOutcome::Native { .. } => BuildStage::AttemptNativeBuild,
            BuildOutcome::Placeholder { .. } => BuildStage::SynthesizePlaceholder,
        }
    }
}

/// Renders, packages and places artifacts into an [`OutputTree`].
#[derive(Clone, Debug)]
pub struct Generator {
    tree: OutputTree,
    store: StoreInfo,
    platforms: Vec<Platform>,
}

impl Generator {
    pub fn new(tree: OutputTree, store: StoreInfo) -> Self {
        Self {
            tree,
            store,
            platforms: Platform::ALL.to_vec(),
        }
    }

    pub fn for_catalog(tree: OutputTree, catalog: &Catalog) -> Self {
        Self::new(tree, catalog.store.clone())
    }

    /// Restrict generation to `platforms`; an empty list keeps the current selection.
    pub fn with_platforms(mut self, platforms: &[Platform]) -> Self {
        if !platforms.is_empty() {
            let mut selected = Vec::new();
            for platform in Platform::ALL {
                if platforms.contains(&platform) {
                    selected.push(platform);
                }
            }
            self.platforms = selected;
        }
        self
    }

    pub fn tree(&self) -> &OutputTree {
        &self.tree
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    /// Write one placeholder archive per platform for `app`.
    pub fn generate_placeholders(&self, app: &AppDescriptor) -> GenerationReport {
        info!("generate: {} ({})", app.id, app.url);
        if let Err(err) = self.tree.ensure_dirs() {
            warn!("generate: output tree incomplete: {}", err);
        }

        let mut report = GenerationReport {
            app_id: app.id.clone(),
            artifacts: Vec::with_capacity(self.platforms.len()),
            failures: Vec::new(),
        };
        for &platform in &self.platforms {
            let path = self.tree.artifact_path(&app.id, platform);
            let bundle = templates::render(app, platform, &self.store);
            match packager::write_archive(&path, &bundle.entries()) {
                Ok(size_bytes) => {
                    debug!("generate: wrote {} ({} bytes)", path.display(), size_bytes);
                    report.artifacts.push(Artifact {
                        app_id: app.id.clone(),
                        platform,
                        path,
                        kind: ArtifactKind::Placeholder,
                        size_bytes,
                    });
                }
                Err(err) => {
                    error!("generate: {} {} failed: {}", app.id, platform, err);
                    report.failures.push(ArtifactFailure {
                        platform,
                        path,
                        error: err,
                    });
                }
            }
        }
        report
    }

    /// Placeholders for every app of the catalog, one report per app.
    pub fn generate_all(&self, catalog: &Catalog) -> Vec<GenerationReport> {
        catalog
            .apps
            .iter()
            .map(|app| self.generate_placeholders(app))
            .collect()
    }

    /// Try the native toolchain first and fall back to placeholders on any failure.
    ///
    /// `None` skips straight to placeholders. There is no retry.
    pub fn build(&self, app: &AppDescriptor, toolchain: Option<&NativeToolchain>) -> BuildOutcome {
        debug!("build: {} entering {}", app.id, BuildStage::AttemptNativeBuild);
        match self.attempt_native(app, toolchain) {
            Ok(artifacts) => {
                info!(
                    "build: {} produced {} native artifact(s)",
                    app.id,
                    artifacts.len()
                );
                BuildOutcome::Native {
                    app_id: app.id.clone(),
                    artifacts,
                }
            }
            Err(reason) => self.fall_back(app, reason),
        }
    }

    /// Write placeholders for `app` because the native stage failed with `reason`.
    pub fn fall_back(&self, app: &AppDescriptor, reason: NativeBuildError) -> BuildOutcome {
        match &reason {
            NativeBuildError::Disabled => debug!("build: {} native build disabled", app.id),
            other => warn!("build: {} native build failed: {}", app.id, other),
        }
        debug!("build: {} entering {}", app.id, BuildStage::SynthesizePlaceholder);
        let report = self.generate_placeholders(app);
        BuildOutcome::Placeholder { reason, report }
    }

    fn attempt_native(
        &self,
        app: &AppDescriptor,
        toolchain: Option<&NativeToolchain>,
    ) -> Result<Vec<Artifact>, NativeBuildError> {
        let toolchain = toolchain.ok_or(NativeBuildError::Disabled)?;
        let dist = toolchain.build(&self.platforms)?;
        let imported = self
            .tree
            .import_native(&dist, &app.id, &self.platforms)
            .map_err(NativeBuildError::MissingOutput)?;
        Ok(imported
            .into_iter()
            .map(|(platform, path, size_bytes)| Artifact {
                app_id: app.id.clone(),
                platform,
                path,
                kind: ArtifactKind::Native,
                size_bytes,
            })
            .collect())
    }
}

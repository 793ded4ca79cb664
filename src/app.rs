use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::champions::{self, ChampionTable};
use crate::config::ResolvedConfig;
use crate::ddragon::DdragonClient;
use crate::domain::{Stage, Version};
use crate::error::DragontailError;
use crate::fs_util;
use crate::store::{self, FsProbe, LocalFs, StepDecision, Store};
use crate::tiles;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub force: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveAction {
    Downloaded,
    Skipped,
    Planned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionAction {
    Extracted,
    Skipped,
    Planned,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub version: Version,
    pub dry_run: bool,
    pub archive: ArchiveAction,
    pub extraction: ExtractionAction,
    pub archive_removed: bool,
    pub champion_count: usize,
    pub tiles_copied: usize,
    pub missing_tiles: Vec<String>,
    pub champions_path: Option<String>,
    pub tiles_path: Option<String>,
    pub finished_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUnit {
    Bytes,
    Files,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: u64,
    pub total: Option<u64>,
    pub unit: ProgressUnit,
}

impl Progress {
    pub fn percent(&self) -> Option<u8> {
        match self.total {
            Some(0) => Some(100),
            Some(total) => Some(((self.done.min(total) * 100) / total) as u8),
            None => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
    pub progress: Option<Progress>,
}

impl ProgressEvent {
    pub fn stage(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            progress: None,
        }
    }

    pub fn progress(stage: Stage, message: impl Into<String>, progress: Progress) -> Self {
        Self {
            stage,
            message: message.into(),
            progress: Some(progress),
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

pub struct App<C: DdragonClient> {
    store: Store,
    config: ResolvedConfig,
    client: C,
}

impl<C: DdragonClient> App<C> {
    pub fn new(store: Store, config: ResolvedConfig, client: C) -> Self {
        let store = store.with_locale(config.locale.clone());
        Self {
            store,
            config,
            client,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn run(
        &self,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<PipelineReport, DragontailError> {
        tracing::info!("starting DDragon data pipeline");

        let version = self
            .resolve_version(sink)
            .map_err(|err| err.in_stage(Stage::Resolve))?;

        if options.dry_run {
            return Ok(self.plan(&version, options, &LocalFs));
        }

        let (archive_path, archive) = self
            .fetch_archive(&version, options.force, sink)
            .map_err(|err| err.in_stage(Stage::Download))?;

        let (_, extracted) = self
            .extract_archive(&archive_path, &version, options.force, sink)
            .map_err(|err| err.in_stage(Stage::Extract))?;

        let mut archive_removed = false;
        if extracted {
            tracing::info!("cleaning up archive file");
            archive_removed = Store::remove_file_if_exists(&archive_path)
                .map_err(|err| err.in_stage(Stage::Extract))?;
        }

        let table = self
            .generate_champions(&version, sink)
            .map_err(|err| err.in_stage(Stage::Transform))?;

        let tiles_copied = self
            .copy_tiles(&version, sink)
            .map_err(|err| err.in_stage(Stage::Copy))?;

        let tiles_dir = self.store.tiles_dir();
        let missing_tiles = tiles::missing_tiles(&table, &tiles_dir);
        if !missing_tiles.is_empty() {
            tracing::warn!(
                count = missing_tiles.len(),
                ids = %missing_tiles.join(", "),
                "champions without a tile image"
            );
        }

        tracing::info!("all steps completed successfully");
        Ok(PipelineReport {
            version,
            dry_run: false,
            archive,
            extraction: if extracted {
                ExtractionAction::Extracted
            } else {
                ExtractionAction::Skipped
            },
            archive_removed,
            champion_count: table.len(),
            tiles_copied,
            missing_tiles,
            champions_path: Some(self.store.champions_output_path().to_string()),
            tiles_path: Some(tiles_dir.to_string()),
            finished_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    pub fn plan(&self, version: &Version, options: &RunOptions, probe: &dyn FsProbe) -> PipelineReport {
        let download = if options.force {
            StepDecision::Run
        } else {
            store::download_decision(&self.store, version, probe)
        };
        let extraction = if options.force {
            StepDecision::Run
        } else {
            store::extraction_decision(&self.store, version, probe)
        };
        PipelineReport {
            version: version.clone(),
            dry_run: true,
            archive: match download {
                StepDecision::Run => ArchiveAction::Planned,
                StepDecision::Skip => ArchiveAction::Skipped,
            },
            extraction: match extraction {
                StepDecision::Run => ExtractionAction::Planned,
                StepDecision::Skip => ExtractionAction::Skipped,
            },
            archive_removed: false,
            champion_count: 0,
            tiles_copied: 0,
            missing_tiles: Vec::new(),
            champions_path: None,
            tiles_path: None,
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn resolve_version(&self, sink: &dyn ProgressSink) -> Result<Version, DragontailError> {
        tracing::info!("fetching latest DDragon version list");
        sink.event(ProgressEvent::stage(Stage::Resolve, "fetching version list"));

        let versions = self.client.fetch_versions()?;
        let latest = versions
            .first()
            .ok_or_else(|| DragontailError::EmptyResult(self.config.versions_url.clone()))?;
        let version: Version = latest.parse()?;

        let marker = self.store.version_marker_path();
        Store::write_bytes_atomic(&marker, version.as_str().as_bytes())?;

        tracing::info!(%version, path = %marker, "latest version written");
        sink.event(ProgressEvent::stage(
            Stage::Resolve,
            format!("latest version {version}"),
        ));
        Ok(version)
    }

    pub fn fetch_archive(
        &self,
        version: &Version,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<(Utf8PathBuf, ArchiveAction), DragontailError> {
        tracing::info!("downloading dragontail archive (if needed)");
        let archive_path = self.store.archive_path(version);

        if !force && store::download_decision(&self.store, version, &LocalFs) == StepDecision::Skip {
            tracing::info!(path = %archive_path, "archive already exists, skipping download");
            sink.event(ProgressEvent::stage(
                Stage::Download,
                "archive already present",
            ));
            return Ok((archive_path, ArchiveAction::Skipped));
        }

        sink.event(ProgressEvent::stage(
            Stage::Download,
            format!("downloading dragontail-{version}.tgz"),
        ));
        let bytes = self.client.download_archive(version, &archive_path, sink)?;
        tracing::info!(path = %archive_path, bytes, "archive downloaded");
        Ok((archive_path, ArchiveAction::Downloaded))
    }

    pub fn extract_archive(
        &self,
        archive_path: &Utf8Path,
        version: &Version,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<(Utf8PathBuf, bool), DragontailError> {
        tracing::info!("extracting dragontail archive (if needed)");
        let extract_dir = self.store.extraction_dir(version);

        if !force && store::extraction_decision(&self.store, version, &LocalFs) == StepDecision::Skip
        {
            tracing::info!(path = %extract_dir, "extraction already exists, skipping extraction");
            sink.event(ProgressEvent::stage(Stage::Extract, "already extracted"));
            return Ok((extract_dir, false));
        }

        sink.event(ProgressEvent::stage(
            Stage::Extract,
            format!("extracting into {extract_dir}"),
        ));
        let entries = fs_util::extract_tar_gz(archive_path, &extract_dir, sink)?;
        tracing::info!(path = %extract_dir, entries, "archive extracted");
        Ok((extract_dir, true))
    }

    pub fn generate_champions(
        &self,
        version: &Version,
        sink: &dyn ProgressSink,
    ) -> Result<ChampionTable, DragontailError> {
        tracing::info!("generating trimmed champions.json");
        sink.event(ProgressEvent::stage(
            Stage::Transform,
            "projecting champion.json",
        ));

        let source = self.store.champion_source_path(version);
        let output = self.store.champions_output_path();
        let table = champions::generate(&source, &output)?;

        tracing::info!(path = %output, champions = table.len(), "champions.json written");
        sink.event(ProgressEvent::stage(
            Stage::Transform,
            format!("{} champions written", table.len()),
        ));
        Ok(table)
    }

    pub fn copy_tiles(&self, version: &Version, sink: &dyn ProgressSink) -> Result<usize, DragontailError> {
        tracing::info!("copying champion images");
        let source_dir = self.store.champion_image_dir(version);
        let files = tiles::list_source_files(&source_dir)?;
        let tiles_dir = self.store.tiles_dir();

        sink.event(ProgressEvent::stage(
            Stage::Copy,
            format!("copying {} images", files.len()),
        ));
        let copied = tiles::copy_files(&files, &tiles_dir, self.config.copy_workers, sink)?;
        tracing::info!(path = %tiles_dir, copied, "images copied");
        Ok(copied)
    }
}

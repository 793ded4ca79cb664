use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::config::DEFAULT_LOCALE;
use crate::domain::Version;
use crate::error::DragontailError;

#[derive(Debug, Clone)]
pub struct Store {
    project_root: Utf8PathBuf,
    locale: String,
}

impl Store {
    pub fn new() -> Result<Self, DragontailError> {
        let cwd = std::env::current_dir()
            .map_err(|err| DragontailError::Filesystem(err.to_string()))?;
        let project_root = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|_| DragontailError::Filesystem("invalid project path".to_string()))?;
        Ok(Self::new_with_root(project_root))
    }

    pub fn new_with_root(project_root: Utf8PathBuf) -> Self {
        Self {
            project_root,
            locale: DEFAULT_LOCALE.to_string(),
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    pub fn cache_root(&self) -> Utf8PathBuf {
        self.project_root.join("cache")
    }

    pub fn data_root(&self) -> Utf8PathBuf {
        self.project_root.join("data")
    }

    pub fn version_marker_path(&self) -> Utf8PathBuf {
        self.project_root.join("version.txt")
    }

    pub fn archive_path(&self, version: &Version) -> Utf8PathBuf {
        self.project_root
            .join(format!("dragontail-{}.tgz", version.as_str()))
    }

    pub fn extraction_dir(&self, version: &Version) -> Utf8PathBuf {
        self.cache_root().join(version.as_str())
    }

    /// The archive unpacks into `<version>/`, so the tree root inside the
    /// extraction directory repeats the version.
    pub fn extracted_tree(&self, version: &Version) -> Utf8PathBuf {
        self.extraction_dir(version).join(version.as_str())
    }

    pub fn extraction_marker(&self, version: &Version) -> Utf8PathBuf {
        self.extracted_tree(version).join("data")
    }

    pub fn champion_source_path(&self, version: &Version) -> Utf8PathBuf {
        self.extracted_tree(version)
            .join("data")
            .join(&self.locale)
            .join("champion.json")
    }

    pub fn champion_image_dir(&self, version: &Version) -> Utf8PathBuf {
        self.extracted_tree(version).join("img").join("champion")
    }

    pub fn champions_output_path(&self) -> Utf8PathBuf {
        self.data_root().join("champions.json")
    }

    pub fn tiles_dir(&self) -> Utf8PathBuf {
        self.data_root().join("tiles")
    }

    pub fn ensure_dir(path: &Utf8Path) -> Result<(), DragontailError> {
        fs::create_dir_all(path.as_std_path())
            .map_err(|err| DragontailError::Filesystem(format!("create {path}: {err}")))
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), DragontailError> {
        let parent = path
            .parent()
            .ok_or_else(|| DragontailError::Filesystem(format!("invalid destination path {path}")))?;
        Self::ensure_dir(parent)?;
        let mut temp = tempfile::Builder::new()
            .prefix(".dragontail-write")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| DragontailError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| DragontailError::Filesystem(err.to_string()))?;
        // Temp files are created 0600; the artifacts are read by other users.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))
                .map_err(|err| DragontailError::Filesystem(format!("chmod {path}: {err}")))?;
        }
        temp.persist(path.as_std_path())
            .map_err(|err| DragontailError::Filesystem(format!("persist {path}: {err}")))?;
        Ok(())
    }

    pub fn remove_file_if_exists(path: &Utf8Path) -> Result<bool, DragontailError> {
        match fs::remove_file(path.as_std_path()) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(DragontailError::Filesystem(format!("remove {path}: {err}"))),
        }
    }
}

pub trait FsProbe {
    fn exists(&self, path: &Utf8Path) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FsProbe for LocalFs {
    fn exists(&self, path: &Utf8Path) -> bool {
        path.as_std_path().exists()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepDecision {
    Skip,
    Run,
}

/// An existing archive is trusted as complete: downloads only ever land on
/// the final path after the whole body has been received. The archive is
/// removed after a fresh extraction, so a completed extraction also skips.
pub fn download_decision(store: &Store, version: &Version, probe: &dyn FsProbe) -> StepDecision {
    if probe.exists(&store.archive_path(version)) || probe.exists(&store.extraction_marker(version))
    {
        StepDecision::Skip
    } else {
        StepDecision::Run
    }
}

pub fn extraction_decision(store: &Store, version: &Version, probe: &dyn FsProbe) -> StepDecision {
    if probe.exists(&store.extraction_marker(version)) {
        StepDecision::Skip
    } else {
        StepDecision::Run
    }
}

use std::cell::Cell;
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use camino::Utf8Path;
use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

use crate::app::{Progress, ProgressEvent, ProgressSink, ProgressUnit};
use crate::domain::Stage;
use crate::error::DragontailError;

const MAX_LINK_HOPS: usize = 40;

pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}

pub fn is_contained(root: &Path, candidate: &Path) -> bool {
    normalize(candidate).starts_with(normalize(root))
}

pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let mut resolved = PathBuf::new();
    let mut pending: Vec<PathBuf> = path
        .components()
        .rev()
        .map(|component| PathBuf::from(component.as_os_str()))
        .collect();
    let mut hops = 0usize;

    while let Some(part) = pending.pop() {
        match part.components().next() {
            Some(Component::Prefix(_)) | Some(Component::RootDir) => resolved.push(&part),
            Some(Component::CurDir) | None => {}
            Some(Component::ParentDir) => {
                resolved.pop();
            }
            Some(Component::Normal(name)) => {
                let next = resolved.join(name);
                let is_link = fs::symlink_metadata(&next)
                    .map(|meta| meta.file_type().is_symlink())
                    .unwrap_or(false);
                if !is_link {
                    resolved = next;
                    continue;
                }
                hops += 1;
                if hops > MAX_LINK_HOPS {
                    return Err(io::Error::other(format!(
                        "too many levels of symbolic links at {}",
                        next.display()
                    )));
                }
                let target = fs::read_link(&next)?;
                pending.extend(
                    target
                        .components()
                        .rev()
                        .map(|component| PathBuf::from(component.as_os_str())),
                );
            }
        }
    }
    Ok(resolved)
}

pub fn safe_join(root: &Path, entry_name: &Path) -> Result<PathBuf, DragontailError> {
    let resolved = resolve_path(&root.join(entry_name))
        .map_err(|err| DragontailError::Filesystem(err.to_string()))?;
    if !is_contained(root, &resolved) {
        return Err(DragontailError::PathTraversal {
            entry: entry_name.display().to_string(),
        });
    }
    Ok(resolved)
}

struct CountingReader<R> {
    inner: R,
    consumed: Rc<Cell<u64>>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.consumed.set(self.consumed.get() + read as u64);
        Ok(read)
    }
}

/// Entries are unpacked into a staging directory next to `target_dir`, which
/// is renamed into place only after every entry passed validation. A rejected
/// archive leaves no partial tree and no completion marker behind.
pub fn extract_tar_gz(
    archive_path: &Utf8Path,
    target_dir: &Utf8Path,
    sink: &dyn ProgressSink,
) -> Result<u64, DragontailError> {
    let archive_error = |err: io::Error| DragontailError::Archive {
        path: archive_path.to_path_buf(),
        message: err.to_string(),
    };

    let file = fs::File::open(archive_path.as_std_path()).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => DragontailError::MissingInput(archive_path.to_path_buf()),
        _ => DragontailError::Filesystem(format!("open archive {archive_path}: {err}")),
    })?;
    let archive_len = file.metadata().ok().map(|meta| meta.len());

    let parent = target_dir
        .parent()
        .ok_or_else(|| DragontailError::Filesystem(format!("invalid extraction dir {target_dir}")))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| DragontailError::Filesystem(format!("create {parent}: {err}")))?;
    let staging = tempfile::Builder::new()
        .prefix(".dragontail-extract")
        .tempdir_in(parent.as_std_path())
        .map_err(|err| DragontailError::Filesystem(err.to_string()))?;
    let root = fs::canonicalize(staging.path())
        .map_err(|err| DragontailError::Filesystem(err.to_string()))?;

    let consumed = Rc::new(Cell::new(0u64));
    let reader = CountingReader {
        inner: file,
        consumed: consumed.clone(),
    };
    let mut archive = Archive::new(GzDecoder::new(reader));
    archive.set_preserve_mtime(true);

    let mut extracted = 0u64;
    for entry in archive.entries().map_err(archive_error)? {
        let mut entry = entry.map_err(archive_error)?;
        let entry_name = entry.path().map_err(archive_error)?.into_owned();
        let kind = entry.header().entry_type();

        if kind.is_pax_global_extensions() || kind.is_pax_local_extensions() {
            continue;
        }

        let target = safe_join(&root, &entry_name)?;
        match kind {
            EntryType::Directory => {
                fs::create_dir_all(&target)
                    .map_err(|err| DragontailError::Filesystem(err.to_string()))?;
            }
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                create_parent(&target)?;
                entry
                    .unpack(&target)
                    .map_err(|err| DragontailError::Filesystem(format!("{}: {err}", entry_name.display())))?;
            }
            EntryType::Symlink => {
                let link = entry
                    .link_name()
                    .map_err(archive_error)?
                    .ok_or_else(|| DragontailError::Archive {
                        path: archive_path.to_path_buf(),
                        message: format!("symlink without target: {}", entry_name.display()),
                    })?
                    .into_owned();
                // Only downward targets: a `..` could be re-aimed by a link created later.
                if link.is_absolute()
                    || link
                        .components()
                        .any(|component| matches!(component, Component::ParentDir))
                {
                    return Err(DragontailError::PathTraversal {
                        entry: entry_name.display().to_string(),
                    });
                }
                let link_parent = target.parent().unwrap_or(root.as_path());
                let resolved = resolve_path(&link_parent.join(&link))
                    .map_err(|err| DragontailError::Filesystem(err.to_string()))?;
                if !is_contained(&root, &resolved) {
                    return Err(DragontailError::PathTraversal {
                        entry: entry_name.display().to_string(),
                    });
                }
                create_parent(&target)?;
                entry
                    .unpack(&target)
                    .map_err(|err| DragontailError::Filesystem(format!("{}: {err}", entry_name.display())))?;
            }
            _ => {
                return Err(DragontailError::PathTraversal {
                    entry: entry_name.display().to_string(),
                });
            }
        }

        extracted += 1;
        tracing::debug!(entry = %entry_name.display(), "extracted");
        sink.event(ProgressEvent::progress(
            Stage::Extract,
            format!("extracted {extracted} entries"),
            Progress {
                done: consumed.get(),
                total: archive_len,
                unit: ProgressUnit::Bytes,
            },
        ));
    }

    let staged = staging.keep();
    atomic_rename_dir(&staged, target_dir.as_std_path())
        .map_err(|err| DragontailError::Filesystem(format!("move into {target_dir}: {err}")))?;
    Ok(extracted)
}

fn create_parent(path: &Path) -> Result<(), DragontailError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| DragontailError::Filesystem(err.to_string()))?;
    }
    Ok(())
}

pub fn atomic_rename_dir(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        fs::remove_dir_all(to)?;
    }
    fs::rename(from, to)
}

use std::fs::{self, File, FileTimes};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;

use crate::app::{Progress, ProgressEvent, ProgressSink, ProgressUnit};
use crate::champions::ChampionTable;
use crate::domain::Stage;
use crate::error::{CopyFailure, DragontailError};

pub fn list_source_files(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, DragontailError> {
    if !dir.as_std_path().is_dir() {
        return Err(DragontailError::MissingInput(dir.to_path_buf()));
    }
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| DragontailError::Filesystem(format!("read {dir}: {err}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| DragontailError::Filesystem(err.to_string()))?;
        let path = Utf8PathBuf::from_path_buf(entry.path()).map_err(|path| {
            DragontailError::Filesystem(format!("non-utf8 file name {}", path.display()))
        })?;
        if fs::metadata(path.as_std_path())
            .map(|meta| meta.is_file())
            .unwrap_or(false)
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn copy_files(
    files: &[Utf8PathBuf],
    dest_dir: &Utf8Path,
    workers: usize,
    sink: &dyn ProgressSink,
) -> Result<usize, DragontailError> {
    fs::create_dir_all(dest_dir.as_std_path())
        .map_err(|err| DragontailError::Filesystem(format!("create {dest_dir}: {err}")))?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|idx| format!("tile-copy-{idx}"))
        .build()
        .map_err(|err| DragontailError::Filesystem(err.to_string()))?;

    let total = files.len() as u64;
    let completed = AtomicU64::new(0);
    let results: Vec<Result<(), CopyFailure>> = pool.install(|| {
        files
            .par_iter()
            .map(|source| {
                let result = copy_one(source, dest_dir);
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                sink.event(ProgressEvent::progress(
                    Stage::Copy,
                    format!("copied {}", source.file_name().unwrap_or(source.as_str())),
                    Progress {
                        done,
                        total: Some(total),
                        unit: ProgressUnit::Files,
                    },
                ));
                result
            })
            .collect()
    });

    let failures: Vec<CopyFailure> = results.into_iter().filter_map(Result::err).collect();
    if !failures.is_empty() {
        return Err(DragontailError::Copy { failures });
    }
    Ok(files.len())
}

fn copy_one(source: &Utf8Path, dest_dir: &Utf8Path) -> Result<(), CopyFailure> {
    let failure = |err: io::Error| CopyFailure {
        file: source.to_path_buf(),
        message: err.to_string(),
    };
    let name = source.file_name().ok_or_else(|| CopyFailure {
        file: source.to_path_buf(),
        message: "source has no file name".to_string(),
    })?;
    let destination = dest_dir.join(name);
    copy_preserving_times(source.as_std_path(), destination.as_std_path()).map_err(failure)?;
    tracing::debug!(file = %name, "tile copied");
    Ok(())
}

pub fn copy_preserving_times(source: &std::path::Path, destination: &std::path::Path) -> io::Result<()> {
    fs::copy(source, destination)?;
    let meta = fs::metadata(source)?;
    let mut times = FileTimes::new().set_modified(meta.modified()?);
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    let file = File::options()
        .write(true)
        .open(destination)
        .or_else(|_| File::open(destination))?;
    file.set_times(times)
}

pub fn missing_tiles(table: &ChampionTable, tiles_dir: &Utf8Path) -> Vec<String> {
    table
        .keys()
        .filter(|id| !tiles_dir.join(format!("{id}.png")).as_std_path().is_file())
        .cloned()
        .collect()
}

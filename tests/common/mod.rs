#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{EntryType, Header};
use tempfile::TempDir;

use dragontail_fetch::app::{App, ProgressEvent, ProgressSink};
use dragontail_fetch::config::ResolvedConfig;
use dragontail_fetch::ddragon::{self, DdragonClient};
use dragontail_fetch::domain::Version;
use dragontail_fetch::error::DragontailError;
use dragontail_fetch::store::Store;

pub const VERSION: &str = "14.1.1";

#[derive(Default)]
pub struct Calls {
    versions: AtomicUsize,
    downloads: AtomicUsize,
}

impl Calls {
    pub fn versions(&self) -> usize {
        self.versions.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

/// Serves a fixed version list and archive from memory.
pub struct MockClient {
    versions: Result<Vec<String>, String>,
    archive: Vec<u8>,
    calls: Arc<Calls>,
}

impl MockClient {
    pub fn new(versions: &[&str], archive: Vec<u8>) -> (Self, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let client = Self {
            versions: Ok(versions.iter().map(|v| v.to_string()).collect()),
            archive,
            calls: calls.clone(),
        };
        (client, calls)
    }

    pub fn failing(message: &str) -> (Self, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let client = Self {
            versions: Err(message.to_string()),
            archive: Vec::new(),
            calls: calls.clone(),
        };
        (client, calls)
    }
}

impl DdragonClient for MockClient {
    fn fetch_versions(&self) -> Result<Vec<String>, DragontailError> {
        self.calls.versions.fetch_add(1, Ordering::SeqCst);
        self.versions
            .clone()
            .map_err(|message| DragontailError::Upstream {
                url: "mock://versions.json".to_string(),
                message,
            })
    }

    fn download_archive(
        &self,
        version: &Version,
        destination: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<u64, DragontailError> {
        self.calls.downloads.fetch_add(1, Ordering::SeqCst);
        let mut body = Cursor::new(self.archive.clone());
        ddragon::write_download(
            &mut body,
            destination,
            &format!("mock://dragontail-{version}.tgz"),
            Some(self.archive.len() as u64),
            4096,
            sink,
        )
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub enum TarEntry<'a> {
    File(&'a str, &'a [u8]),
    Dir(&'a str),
    Symlink(&'a str, &'a str),
    HardLink(&'a str, &'a str),
}

/// Builds a gzip tarball from raw header names, so entries such as
/// `../escape.txt` can be produced as-is.
pub fn tgz(entries: &[TarEntry<'_>]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for entry in entries {
        let mut header = Header::new_gnu();
        header.set_mtime(1_700_000_000);
        let data: &[u8] = match entry {
            TarEntry::File(name, data) => {
                header.set_entry_type(EntryType::Regular);
                header.set_mode(0o644);
                raw_name(&mut header, name);
                data
            }
            TarEntry::Dir(name) => {
                header.set_entry_type(EntryType::Directory);
                header.set_mode(0o755);
                raw_name(&mut header, name);
                &[]
            }
            TarEntry::Symlink(name, target) | TarEntry::HardLink(name, target) => {
                header.set_entry_type(if matches!(entry, TarEntry::Symlink(..)) {
                    EntryType::Symlink
                } else {
                    EntryType::Link
                });
                header.set_mode(0o777);
                raw_name(&mut header, name);
                raw_link(&mut header, target);
                &[]
            }
        };
        header.set_size(data.len() as u64);
        header.set_cksum();
        builder.append(&header, data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn raw_name(header: &mut Header, name: &str) {
    header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
}

fn raw_link(header: &mut Header, target: &str) {
    header.as_old_mut().linkname[..target.len()].copy_from_slice(target.as_bytes());
}

pub const CHAMPION_JSON: &str = r#"{
  "type": "champion",
  "format": "standAloneComplex",
  "version": "14.1.1",
  "data": {
    "Aatrox": {
      "version": "14.1.1",
      "id": "Aatrox",
      "key": "266",
      "name": "Aatrox",
      "title": "the Darkin Blade",
      "tags": ["Fighter", "Tank"]
    }
  }
}"#;

pub const AATROX_PNG: &[u8] = b"\x89PNG\r\n\x1a\nAatrox tile";

/// The minimal dragontail layout: one champion and its tile.
pub fn aatrox_archive() -> Vec<u8> {
    tgz(&[
        TarEntry::Dir("14.1.1/"),
        TarEntry::File("14.1.1/data/en_US/champion.json", CHAMPION_JSON.as_bytes()),
        TarEntry::File("14.1.1/img/champion/Aatrox.png", AATROX_PNG),
    ])
}

pub fn project() -> (TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

pub fn app(root: &Utf8Path, client: MockClient) -> App<MockClient> {
    App::new(
        Store::new_with_root(root.to_path_buf()),
        ResolvedConfig::default(),
        client,
    )
}

/// Every path under `dir`, relative to it, sorted.
pub fn listing(dir: &Utf8Path) -> Vec<String> {
    fn walk(base: &Utf8Path, dir: &Utf8Path, out: &mut Vec<String>) {
        let Ok(entries) = std::fs::read_dir(dir.as_std_path()) else {
            return;
        };
        for entry in entries {
            let path = Utf8PathBuf::from_path_buf(entry.unwrap().path()).unwrap();
            out.push(path.strip_prefix(base).unwrap().to_string());
            if path.as_std_path().is_dir() {
                walk(base, &path, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(dir, dir, &mut out);
    out.sort();
    out
}

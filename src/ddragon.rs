use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use camino::Utf8Path;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::app::{Progress, ProgressEvent, ProgressSink, ProgressUnit};
use crate::config::ResolvedConfig;
use crate::domain::{Stage, Version};
use crate::error::DragontailError;

pub trait DdragonClient: Send + Sync {
    fn fetch_versions(&self) -> Result<Vec<String>, DragontailError>;

    fn download_archive(
        &self,
        version: &Version,
        destination: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<u64, DragontailError>;
}

#[derive(Clone)]
pub struct DdragonHttpClient {
    client: Client,
    config: ResolvedConfig,
}

impl DdragonHttpClient {
    pub fn new(config: &ResolvedConfig) -> Result<Self, DragontailError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("dragontail/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DragontailError::Filesystem(err.to_string()))?,
        );
        // A total timeout would also cap the archive body, so only the
        // connect phase is bounded here and the version list sets its own.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.request_timeout)
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| DragontailError::Upstream {
                url: config.versions_url.clone(),
                message: err.to_string(),
            })?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn handle_status(
        url: &str,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, DragontailError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(DragontailError::UpstreamStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        })
    }
}

impl DdragonClient for DdragonHttpClient {
    fn fetch_versions(&self) -> Result<Vec<String>, DragontailError> {
        let url = &self.config.versions_url;
        let response = self
            .client
            .get(url)
            .timeout(self.config.request_timeout)
            .send()
            .map_err(|err| DragontailError::Upstream {
                url: url.clone(),
                message: err.to_string(),
            })?;
        let response = Self::handle_status(url, response)?;
        response
            .json::<Vec<String>>()
            .map_err(|err| DragontailError::Upstream {
                url: url.clone(),
                message: format!("invalid version list: {err}"),
            })
    }

    fn download_archive(
        &self,
        version: &Version,
        destination: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<u64, DragontailError> {
        let url = self.config.archive_url(version);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| DragontailError::Upstream {
                url: url.clone(),
                message: err.to_string(),
            })?;
        let mut response = Self::handle_status(&url, response)?;
        let expected = response.content_length();

        write_download(
            &mut response,
            destination,
            &url,
            expected,
            self.config.chunk_size,
            sink,
        )
    }
}

/// Streams `reader` into a temp file beside `destination` and only renames it
/// into place once the body is complete and matches `expected` when known.
pub fn write_download<R: Read>(
    reader: &mut R,
    destination: &Utf8Path,
    url: &str,
    expected: Option<u64>,
    chunk_size: usize,
    sink: &dyn ProgressSink,
) -> Result<u64, DragontailError> {
    let parent = destination.parent().ok_or_else(|| {
        DragontailError::Filesystem(format!("invalid download destination {destination}"))
    })?;
    let parent = if parent.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        parent
    };
    std::fs::create_dir_all(parent.as_std_path())
        .map_err(|err| DragontailError::Filesystem(format!("create {parent}: {err}")))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".dragontail-download")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| DragontailError::Filesystem(err.to_string()))?;

    let received = stream_body(reader, temp.as_file_mut(), chunk_size, url, |done| {
        sink.event(ProgressEvent::progress(
            Stage::Download,
            "downloading archive",
            Progress {
                done,
                total: expected,
                unit: ProgressUnit::Bytes,
            },
        ));
    })?;

    if let Some(expected) = expected {
        if received != expected {
            return Err(DragontailError::IncompleteDownload {
                url: url.to_string(),
                expected,
                received,
            });
        }
    }

    temp.as_file()
        .sync_all()
        .map_err(|err| DragontailError::Filesystem(err.to_string()))?;
    temp.persist(destination.as_std_path())
        .map_err(|err| DragontailError::Filesystem(format!("persist {destination}: {err}")))?;
    Ok(received)
}

pub fn stream_body<R, W, F>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
    url: &str,
    mut on_chunk: F,
) -> Result<u64, DragontailError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    F: FnMut(u64),
{
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                return Err(DragontailError::Upstream {
                    url: url.to_string(),
                    message: format!("body read failed after {total} bytes: {err}"),
                });
            }
        };
        writer
            .write_all(&buffer[..read])
            .map_err(|err| DragontailError::Filesystem(err.to_string()))?;
        total += read as u64;
        on_chunk(total);
    }
    writer
        .flush()
        .map_err(|err| DragontailError::Filesystem(err.to_string()))?;
    Ok(total)
}

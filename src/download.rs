//! HTTP transport
//!
//! [`Downloader`] is everything acquisition needs from the network: a text
//! fetch for checksum listings, a streaming archive fetch that extracts as
//! it downloads, and a plain file fetch. Both binary fetches can hash the raw
//! bytes on the way through so verification never re-reads the disk.
//!
//! ## Timeouts
//!
//! Set `RUNTIME_DIST_HTTP_TIMEOUT` (seconds) to change the connect/read
//! timeout used by [`HttpDownloader`].

use crate::error::{Error, Result};
use crate::extract::{self, Compression};
use crate::output;
use indicatif::ProgressBar;
use sha2::{Digest, Sha256};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Default HTTP timeout in seconds
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Get HTTP timeout from environment variable or use default.
/// Cached (only reads env var once).
fn get_http_timeout() -> Duration {
    static TIMEOUT: OnceLock<Duration> = OnceLock::new();
    *TIMEOUT.get_or_init(|| {
        let secs = std::env::var("RUNTIME_DIST_HTTP_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        // Clamp to reasonable range (5-300 seconds)
        Duration::from_secs(secs.clamp(5, 300))
    })
}

/// Hash computed over downloaded bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
        }
    }
}

/// How to unpack a fetched archive.
pub struct ArchiveOptions<'a> {
    pub dest_dir: &'a Path,
    /// Hash the raw (compressed) bytes with this algorithm
    pub hash: Option<HashAlgorithm>,
    /// Leading path components dropped from every entry
    pub strip_components: usize,
    /// Receives the stripped entry path; entries it rejects are skipped
    pub filter: &'a dyn Fn(&Path) -> bool,
}

/// Where to put a fetched file.
#[derive(Debug, Clone, Copy)]
pub struct FileOptions<'a> {
    pub dest_path: &'a Path,
    pub hash: Option<HashAlgorithm>,
}

/// Network capability used by acquisition.
///
/// The binary fetches return the lowercase hex digest of the downloaded
/// bytes when a hash algorithm was requested, `None` otherwise.
pub trait Downloader {
    fn fetch_text(&self, url: &str) -> Result<String>;
    fn fetch_archive(&self, url: &str, options: &ArchiveOptions<'_>) -> Result<Option<String>>;
    fn fetch_file(&self, url: &str, options: &FileOptions<'_>) -> Result<Option<String>>;
}

/// Reader adapter that hashes and counts everything read through it.
///
/// A failure of the underlying stream is remembered, so a consumer that
/// wraps every `io::Error` (the tar reader does) can still be told apart
/// from a broken connection.
struct HashingReader<R> {
    inner: R,
    hasher: Option<Sha256>,
    total: u64,
    progress: ProgressBar,
    stream_error: Option<String>,
}

impl<R: Read> HashingReader<R> {
    fn new(inner: R, algorithm: Option<HashAlgorithm>, progress: ProgressBar) -> Self {
        let hasher = algorithm.map(|HashAlgorithm::Sha256| Sha256::new());
        Self {
            inner,
            hasher,
            total: 0,
            progress,
            stream_error: None,
        }
    }

    /// Error raised by the underlying stream, if any.
    fn take_stream_error(&mut self) -> Option<String> {
        self.stream_error.take()
    }

    /// Read to EOF so trailing bytes the consumer skipped still get hashed.
    fn drain(&mut self) -> io::Result<()> {
        io::copy(self, &mut io::sink()).map(|_| ())
    }

    fn finish(self) -> (u64, Option<String>) {
        self.progress.finish_and_clear();
        let digest = self.hasher.map(|h| hex::encode(h.finalize()));
        (self.total, digest)
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf).inspect_err(|e| {
            self.stream_error = Some(e.to_string());
        })?;
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(&buf[..n]);
        }
        self.total += n as u64;
        self.progress.set_position(self.total);
        Ok(n)
    }
}

/// [`Downloader`] over blocking HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpDownloader {
    pub fn new() -> Self {
        let timeout = get_http_timeout();
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .user_agent(concat!("runtime-dist/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }

    fn get(&self, url: &str) -> Result<ureq::Response> {
        self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => Error::transport(url, format!("HTTP {}", code)),
            other => Error::transport(url, other),
        })
    }

    /// Response body wrapped in a hashing reader with a progress spinner.
    fn body(
        &self,
        url: &str,
        algorithm: Option<HashAlgorithm>,
    ) -> Result<HashingReader<Box<dyn Read + Send + Sync + 'static>>> {
        let response = self.get(url)?;
        let pb = output::spinner(&format!("downloading {}", file_name(url)));
        if let Some(len) = response
            .header("content-length")
            .and_then(|s| s.parse().ok())
        {
            output::upgrade_to_bytes(&pb, len);
        }
        Ok(HashingReader::new(response.into_reader(), algorithm, pb))
    }
}

/// Last path segment of a URL.
fn file_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

impl Downloader for HttpDownloader {
    fn fetch_text(&self, url: &str) -> Result<String> {
        self.get(url)?
            .into_string()
            .map_err(|e| Error::transport(url, format!("failed to read response: {}", e)))
    }

    fn fetch_archive(&self, url: &str, options: &ArchiveOptions<'_>) -> Result<Option<String>> {
        let compression = Compression::detect(url).ok_or_else(|| Error::Parse {
            path: options.dest_dir.to_path_buf(),
            reason: format!("unsupported archive format: {}", url),
        })?;

        let body = self.body(url, options.hash)?;
        extract_body(url, compression, body, options)
    }

    /// Write the body to `<dest>.part`, then rename it into place.
    ///
    /// A failed transfer removes the partial file; an existing `dest` is
    /// only replaced once the new copy is complete.
    fn fetch_file(&self, url: &str, options: &FileOptions<'_>) -> Result<Option<String>> {
        let body = self.body(url, options.hash)?;
        write_body(url, body, options.dest_path)
    }
}

/// Unpack a response body, draining whatever the tar reader left unread.
fn extract_body<R: Read>(
    url: &str,
    compression: Compression,
    mut body: HashingReader<R>,
    options: &ArchiveOptions<'_>,
) -> Result<Option<String>> {
    let unpacked = extract::unpack(
        &mut body,
        compression,
        options.dest_dir,
        options.strip_components,
        options.filter,
    );
    let files = match unpacked {
        Ok(files) => files,
        Err(e) => {
            let err = match body.take_stream_error() {
                Some(reason) => Error::transport(url, format!("read error: {}", reason)),
                None => e,
            };
            body.finish();
            return Err(err);
        }
    };
    body.drain()
        .map_err(|e| Error::transport(url, format!("read error: {}", e)))?;

    let (bytes, digest) = body.finish();
    output::detail(&format!(
        "extracted {} files from {} ({} bytes)",
        files,
        file_name(url),
        bytes
    ));
    Ok(digest)
}

fn write_body<R: Read>(
    url: &str,
    mut body: HashingReader<R>,
    dest: &Path,
) -> Result<Option<String>> {
    // Only a fully written file may appear under its final name
    let mut partial = dest.as_os_str().to_os_string();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let written = copy_to(url, &mut body, &partial);
    if written.is_err() {
        let _ = std::fs::remove_file(&partial);
    }
    written?;

    std::fs::rename(&partial, dest).map_err(|e| Error::fs(dest, e))?;

    let (bytes, digest) = body.finish();
    output::detail(&format!("downloaded {} ({} bytes)", file_name(url), bytes));
    Ok(digest)
}

fn copy_to<R: Read>(url: &str, body: &mut HashingReader<R>, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path).map_err(|e| Error::fs(path, e))?;

    let mut buffer = [0u8; 8192];
    loop {
        let n = body
            .read(&mut buffer)
            .map_err(|e| Error::transport(url, format!("read error: {}", e)))?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])
            .map_err(|e| Error::fs(path, e))?;
    }
    file.flush().map_err(|e| Error::fs(path, e))
}

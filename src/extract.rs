//! Streaming tar extraction
//!
//! Archives are unpacked straight from the download stream. Entries are
//! stripped of leading components and passed through a path filter before
//! anything touches the disk.

use crate::error::{Error, Result};
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

/// Compression wrapped around the tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Xz,
    None,
}

impl Compression {
    /// Detect compression from an archive name or URL.
    pub fn detect(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::Gzip)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::Xz)
        } else if name.ends_with(".tar") {
            Some(Self::None)
        } else {
            None
        }
    }
}

/// Entry path with the first `strip` components removed.
///
/// Returns `None` for entries that live entirely inside the stripped prefix.
fn strip_components(path: &Path, strip: usize) -> Option<PathBuf> {
    let mut normal = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir));
    for _ in 0..strip {
        normal.next()?;
    }
    Some(normal.collect())
}

fn ensure_no_symlink_components(dest: &Path, rel: &Path) -> Result<()> {
    // Writing through an existing symlink could land outside `dest`
    let mut cur = dest.to_path_buf();
    for comp in rel.components() {
        cur.push(comp);
        if let Ok(md) = std::fs::symlink_metadata(&cur)
            && md.file_type().is_symlink()
        {
            return Err(Error::Parse {
                path: cur,
                reason: "tar extraction blocked: symlink in path component".to_string(),
            });
        }
    }
    Ok(())
}

/// Unpack a (possibly compressed) tar stream into `dest`.
///
/// Only regular files are materialized; directories are created as needed
/// for the files that pass `filter`, and links are skipped. `filter`
/// receives the stripped, relative entry path (empty for the archive root).
///
/// Returns the number of files written.
pub fn unpack<R: Read>(
    reader: R,
    compression: Compression,
    dest: &Path,
    strip: usize,
    filter: &dyn Fn(&Path) -> bool,
) -> Result<usize> {
    let reader = BufReader::new(reader);
    match compression {
        Compression::Gzip => unpack_tar(flate2::read::GzDecoder::new(reader), dest, strip, filter),
        Compression::Xz => unpack_tar(xz2::read::XzDecoder::new(reader), dest, strip, filter),
        Compression::None => unpack_tar(reader, dest, strip, filter),
    }
}

fn unpack_tar<R: Read>(
    reader: R,
    dest: &Path,
    strip: usize,
    filter: &dyn Fn(&Path) -> bool,
) -> Result<usize> {
    let tar_error = |e: std::io::Error| Error::Parse {
        path: dest.to_path_buf(),
        reason: format!("tar read error: {}", e),
    };

    let mut archive = tar::Archive::new(reader);
    let mut written = 0;

    for entry in archive.entries().map_err(tar_error)? {
        let mut entry = entry.map_err(tar_error)?;
        let path = entry.path().map_err(tar_error)?.into_owned();

        if path.is_absolute() || path.components().any(|c| c == Component::ParentDir) {
            return Err(Error::Parse {
                path: dest.to_path_buf(),
                reason: format!("tar contains unsafe path: {}", path.display()),
            });
        }

        let Some(rel) = strip_components(&path, strip) else {
            continue;
        };
        if !filter(&rel) {
            continue;
        }
        if rel.as_os_str().is_empty() || !entry.header().entry_type().is_file() {
            continue;
        }

        let full_path = dest.join(&rel);
        ensure_no_symlink_components(dest, &rel)?;
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::fs(parent, e))?;
        }

        entry
            .unpack(&full_path)
            .map_err(|e| Error::fs(&full_path, e))?;
        written += 1;
    }

    Ok(written)
}

/// Filter keeping the archive root and C/C++ header files.
pub fn headers_only(path: &Path) -> bool {
    if path.as_os_str().is_empty() {
        return true;
    }
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("h"))
}

//! Filesystem probing
//!
//! The distribution only ever asks a handful of questions of the filesystem.
//! They sit behind [`FileProbe`] so the acquisition logic can be tested
//! against fakes; [`LocalFs`] answers them for real.

use crate::error::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a path currently is. A missing path is all `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathStat {
    pub exists: bool,
    pub is_file: bool,
    pub is_dir: bool,
}

pub trait FileProbe {
    /// Stat a path. Missing paths are not an error.
    fn stat(&self, path: &Path) -> Result<PathStat>;

    /// Find the single regular file called `name` anywhere below `root`.
    ///
    /// Zero or several matches are both [`Error::NotFound`].
    fn find_one(&self, name: &str, root: &Path) -> Result<PathBuf>;

    fn read_text(&self, path: &Path) -> Result<String>;

    /// Create a directory and its parents; succeeds if it already exists.
    fn ensure_dir(&self, path: &Path) -> Result<()>;
}

/// [`FileProbe`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

fn is_missing(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

impl FileProbe for LocalFs {
    fn stat(&self, path: &Path) -> Result<PathStat> {
        match std::fs::metadata(path) {
            Ok(md) => Ok(PathStat {
                exists: true,
                is_file: md.is_file(),
                is_dir: md.is_dir(),
            }),
            Err(e) if is_missing(&e) => Ok(PathStat::default()),
            Err(e) => Err(Error::fs(path, e)),
        }
    }

    fn find_one(&self, name: &str, root: &Path) -> Result<PathBuf> {
        let not_found = |found| Error::NotFound {
            name: name.to_string(),
            root: root.to_path_buf(),
            found,
        };

        if !self.stat(root)?.is_dir {
            return Err(not_found(0));
        }

        let mut matches = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("filesystem loop"));
                Error::fs(path, source)
            })?;
            if entry.file_type().is_file() && entry.file_name() == name {
                matches.push(entry.into_path());
            }
        }

        match matches.len() {
            1 => Ok(matches.remove(0)),
            n => Err(not_found(n)),
        }
    }

    fn read_text(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| Error::fs(path, e))
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| Error::fs(path, e))
    }
}

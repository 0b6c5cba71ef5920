//! Cache directory locking
//!
//! Two builds targeting the same configuration share one cache directory.
//! An exclusive advisory lock held around check-and-download makes the
//! second build wait and then find the cache complete.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Lock file that sits next to a cache directory: `v18.0.0` → `v18.0.0.lock`.
pub fn lock_path_for(dir: &Path) -> PathBuf {
    let mut name = dir
        .file_name()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    dir.with_file_name(name)
}

fn open_lock_file(dir: &Path) -> Result<(File, PathBuf)> {
    let path = lock_path_for(dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::fs(parent, e))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(|e| Error::Lock {
            path: path.clone(),
            source: e,
        })?;
    Ok((file, path))
}

/// Block until the lock guarding `dir` is ours.
pub fn lock_cache_dir(dir: &Path) -> Result<CacheLock> {
    let (file, path) = open_lock_file(dir)?;
    file.lock_exclusive().map_err(|e| Error::Lock {
        path: path.clone(),
        source: e,
    })?;
    Ok(CacheLock { file, path })
}

/// Take the lock without waiting; `None` if another holder has it.
pub fn try_lock_cache_dir(dir: &Path) -> Result<Option<CacheLock>> {
    let (file, path) = open_lock_file(dir)?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(Some(CacheLock { file, path })),
        Err(e) if is_contended(&e) => Ok(None),
        Err(e) => Err(Error::Lock { path, source: e }),
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    match (e.raw_os_error(), fs2::lock_contended_error().raw_os_error()) {
        (Some(code), Some(contended)) => code == contended,
        _ => e.kind() == std::io::ErrorKind::WouldBlock,
    }
}

/// RAII guard; the lock is released when dropped.
///
/// The lock file itself stays on disk. Removing it while another process
/// waits on it would let a third process lock a different inode.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_is_sibling() {
        assert_eq!(
            lock_path_for(Path::new("/cache/node/linux/x64/v18.0.0")),
            PathBuf::from("/cache/node/linux/x64/v18.0.0.lock")
        );
    }

    #[test]
    fn test_lock_acquired_before_dir_exists() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("node/linux/x64/v18.0.0");

        let lock = lock_cache_dir(&cache).unwrap();
        assert!(lock.path().exists());
        assert!(!cache.exists());
    }

    #[test]
    fn test_contention_is_recognized() {
        assert!(is_contended(&fs2::lock_contended_error()));
        assert!(!is_contended(&std::io::Error::from(
            std::io::ErrorKind::PermissionDenied
        )));
    }

    #[test]
    fn test_second_holder_blocked_until_release() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("v18.0.0");

        let first = lock_cache_dir(&cache).unwrap();
        assert!(try_lock_cache_dir(&cache).unwrap().is_none());

        drop(first);
        assert!(try_lock_cache_dir(&cache).unwrap().is_some());
    }
}

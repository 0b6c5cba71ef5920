//! Runtime distribution acquisition
//!
//! A [`RuntimeDistribution`] owns one cache directory, derived from a
//! [`BuildConfiguration`]. It knows which files a native build needs from
//! that directory, fetches and verifies them when any are missing, and reads
//! the runtime's ABI number out of the downloaded headers.
//!
//! ## Cache layout
//!
//! ```text
//! <cache_root>/<runtime>/<os>/<arch>/v<version>/
//!     include/node/node.h          header-only distributions
//!     src/node.h                   full source distributions
//!     deps/v8/include/v8.h
//!     win-x64/node.lib             Windows import libraries
//! <cache_root>/<runtime>/<os>/<arch>/v<version>.lock
//! ```
//!
//! A cache directory is complete when every required file is present.
//! There is no separate success marker, so an interrupted or rejected
//! download is repaired by the next [`RuntimeDistribution::ensure_ready`].

use crate::config::{BuildConfiguration, Settings};
use crate::download::{ArchiveOptions, Downloader, FileOptions, HashAlgorithm, HttpDownloader};
use crate::error::{Error, Result};
use crate::extract;
use crate::lock;
use crate::manifest::ChecksumManifest;
use crate::output;
use crate::probe::{FileProbe, LocalFs};
use crate::registry::{PathResolver, RemoteLayout, UrlRegistry, url_join};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Checksum listing published next to node and io.js downloads
const CHECKSUM_FILE: &str = "SHASUMS256.txt";

/// Header declaring `NODE_MODULE_VERSION`
const VERSION_HEADER: &str = "node_version.h";

/// Marker for header-only distributions
const HEADER_ONLY_MARKER: &str = "include/node/node.h";

/// Shallow and deep markers for full source distributions. Extraction can
/// stop before reaching the deep one, so both are required.
const SOURCE_MARKERS: [&str; 2] = ["src/node.h", "deps/v8/include/v8.h"];

fn module_version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"#define\s+NODE_MODULE_VERSION\s+(\d+)").expect("static regex is valid")
    })
}

/// Read `NODE_MODULE_VERSION` out of the text of `node_version.h`.
pub fn parse_module_version(text: &str, path: &Path) -> Result<u32> {
    let digits = module_version_pattern()
        .captures(text)
        .and_then(|c| c.get(1))
        .ok_or_else(|| Error::Parse {
            path: path.to_path_buf(),
            reason: "failed to find NODE_MODULE_VERSION macro".to_string(),
        })?;

    digits.as_str().parse::<u32>().map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        reason: format!(
            "invalid version specified by NODE_MODULE_VERSION macro '{}': {}",
            digits.as_str(),
            e
        ),
    })
}

/// Headers (and import libraries) for one build configuration.
pub struct RuntimeDistribution<D = HttpDownloader, P = LocalFs> {
    config: BuildConfiguration,
    internal_path: PathBuf,
    layout: RemoteLayout,
    downloader: D,
    probe: P,
    abi: OnceLock<u32>,
    locking: bool,
}

impl RuntimeDistribution {
    /// Distribution backed by the official mirrors, HTTP and the local disk.
    pub fn new(config: BuildConfiguration, settings: &Settings) -> Result<Self> {
        Self::with_collaborators(
            config,
            settings,
            &UrlRegistry::new(settings),
            HttpDownloader::new(),
            LocalFs,
        )
    }
}

impl<D: Downloader, P: FileProbe> RuntimeDistribution<D, P> {
    /// Build a distribution with explicit collaborators.
    ///
    /// The remote layout is resolved once, here.
    pub fn with_collaborators(
        config: BuildConfiguration,
        settings: &Settings,
        resolver: &dyn PathResolver,
        downloader: D,
        probe: P,
    ) -> Result<Self> {
        let layout = resolver.resolve(&config)?;
        let internal_path = settings.cache_dir(&config);
        Ok(Self {
            config,
            internal_path,
            layout,
            downloader,
            probe,
            abi: OnceLock::new(),
            locking: true,
        })
    }

    /// Skip the cache directory lock, for callers that serialize access themselves.
    pub fn without_lock(mut self) -> Self {
        self.locking = false;
        self
    }

    pub fn config(&self) -> &BuildConfiguration {
        &self.config
    }

    pub fn layout(&self) -> &RemoteLayout {
        &self.layout
    }

    /// Local cache directory of this distribution.
    pub fn internal_path(&self) -> &Path {
        &self.internal_path
    }

    /// Remote base URL of this distribution.
    pub fn external_path(&self) -> &str {
        &self.layout.external_base_url
    }

    pub fn header_only(&self) -> bool {
        self.layout.header_only
    }

    /// Local paths of the Windows import libraries.
    pub fn win_libs(&self) -> Vec<PathBuf> {
        self.layout
            .extra_artifacts
            .iter()
            .map(|a| self.internal_path.join(&a.dir).join(&a.name))
            .collect()
    }

    /// `NODE_MODULE_VERSION`, once [`resolve_abi`](Self::resolve_abi) succeeded.
    pub fn abi(&self) -> Option<u32> {
        self.abi.get().copied()
    }

    /// Every file a build needs from the cache directory.
    pub fn required_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = if self.layout.header_only {
            vec![self.internal_path.join(HEADER_ONLY_MARKER)]
        } else {
            SOURCE_MARKERS
                .iter()
                .map(|m| self.internal_path.join(m))
                .collect()
        };
        if self.config.os.needs_import_libs() {
            files.extend(self.win_libs());
        }
        files
    }

    /// Required files that are not present as regular files.
    pub fn missing_files(&self) -> Result<Vec<PathBuf>> {
        let mut missing = Vec::new();
        for file in self.required_files() {
            if !self.probe.stat(&file)?.is_file {
                missing.push(file);
            }
        }
        Ok(missing)
    }

    /// Whether the cache directory holds everything a build needs.
    ///
    /// Never touches the network. Missing files are `Ok(false)`; only real
    /// filesystem failures are errors.
    pub fn is_complete(&self) -> Result<bool> {
        if !self.probe.stat(&self.internal_path)?.is_dir {
            return Ok(false);
        }
        Ok(self.missing_files()?.is_empty())
    }

    /// Make sure the cache directory is complete, downloading if it isn't.
    pub fn ensure_ready(&self) -> Result<()> {
        let _guard = if self.locking {
            Some(self.lock()?)
        } else {
            None
        };

        if self.is_complete()? {
            output::skip(&format!("{} already cached", self.config));
            return Ok(());
        }

        self.download()?;

        // An archive that extracted fine but lacks a required header is
        // not something we can build against.
        if let Some(first) = self.missing_files()?.into_iter().next() {
            let name = first
                .strip_prefix(&self.internal_path)
                .unwrap_or(&first)
                .display()
                .to_string();
            return Err(Error::NotFound {
                name,
                root: self.internal_path.clone(),
                found: 0,
            });
        }
        Ok(())
    }

    fn lock(&self) -> Result<lock::CacheLock> {
        if let Some(guard) = lock::try_lock_cache_dir(&self.internal_path)? {
            return Ok(guard);
        }
        let guard = lock::lock_cache_dir(&self.internal_path)?;
        output::detail(&format!(
            "waited for another process holding {}",
            guard.path().display()
        ));
        Ok(guard)
    }

    /// Fetch everything: checksum listing, headers archive, import libraries.
    ///
    /// Each step aborts the rest on failure. Nothing already written is
    /// rolled back.
    pub fn download(&self) -> Result<()> {
        self.probe.ensure_dir(&self.internal_path)?;
        let manifest = self.fetch_manifest()?;
        self.fetch_archive(manifest.as_ref())?;
        self.fetch_extras(manifest.as_ref())?;
        Ok(())
    }

    /// `SHASUMS256.txt` for runtimes that publish one, `None` otherwise.
    pub fn fetch_manifest(&self) -> Result<Option<ChecksumManifest>> {
        if !self.config.runtime.publishes_checksums() {
            output::detail(&format!(
                "{} publishes no checksums, skipping verification",
                self.config.runtime
            ));
            return Ok(None);
        }

        let url = url_join(self.external_path(), CHECKSUM_FILE);
        output::detail(&format!("fetching {}", url));
        let text = self.downloader.fetch_text(&url)?;
        let manifest = ChecksumManifest::parse(&text);
        if manifest.is_empty() {
            output::warning(&format!("{} lists no checksums", url));
        } else {
            output::detail(&format!("{} checksums listed", manifest.len()));
        }
        Ok(Some(manifest))
    }

    /// Stream the headers archive into the cache directory.
    pub fn fetch_archive(&self, manifest: Option<&ChecksumManifest>) -> Result<()> {
        let archive = &self.layout.archive_path;
        let url = url_join(self.external_path(), archive);
        output::detail(&format!("downloading {}", url));

        let actual = self.downloader.fetch_archive(
            &url,
            &ArchiveOptions {
                dest_dir: &self.internal_path,
                hash: manifest.map(|_| HashAlgorithm::Sha256),
                strip_components: 1,
                filter: &extract::headers_only,
            },
        )?;

        verify(manifest, archive, actual)
    }

    /// Download the import libraries, only for targets that link against them.
    pub fn fetch_extras(&self, manifest: Option<&ChecksumManifest>) -> Result<()> {
        if !self.config.os.needs_import_libs() {
            return Ok(());
        }

        for artifact in &self.layout.extra_artifacts {
            let dir = self.internal_path.join(&artifact.dir);
            self.probe.ensure_dir(&dir)?;

            let relative = artifact.relative_path();
            let url = url_join(self.external_path(), &relative);
            output::detail(&format!("downloading {}", url));

            let dest = dir.join(&artifact.name);
            let actual = self.downloader.fetch_file(
                &url,
                &FileOptions {
                    dest_path: &dest,
                    hash: manifest.map(|_| HashAlgorithm::Sha256),
                },
            )?;

            verify(manifest, &relative, actual)?;
        }
        Ok(())
    }

    /// Find `node_version.h` below `include/` and record its ABI number.
    ///
    /// Only meaningful after [`ensure_ready`](Self::ensure_ready). Once a
    /// value is recorded it is kept; later calls return it without I/O.
    pub fn resolve_abi(&self) -> Result<u32> {
        if let Some(abi) = self.abi() {
            return Ok(abi);
        }

        let include = self.internal_path.join("include");
        let header = self.probe.find_one(VERSION_HEADER, &include)?;
        let text = self.probe.read_text(&header)?;
        let version = parse_module_version(&text, &header)?;

        Ok(*self.abi.get_or_init(|| version))
    }
}

/// Check `actual` against the listing, if there is one.
fn verify(manifest: Option<&ChecksumManifest>, path: &str, actual: Option<String>) -> Result<()> {
    let Some(manifest) = manifest else {
        return Ok(());
    };

    if manifest.matches(path, actual.as_deref()) {
        output::detail(&format!(
            "verified {} of {}",
            HashAlgorithm::Sha256.name(),
            path
        ));
        return Ok(());
    }

    Err(Error::ChecksumMismatch {
        path: path.to_string(),
        expected: manifest.expected(path).map(str::to_string),
        actual,
    })
}

//! Remote layout of runtime distributions.
//!
//! Maps a [`BuildConfiguration`] to where its headers live on the runtime's
//! download server and which extra files Windows builds need.

use crate::config::{BuildConfiguration, Runtime, Settings, TargetArch};
use crate::error::{Error, Result};
use semver::Version;

/// A platform-specific binary downloaded next to the headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraArtifact {
    /// Subdirectory relative to the distribution root (may be empty)
    pub dir: String,
    pub name: String,
}

impl ExtraArtifact {
    pub fn new(dir: &str, name: &str) -> Self {
        Self {
            dir: dir.to_string(),
            name: name.to_string(),
        }
    }

    /// Path relative to the distribution root, as listed in `SHASUMS256.txt`.
    pub fn relative_path(&self) -> String {
        if self.dir.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.dir, self.name)
        }
    }
}

/// Where a distribution lives remotely and what it consists of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    /// Base URL, always ending in `/`
    pub external_base_url: String,
    /// Archive path relative to the base URL
    pub archive_path: String,
    /// Whether the archive only carries headers (no full source tree)
    pub header_only: bool,
    pub extra_artifacts: Vec<ExtraArtifact>,
}

/// Resolves a configuration to its remote layout. Must not perform I/O.
pub trait PathResolver {
    fn resolve(&self, config: &BuildConfiguration) -> Result<RemoteLayout>;
}

/// Download layout of the runtimes published on their official mirrors.
#[derive(Debug, Clone)]
pub struct UrlRegistry {
    node_mirror: String,
    iojs_mirror: String,
    electron_mirror: String,
}

/// nw.js headers are only published on S3
const NW_MIRROR: &str = "https://node-webkit.s3.amazonaws.com";

impl UrlRegistry {
    pub fn new(settings: &Settings) -> Self {
        Self {
            node_mirror: settings.node_mirror.trim_end_matches('/').to_string(),
            iojs_mirror: settings.iojs_mirror.trim_end_matches('/').to_string(),
            electron_mirror: settings.electron_mirror.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for UrlRegistry {
    fn default() -> Self {
        Self::new(&Settings::from_env())
    }
}

fn parse_version(version: &str) -> Result<Version> {
    Version::parse(version).map_err(|source| Error::InvalidVersion {
        version: version.to_string(),
        source,
    })
}

/// `x64` for 64-bit builds, the distribution root otherwise.
fn legacy_lib_dir(arch: TargetArch) -> &'static str {
    if arch == TargetArch::X64 { "x64" } else { "" }
}

/// `win-x64` / `win-x86`, used by node >= 4 and io.js.
fn win_lib_dir(arch: TargetArch) -> &'static str {
    if arch == TargetArch::X64 {
        "win-x64"
    } else {
        "win-x86"
    }
}

impl PathResolver for UrlRegistry {
    fn resolve(&self, config: &BuildConfiguration) -> Result<RemoteLayout> {
        let version = parse_version(&config.version)?;
        let v = &config.version;

        let layout = match config.runtime {
            Runtime::Node if version < Version::new(4, 0, 0) => RemoteLayout {
                external_base_url: format!("{}/v{}/", self.node_mirror, v),
                archive_path: format!("node-v{}.tar.gz", v),
                header_only: false,
                extra_artifacts: vec![ExtraArtifact::new(legacy_lib_dir(config.arch), "node.lib")],
            },
            Runtime::Node => RemoteLayout {
                external_base_url: format!("{}/v{}/", self.node_mirror, v),
                archive_path: format!("node-v{}-headers.tar.gz", v),
                header_only: true,
                extra_artifacts: vec![ExtraArtifact::new(win_lib_dir(config.arch), "node.lib")],
            },
            Runtime::Iojs => RemoteLayout {
                external_base_url: format!("{}/v{}/", self.iojs_mirror, v),
                archive_path: format!("iojs-v{}.tar.gz", v),
                header_only: false,
                extra_artifacts: vec![ExtraArtifact::new(win_lib_dir(config.arch), "iojs.lib")],
            },
            Runtime::Electron => {
                // Pre-releases of 4.0.0 already ship the header-only tarball
                let header_only_since = parse_version("4.0.0-alpha")?;
                RemoteLayout {
                    external_base_url: format!("{}/v{}/", self.electron_mirror, v),
                    archive_path: format!("node-v{}.tar.gz", v),
                    header_only: version >= header_only_since,
                    extra_artifacts: vec![ExtraArtifact::new(
                        legacy_lib_dir(config.arch),
                        "node.lib",
                    )],
                }
            }
            Runtime::Nw => RemoteLayout {
                external_base_url: format!("{}/v{}/", NW_MIRROR, v),
                archive_path: format!("nw-headers-v{}.tar.gz", v),
                header_only: false,
                extra_artifacts: vec![
                    ExtraArtifact::new(legacy_lib_dir(config.arch), "nw.lib"),
                    ExtraArtifact::new(legacy_lib_dir(config.arch), "node.lib"),
                ],
            },
        };

        Ok(layout)
    }
}

/// Join a base URL and a relative path with exactly one `/` between them.
pub fn url_join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetOs;

    fn registry() -> UrlRegistry {
        UrlRegistry::new(&Settings::with_cache_root("/unused"))
    }

    fn resolve(runtime: Runtime, version: &str, arch: TargetArch) -> RemoteLayout {
        let config = BuildConfiguration::new(runtime, version, TargetOs::Win32, arch);
        registry().resolve(&config).unwrap()
    }

    #[test]
    fn test_modern_node_is_header_only() {
        let layout = resolve(Runtime::Node, "18.17.0", TargetArch::X64);
        assert_eq!(layout.external_base_url, "https://nodejs.org/dist/v18.17.0/");
        assert_eq!(layout.archive_path, "node-v18.17.0-headers.tar.gz");
        assert!(layout.header_only);
        assert_eq!(
            layout.extra_artifacts,
            vec![ExtraArtifact::new("win-x64", "node.lib")]
        );
    }

    #[test]
    fn test_legacy_node_ships_full_tree() {
        let layout = resolve(Runtime::Node, "0.12.18", TargetArch::Ia32);
        assert_eq!(layout.archive_path, "node-v0.12.18.tar.gz");
        assert!(!layout.header_only);
        assert_eq!(layout.extra_artifacts, vec![ExtraArtifact::new("", "node.lib")]);
    }

    #[test]
    fn test_iojs_layout() {
        let layout = resolve(Runtime::Iojs, "3.3.1", TargetArch::Ia32);
        assert_eq!(layout.external_base_url, "https://iojs.org/dist/v3.3.1/");
        assert_eq!(layout.archive_path, "iojs-v3.3.1.tar.gz");
        assert_eq!(layout.extra_artifacts[0].relative_path(), "win-x86/iojs.lib");
    }

    #[test]
    fn test_electron_header_only_threshold() {
        assert!(!resolve(Runtime::Electron, "3.1.13", TargetArch::X64).header_only);
        assert!(resolve(Runtime::Electron, "4.0.0-beta.1", TargetArch::X64).header_only);
        assert!(resolve(Runtime::Electron, "25.3.0", TargetArch::X64).header_only);
    }

    #[test]
    fn test_nw_needs_two_libs() {
        let layout = resolve(Runtime::Nw, "0.80.0", TargetArch::X64);
        let paths: Vec<_> = layout
            .extra_artifacts
            .iter()
            .map(ExtraArtifact::relative_path)
            .collect();
        assert_eq!(paths, vec!["x64/nw.lib", "x64/node.lib"]);
    }

    #[test]
    fn test_custom_mirror_trailing_slash() {
        let mut settings = Settings::with_cache_root("/unused");
        settings.node_mirror = "https://mirror.example/node/".to_string();
        let config =
            BuildConfiguration::new(Runtime::Node, "20.0.0", TargetOs::Linux, TargetArch::X64);
        let layout = UrlRegistry::new(&settings).resolve(&config).unwrap();
        assert_eq!(layout.external_base_url, "https://mirror.example/node/v20.0.0/");
    }

    #[test]
    fn test_invalid_version_rejected() {
        let config =
            BuildConfiguration::new(Runtime::Node, "latest", TargetOs::Linux, TargetArch::X64);
        let err = registry().resolve(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { .. }));
    }

    #[test]
    fn test_url_join() {
        assert_eq!(url_join("https://a/v1/", "SHASUMS256.txt"), "https://a/v1/SHASUMS256.txt");
        assert_eq!(url_join("https://a/v1", "/x/y.lib"), "https://a/v1/x/y.lib");
    }
}

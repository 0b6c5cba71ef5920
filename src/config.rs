//! Build configuration and settings.
//!
//! A [`BuildConfiguration`] names the runtime a native module is compiled
//! against. [`Settings`] carries everything environment-dependent: where the
//! cache lives and which mirrors to download from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default node.js distribution mirror
pub const DEFAULT_NODE_MIRROR: &str = "https://nodejs.org/dist";

/// Default io.js distribution mirror
pub const DEFAULT_IOJS_MIRROR: &str = "https://iojs.org/dist";

/// Default electron headers mirror
pub const DEFAULT_ELECTRON_MIRROR: &str = "https://electronjs.org/headers";

/// Directory under the home directory used when no cache root is configured
const CACHE_DIR_NAME: &str = ".runtime-dist";

/// Runtime a native module is built against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    Node,
    Iojs,
    Electron,
    Nw,
}

impl Runtime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Iojs => "iojs",
            Self::Electron => "electron",
            Self::Nw => "nw",
        }
    }

    /// Whether the runtime publishes a `SHASUMS256.txt` next to its downloads.
    pub fn publishes_checksums(&self) -> bool {
        matches!(self, Self::Node | Self::Iojs)
    }
}

/// Target operating system, spelled the way node reports `process.platform`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetOs {
    Linux,
    Darwin,
    Win32,
    FreeBsd,
    OpenBsd,
    SunOs,
    Aix,
}

impl TargetOs {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Win32 => "win32",
            Self::FreeBsd => "freebsd",
            Self::OpenBsd => "openbsd",
            Self::SunOs => "sunos",
            Self::Aix => "aix",
        }
    }

    /// Linking a native module on Windows needs the runtime's import libraries.
    pub fn needs_import_libs(&self) -> bool {
        matches!(self, Self::Win32)
    }

    pub fn host() -> Option<Self> {
        match std::env::consts::OS {
            "linux" => Some(Self::Linux),
            "macos" => Some(Self::Darwin),
            "windows" => Some(Self::Win32),
            "freebsd" => Some(Self::FreeBsd),
            "openbsd" => Some(Self::OpenBsd),
            "solaris" | "illumos" => Some(Self::SunOs),
            "aix" => Some(Self::Aix),
            _ => None,
        }
    }
}

/// Target CPU architecture, spelled the way node reports `process.arch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetArch {
    X64,
    Ia32,
    Arm64,
    Arm,
    Ppc64,
    S390x,
    Riscv64,
    Loong64,
}

impl TargetArch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::Ia32 => "ia32",
            Self::Arm64 => "arm64",
            Self::Arm => "arm",
            Self::Ppc64 => "ppc64",
            Self::S390x => "s390x",
            Self::Riscv64 => "riscv64",
            Self::Loong64 => "loong64",
        }
    }

    pub fn host() -> Option<Self> {
        match std::env::consts::ARCH {
            "x86_64" => Some(Self::X64),
            "x86" => Some(Self::Ia32),
            "aarch64" => Some(Self::Arm64),
            "arm" => Some(Self::Arm),
            "powerpc64" => Some(Self::Ppc64),
            "s390x" => Some(Self::S390x),
            "riscv64" => Some(Self::Riscv64),
            "loongarch64" => Some(Self::Loong64),
            _ => None,
        }
    }
}

macro_rules! impl_str_conversions {
    ($ty:ty, $what:literal, [$($variant:ident),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lower = s.to_ascii_lowercase();
                $(
                    if lower == <$ty>::$variant.as_str() {
                        return Ok(<$ty>::$variant);
                    }
                )+
                Err(format!("unknown {}: {}", $what, s))
            }
        }
    };
}

impl_str_conversions!(Runtime, "runtime", [Node, Iojs, Electron, Nw]);
impl_str_conversions!(
    TargetOs,
    "operating system",
    [Linux, Darwin, Win32, FreeBsd, OpenBsd, SunOs, Aix]
);
impl_str_conversions!(
    TargetArch,
    "architecture",
    [X64, Ia32, Arm64, Arm, Ppc64, S390x, Riscv64, Loong64]
);

/// Identifies one build target. Immutable for the lifetime of an acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildConfiguration {
    pub runtime: Runtime,
    pub version: String,
    pub os: TargetOs,
    pub arch: TargetArch,
}

impl BuildConfiguration {
    pub fn new(
        runtime: Runtime,
        version: impl Into<String>,
        os: TargetOs,
        arch: TargetArch,
    ) -> Self {
        let version = version.into();
        // "v18.0.0" and "18.0.0" name the same release
        let version = version
            .strip_prefix('v')
            .map(str::to_string)
            .unwrap_or(version);
        Self {
            runtime,
            version,
            os,
            arch,
        }
    }

    /// Configuration targeting the machine we are running on.
    ///
    /// Returns `None` on platforms node has no distribution for.
    pub fn host(runtime: Runtime, version: impl Into<String>) -> Option<Self> {
        Some(Self::new(
            runtime,
            version,
            TargetOs::host()?,
            TargetArch::host()?,
        ))
    }
}

impl fmt::Display for BuildConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{} ({}-{})",
            self.runtime, self.version, self.os, self.arch
        )
    }
}

/// Environment-dependent settings for acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Root under which every distribution gets its own directory
    pub cache_root: PathBuf,
    pub node_mirror: String,
    pub iojs_mirror: String,
    pub electron_mirror: String,
}

impl Settings {
    /// Settings read from the environment.
    ///
    /// - `RUNTIME_DIST_CACHE` overrides the cache root (default `~/.runtime-dist`)
    /// - `NVM_NODEJS_ORG_MIRROR`, `NVM_IOJS_ORG_MIRROR`, `ELECTRON_MIRROR`
    ///   override the download mirrors
    pub fn from_env() -> Self {
        Self {
            cache_root: default_cache_root(),
            node_mirror: env_or("NVM_NODEJS_ORG_MIRROR", DEFAULT_NODE_MIRROR),
            iojs_mirror: env_or("NVM_IOJS_ORG_MIRROR", DEFAULT_IOJS_MIRROR),
            electron_mirror: env_or("ELECTRON_MIRROR", DEFAULT_ELECTRON_MIRROR),
        }
    }

    /// Default mirrors with an explicit cache root.
    pub fn with_cache_root(cache_root: impl AsRef<Path>) -> Self {
        Self {
            cache_root: cache_root.as_ref().to_path_buf(),
            node_mirror: DEFAULT_NODE_MIRROR.to_string(),
            iojs_mirror: DEFAULT_IOJS_MIRROR.to_string(),
            electron_mirror: DEFAULT_ELECTRON_MIRROR.to_string(),
        }
    }

    /// Cache location for one configuration: `<root>/<runtime>/<os>/<arch>/v<version>`.
    pub fn cache_dir(&self, config: &BuildConfiguration) -> PathBuf {
        self.cache_root
            .join(config.runtime.as_str())
            .join(config.os.as_str())
            .join(config.arch.as_str())
            .join(format!("v{}", config.version))
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.trim_end_matches('/').to_string())
        .unwrap_or_else(|| default.to_string())
}

/// Cache root from `RUNTIME_DIST_CACHE`, falling back to `~/.runtime-dist`.
pub fn default_cache_root() -> PathBuf {
    if let Ok(path) = std::env::var("RUNTIME_DIST_CACHE")
        && !path.is_empty()
    {
        return PathBuf::from(path);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CACHE_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(version: &str, os: TargetOs, arch: TargetArch) -> BuildConfiguration {
        BuildConfiguration::new(Runtime::Node, version, os, arch)
    }

    #[test]
    fn test_cache_dir_layout() {
        let settings = Settings::with_cache_root("/cache");
        let dir = settings.cache_dir(&node("18.17.0", TargetOs::Linux, TargetArch::X64));
        assert_eq!(dir, PathBuf::from("/cache/node/linux/x64/v18.17.0"));
    }

    #[test]
    fn test_cache_dir_is_deterministic() {
        let settings = Settings::with_cache_root("/cache");
        let a = node("20.0.0", TargetOs::Win32, TargetArch::Ia32);
        let b = node("20.0.0", TargetOs::Win32, TargetArch::Ia32);
        assert_eq!(settings.cache_dir(&a), settings.cache_dir(&b));
    }

    #[test]
    fn test_cache_dir_differs_per_field() {
        let settings = Settings::with_cache_root("/cache");
        let base = node("20.0.0", TargetOs::Linux, TargetArch::X64);
        let variants = [
            BuildConfiguration::new(Runtime::Electron, "20.0.0", TargetOs::Linux, TargetArch::X64),
            node("20.0.1", TargetOs::Linux, TargetArch::X64),
            node("20.0.0", TargetOs::Darwin, TargetArch::X64),
            node("20.0.0", TargetOs::Linux, TargetArch::Arm64),
        ];
        for other in &variants {
            assert_ne!(settings.cache_dir(&base), settings.cache_dir(other), "{}", other);
        }
    }

    #[test]
    fn test_version_prefix_stripped() {
        let config = node("v18.0.0", TargetOs::Linux, TargetArch::X64);
        assert_eq!(config.version, "18.0.0");
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("node".parse::<Runtime>().unwrap(), Runtime::Node);
        assert_eq!("Electron".parse::<Runtime>().unwrap(), Runtime::Electron);
        assert_eq!("win32".parse::<TargetOs>().unwrap(), TargetOs::Win32);
        assert_eq!("ia32".parse::<TargetArch>().unwrap(), TargetArch::Ia32);
        assert!("deno".parse::<Runtime>().is_err());
        assert!("sparc".parse::<TargetArch>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for os in [TargetOs::Linux, TargetOs::FreeBsd, TargetOs::SunOs] {
            assert_eq!(os.to_string().parse::<TargetOs>().unwrap(), os);
        }
    }

    #[test]
    fn test_only_windows_needs_import_libs() {
        assert!(TargetOs::Win32.needs_import_libs());
        assert!(!TargetOs::Linux.needs_import_libs());
        assert!(!TargetOs::Darwin.needs_import_libs());
    }

    #[test]
    fn test_checksum_publishers() {
        assert!(Runtime::Node.publishes_checksums());
        assert!(Runtime::Iojs.publishes_checksums());
        assert!(!Runtime::Electron.publishes_checksums());
        assert!(!Runtime::Nw.publishes_checksums());
    }
}

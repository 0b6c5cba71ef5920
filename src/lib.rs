//! Header distributions for native addon builds
//!
//! Building a native addon needs the headers of the exact runtime it will be
//! loaded into: node, io.js, electron or nw.js, at one version, for one
//! operating system and architecture. On Windows it also needs the
//! runtime's import libraries.
//!
//! This crate keeps those files in a local cache, one directory per
//! configuration:
//!
//! ```text
//! <cache_root>/<runtime>/<os>/<arch>/v<version>
//! ```
//!
//! and fills a directory from the runtime's download server when it is
//! incomplete. Node and io.js publish a `SHASUMS256.txt` listing which every
//! download is checked against.
//!
//! # Example
//!
//! ```no_run
//! use runtime_dist::{BuildConfiguration, Runtime, RuntimeDistribution, Settings};
//!
//! # fn main() -> runtime_dist::Result<()> {
//! let config = BuildConfiguration::host(Runtime::Node, "18.17.0").expect("supported host");
//! let dist = RuntimeDistribution::new(config, &Settings::from_env())?;
//!
//! dist.ensure_ready()?;
//! println!("headers in {}", dist.internal_path().display());
//! println!("NODE_MODULE_VERSION {}", dist.resolve_abi()?);
//! # Ok(())
//! # }
//! ```
//!
//! # Environment
//!
//! - `RUNTIME_DIST_CACHE` - cache root (default `~/.runtime-dist`)
//! - `RUNTIME_DIST_HTTP_TIMEOUT` - HTTP timeout in seconds
//! - `NVM_NODEJS_ORG_MIRROR`, `NVM_IOJS_ORG_MIRROR`, `ELECTRON_MIRROR` - mirrors

pub mod config;
pub mod distribution;
pub mod download;
mod error;
pub mod extract;
pub mod lock;
pub mod manifest;
pub mod output;
pub mod probe;
pub mod registry;

pub use config::{BuildConfiguration, Runtime, Settings, TargetArch, TargetOs};
pub use distribution::RuntimeDistribution;
pub use download::{Downloader, HttpDownloader};
pub use error::{Error, ErrorKind, Result};
pub use manifest::ChecksumManifest;
pub use probe::{FileProbe, LocalFs};
pub use registry::{ExtraArtifact, PathResolver, RemoteLayout, UrlRegistry};

//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use runtime_dist::{BuildConfiguration, Runtime, Settings, TargetArch, TargetOs};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const NODE_VERSION_H: &str = "\
#ifndef SRC_NODE_VERSION_H_
#define SRC_NODE_VERSION_H_

#define NODE_MAJOR_VERSION 18
#define NODE_MINOR_VERSION 0
#define NODE_PATCH_VERSION 0

#define NODE_MODULE_VERSION 108

#endif  // SRC_NODE_VERSION_H_
";

/// Gzipped tarball with the given (path, contents) entries.
pub fn gz_tarball(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, contents.as_bytes())
            .unwrap();
    }
    let tar = builder.into_inner().unwrap();
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

/// What nodejs.org ships as `node-v18.0.0-headers.tar.gz`, trimmed down.
pub fn node_headers_tarball() -> Vec<u8> {
    gz_tarball(&[
        ("node-v18.0.0/include/node/node.h", "// node.h\n"),
        ("node-v18.0.0/include/node/node_version.h", NODE_VERSION_H),
        ("node-v18.0.0/include/node/v8.h", "// v8.h\n"),
        ("node-v18.0.0/include/node/common.gypi", "{}\n"),
    ])
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// `SHASUMS256.txt` body listing `files`.
pub fn shasums(files: &[(&str, &[u8])]) -> String {
    files
        .iter()
        .map(|(name, data)| format!("{}  {}\n", sha256_hex(data), name))
        .collect()
}

/// Serve `body` at `url_path`, expecting exactly `times` requests.
pub async fn serve(server: &MockServer, url_path: &str, body: Vec<u8>, times: u64) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(times)
        .mount(server)
        .await;
}

/// Settings pointing every mirror at the mock server.
pub fn mock_settings(server: &MockServer, cache_root: &Path) -> Settings {
    let mut settings = Settings::with_cache_root(cache_root);
    settings.node_mirror = server.uri();
    settings.iojs_mirror = server.uri();
    settings.electron_mirror = server.uri();
    settings
}

pub fn node18(os: TargetOs) -> BuildConfiguration {
    BuildConfiguration::new(Runtime::Node, "v18.0.0", os, TargetArch::X64)
}

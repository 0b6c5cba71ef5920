//! `SHASUMS256.txt` parsing and lookup.

/// One `<hash> <path>` line of a checksum listing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChecksumEntry {
    path: String,
    hash: String,
}

/// Expected hashes per relative path, in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumManifest {
    entries: Vec<ChecksumEntry>,
}

impl ChecksumManifest {
    /// Parse a checksum listing.
    ///
    /// Each line is split on whitespace: first token is the hash, second the
    /// path. Lines with fewer than two tokens are dropped.
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                let hash = parts.next()?;
                let path = parts.next()?;
                Some(ChecksumEntry {
                    path: path.to_string(),
                    hash: hash.to_string(),
                })
            })
            .collect();
        Self { entries }
    }

    /// Expected hash for `path`, first listing wins.
    pub fn expected(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| e.hash.as_str())
    }

    /// True when `path` is listed with exactly `actual` (case-insensitive hex).
    pub fn matches(&self, path: &str, actual: Option<&str>) -> bool {
        match (self.expected(path), actual) {
            (Some(expected), Some(actual)) => expected.eq_ignore_ascii_case(actual),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
a1b2c3  node-v18.17.0-headers.tar.gz
d4e5f6  win-x64/node.lib

garbage
0f0f0f\tnode-v18.17.0.tar.xz
";

    #[test]
    fn test_parse_skips_blank_and_malformed() {
        let manifest = ChecksumManifest::parse(LISTING);
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest.expected("win-x64/node.lib"), Some("d4e5f6"));
        assert_eq!(manifest.expected("node-v18.17.0.tar.xz"), Some("0f0f0f"));
        assert_eq!(manifest.expected("garbage"), None);
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let manifest = ChecksumManifest::parse(LISTING);
        assert!(manifest.matches("node-v18.17.0-headers.tar.gz", Some("A1B2C3")));
        assert!(!manifest.matches("node-v18.17.0-headers.tar.gz", Some("ffffff")));
    }

    #[test]
    fn test_unlisted_or_unhashed_never_matches() {
        let manifest = ChecksumManifest::parse(LISTING);
        assert!(!manifest.matches("win-x86/node.lib", Some("d4e5f6")));
        assert!(!manifest.matches("win-x64/node.lib", None));
    }

    #[test]
    fn test_empty_listing() {
        assert!(ChecksumManifest::parse("").is_empty());
        assert!(ChecksumManifest::parse("\n\n   \n").is_empty());
    }
}

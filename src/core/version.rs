//! Canonical version derivation and release tagging.
//!
//! Upstream projects tag releases every way imaginable (`v0.5.1`,
//! `ver_1.4.8`, `REL15_1_5_0`). Everything downstream of the pipeline keys
//! on one canonical `major.minor.patch` form, derived here exactly once.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// A normalized `major.minor.patch` version.
/// Derived once from the raw upstream string and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl fmt::Display for CanonicalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for CanonicalVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// The identifier a release is published under: `{name}-v{version}`.
/// Doubles as the pipeline's idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseTag(String);

impl ReleaseTag {
    pub fn new(name: &str, version: &CanonicalVersion) -> Self {
        Self(format!("{}-v{}", name, version))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ReleaseTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

fn dotted_triple_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("valid regex"))
}

fn underscore_triple_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)_(\d+)_(\d+)").expect("valid regex"))
}

/// Normalize a raw upstream version string into canonical form.
///
/// Two rewrites are tried in order, first-match-wins:
/// 1. a dotted triple `N.N.N` anywhere in the string (`"ver_1.4.8"` -> 1.4.8)
/// 2. an underscore triple `N_N_N` anywhere (`"REL15_1_5_0"` -> 1.5.0)
///
/// Surrounding text is discarded; the rightmost plausible triple is the
/// canonical one. Input with no extractable triple is an error, never a
/// silent fallback.
pub fn normalize(raw: &str) -> Result<CanonicalVersion> {
    let input = raw.trim();

    if let Some(version) = rightmost_triple(dotted_triple_re(), input) {
        return Ok(version);
    }
    if let Some(version) = rightmost_triple(underscore_triple_re(), input) {
        return Ok(version);
    }

    Err(Error::invalid_version_format(raw))
}

/// Scan for the rightmost triple, allowing overlap: a greedy left-to-right
/// pass over `REL15_1_5_0` would claim `15_1_5` and miss the trailing
/// `1_5_0`, so each match restarts the search one byte past its start.
fn rightmost_triple(re: &Regex, input: &str) -> Option<CanonicalVersion> {
    let mut found = None;
    let mut from = 0;

    while from <= input.len() {
        let Some(caps) = re.captures_at(input, from) else {
            break;
        };
        let (Some(whole), Some(major), Some(minor), Some(patch)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            break;
        };

        if let (Ok(major), Ok(minor), Ok(patch)) = (
            major.as_str().parse(),
            minor.as_str().parse(),
            patch.as_str().parse(),
        ) {
            found = Some(CanonicalVersion {
                major,
                minor,
                patch,
            });
        }

        from = whole.start() + 1;
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    #[test]
    fn normalize_is_idempotent_on_canonical_input() {
        assert_eq!(normalize("2.3.4").unwrap().to_string(), "2.3.4");
    }

    #[test]
    fn normalize_strips_prefix_from_dotted_triple() {
        assert_eq!(normalize("ver_1.4.8").unwrap().to_string(), "1.4.8");
        assert_eq!(normalize("v0.5.1").unwrap().to_string(), "0.5.1");
    }

    #[test]
    fn normalize_extracts_trailing_underscore_triple() {
        assert_eq!(normalize("REL15_1_5_0").unwrap().to_string(), "1.5.0");
    }

    #[test]
    fn normalize_prefers_dotted_over_underscore() {
        assert_eq!(normalize("REL15_1.4.8").unwrap().to_string(), "1.4.8");
    }

    #[test]
    fn normalize_takes_rightmost_dotted_triple() {
        assert_eq!(normalize("1.2.3.4").unwrap().to_string(), "2.3.4");
    }

    #[test]
    fn normalize_fails_without_a_triple() {
        let err = normalize("latest").unwrap_err();
        assert_eq!(err.code, ErrorCode::VersionInvalidFormat);
    }

    #[test]
    fn normalize_fails_on_two_component_versions() {
        assert!(normalize("1.2").is_err());
        assert!(normalize("v3").is_err());
    }

    #[test]
    fn tags_are_distinct_per_name_and_version() {
        let a = ReleaseTag::new("pgvector", &normalize("0.5.1").unwrap());
        let b = ReleaseTag::new("pgvector", &normalize("0.5.2").unwrap());
        let c = ReleaseTag::new("postgis", &normalize("0.5.1").unwrap());
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn tag_renders_name_and_version() {
        let tag = ReleaseTag::new("pgvector", &normalize("v0.5.1").unwrap());
        assert_eq!(tag.as_str(), "pgvector-v0.5.1");
    }

    #[test]
    fn canonical_version_serializes_as_string() {
        let version = normalize("16.1.0").unwrap();
        assert_eq!(
            serde_json::to_value(version).unwrap(),
            serde_json::json!("16.1.0")
        );
    }
}

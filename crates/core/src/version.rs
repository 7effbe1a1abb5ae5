// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine version discipline.
//!
//! Versions are strict `MAJOR.MINOR.PATCH` triples. Pre-release tags and
//! build metadata are rejected: a subject must bind to exactly one machine,
//! and the loose semver grammar would let `1.0.0-rc1` and `1.0.0` collide
//! in ways the router cannot disambiguate.

use semver::Version;
use std::sync::LazyLock;
use thiserror::Error;

#[allow(clippy::expect_used)]
static VERSION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^\d+\.\d+\.\d+$").expect("constant regex pattern is valid")
});

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version `{0}`: expected a MAJOR.MINOR.PATCH triple")]
    Invalid(String),
}

/// True when `s` has the plain-triple shape, without allocating a `Version`.
pub fn is_version_shape(s: &str) -> bool {
    VERSION_RE.is_match(s)
}

/// Parse a strict `MAJOR.MINOR.PATCH` triple.
pub fn parse_version(s: &str) -> Result<Version, VersionError> {
    if !is_version_shape(s) {
        return Err(VersionError::Invalid(s.to_string()));
    }
    Version::parse(s).map_err(|_| VersionError::Invalid(s.to_string()))
}

/// Reject versions carrying pre-release or build metadata.
pub fn ensure_plain(version: &Version) -> Result<(), VersionError> {
    if version.pre.is_empty() && version.build.is_empty() {
        Ok(())
    } else {
        Err(VersionError::Invalid(version.to_string()))
    }
}

/// The highest version, by lexicographic per-component comparison.
pub fn highest<'a, I>(versions: I) -> Option<&'a Version>
where
    I: IntoIterator<Item = &'a Version>,
{
    versions.into_iter().max()
}

#[cfg(test)]
#[path = "version_tests.rs"]
mod tests;

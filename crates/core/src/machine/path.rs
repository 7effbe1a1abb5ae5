// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State paths.
//!
//! A path names one state by its segments from the machine root. The dotted
//! display form carries a `#` sigil on every ancestor segment and none on
//! the leaf (`#A.#B.leaf`); a top-level state is a bare name. Parsing strips
//! sigils, so both the sigiled and sigil-free schemes are accepted.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("state path `{0}` has an empty segment")]
    EmptySegment(String),
}

/// A state's position in the machine tree, root-down.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StatePath(Vec<String>);

impl StatePath {
    /// The machine root (no segments).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a dotted path, tolerating `#` sigils on any segment.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for raw in s.split('.') {
            let segment = raw.strip_prefix('#').unwrap_or(raw);
            if segment.is_empty() {
                return Err(PathError::EmptySegment(s.to_string()));
            }
            segments.push(segment.to_string());
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.as_ref().to_string());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// True when `self` is a strict prefix of `other`.
    pub fn is_ancestor_of(&self, other: &StatePath) -> bool {
        self.0.len() < other.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// The deepest common ancestor of two paths (possibly the root).
    pub fn lca(&self, other: &StatePath) -> StatePath {
        let shared = self
            .0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count();
        // A transition whose target is its own source (or a descendant)
        // must still exit and re-enter the source, so back off one level.
        let shared = if shared == self.0.len() || shared == other.0.len() {
            shared.saturating_sub(1)
        } else {
            shared
        };
        Self(self.0[..shared].to_vec())
    }

    /// Every path from the first segment down to `self`, shortest first.
    pub fn ancestry(&self) -> impl Iterator<Item = StatePath> + '_ {
        (1..=self.0.len()).map(move |n| Self(self.0[..n].to_vec()))
    }

    /// `self` first, then each ancestor up to (excluding) the root.
    pub fn self_and_ancestors(&self) -> impl Iterator<Item = StatePath> + '_ {
        (1..=self.0.len()).rev().map(move |n| Self(self.0[..n].to_vec()))
    }

    /// The dotted display form: sigiled ancestors, bare leaf.
    pub fn dotted(&self) -> String {
        match self.0.split_last() {
            None => String::new(),
            Some((leaf, ancestors)) => {
                let mut out = String::new();
                for segment in ancestors {
                    out.push('#');
                    out.push_str(segment);
                    out.push('.');
                }
                out.push_str(leaf);
                out
            }
        }
    }
}

impl std::fmt::Display for StatePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.dotted())
    }
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;

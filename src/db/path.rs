// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Slash-separated locations in the database tree.

use crate::db::StoreError;
use std::fmt;

/// Maximum key length in bytes (UTF-8).
pub const MAX_KEY_BYTES: usize = 768;

const FORBIDDEN_KEY_CHARS: &[char] = &['.', '$', '#', '[', ']', '/'];

/// A validated location in the database, e.g. `activities/-Nabc123`.
///
/// The root location has no segments and displays as `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DbPath {
    segments: Vec<String>,
}

impl DbPath {
    /// The root of the database.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a slash-separated path. Empty segments are ignored, so
    /// `"/activities/"` and `"activities"` are the same location.
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        let mut segments = Vec::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            validate_key(segment)?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Location of a direct child.
    pub fn child(&self, key: &str) -> Result<Self, StoreError> {
        validate_key(key)?;
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, `None` at the root.
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Parent location, `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// True if `self` is `other` or lies below it.
    pub fn starts_with(&self, other: &DbPath) -> bool {
        self.segments.starts_with(&other.segments)
    }

    /// The part of `self` below `base`, or `None` if `self` is not under `base`.
    pub fn strip_prefix(&self, base: &DbPath) -> Option<DbPath> {
        if !self.starts_with(base) {
            return None;
        }
        Some(Self {
            segments: self.segments[base.segments.len()..].to_vec(),
        })
    }
}

impl fmt::Display for DbPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        f.write_str(&self.segments.join("/"))
    }
}

/// Check a single key against the database's key rules.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = |reason: &str| StoreError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(invalid("key is longer than 768 bytes"));
    }
    if key.contains(FORBIDDEN_KEY_CHARS) {
        return Err(invalid("key contains one of . $ # [ ] /"));
    }
    if key.chars().any(|c| c.is_ascii_control()) {
        return Err(invalid("key contains a control character"));
    }
    Ok(())
}

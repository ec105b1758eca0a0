//! Normalized relative path type shared by every target.
//!
//! A [`TargetPath`] is always relative to a target's root: slash-delimited,
//! with `//` collapsed and no leading or trailing slash (the root itself is
//! the empty path, displayed as `/`). Two paths with the same segments are
//! always equal, which is what lets [`FileSyncManager`](crate) compare
//! metadata maps across targets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// A normalized, slash-delimited path relative to a target's root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetPath(String);

impl TargetPath {
    /// Parses and normalizes a path string.
    ///
    /// Collapses repeated `/`, strips a leading and trailing `/`, and
    /// rejects `.`/`..` segments (sync paths never traverse outside the
    /// target root).
    pub fn new(raw: impl AsRef<str>) -> Result<Self, SyncError> {
        let raw = raw.as_ref();
        let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();

        for segment in &segments {
            if *segment == "." || *segment == ".." {
                return Err(SyncError::InvalidOperation(format!(
                    "path segment '{segment}' is not allowed in '{raw}'"
                )));
            }
        }

        Ok(Self(segments.join("/")))
    }

    /// The root path (the target's own directory).
    pub fn root() -> Self {
        Self(String::new())
    }

    /// True if this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The normalized path with no leading/trailing slash (empty for root).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final path segment, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.0.rsplit('/').next().filter(|s| !s.is_empty())
    }

    /// The parent path, `None` if this is already the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rsplit_once('/') {
            Some((parent, _)) => Some(Self(parent.to_string())),
            None => Some(Self::root()),
        }
    }

    /// Joins a child segment onto this path.
    pub fn join(&self, child: impl AsRef<str>) -> Result<Self, SyncError> {
        if self.is_root() {
            Self::new(child)
        } else {
            Self::new(format!("{}/{}", self.0, child.as_ref()))
        }
    }

    /// True if `other` is this path or a descendant of it.
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        if self.is_root() {
            return true;
        }
        other.0 == self.0 || other.0.starts_with(&format!("{}/", self.0))
    }
}

impl fmt::Display for TargetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "/{}", self.0)
        }
    }
}

impl TryFrom<String> for TargetPath {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetPath> for String {
    fn from(path: TargetPath) -> Self {
        path.0
    }
}

impl std::str::FromStr for TargetPath {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_leading_and_trailing_slashes() {
        let p = TargetPath::new("/a/b/").unwrap();
        assert_eq!(p.as_str(), "a/b");
        assert_eq!(p.to_string(), "/a/b");
    }

    #[test]
    fn collapses_double_slashes() {
        let p = TargetPath::new("a//b///c").unwrap();
        assert_eq!(p.as_str(), "a/b/c");
    }

    #[test]
    fn root_is_empty_and_displays_as_slash() {
        let p = TargetPath::root();
        assert!(p.is_root());
        assert_eq!(p.to_string(), "/");
    }

    #[test]
    fn rejects_dot_segments() {
        assert!(TargetPath::new("a/../b").is_err());
        assert!(TargetPath::new("./a").is_err());
    }

    #[test]
    fn file_name_and_parent() {
        let p = TargetPath::new("a/b/c.txt").unwrap();
        assert_eq!(p.file_name(), Some("c.txt"));
        assert_eq!(p.parent().unwrap().as_str(), "a/b");

        let top = TargetPath::new("c.txt").unwrap();
        assert_eq!(top.parent().unwrap(), TargetPath::root());
        assert_eq!(TargetPath::root().parent(), None);
    }

    #[test]
    fn join_builds_child_paths() {
        let root = TargetPath::root();
        let child = root.join("a").unwrap().join("b").unwrap();
        assert_eq!(child.as_str(), "a/b");
    }

    #[test]
    fn is_ancestor_of() {
        let parent = TargetPath::new("a/b").unwrap();
        let child = TargetPath::new("a/b/c").unwrap();
        let unrelated = TargetPath::new("a/bb").unwrap();

        assert!(parent.is_ancestor_of(&child));
        assert!(parent.is_ancestor_of(&parent));
        assert!(!parent.is_ancestor_of(&unrelated));
        assert!(TargetPath::root().is_ancestor_of(&child));
    }

    #[test]
    fn case_sensitive_equality() {
        let a = TargetPath::new("A/B").unwrap();
        let b = TargetPath::new("a/b").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn serde_roundtrip() {
        let p = TargetPath::new("docs/report.txt").unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"docs/report.txt\"");
        let back: TargetPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}

//! The `IgnoreService` port: a pure predicate over paths.
//!
//! Ignore matching must never block synchronization: callers swallow any
//! error the predicate raises and treat the path as not ignored.

use crate::domain::TargetPath;

/// Pure, stateless-after-construction predicate over paths.
pub trait IgnoreService: Send + Sync {
    fn is_ignored(&self, path: &TargetPath) -> bool;
    fn set_patterns(&mut self, patterns: Vec<String>);
    fn patterns(&self) -> Vec<String>;
}

/// A glob-pattern-backed [`IgnoreService`], the reference implementation
/// used by the watcher and its tests.
#[derive(Debug, Clone, Default)]
pub struct GlobIgnoreService {
    patterns: Vec<String>,
    compiled: Vec<glob::Pattern>,
}

impl GlobIgnoreService {
    pub fn new(patterns: Vec<String>) -> Self {
        let mut service = Self::default();
        service.set_patterns(patterns);
        service
    }
}

impl IgnoreService for GlobIgnoreService {
    /// Matches as documented: an invalid stored pattern simply never
    /// matches, rather than panicking or propagating an error — the
    /// predicate contract has no error channel.
    fn is_ignored(&self, path: &TargetPath) -> bool {
        self.compiled.iter().any(|p| p.matches(path.as_str()))
    }

    fn set_patterns(&mut self, patterns: Vec<String>) {
        self.compiled = patterns
            .iter()
            .filter_map(|p| glob::Pattern::new(p).ok())
            .collect();
        self.patterns = patterns;
    }

    fn patterns(&self) -> Vec<String> {
        self.patterns.clone()
    }
}

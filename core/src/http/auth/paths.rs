//! Request path classification.
//!
//! Decides which [`AccessPath`] a request belongs to before any credential
//! is examined: git transport endpoints by suffix, authenticated REST by
//! prefix, everything else `Unknown`.

use regex::Regex;

use crate::http::session::AccessPath;

const GIT_SUFFIXES: &str = r"(/info/refs|/git-upload-pack|/git-receive-pack)$";

/// Classifies request paths into access paths.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    git_pattern: Regex,
    rest_prefix: String,
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PathClassifier {
    pub fn new() -> Self {
        PathClassifier {
            git_pattern: Regex::new(GIT_SUFFIXES).expect("default git pattern is valid"),
            rest_prefix: "/a/".to_string(),
        }
    }

    /// Replaces the git endpoint pattern. Invalid patterns are ignored and
    /// the previous pattern kept.
    pub fn git_pattern(mut self, pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => self.git_pattern = regex,
            Err(e) => eprintln!("Warning: invalid git path pattern {:?}: {}", pattern, e),
        }
        self
    }

    pub fn rest_prefix(mut self, prefix: &str) -> Self {
        self.rest_prefix = prefix.to_string();
        self
    }

    pub fn classify(&self, path: &str) -> AccessPath {
        if self.git_pattern.is_match(path) {
            AccessPath::Git
        } else if path.starts_with(&self.rest_prefix) {
            AccessPath::RestApi
        } else {
            AccessPath::Unknown
        }
    }
}

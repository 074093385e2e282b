//! Path resolution confined to a fixed set of permitted roots.
//!
//! Every path string that reaches the filesystem layer, whether it came
//! from the config file or from an untrusted tool call, goes through
//! [`resolver::SafePathResolver`] first. The resolver normalizes the
//! request, then checks segment-wise that the result stays under one of
//! the [`PermittedRoots`]. There is no best-effort correction: anything
//! that would land outside the roots is rejected.

pub mod normalize;
pub mod resolver;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use resolver::{ensure_directory, SafePathResolver};

#[derive(Debug, Error)]
pub enum PathError {
    #[error("path escapes permitted roots: {request:?}")]
    Escape {
        request: String,
        roots: Vec<PathBuf>,
    },
    #[error("invalid path request {request:?}: {reason}")]
    InvalidRequest { request: String, reason: String },
    #[error("cannot access directory {path}: {source}")]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How containment is established before a path is handed back.
///
/// `Lexical` resolves `.`/`..` without touching the filesystem. `Strict`
/// additionally canonicalizes through the deepest existing ancestor, so a
/// symlink inside a root cannot point resolution outside of it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainmentMode {
    #[default]
    Lexical,
    Strict,
}

/// The ordered set of absolute directories that bound resolution.
///
/// The primary root (the workspace) anchors relative requests. The home
/// root, when present, both permits home-directory paths and enables `~`
/// expansion; without it a leading `~` is rejected rather than silently
/// expanded to a directory the caller is not allowed to reach. Extra
/// roots (typically the system temp directory) only widen containment.
#[derive(Debug, Clone)]
pub struct PermittedRoots {
    primary: PathBuf,
    home: Option<PathBuf>,
    extra: Vec<PathBuf>,
}

impl PermittedRoots {
    /// `primary` must be absolute; relative roots cannot bound anything.
    pub fn new(primary: PathBuf) -> Self {
        debug_assert!(primary.is_absolute(), "primary root must be absolute");
        Self {
            primary,
            home: None,
            extra: Vec::new(),
        }
    }

    pub fn with_home(mut self, home: PathBuf) -> Self {
        debug_assert!(home.is_absolute(), "home root must be absolute");
        self.home = Some(home);
        self
    }

    pub fn with_extra(mut self, root: PathBuf) -> Self {
        debug_assert!(root.is_absolute(), "extra root must be absolute");
        self.extra.push(root);
        self
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.primary.as_path())
            .chain(self.home.as_deref())
            .chain(self.extra.iter().map(PathBuf::as_path))
    }

    /// Segment-wise containment: true when `path` equals or descends from
    /// one of the roots. `Path::starts_with` compares whole components, so
    /// `/data/ws-eu` is not under `/data/ws`.
    pub fn contains(&self, path: &Path) -> bool {
        self.iter().any(|root| path.starts_with(root))
    }
}

/// An absolute, normalized path known to lie under one of the permitted
/// roots. Only the resolver constructs these, which is what lets
/// [`ensure_directory`] demand one instead of re-validating.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    pub(crate) fn new_checked(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_segment_wise() {
        let roots = PermittedRoots::new(PathBuf::from("/data/ws"));
        assert!(roots.contains(Path::new("/data/ws")));
        assert!(roots.contains(Path::new("/data/ws/out")));
        assert!(!roots.contains(Path::new("/data/ws-eu/evil")));
        assert!(!roots.contains(Path::new("/data")));
    }

    #[test]
    fn iter_orders_primary_first() {
        let roots = PermittedRoots::new(PathBuf::from("/ws"))
            .with_home(PathBuf::from("/home/alice"))
            .with_extra(PathBuf::from("/tmp"));
        let collected: Vec<_> = roots.iter().collect();
        assert_eq!(
            collected,
            vec![Path::new("/ws"), Path::new("/home/alice"), Path::new("/tmp")]
        );
    }

    #[test]
    fn home_is_optional() {
        let roots = PermittedRoots::new(PathBuf::from("/ws"));
        assert!(roots.home().is_none());
        assert!(!roots.contains(Path::new("/home/alice/secrets")));
    }
}

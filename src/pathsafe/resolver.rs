//! The resolver itself: request string in, confined absolute path out.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{normalize, ContainmentMode, PathError, PermittedRoots, ResolvedPath};

/// Resolves untrusted path requests against a fixed set of permitted
/// roots. Pure apart from the optional `strict`-mode canonicalization,
/// so a single instance can be shared across any number of callers.
#[derive(Debug, Clone)]
pub struct SafePathResolver {
    roots: PermittedRoots,
    mode: ContainmentMode,
}

impl SafePathResolver {
    pub fn new(roots: PermittedRoots) -> Self {
        Self {
            roots,
            mode: ContainmentMode::Lexical,
        }
    }

    pub fn with_mode(mut self, mode: ContainmentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn roots(&self) -> &PermittedRoots {
        &self.roots
    }

    /// Resolve a request to a directory or file path under the roots.
    ///
    /// An empty or absent request falls back to `default_subdir` under the
    /// primary root. `~`/`~/...` expand against the home root and are
    /// rejected outright when no home root is permitted. Relative requests
    /// join to the primary root; absolute requests are taken as-is. The
    /// result is normalized before the containment check; `..` segments
    /// are exactly the attack this function exists to stop.
    pub fn resolve(
        &self,
        request: Option<&str>,
        default_subdir: &str,
    ) -> Result<ResolvedPath, PathError> {
        let (candidate, label) = match request {
            None | Some("") => (self.roots.primary().join(default_subdir), String::new()),
            Some(raw) => {
                check_request(raw)?;
                (self.expand(raw)?, raw.to_string())
            }
        };
        self.confine(candidate, &label)
    }

    /// Resolve a child request (a logo or asset sub-path) against an
    /// already-validated base. The child is containment-checked against
    /// the full root set again: a validated base does not make the
    /// child's own `..` segments safe.
    pub fn resolve_child(
        &self,
        base: &ResolvedPath,
        child: &str,
    ) -> Result<ResolvedPath, PathError> {
        check_request(child)?;
        if child.is_empty() {
            return Err(PathError::InvalidRequest {
                request: child.to_string(),
                reason: "empty child path".to_string(),
            });
        }
        let requested = Path::new(child);
        let candidate = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            base.as_path().join(requested)
        };
        self.confine(candidate, child)
    }

    fn expand(&self, raw: &str) -> Result<PathBuf, PathError> {
        if raw == "~" || raw.starts_with("~/") {
            // Expanding against a home directory that is not permitted
            // would manufacture a path the caller cannot reach; reject
            // instead of silently expanding.
            let Some(home) = self.roots.home() else {
                return Err(self.escape(raw));
            };
            return Ok(if raw == "~" {
                home.to_path_buf()
            } else {
                home.join(&raw[2..])
            });
        }
        let requested = Path::new(raw);
        Ok(if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.roots.primary().join(requested)
        })
    }

    fn confine(&self, candidate: PathBuf, request: &str) -> Result<ResolvedPath, PathError> {
        let cleaned = normalize::clean(&candidate).ok_or_else(|| self.escape(request))?;
        match self.mode {
            ContainmentMode::Lexical => {
                if self.roots.contains(&cleaned) {
                    Ok(ResolvedPath::new_checked(cleaned))
                } else {
                    Err(self.escape(request))
                }
            }
            ContainmentMode::Strict => {
                let canonical = normalize::canonicalize_existing_prefix(&cleaned)
                    .map_err(|source| PathError::DirectoryAccess {
                        path: cleaned.clone(),
                        source,
                    })?;
                if self.contains_canonical(&canonical) {
                    Ok(ResolvedPath::new_checked(canonical))
                } else {
                    Err(self.escape(request))
                }
            }
        }
    }

    // Roots themselves may sit behind symlinks (macOS /var, tempdirs), so
    // strict containment compares canonical forms on both sides.
    fn contains_canonical(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| {
            let canonical_root = normalize::canonicalize_existing_prefix(root)
                .unwrap_or_else(|_| root.to_path_buf());
            path.starts_with(&canonical_root)
        })
    }

    fn escape(&self, request: &str) -> PathError {
        PathError::Escape {
            request: request.to_string(),
            roots: self.roots.iter().map(Path::to_path_buf).collect(),
        }
    }
}

fn check_request(raw: &str) -> Result<(), PathError> {
    if raw.contains('\0') {
        return Err(PathError::InvalidRequest {
            request: raw.replace('\0', "\\0"),
            reason: "contains a null byte".to_string(),
        });
    }
    Ok(())
}

/// Create an already-resolved directory, parents included. Idempotent:
/// "already exists" is success, including when a concurrent caller wins
/// the race. The `ResolvedPath` argument is what guarantees this is
/// never handed an unvalidated path.
pub fn ensure_directory(path: &ResolvedPath) -> Result<(), PathError> {
    match fs::create_dir_all(path.as_path()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(source) => Err(PathError::DirectoryAccess {
            path: path.as_path().to_path_buf(),
            source,
        }),
    }
}


#[cfg(all(test, feature = "proptests"))]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn segment() -> impl Strategy<Value = String> {
        prop_oneof![
            4 => "[a-zA-Z0-9_-]{1,8}",
            1 => Just(".".to_string()),
            1 => Just("..".to_string()),
        ]
    }

    fn request() -> impl Strategy<Value = String> {
        prop::collection::vec(segment(), 1..=6).prop_map(|parts| parts.join("/"))
    }

    proptest! {
        /// Whatever resolves, resolves inside the roots.
        #[test]
        fn resolved_paths_stay_contained(req in request()) {
            let resolver = SafePathResolver::new(
                PermittedRoots::new(PathBuf::from("/users/test/workspace")),
            );
            if let Ok(resolved) = resolver.resolve(Some(&req), "fallback") {
                prop_assert!(resolver.roots().contains(resolved.as_path()));
                prop_assert!(resolved.as_path().is_absolute());
            }
        }

        /// Resolution is a pure function of its inputs.
        #[test]
        fn resolve_is_deterministic(req in request()) {
            let resolver = SafePathResolver::new(
                PermittedRoots::new(PathBuf::from("/users/test/workspace")),
            );
            let first = resolver.resolve(Some(&req), "fallback");
            let second = resolver.resolve(Some(&req), "fallback");
            match (first, second) {
                (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
                (Err(_), Err(_)) => {}
                _ => prop_assert!(false, "resolution not deterministic"),
            }
        }

        /// Normalized output never retains dot components.
        #[test]
        fn resolved_paths_are_normalized(req in request()) {
            let resolver = SafePathResolver::new(
                PermittedRoots::new(PathBuf::from("/users/test/workspace")),
            );
            if let Ok(resolved) = resolver.resolve(Some(&req), "fallback") {
                for component in resolved.as_path().components() {
                    prop_assert_ne!(component, std::path::Component::CurDir);
                    prop_assert_ne!(component, std::path::Component::ParentDir);
                }
            }
        }
    }
}

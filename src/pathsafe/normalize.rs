//! Lexical cleanup applied before any containment check.

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components of an absolute path without touching
/// the filesystem. Returns `None` when `..` would walk above the
/// filesystem root, which the caller treats as an escape attempt.
pub(crate) fn clean(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    let mut has_root = false;
    for component in path.components() {
        match component {
            Component::RootDir => {
                out.push(component);
                has_root = true;
            }
            Component::Prefix(prefix) => {
                out.push(prefix.as_os_str());
                has_root = true;
            }
            Component::Normal(seg) => out.push(seg),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
        }
    }
    if has_root && out.as_os_str().is_empty() {
        out.push(Component::RootDir);
    }
    Some(out)
}

/// Canonicalize through the deepest existing ancestor, reattaching the
/// not-yet-created tail afterwards. This is what `strict` containment
/// checks against: symlinks in the existing part of the path are
/// resolved, while paths that will only exist after `ensure_directory`
/// still resolve deterministically.
pub(crate) fn canonicalize_existing_prefix(path: &Path) -> std::io::Result<PathBuf> {
    if let Ok(canonical) = dunce::canonicalize(path) {
        return Ok(canonical);
    }
    let mut missing: Vec<std::ffi::OsString> = Vec::new();
    let mut current = path;
    while let Some(parent) = current.parent() {
        if let Some(name) = current.file_name() {
            missing.push(name.to_os_string());
        }
        if let Ok(canonical) = dunce::canonicalize(parent) {
            let mut out = canonical;
            for segment in missing.iter().rev() {
                out.push(segment);
            }
            return Ok(out);
        }
        current = parent;
    }
    dunce::canonicalize(path)
}

//! Path normalization for the loader search list.
//!
//! Directories reach the search list from request routing, configuration,
//! and tests, in whatever casing and slash style the caller used. Entries
//! are compared through [`path_key`], which is case-insensitive and
//! separator-normalized, so one effective directory never appears twice.

use std::path::{Component, Path, PathBuf};

/// Resolve `path` to an absolute, lexically normalized form.
///
/// Relative paths (including the empty path) resolve against `base`, which
/// defaults to the process working directory. Normalization folds `.` and
/// `..` components without touching the filesystem, so paths that do not
/// exist yet still normalize.
pub fn full_path(path: impl AsRef<Path>, base: Option<&Path>) -> PathBuf {
    let raw = path.as_ref();
    let joined = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        let base = match base {
            Some(b) => b.to_path_buf(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };
        base.join(raw)
    };
    normalize_lexically(&joined)
}

/// Comparison key for a path: separators unified to `/`, lowercased.
pub fn path_key(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .to_string_lossy()
        .replace('\\', "/")
        .to_lowercase()
}

/// Whether two paths name the same directory after normalization, ignoring
/// casing and slash style.
pub fn same_path(a: impl AsRef<Path>, b: impl AsRef<Path>) -> bool {
    path_key(full_path(a, None)) == path_key(full_path(b, None))
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}

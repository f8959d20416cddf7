//! Path helpers shared by planning and apply

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Anchor a caller-supplied path at the project root and normalize it.
pub fn resolve_in_root(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&project_root.join(path))
    }
}

/// `path` relative to the project root for display, or the path itself.
pub fn display_relative(project_root: &Path, path: &Path) -> String {
    path.strip_prefix(project_root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Translate `path` under `old_root` to the same location under `new_root`.
pub fn rebase(path: &Path, old_root: &Path, new_root: &Path) -> Option<PathBuf> {
    path.strip_prefix(old_root).ok().map(|rel| {
        if rel.as_os_str().is_empty() {
            new_root.to_path_buf()
        } else {
            new_root.join(rel)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/p/src/../lib/./a.ts")), PathBuf::from("/p/lib/a.ts"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_resolve_in_root() {
        let root = Path::new("/p");
        assert_eq!(resolve_in_root(root, Path::new("src/a.ts")), PathBuf::from("/p/src/a.ts"));
        assert_eq!(resolve_in_root(root, Path::new("/q/a.ts")), PathBuf::from("/q/a.ts"));
    }

    #[test]
    fn test_rebase() {
        assert_eq!(
            rebase(Path::new("/p/src/u/a.ts"), Path::new("/p/src"), Path::new("/p/lib")),
            Some(PathBuf::from("/p/lib/u/a.ts"))
        );
        assert_eq!(rebase(Path::new("/p/x.ts"), Path::new("/p/src"), Path::new("/p/lib")), None);
    }
}

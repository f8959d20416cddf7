//! Project file discovery
//!
//! Walks the project honouring `.gitignore` and the configured ignored
//! directories. Results are sorted so plans built from them are deterministic.

use ignore::WalkBuilder;
use refit_foundation::{RefitError, RefitResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct FileDiscovery {
    ignored_dirs: HashSet<String>,
}

impl FileDiscovery {
    pub fn new(ignored_dirs: impl IntoIterator<Item = String>) -> Self {
        Self {
            ignored_dirs: ignored_dirs.into_iter().collect(),
        }
    }

    /// Every project file under `root`, sorted.
    pub async fn project_files(&self, root: &Path) -> RefitResult<Vec<PathBuf>> {
        let root = root.to_path_buf();
        let ignored = self.ignored_dirs.clone();

        let files = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            let walker = WalkBuilder::new(&root)
                .hidden(false)
                .git_ignore(true)
                .git_global(false)
                .git_exclude(true)
                .require_git(false)
                .filter_entry(move |entry| {
                    let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                    if !is_dir || entry.depth() == 0 {
                        return true;
                    }
                    let name = entry.file_name().to_string_lossy();
                    !ignored.contains(name.as_ref())
                })
                .build();

            for entry in walker.flatten() {
                if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    files.push(entry.into_path());
                }
            }
            files.sort();
            files
        })
        .await
        .map_err(|e| RefitError::internal(format!("File discovery task failed: {}", e)))?;

        debug!(file_count = files.len(), "Discovered project files");
        Ok(files)
    }

    /// Every file under `dir`, sorted. Ignore rules do not apply: a moved or
    /// deleted directory takes all of its contents with it.
    pub async fn files_under(&self, dir: &Path) -> RefitResult<Vec<PathBuf>> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            for entry in WalkDir::new(&dir).follow_links(false) {
                let entry = entry.map_err(|e| {
                    RefitError::io(format!("Failed to walk {}: {}", dir.display(), e))
                })?;
                if entry.file_type().is_file() || entry.file_type().is_symlink() {
                    files.push(entry.into_path());
                }
            }
            files.sort();
            Ok(files)
        })
        .await
        .map_err(|e| RefitError::internal(format!("Directory walk task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_project_files_skips_ignored_dirs_and_gitignore() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/a.ts", "");
        write(root, "node_modules/pkg/index.js", "");
        write(root, "dist/out.js", "");
        write(root, ".gitignore", "dist/\n");
        write(root, "README.md", "");

        let discovery = FileDiscovery::new(vec!["node_modules".to_string()]);
        let files = discovery.project_files(root).await.unwrap();
        let rel: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();

        assert_eq!(rel, vec![".gitignore", "README.md", "src/a.ts"]);
    }

    #[tokio::test]
    async fn test_files_under_includes_ignored_content() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/util/a.ts", "");
        write(root, "src/util/nested/b.ts", "");

        let discovery = FileDiscovery::new(vec!["nested".to_string()]);
        let files = discovery.files_under(&root.join("src/util")).await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.ts"));
    }
}

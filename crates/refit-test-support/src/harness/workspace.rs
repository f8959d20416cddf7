use refit_config::AppConfig;
use refit_lsp::{CodeIntelligence, NoCodeIntelligence};
use refit_plugin_api::PluginRegistry;
use refit_services::{RefactorEngine, WorkspaceFs};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tempfile::{tempdir, TempDir};
use walkdir::WalkDir;

/// Content and modification time of one workspace file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    pub content: Vec<u8>,
    pub modified: Option<SystemTime>,
}

/// Manages a temporary directory for a test scenario.
/// Cleans up automatically when dropped.
pub struct TestWorkspace {
    pub temp_dir: TempDir,
    root: PathBuf,
}

impl TestWorkspace {
    /// Creates a new empty workspace.
    pub fn new() -> Self {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let root = temp_dir
            .path()
            .canonicalize()
            .expect("Failed to canonicalize temp dir");
        Self { temp_dir, root }
    }

    /// Returns the canonical root path of the workspace.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Creates a file with content within the workspace.
    /// Automatically creates parent directories.
    pub fn create_file(&self, rel_path: &str, content: &str) -> PathBuf {
        let file_path = self.path().join(rel_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap_or_else(|e| {
                panic!("Failed to create parent dirs for '{}': {}", rel_path, e)
            });
        }
        fs::write(&file_path, content)
            .unwrap_or_else(|e| panic!("Failed to write file '{}': {}", file_path.display(), e));
        file_path
    }

    /// Creates a directory within the workspace.
    pub fn create_directory(&self, rel_path: &str) {
        let dir_path = self.path().join(rel_path);
        fs::create_dir_all(&dir_path).unwrap_or_else(|e| {
            panic!("Failed to create directory '{}': {}", dir_path.display(), e)
        });
    }

    /// Reads a file from the workspace.
    pub fn read_file(&self, rel_path: &str) -> String {
        let file_path = self.path().join(rel_path);
        fs::read_to_string(&file_path)
            .unwrap_or_else(|e| panic!("Failed to read file '{}': {}", file_path.display(), e))
    }

    /// Check if a file exists in the workspace.
    pub fn file_exists(&self, rel_path: &str) -> bool {
        self.path().join(rel_path).exists()
    }

    /// Get the absolute path to a file in the workspace.
    pub fn absolute_path(&self, rel_path: &str) -> PathBuf {
        self.path().join(rel_path)
    }

    /// Every file in the workspace, keyed by relative path.
    pub fn fingerprint(&self) -> BTreeMap<PathBuf, FileFingerprint> {
        WalkDir::new(self.path())
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e
                    .path()
                    .strip_prefix(self.path())
                    .expect("walked path is under the root")
                    .to_path_buf();
                let fingerprint = FileFingerprint {
                    content: fs::read(e.path()).expect("Failed to read workspace file"),
                    modified: e.metadata().ok().and_then(|m| m.modified().ok()),
                };
                (rel, fingerprint)
            })
            .collect()
    }

    /// Relative paths of every file, sorted.
    pub fn files(&self) -> Vec<String> {
        self.fingerprint()
            .into_keys()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    /// Create a basic TypeScript project structure.
    pub fn setup_typescript_project(&self, name: &str) {
        self.create_file(
            "package.json",
            &format!(
                "{{\n  \"name\": \"{}\",\n  \"version\": \"1.0.0\",\n  \"type\": \"module\"\n}}\n",
                name
            ),
        );
        self.create_file(
            "tsconfig.json",
            "{\n  \"compilerOptions\": { \"strict\": true, \"noEmit\": true },\n  \"include\": [\"src/**/*\"]\n}\n",
        );
        self.create_directory("src");
    }

    /// Engine over this workspace with the bundled language plugins and no
    /// code intelligence.
    pub fn engine(&self) -> Arc<RefactorEngine> {
        self.engine_with(
            crate::helpers::create_test_config(),
            Arc::new(NoCodeIntelligence),
        )
    }

    pub fn engine_with(
        &self,
        config: AppConfig,
        intelligence: Arc<dyn CodeIntelligence>,
    ) -> Arc<RefactorEngine> {
        Arc::new(
            RefactorEngine::new(
                config,
                self.path(),
                Arc::new(crate::helpers::default_registry()),
                intelligence,
            )
            .expect("Failed to create engine"),
        )
    }

    /// Engine writing through `fs`, for failure injection.
    pub fn engine_with_fs(
        &self,
        config: AppConfig,
        intelligence: Arc<dyn CodeIntelligence>,
        fs: Arc<dyn WorkspaceFs>,
    ) -> Arc<RefactorEngine> {
        Arc::new(
            RefactorEngine::from_parts(
                config,
                self.path(),
                Arc::new(crate::helpers::default_registry()),
                intelligence,
                fs,
            )
            .expect("Failed to create engine"),
        )
    }

    /// Engine with a custom plugin registry.
    pub fn engine_with_registry(&self, registry: PluginRegistry) -> Arc<RefactorEngine> {
        Arc::new(
            RefactorEngine::new(
                crate::helpers::create_test_config(),
                self.path(),
                Arc::new(registry),
                Arc::new(NoCodeIntelligence),
            )
            .expect("Failed to create engine"),
        )
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

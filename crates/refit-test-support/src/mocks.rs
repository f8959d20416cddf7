//! Mock and fake code intelligence for testing

use async_trait::async_trait;
use mockall::mock;
use refit_foundation::{
    utf16_len, Diagnostic, EditLocation, Location, Position, RefitError, RefitResult,
    SymbolCandidate, WorkspaceEdit,
};
use refit_lsp::CodeIntelligence;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use walkdir::WalkDir;

mock! {
    pub CodeIntelligence {}

    #[async_trait]
    impl CodeIntelligence for CodeIntelligence {
        async fn find_references(&self, file: &Path, position: Position) -> RefitResult<Vec<Location>>;
        async fn rename_symbol(&self, file: &Path, position: Position, new_name: &str) -> RefitResult<WorkspaceEdit>;
        async fn find_symbols(&self, name: &str) -> RefitResult<Vec<SymbolCandidate>>;
        async fn get_diagnostics(&self, file: &Path) -> RefitResult<Vec<Diagnostic>>;
        async fn restart(&self, extensions: Option<Vec<String>>) -> RefitResult<()>;
        async fn shutdown(&self) -> RefitResult<()>;
    }
}

/// Create a mock code intelligence service for testing
pub fn mock_code_intelligence() -> MockCodeIntelligence {
    MockCodeIntelligence::new()
}

struct IndexedSymbol {
    candidate: SymbolCandidate,
    references: Vec<Location>,
}

/// In-memory code intelligence built from exact token matches.
///
/// Each indexed symbol owns its declaration and reference locations. A
/// position resolves to the symbol with a location covering it.
#[derive(Default)]
pub struct FakeCodeIntelligence {
    symbols: Mutex<Vec<IndexedSymbol>>,
    restarts: AtomicUsize,
}

impl FakeCodeIntelligence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a symbol and every location referencing it.
    pub fn with_symbol(self, candidate: SymbolCandidate, references: Vec<Location>) -> Self {
        self.symbols
            .lock()
            .expect("symbol index poisoned")
            .push(IndexedSymbol {
                candidate,
                references,
            });
        self
    }

    /// Index `name` as one symbol across every file under `root`.
    ///
    /// The first line matching `function <name>`, `const <name>` or
    /// `class <name>` is its declaration; every whole-token occurrence is a
    /// reference.
    pub fn index_workspace(self, root: &Path, name: &str, kind: &str) -> Self {
        let token = Regex::new(&format!(r"\b{}\b", regex::escape(name)))
            .expect("escaped name is a valid pattern");
        let declaration = Regex::new(&format!(
            r"\b(?:function|const|let|class)\s+{}\b",
            regex::escape(name)
        ))
        .expect("escaped name is a valid pattern");

        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        files.sort();

        let mut references = Vec::new();
        let mut declared_at = None;
        for file in files {
            let Ok(content) = std::fs::read_to_string(&file) else {
                continue;
            };
            for (line_no, line) in content.lines().enumerate() {
                for m in token.find_iter(line) {
                    let location = Location {
                        path: file.clone(),
                        range: EditLocation::on_line(
                            line_no as u32,
                            utf16_len(&line[..m.start()]),
                            utf16_len(name),
                        ),
                    };
                    if declared_at.is_none() && declaration.is_match(line) {
                        declared_at = Some(location.clone());
                    }
                    references.push(location);
                }
            }
        }

        let Some(location) = declared_at.or_else(|| references.first().cloned()) else {
            return self;
        };
        self.with_symbol(
            SymbolCandidate {
                name: name.to_string(),
                kind: kind.to_string(),
                location,
                container: None,
            },
            references,
        )
    }

    pub fn restart_count(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    fn covers(location: &Location, file: &Path, position: Position) -> bool {
        location.path == file
            && location.range.start() <= position
            && position <= location.range.end()
    }
}

#[async_trait]
impl CodeIntelligence for FakeCodeIntelligence {
    async fn find_references(&self, file: &Path, position: Position) -> RefitResult<Vec<Location>> {
        let symbols = self
            .symbols
            .lock()
            .map_err(|_| RefitError::internal("symbol index poisoned"))?;
        Ok(symbols
            .iter()
            .find(|s| {
                Self::covers(&s.candidate.location, file, position)
                    || s.references.iter().any(|r| Self::covers(r, file, position))
            })
            .map(|s| s.references.clone())
            .unwrap_or_default())
    }

    async fn rename_symbol(
        &self,
        _file: &Path,
        _position: Position,
        _new_name: &str,
    ) -> RefitResult<WorkspaceEdit> {
        Err(RefitError::not_supported("rename_symbol"))
    }

    async fn find_symbols(&self, name: &str) -> RefitResult<Vec<SymbolCandidate>> {
        let symbols = self
            .symbols
            .lock()
            .map_err(|_| RefitError::internal("symbol index poisoned"))?;
        Ok(symbols
            .iter()
            .filter(|s| s.candidate.name == name)
            .map(|s| s.candidate.clone())
            .collect())
    }

    async fn get_diagnostics(&self, _file: &Path) -> RefitResult<Vec<Diagnostic>> {
        Ok(Vec::new())
    }

    async fn restart(&self, _extensions: Option<Vec<String>>) -> RefitResult<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> RefitResult<()> {
        Ok(())
    }
}

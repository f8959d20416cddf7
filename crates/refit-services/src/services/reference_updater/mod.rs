//! Service for updating references in a workspace
//!
//! Given a set of path moves, finds every file whose references point at a
//! moved path and computes the text edits that keep them resolving. Moved
//! files get their own relative references rebased too. Language plugins
//! provide the parsing; opted-in text formats without a plugin go through
//! the generic detector.

mod cache;
pub mod detectors;
pub mod resolver;

pub use cache::{CacheStats, FileImportInfo, ImportCache};
pub use resolver::{KnownFiles, Resolution};

use crate::services::checksum_validator::ChecksumValidator;
use crate::services::file_discovery::FileDiscovery;
use crate::services::path_utils::{display_relative, rebase};
use crate::services::workspace_fs::WorkspaceFs;
use detectors::{find_path_mentions, line_edits, located_refs};
use futures::stream::{self, StreamExt};
use refit_config::RefactorConfig;
use refit_foundation::{
    warning_codes, EditType, PlanWarning, RefitResult, TextEdit, WorkspaceEdit,
};
use refit_plugin_api::specifier::{format_specifier, split_suffix};
use refit_plugin_api::{
    ImportKind, ImportMoveSupport, ImportParser, ImportRef, PluginRegistry, SpecifierBase,
    SpecifierRequest, SpecifierStyle,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SCAN_CONCURRENCY: usize = 16;

/// Old path -> new path for every moved file, plus the moved directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveContext {
    files: BTreeMap<PathBuf, PathBuf>,
    dirs: Vec<(PathBuf, PathBuf)>,
}

impl MoveContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, from: impl Into<PathBuf>, to: impl Into<PathBuf>) {
        self.files.insert(from.into(), to.into());
    }

    pub fn add_dir(&mut self, from: impl Into<PathBuf>, to: impl Into<PathBuf>) {
        self.dirs.push((from.into(), to.into()));
    }

    /// Where `path` ends up, if it moves at all.
    pub fn new_location(&self, path: &Path) -> Option<PathBuf> {
        if let Some(to) = self.files.get(path) {
            return Some(to.clone());
        }
        self.dirs
            .iter()
            .find_map(|(from, to)| rebase(path, from, to))
    }

    pub fn moved_files(&self) -> impl Iterator<Item = (&PathBuf, &PathBuf)> {
        self.files.iter()
    }

    pub fn is_moved(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }
}

/// Edits keeping references valid after a set of moves.
#[derive(Debug, Clone, Default)]
pub struct ReferenceEdits {
    /// Keyed by each file's path before the move
    pub edit: WorkspaceEdit,
    /// Files outside the move set that reference a moved path
    pub dependents: Vec<PathBuf>,
    pub warnings: Vec<PlanWarning>,
}

/// Referencing file -> referenced targets
pub type Dependents = BTreeMap<PathBuf, BTreeSet<PathBuf>>;

enum Parsed<'a> {
    Refs { refs: Vec<ImportRef>, generic: bool },
    Rewrite(&'a dyn ImportMoveSupport),
}

struct ScannedFile<'a> {
    content: String,
    parsed: Parsed<'a>,
    formatter: Option<&'a dyn ImportMoveSupport>,
}

#[derive(Default)]
struct FileOutcome {
    path: PathBuf,
    edits: Vec<TextEdit>,
    warnings: Vec<PlanWarning>,
}

enum SpecifierUpdate {
    Unchanged,
    Changed(String),
    Ambiguous(Vec<PathBuf>),
    Unresolved,
}

/// A service for updating references in a workspace.
pub struct ReferenceUpdater {
    project_root: PathBuf,
    registry: Arc<PluginRegistry>,
    fs: Arc<dyn WorkspaceFs>,
    discovery: FileDiscovery,
    cache: Arc<ImportCache>,
    text_extensions: HashSet<String>,
    max_file_size: u64,
}

impl ReferenceUpdater {
    pub fn new(
        project_root: impl Into<PathBuf>,
        registry: Arc<PluginRegistry>,
        fs: Arc<dyn WorkspaceFs>,
        config: &RefactorConfig,
        cache_enabled: bool,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            registry,
            fs,
            discovery: FileDiscovery::new(config.all_ignored_dirs()),
            cache: Arc::new(ImportCache::new(cache_enabled)),
            text_extensions: config.all_text_extensions().into_iter().collect(),
            max_file_size: config.max_file_size_bytes,
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn discovery(&self) -> &FileDiscovery {
        &self.discovery
    }

    pub fn cache(&self) -> &Arc<ImportCache> {
        &self.cache
    }

    /// Files referencing any of `targets` (files or directories), without
    /// computing edits. Targets never count as their own dependents.
    pub async fn find_dependents(&self, targets: &[PathBuf]) -> RefitResult<Dependents> {
        let files = self.discovery.project_files(&self.project_root).await?;
        let known = KnownFiles::new(&self.project_root, &files);
        let known = &known;
        let target_set: HashSet<&Path> = targets.iter().map(PathBuf::as_path).collect();
        let target_set = &target_set;
        let is_target = move |path: &Path| target_set.iter().any(|t| path == *t || path.starts_with(t));

        let scans: Vec<_> = files
            .iter()
            .filter(move |file| !is_target(file.as_path()))
            .map(move |file| async move {
                let scanned = self.scan(file, known).await?;
                let mut hits = BTreeSet::new();
                match &scanned.parsed {
                    Parsed::Refs { refs, .. } => {
                        for r in refs {
                            if let Resolution::Resolved { target, .. } =
                                resolver::resolve(known, &self.project_root, file, &r.specifier)
                            {
                                if is_target(&target) {
                                    hits.insert(target);
                                }
                            }
                        }
                    }
                    Parsed::Rewrite(support) => {
                        for target in targets {
                            let scratch = scratch_destination(target);
                            let (_, count) = support.rewrite_imports_for_move(
                                &scanned.content,
                                file,
                                target,
                                &scratch,
                            );
                            if count > 0 {
                                hits.insert(target.clone());
                            }
                        }
                    }
                }
                (!hits.is_empty()).then(|| (file.clone(), hits))
            })
            .collect();
        let scanned: Vec<Option<(PathBuf, BTreeSet<PathBuf>)>> = stream::iter(scans)
            .buffer_unordered(SCAN_CONCURRENCY)
            .collect()
            .await;

        let dependents: Dependents = scanned.into_iter().flatten().collect();
        debug!(
            targets = targets.len(),
            dependents = dependents.len(),
            "Found dependent files"
        );
        Ok(dependents)
    }

    /// Edits for every file whose references are affected by `moves`.
    pub async fn plan_moves(&self, moves: &MoveContext) -> RefitResult<ReferenceEdits> {
        let files = self.discovery.project_files(&self.project_root).await?;
        let known = KnownFiles::new(&self.project_root, &files);

        let plans: Vec<_> = files
            .iter()
            .map(|file| self.plan_file(file, &known, moves))
            .collect();
        let mut outcomes: Vec<FileOutcome> = stream::iter(plans)
            .buffer_unordered(SCAN_CONCURRENCY)
            .filter_map(std::future::ready)
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.path.cmp(&b.path));

        let mut result = ReferenceEdits::default();
        for outcome in outcomes {
            if !outcome.edits.is_empty() && !moves.is_moved(&outcome.path) {
                result.dependents.push(outcome.path.clone());
            }
            result.warnings.extend(outcome.warnings);
            if !outcome.edits.is_empty() {
                result.edit.add_edits(outcome.path, outcome.edits);
            }
        }

        info!(
            scanned_files = files.len(),
            dependents = result.dependents.len(),
            edits = result.edit.edit_count(),
            warnings = result.warnings.len(),
            "Computed reference updates"
        );
        Ok(result)
    }

    async fn plan_file(
        &self,
        file: &Path,
        known: &KnownFiles,
        moves: &MoveContext,
    ) -> Option<FileOutcome> {
        let scanned = self.scan(file, known).await?;
        let importer_new = moves
            .new_location(file)
            .unwrap_or_else(|| file.to_path_buf());
        let importer_moved = importer_new != file;

        let mut outcome = FileOutcome {
            path: file.to_path_buf(),
            ..FileOutcome::default()
        };

        match &scanned.parsed {
            Parsed::Refs { refs, generic } => {
                let mut seen = HashSet::new();
                for r in refs {
                    let Some(location) = r.location else {
                        continue;
                    };
                    if !seen.insert(location) {
                        continue;
                    }
                    let update = self.update_specifier(
                        known,
                        moves,
                        file,
                        &importer_new,
                        &r.specifier,
                        scanned.formatter,
                    );
                    match update {
                        SpecifierUpdate::Unchanged => {}
                        SpecifierUpdate::Changed(new_specifier) => {
                            let edit_type = if *generic {
                                EditType::UpdateReference
                            } else {
                                EditType::UpdateImport
                            };
                            debug!(
                                file_path = %file.display(),
                                old = %r.specifier,
                                new = %new_specifier,
                                "Rewriting reference"
                            );
                            outcome.edits.push(
                                TextEdit::replace(location, r.specifier.clone(), new_specifier.clone())
                                    .with_type(edit_type)
                                    .with_description(format!(
                                        "Update reference '{}' -> '{}'",
                                        r.specifier, new_specifier
                                    )),
                            );
                        }
                        SpecifierUpdate::Ambiguous(candidates) => {
                            let affected = importer_moved
                                || candidates.iter().any(|c| moves.new_location(c).is_some());
                            if affected {
                                warn!(
                                    file_path = %file.display(),
                                    specifier = %r.specifier,
                                    candidates = candidates.len(),
                                    "Ambiguous reference left unchanged"
                                );
                                outcome.warnings.push(
                                    PlanWarning::new(
                                        warning_codes::AMBIGUOUS_REFERENCE,
                                        format!(
                                            "Reference '{}' in {} matches several files and was left unchanged",
                                            r.specifier,
                                            display_relative(&self.project_root, file)
                                        ),
                                    )
                                    .with_candidates(
                                        candidates
                                            .iter()
                                            .map(|c| display_relative(&self.project_root, c))
                                            .collect(),
                                    ),
                                );
                            }
                        }
                        SpecifierUpdate::Unresolved => {
                            if importer_moved && !*generic && r.kind != ImportKind::Link {
                                outcome.warnings.push(PlanWarning::new(
                                    warning_codes::UNRESOLVED_REFERENCE,
                                    format!(
                                        "Reference '{}' in moved file {} does not resolve and was left unchanged",
                                        r.specifier,
                                        display_relative(&self.project_root, file)
                                    ),
                                ));
                            }
                        }
                    }
                }
            }
            Parsed::Rewrite(support) => {
                if importer_moved {
                    warn!(
                        file_path = %file.display(),
                        "Plugin cannot locate imports; references inside the moved file are not rebased"
                    );
                    outcome.warnings.push(PlanWarning::new(
                        warning_codes::SKIPPED_REFERENCE,
                        format!(
                            "References inside moved file {} were not rebased",
                            display_relative(&self.project_root, file)
                        ),
                    ));
                }
                let mut current = scanned.content.clone();
                let mut total = 0usize;
                for (old, new) in moves.moved_files() {
                    if old == file {
                        continue;
                    }
                    let (rewritten, count) =
                        support.rewrite_imports_for_move(&current, file, old, new);
                    if count > 0 {
                        current = rewritten;
                        total += count;
                    }
                }
                if total > 0 {
                    outcome.edits = line_edits(&scanned.content, &current, "Update imports for moved files");
                }
            }
        }

        (!outcome.edits.is_empty() || !outcome.warnings.is_empty()).then_some(outcome)
    }

    /// Read and parse one file with the strategy its extension selects.
    async fn scan<'a>(&'a self, file: &Path, known: &KnownFiles) -> Option<ScannedFile<'a>> {
        let extension = file
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)?;
        let plugin = self.registry.plugin_for_path(file);
        if plugin.is_none() && !self.text_extensions.contains(&extension) {
            return None;
        }

        let bytes = match self.fs.read(file).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file_path = %file.display(), error = %e, "Skipping unreadable file");
                return None;
            }
        };
        if bytes.len() as u64 > self.max_file_size {
            debug!(file_path = %file.display(), bytes = bytes.len(), "Skipping large file");
            return None;
        }
        let fingerprint = ChecksumValidator::calculate_checksum(&bytes);
        let content = String::from_utf8(bytes).ok()?;

        let formatter = plugin.and_then(|p| p.import_move_support());
        let parser: Option<&dyn ImportParser> = plugin.and_then(|p| p.import_parser());

        if plugin.is_some() && parser.is_none() {
            if let Some(support) = formatter {
                return Some(ScannedFile {
                    content,
                    parsed: Parsed::Rewrite(support),
                    formatter,
                });
            }
            return None;
        }

        if let Some(refs) = self.cache.get(file, &fingerprint).await {
            return Some(ScannedFile {
                content,
                parsed: Parsed::Refs {
                    refs,
                    generic: plugin.is_none(),
                },
                formatter,
            });
        }

        let refs = match parser {
            Some(parser) => match located_refs(parser, &content) {
                Some(refs) => refs,
                None => match formatter {
                    Some(support) => {
                        return Some(ScannedFile {
                            content,
                            parsed: Parsed::Rewrite(support),
                            formatter,
                        })
                    }
                    None => {
                        warn!(file_path = %file.display(), "Plugin reported imports without locations; skipping file");
                        return None;
                    }
                },
            },
            None => find_path_mentions(&content, &extension)
                .into_iter()
                .map(|m| ImportRef::new(m.text, ImportKind::Link).at(m.location))
                .collect(),
        };

        let targets = refs
            .iter()
            .filter_map(|r| match resolver::resolve(known, &self.project_root, file, &r.specifier) {
                Resolution::Resolved { target, .. } => Some(target),
                _ => None,
            })
            .collect();
        self.cache
            .insert(
                file.to_path_buf(),
                FileImportInfo {
                    fingerprint,
                    refs: refs.clone(),
                    targets,
                },
            )
            .await;

        Some(ScannedFile {
            content,
            parsed: Parsed::Refs {
                refs,
                generic: plugin.is_none(),
            },
            formatter,
        })
    }

    /// New text for `specifier` once the moves are applied.
    fn update_specifier(
        &self,
        known: &KnownFiles,
        moves: &MoveContext,
        importer_old: &Path,
        importer_new: &Path,
        specifier: &str,
        formatter: Option<&dyn ImportMoveSupport>,
    ) -> SpecifierUpdate {
        let (target, base, written_extension) =
            match resolver::resolve(known, &self.project_root, importer_old, specifier) {
                Resolution::Resolved {
                    target,
                    base,
                    written_extension,
                } => (target, base, written_extension),
                Resolution::Ambiguous(candidates) => return SpecifierUpdate::Ambiguous(candidates),
                Resolution::Unresolved => return SpecifierUpdate::Unresolved,
            };

        let target_new = moves
            .new_location(&target)
            .unwrap_or_else(|| target.clone());
        let importer_moved = importer_new != importer_old;
        if target_new == target && (!importer_moved || base == SpecifierBase::ProjectRoot) {
            return SpecifierUpdate::Unchanged;
        }

        let mut style = SpecifierStyle::infer(specifier, base, &target);
        if known.is_dir(&target) {
            style.explicit_extension = true;
            style.index = false;
        }
        let request = SpecifierRequest {
            importing_file: importer_new,
            project_root: &self.project_root,
            target: &target_new,
            original: specifier,
            style: &style,
        };
        let mut new_specifier = match formatter {
            Some(support) => support.format_specifier(&request),
            None => format_specifier(&request),
        };

        let (original_path, _) = split_suffix(specifier);
        let (new_path, new_suffix) = split_suffix(&new_specifier);
        let mut path = new_path.to_string();
        let suffix = new_suffix.to_string();
        if let Some(ext) = written_extension {
            path = format!("{}.{}", path, ext);
        }
        if original_path.ends_with('/') && !path.ends_with('/') {
            path.push('/');
        }
        new_specifier = format!("{}{}", path, suffix);

        if new_specifier == specifier {
            SpecifierUpdate::Unchanged
        } else {
            SpecifierUpdate::Changed(new_specifier)
        }
    }
}

/// Stand-in destination used to ask a rewrite-only plugin whether a file
/// references `target` at all.
fn scratch_destination(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    target
        .parent()
        .map(|p| p.join(".refit-scratch").join(&name))
        .unwrap_or_else(|| PathBuf::from(".refit-scratch").join(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::workspace_fs::LocalFs;
    use pretty_assertions::assert_eq;
    use refit_plugin_api::{LanguageMetadata, LanguagePlugin};
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn updater(root: &Path, registry: PluginRegistry) -> ReferenceUpdater {
        ReferenceUpdater::new(
            root,
            Arc::new(registry),
            Arc::new(LocalFs),
            &RefactorConfig::default(),
            true,
        )
    }

    /// Rewrite-only plugin replacing quoted relative specifiers literally.
    struct RewriteOnly;

    impl ImportMoveSupport for RewriteOnly {
        fn rewrite_imports_for_move(
            &self,
            content: &str,
            importing_file: &Path,
            old_path: &Path,
            new_path: &Path,
        ) -> (String, usize) {
            let dir = importing_file.parent().unwrap();
            let old = format!("'./{}'", old_path.strip_prefix(dir).unwrap_or(old_path).display());
            let new = pathdiff::diff_paths(new_path, dir).unwrap();
            let new = format!("'./{}'", new.display());
            let count = content.matches(&old).count();
            (content.replace(&old, &new), count)
        }
    }

    impl LanguagePlugin for RewriteOnly {
        fn metadata(&self) -> &LanguageMetadata {
            const META: LanguageMetadata = LanguageMetadata {
                name: "RewriteOnly",
                extensions: &["rw"],
            };
            &META
        }

        fn import_move_support(&self) -> Option<&dyn ImportMoveSupport> {
            Some(self)
        }
    }

    #[test]
    fn test_move_context_rebases_directories() {
        let mut moves = MoveContext::new();
        moves.add_file("/p/src/a.ts", "/p/lib/a.ts");
        moves.add_dir("/p/docs", "/p/guide");
        assert_eq!(moves.new_location(Path::new("/p/src/a.ts")), Some(PathBuf::from("/p/lib/a.ts")));
        assert_eq!(moves.new_location(Path::new("/p/docs/api")), Some(PathBuf::from("/p/guide/api")));
        assert_eq!(moves.new_location(Path::new("/p/src/b.ts")), None);
    }

    #[tokio::test]
    async fn test_generic_detector_updates_text_mentions() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "docs/setup.md", "# Setup\n");
        write(root, "notes.txt", "See docs/setup.md#install and `docs/setup.md`.\n");

        let updater = updater(root, PluginRegistry::new());
        let mut moves = MoveContext::new();
        moves.add_file(root.join("docs/setup.md"), root.join("guide/setup.md"));

        let result = updater.plan_moves(&moves).await.unwrap();
        assert_eq!(result.dependents, vec![root.join("notes.txt")]);
        let edits = &result.edit.changes[&root.join("notes.txt")];
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].original_text, "docs/setup.md#install");
        assert_eq!(edits[0].new_text, "guide/setup.md#install");
        assert_eq!(edits[0].edit_type, EditType::UpdateReference);
    }

    #[tokio::test]
    async fn test_rewrite_only_plugin_yields_line_edits() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/a.rw", "");
        write(root, "src/b.rw", "use './a.rw'\nkeep\n");

        let updater = updater(root, PluginRegistry::new().with_plugin(Arc::new(RewriteOnly)));
        let mut moves = MoveContext::new();
        moves.add_file(root.join("src/a.rw"), root.join("src/util/a.rw"));

        let result = updater.plan_moves(&moves).await.unwrap();
        let edits = &result.edit.changes[&root.join("src/b.rw")];
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].new_text, "use './util/a.rw'");

        let dependents = updater.find_dependents(&[root.join("src/a.rw")]).await.unwrap();
        assert_eq!(dependents.keys().cloned().collect::<Vec<_>>(), vec![root.join("src/b.rw")]);
    }

    #[tokio::test]
    async fn test_find_dependents_excludes_targets_and_uses_cache() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "docs/a.md", "See docs/b.md\n");
        write(root, "docs/b.md", "See docs/a.md\n");
        write(root, "README.md", "Start at docs/a.md\n");

        let updater = updater(root, PluginRegistry::new());
        let dependents = updater.find_dependents(&[root.join("docs/a.md")]).await.unwrap();
        assert_eq!(
            dependents.keys().cloned().collect::<Vec<_>>(),
            vec![root.join("README.md"), root.join("docs/b.md")]
        );

        let before = updater.cache().stats().await;
        updater.find_dependents(&[root.join("docs/a.md")]).await.unwrap();
        let after = updater.cache().stats().await;
        assert!(after.hits > before.hits);
        assert_eq!(
            updater.cache().importers_of(&root.join("docs/a.md")).await,
            vec![root.join("README.md"), root.join("docs/b.md")]
        );
    }
}

//! Specifier resolution against the set of known project files
//!
//! Resolution order, first hit wins:
//! 1. exact path relative to the referencing file
//! 2. exact path relative to the project root
//! 3. implicit extension appended, or a `.js`-family extension swapped for its
//!    TypeScript source
//! 4. `index.<ext>` inside a directory
//! 5. the directory itself
//! 6. case-insensitive match on any of the above

use crate::services::path_utils::normalize;
use refit_plugin_api::specifier::split_suffix;
use refit_plugin_api::SpecifierBase;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const IMPLICIT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "md"];

const EXTENSION_SWAPS: &[(&str, &[&str])] = &[
    ("js", &["ts", "tsx"]),
    ("jsx", &["tsx"]),
    ("mjs", &["mts"]),
    ("cjs", &["cts"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved {
        target: PathBuf,
        base: SpecifierBase,
        /// Extension written in the specifier when it differs from the target's
        written_extension: Option<String>,
    },
    Ambiguous(Vec<PathBuf>),
    Unresolved,
}

/// Snapshot of the project's files at plan time.
#[derive(Debug, Default)]
pub struct KnownFiles {
    files: HashSet<PathBuf>,
    dirs: HashSet<PathBuf>,
    lowercase: HashMap<String, Vec<PathBuf>>,
}

impl KnownFiles {
    pub fn new(project_root: &Path, files: &[PathBuf]) -> Self {
        let mut known = Self::default();
        for file in files {
            known.files.insert(file.clone());
            known
                .lowercase
                .entry(file.to_string_lossy().to_lowercase())
                .or_default()
                .push(file.clone());

            let mut parent = file.parent();
            while let Some(dir) = parent {
                if !dir.starts_with(project_root) || !known.dirs.insert(dir.to_path_buf()) {
                    break;
                }
                known
                    .lowercase
                    .entry(dir.to_string_lossy().to_lowercase())
                    .or_default()
                    .push(dir.to_path_buf());
                parent = dir.parent();
            }
        }
        known
    }

    pub fn is_file(&self, path: &Path) -> bool {
        self.files.contains(path)
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Whether a specifier points outside the filesystem.
pub fn is_external(specifier: &str) -> bool {
    specifier.contains("://")
        || specifier.starts_with('#')
        || specifier.starts_with("mailto:")
        || specifier.starts_with("data:")
        || specifier.starts_with("tel:")
}

pub fn resolve(
    known: &KnownFiles,
    project_root: &Path,
    importing_file: &Path,
    specifier: &str,
) -> Resolution {
    if is_external(specifier) {
        return Resolution::Unresolved;
    }
    let (path_part, _) = split_suffix(specifier);
    let path_part = path_part.trim_end_matches('/');
    if path_part.is_empty() {
        return Resolution::Unresolved;
    }

    let bases = candidate_bases(project_root, importing_file, path_part);

    // Steps 1 and 2
    for (base_kind, candidate) in &bases {
        if known.is_file(candidate) {
            return resolved(candidate.clone(), *base_kind, None);
        }
    }

    // Step 3
    for (base_kind, candidate) in &bases {
        for variant in extension_variants(candidate) {
            if known.is_file(&variant.path) {
                return resolved(variant.path, *base_kind, variant.written_extension);
            }
        }
    }

    // Steps 4 and 5
    for (base_kind, candidate) in &bases {
        if known.is_dir(candidate) {
            for ext in IMPLICIT_EXTENSIONS {
                let index = candidate.join(format!("index.{}", ext));
                if known.is_file(&index) {
                    return resolved(index, *base_kind, None);
                }
            }
            return resolved(candidate.clone(), *base_kind, None);
        }
    }

    // Step 6
    let mut matches: BTreeSet<(PathBuf, usize)> = BTreeSet::new();
    for (idx, (_, candidate)) in bases.iter().enumerate() {
        let mut keys = vec![candidate.clone()];
        keys.extend(extension_variants(candidate).into_iter().map(|v| v.path));
        for key in keys {
            if let Some(found) = known.lowercase.get(&key.to_string_lossy().to_lowercase()) {
                for path in found {
                    matches.insert((path.clone(), idx));
                }
            }
        }
    }

    let distinct: BTreeSet<&PathBuf> = matches.iter().map(|(path, _)| path).collect();
    match distinct.len() {
        0 => Resolution::Unresolved,
        1 => {
            let Some((path, idx)) = matches.iter().next() else {
                return Resolution::Unresolved;
            };
            resolved(path.clone(), bases[*idx].0, None)
        }
        _ => Resolution::Ambiguous(distinct.into_iter().cloned().collect()),
    }
}

fn resolved(target: PathBuf, base: SpecifierBase, written_extension: Option<String>) -> Resolution {
    Resolution::Resolved {
        target,
        base,
        written_extension,
    }
}

fn candidate_bases(
    project_root: &Path,
    importing_file: &Path,
    path_part: &str,
) -> Vec<(SpecifierBase, PathBuf)> {
    if let Some(rooted) = path_part.strip_prefix('/') {
        return vec![(SpecifierBase::ProjectRoot, normalize(&project_root.join(rooted)))];
    }

    let dir = importing_file.parent().unwrap_or(project_root);
    let mut bases = vec![(SpecifierBase::ImportingFile, normalize(&dir.join(path_part)))];
    let is_dotted = path_part.starts_with("./") || path_part.starts_with("../");
    if !is_dotted {
        let rooted = normalize(&project_root.join(path_part));
        if rooted != bases[0].1 {
            bases.push((SpecifierBase::ProjectRoot, rooted));
        }
    }
    bases
}

struct Variant {
    path: PathBuf,
    written_extension: Option<String>,
}

fn extension_variants(candidate: &Path) -> Vec<Variant> {
    let mut variants = Vec::new();
    let name = candidate
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if name.is_empty() {
        return variants;
    }

    for ext in IMPLICIT_EXTENSIONS {
        variants.push(Variant {
            path: candidate.with_file_name(format!("{}.{}", name, ext)),
            written_extension: None,
        });
    }

    if let Some(ext) = candidate.extension().and_then(|e| e.to_str()) {
        if let Some((_, swaps)) = EXTENSION_SWAPS.iter().find(|(from, _)| *from == ext) {
            for swap in *swaps {
                variants.push(Variant {
                    path: candidate.with_extension(swap),
                    written_extension: Some(ext.to_string()),
                });
            }
        }
    }
    variants
}

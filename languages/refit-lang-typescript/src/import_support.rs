//! Import support implementation for TypeScript/JavaScript
//!
//! Parses ES module imports, re-exports, `require` calls and dynamic imports
//! with the exact span of each specifier, and rewrites relative specifiers
//! when a module moves or a package is renamed.

use crate::parser::{self, ParsedModule};
use crate::regex_patterns::{DYNAMIC_IMPORT_RE, ES6_IMPORT_RE, REEXPORT_RE, REQUIRE_RE};
use refit_foundation::{position_at, EditLocation};
use refit_plugin_api::specifier::split_suffix;
use refit_plugin_api::{
    ImportKind, ImportMoveSupport, ImportParser, ImportRef, ImportRenameSupport, SpecifierBase,
    SpecifierRequest, SpecifierStyle,
};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use swc_common::Span;
use swc_ecma_ast::{
    CallExpr, Callee, ExportAll, Expr, ImportDecl, Lit, ModuleDecl, ModuleItem, NamedExport,
    TsImportEqualsDecl, TsModuleRef,
};
use swc_ecma_visit::{Visit, VisitWith};
use tracing::{debug, warn};

/// Extensions a module specifier may resolve through without naming them
pub(crate) const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

const JS_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs"];

/// TypeScript/JavaScript import support implementation
pub struct TypeScriptImportSupport;

impl TypeScriptImportSupport {
    /// Creates a new TypeScript/JavaScript import support instance.
    pub fn new() -> Self {
        Self
    }
}

impl Default for TypeScriptImportSupport {
    fn default() -> Self {
        Self::new()
    }
}

/// One specifier and its byte span in the source, quotes excluded
#[derive(Debug, Clone, PartialEq, Eq)]
struct LocatedImport {
    specifier: String,
    kind: ImportKind,
    start: usize,
    end: usize,
}

/// Collects every module specifier in a parsed module
struct ImportCollector<'a> {
    parsed: &'a ParsedModule,
    source: &'a str,
    found: Vec<LocatedImport>,
}

impl ImportCollector<'_> {
    /// Record the string literal at `span`.
    fn push(&mut self, span: Span, kind: ImportKind) {
        let (start, end) = self.parsed.range(span);
        if end < start + 2 {
            return;
        }
        let (start, end) = (start + 1, end - 1);
        if let Some(specifier) = self.source.get(start..end) {
            self.found.push(LocatedImport {
                specifier: specifier.to_string(),
                kind,
                start,
                end,
            });
        }
    }
}

impl Visit for ImportCollector<'_> {
    fn visit_import_decl(&mut self, n: &ImportDecl) {
        self.push(n.src.span, ImportKind::Import);
    }

    fn visit_export_all(&mut self, n: &ExportAll) {
        self.push(n.src.span, ImportKind::ReExport);
    }

    fn visit_named_export(&mut self, n: &NamedExport) {
        if let Some(src) = &n.src {
            self.push(src.span, ImportKind::ReExport);
        }
    }

    fn visit_ts_import_equals_decl(&mut self, n: &TsImportEqualsDecl) {
        if let TsModuleRef::TsExternalModuleRef(external) = &n.module_ref {
            self.push(external.expr.span, ImportKind::Require);
        }
    }

    fn visit_call_expr(&mut self, n: &CallExpr) {
        let kind = match &n.callee {
            Callee::Import(_) => Some(ImportKind::DynamicImport),
            Callee::Expr(callee) => match &**callee {
                Expr::Ident(ident) if &*ident.sym == "require" => Some(ImportKind::Require),
                _ => None,
            },
            Callee::Super(_) => None,
        };
        if let (Some(kind), [argument]) = (kind, n.args.as_slice()) {
            if let Expr::Lit(Lit::Str(literal)) = &*argument.expr {
                self.push(literal.span, kind);
            }
        }
        n.visit_children_with(self);
    }
}

/// Line-by-line regex scan for files SWC rejects. Lines that open with a
/// comment are skipped.
fn scan_imports_fallback(content: &str) -> Vec<LocatedImport> {
    let patterns: [(&Regex, ImportKind); 4] = [
        (&*ES6_IMPORT_RE, ImportKind::Import),
        (&*REEXPORT_RE, ImportKind::ReExport),
        (&*REQUIRE_RE, ImportKind::Require),
        (&*DYNAMIC_IMPORT_RE, ImportKind::DynamicImport),
    ];

    let mut found = Vec::new();
    let mut line_offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if !(trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*')) {
            for (pattern, kind) in &patterns {
                for caps in pattern.captures_iter(line) {
                    if let Some(specifier) = caps.get(2) {
                        found.push(LocatedImport {
                            specifier: specifier.as_str().to_string(),
                            kind: *kind,
                            start: line_offset + specifier.start(),
                            end: line_offset + specifier.end(),
                        });
                    }
                }
            }
        }
        line_offset += line.len();
    }
    found
}

fn scan_imports(content: &str, path: Option<&Path>) -> Vec<LocatedImport> {
    let mut found = match parser::parse_module(content, path) {
        Ok(parsed) => {
            let mut collector = ImportCollector {
                parsed: &parsed,
                source: content,
                found: Vec::new(),
            };
            parsed.module.visit_with(&mut collector);
            collector.found
        }
        Err(e) => {
            warn!(error = %e, "Failed to parse imports, falling back to regex");
            scan_imports_fallback(content)
        }
    };
    found.sort_by_key(|import| import.start);
    found.dedup_by_key(|import| import.start);
    found
}

/// Offset just past the line ending the last top-level import or re-export, or 0.
pub(crate) fn import_block_end(content: &str, parsed: &ParsedModule) -> usize {
    parsed
        .module
        .body
        .iter()
        .filter_map(|item| match item {
            ModuleItem::ModuleDecl(ModuleDecl::Import(decl)) => Some(decl.span),
            ModuleItem::ModuleDecl(ModuleDecl::ExportAll(decl)) => Some(decl.span),
            ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(decl)) if decl.src.is_some() => {
                Some(decl.span)
            }
            _ => None,
        })
        .map(|span| parser::line_end_inclusive(content, parsed.range(span).1))
        .max()
        .unwrap_or(0)
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn has_extension_in(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Whether the resolved specifier path `candidate` names `target`.
///
/// Covers exact paths, omitted extensions, directory imports through
/// `index.*`, and `.js` specifiers naming a `.ts` source.
fn refers_to(candidate: &Path, target: &Path) -> bool {
    if candidate == target {
        return true;
    }
    if !has_extension_in(target, SOURCE_EXTENSIONS) {
        return false;
    }
    if target.with_extension("") == candidate {
        return true;
    }
    if has_extension_in(candidate, JS_EXTENSIONS)
        && candidate.with_extension("") == target.with_extension("")
    {
        return true;
    }
    target.file_stem().and_then(|s| s.to_str()) == Some("index")
        && target.parent() == Some(candidate)
}

/// The `.js`-family extension written for a module whose source has another one.
fn written_extension<'a>(candidate: &'a Path, target: &Path) -> Option<&'a str> {
    if candidate == target || !has_extension_in(candidate, JS_EXTENSIONS) {
        return None;
    }
    candidate.extension().and_then(|ext| ext.to_str())
}

impl ImportParser for TypeScriptImportSupport {
    fn parse_imports(&self, content: &str) -> Vec<ImportRef> {
        scan_imports(content, None)
            .into_iter()
            .map(|import| {
                let start = position_at(content, import.start);
                let end = position_at(content, import.end);
                ImportRef::new(import.specifier, import.kind).at(EditLocation::new(
                    start.line,
                    start.character,
                    end.line,
                    end.character,
                ))
            })
            .collect()
    }
}

impl ImportRenameSupport for TypeScriptImportSupport {
    fn rewrite_imports_for_rename(
        &self,
        content: &str,
        old_name: &str,
        new_name: &str,
    ) -> (String, usize) {
        let mut result = content.to_string();
        let mut changes = 0;
        let nested = format!("{}/", old_name);

        for import in scan_imports(content, None).into_iter().rev() {
            let replacement = if import.specifier == old_name {
                new_name.to_string()
            } else if let Some(rest) = import.specifier.strip_prefix(&nested) {
                format!("{}/{}", new_name, rest)
            } else {
                continue;
            };
            result.replace_range(import.start..import.end, &replacement);
            changes += 1;
        }

        if changes > 0 {
            debug!(old_name, new_name, changes, "Rewrote imports for rename");
        }
        (result, changes)
    }
}

impl ImportMoveSupport for TypeScriptImportSupport {
    fn rewrite_imports_for_move(
        &self,
        content: &str,
        importing_file: &Path,
        old_path: &Path,
        new_path: &Path,
    ) -> (String, usize) {
        let base = importing_file.parent().unwrap_or(Path::new("/"));
        let mut result = content.to_string();
        let mut changes = 0;

        for import in scan_imports(content, Some(importing_file)).into_iter().rev() {
            let (path_part, _) = split_suffix(&import.specifier);
            if !path_part.starts_with('.') {
                continue;
            }
            let candidate = normalize(&base.join(path_part));
            if !refers_to(&candidate, old_path) {
                continue;
            }

            let style =
                SpecifierStyle::infer(&import.specifier, SpecifierBase::ImportingFile, old_path);
            let formatted = self.format_specifier(&SpecifierRequest {
                importing_file,
                project_root: base,
                target: new_path,
                original: &import.specifier,
                style: &style,
            });
            let new_specifier = match written_extension(&candidate, old_path) {
                Some(ext) => {
                    let (path, suffix) = split_suffix(&formatted);
                    format!("{}.{}{}", path, ext, suffix)
                }
                None => formatted,
            };

            if new_specifier != import.specifier {
                result.replace_range(import.start..import.end, &new_specifier);
                changes += 1;
            }
        }

        if changes > 0 {
            debug!(
                importing_file = %importing_file.display(),
                old_path = %old_path.display(),
                new_path = %new_path.display(),
                changes,
                "Rewrote imports for move"
            );
        }
        (result, changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn specifiers(content: &str) -> Vec<(String, ImportKind)> {
        TypeScriptImportSupport::new()
            .parse_imports(content)
            .into_iter()
            .map(|r| (r.specifier, r.kind))
            .collect()
    }

    #[test]
    fn test_parse_every_import_form() {
        let content = r#"import React from 'react';
import { a, b as c } from "./utils";
import type { T } from './types';
import './polyfill';
import {
  x,
  y,
} from '../shared/xy';
export * from './barrel';
export { z } from "./z";
const fs = require('fs');
const lazy = await import('./lazy');
"#;
        assert_eq!(
            specifiers(content),
            vec![
                ("react".to_string(), ImportKind::Import),
                ("./utils".to_string(), ImportKind::Import),
                ("./types".to_string(), ImportKind::Import),
                ("./polyfill".to_string(), ImportKind::Import),
                ("../shared/xy".to_string(), ImportKind::Import),
                ("./barrel".to_string(), ImportKind::ReExport),
                ("./z".to_string(), ImportKind::ReExport),
                ("fs".to_string(), ImportKind::Require),
                ("./lazy".to_string(), ImportKind::DynamicImport),
            ]
        );
    }

    #[test]
    fn test_parse_records_specifier_span() {
        let content = "// header\nimport { a } from './a';\n";
        let refs = TypeScriptImportSupport::new().parse_imports(content);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].location, Some(EditLocation::on_line(1, 19, 3)));
    }

    #[test]
    fn test_parse_ignores_comments_and_strings() {
        let content = r#"// import { old } from './commented';
/* import './blocked'; */
const text = "import x from './in-string'";
const tpl = `require('./in-template')`;
import { real } from './real';
"#;
        assert_eq!(
            specifiers(content),
            vec![("./real".to_string(), ImportKind::Import)]
        );
    }

    #[test]
    fn test_parse_import_equals_and_nested_require() {
        let content = "import fs = require('fs');\nfunction load() {\n  return require('./lazy-config');\n}\n";
        assert_eq!(
            specifiers(content),
            vec![
                ("fs".to_string(), ImportKind::Require),
                ("./lazy-config".to_string(), ImportKind::Require),
            ]
        );
    }

    #[test]
    fn test_unparsable_file_falls_back_to_line_scan() {
        let content = "// import './commented';\nimport { a } from './a';\nconst = broken;\n";
        assert_eq!(
            specifiers(content),
            vec![("./a".to_string(), ImportKind::Import)]
        );
    }

    #[test]
    fn test_import_block_end() {
        let content = "import a from './a';\nexport * from './b';\n\nconst x = 1;\n";
        let parsed = parser::parse_module(content, None).unwrap();
        assert_eq!(import_block_end(content, &parsed), content.find("\nconst").unwrap());
        let parsed = parser::parse_module("const x = 1;\n", None).unwrap();
        assert_eq!(import_block_end("const x = 1;\n", &parsed), 0);
    }

    #[test]
    fn test_rewrite_imports_for_move() {
        let support = TypeScriptImportSupport::new();
        let content = "import { a } from './a';\nimport { b } from './b';\n";
        let (result, changes) = support.rewrite_imports_for_move(
            content,
            Path::new("/p/src/main.ts"),
            Path::new("/p/src/a.ts"),
            Path::new("/p/lib/a.ts"),
        );
        assert_eq!(changes, 1);
        assert_eq!(result, "import { a } from '../lib/a';\nimport { b } from './b';\n");
    }

    #[test]
    fn test_rewrite_keeps_directory_import() {
        let support = TypeScriptImportSupport::new();
        let content = "export * from './components';\n";
        let (result, changes) = support.rewrite_imports_for_move(
            content,
            Path::new("/p/src/index.ts"),
            Path::new("/p/src/components/index.ts"),
            Path::new("/p/src/ui/index.ts"),
        );
        assert_eq!(changes, 1);
        assert_eq!(result, "export * from './ui';\n");
    }

    #[test]
    fn test_rewrite_keeps_written_js_extension() {
        let support = TypeScriptImportSupport::new();
        let content = "import { a } from './a.js';\n";
        let (result, changes) = support.rewrite_imports_for_move(
            content,
            Path::new("/p/src/main.ts"),
            Path::new("/p/src/a.ts"),
            Path::new("/p/src/core/a.ts"),
        );
        assert_eq!(changes, 1);
        assert_eq!(result, "import { a } from './core/a.js';\n");
    }

    #[test]
    fn test_rewrite_skips_packages_and_other_files() {
        let support = TypeScriptImportSupport::new();
        let content = "import a from 'a';\nimport css from './a.css';\n";
        let (result, changes) = support.rewrite_imports_for_move(
            content,
            Path::new("/p/src/main.ts"),
            Path::new("/p/src/a.ts"),
            Path::new("/p/lib/a.ts"),
        );
        assert_eq!(changes, 0);
        assert_eq!(result, content);
    }

    #[test]
    fn test_rewrite_imports_for_rename() {
        let support = TypeScriptImportSupport::new();
        let content = "import a from 'old-pkg';\nimport b from 'old-pkg/sub';\nimport c from 'old-pkg-extra';\n";
        let (result, changes) = support.rewrite_imports_for_rename(content, "old-pkg", "new-pkg");
        assert_eq!(changes, 2);
        assert_eq!(
            result,
            "import a from 'new-pkg';\nimport b from 'new-pkg/sub';\nimport c from 'old-pkg-extra';\n"
        );
    }

    #[test]
    fn test_refers_to_variants() {
        let target = Path::new("/p/src/a.ts");
        assert!(refers_to(Path::new("/p/src/a"), target));
        assert!(refers_to(Path::new("/p/src/a.ts"), target));
        assert!(refers_to(Path::new("/p/src/a.js"), target));
        assert!(!refers_to(Path::new("/p/src/a.css"), target));
        assert!(refers_to(Path::new("/p/src/lib"), Path::new("/p/src/lib/index.tsx")));
    }
}

//! SWC parsing shared by import support and refactoring
//!
//! Spans are converted to byte offsets into the parsed source so edits can be
//! built with the foundation position helpers.

use refit_plugin_api::{PluginApiError, PluginResult};
use std::path::{Path, PathBuf};
use swc_common::comments::{Comment, Comments, SingleThreadedComments};
use swc_common::{sync::Lrc, BytePos, FileName, FilePathMapping, SourceMap, Span};
use swc_ecma_ast::{ArrayPat, EsVersion, Module, ObjectPat, ObjectPatProp, Pat};
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax};

/// A parsed module together with the comments and offset base of its source.
pub(crate) struct ParsedModule {
    pub module: Module,
    comments: SingleThreadedComments,
    base: BytePos,
}

impl ParsedModule {
    /// Byte offsets of `span` within the source.
    pub fn range(&self, span: Span) -> (usize, usize) {
        (self.offset(span.lo), self.offset(span.hi))
    }

    pub fn offset(&self, pos: BytePos) -> usize {
        pos.0.saturating_sub(self.base.0) as usize
    }

    /// Comments directly before the token at `pos`.
    pub fn leading_comments(&self, pos: BytePos) -> Vec<Comment> {
        self.comments.get_leading(pos).unwrap_or_default()
    }
}

fn syntaxes(path: Option<&Path>) -> Vec<Syntax> {
    let ts = Syntax::Typescript(TsSyntax {
        tsx: false,
        decorators: true,
        ..Default::default()
    });
    let tsx = Syntax::Typescript(TsSyntax {
        tsx: true,
        decorators: true,
        ..Default::default()
    });
    let js = Syntax::Es(EsSyntax {
        jsx: true,
        decorators: true,
        ..Default::default()
    });

    let extension = path
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("tsx") => vec![tsx, ts],
        Some("js" | "jsx" | "mjs" | "cjs") => vec![js, tsx],
        _ => vec![ts, tsx, js],
    }
}

fn parse_with(source: &str, path: &Path, syntax: Syntax) -> PluginResult<ParsedModule> {
    let cm: Lrc<SourceMap> = Lrc::new(SourceMap::new(FilePathMapping::empty()));
    let file_name = Lrc::new(FileName::Real(path.to_path_buf()));
    let source_file = cm.new_source_file(file_name, source.to_string());
    let comments = SingleThreadedComments::default();
    let lexer = Lexer::new(
        syntax,
        EsVersion::latest(),
        StringInput::from(&*source_file),
        Some(&comments as &dyn Comments),
    );
    let mut parser = Parser::new_from(lexer);
    let module = parser
        .parse_module()
        .map_err(|e| PluginApiError::parse(format!("Failed to parse module: {:?}", e)))?;
    Ok(ParsedModule {
        module,
        comments,
        base: source_file.start_pos,
    })
}

/// Parse `source` as a module, trying the syntaxes its extension suggests in turn.
pub(crate) fn parse_module(source: &str, path: Option<&Path>) -> PluginResult<ParsedModule> {
    let name = path.map_or_else(|| PathBuf::from("module.ts"), Path::to_path_buf);
    let mut last_error = None;
    for syntax in syntaxes(path) {
        match parse_with(source, &name, syntax) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| PluginApiError::parse("No syntax to parse with")))
}

/// Identifiers a binding pattern introduces, with their spans.
pub(crate) fn pattern_names(pat: &Pat, out: &mut Vec<(String, Span)>) {
    match pat {
        Pat::Ident(binding) => out.push((binding.id.sym.to_string(), binding.id.span)),
        Pat::Array(array) => array_pattern_names(array, out),
        Pat::Object(object) => object_pattern_names(object, out),
        Pat::Rest(rest) => pattern_names(&rest.arg, out),
        Pat::Assign(assign) => pattern_names(&assign.left, out),
        Pat::Invalid(_) | Pat::Expr(_) => {}
    }
}

pub(crate) fn array_pattern_names(array: &ArrayPat, out: &mut Vec<(String, Span)>) {
    for elem in array.elems.iter().flatten() {
        pattern_names(elem, out);
    }
}

pub(crate) fn object_pattern_names(object: &ObjectPat, out: &mut Vec<(String, Span)>) {
    for prop in &object.props {
        match prop {
            ObjectPatProp::KeyValue(kv) => pattern_names(&kv.value, out),
            ObjectPatProp::Assign(assign) => {
                out.push((assign.key.sym.to_string(), assign.key.span))
            }
            ObjectPatProp::Rest(rest) => pattern_names(&rest.arg, out),
        }
    }
}

/// Start of the line holding `offset`.
pub(crate) fn line_start(source: &str, offset: usize) -> usize {
    source[..offset].rfind('\n').map_or(0, |p| p + 1)
}

/// End of the line holding `offset`, after its newline when there is one.
pub(crate) fn line_end_inclusive(source: &str, offset: usize) -> usize {
    source[offset..]
        .find('\n')
        .map_or(source.len(), |p| offset + p + 1)
}

pub(crate) fn indentation(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

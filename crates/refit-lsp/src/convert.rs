//! Conversions between `lsp_types` and the refit planning model

use lsp_types::{
    DocumentChangeOperation, DocumentChanges, OneOf, ResourceOp, SymbolKind, TextDocumentEdit, Uri,
};
use refit_foundation::{
    Diagnostic, DiagnosticSeverity, EditLocation, EditType, FileOperation, Location, Position,
    RefitError, RefitResult, SymbolCandidate, TextEdit, WorkspaceEdit,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Build a `file://` URI for an absolute path, percent-encoding each segment.
pub fn path_to_uri(path: &Path) -> RefitResult<Uri> {
    let encoded = path
        .to_string_lossy()
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    let prefix = if encoded.starts_with('/') { "file://" } else { "file:///" };
    Uri::from_str(&format!("{}{}", prefix, encoded)).map_err(|e| {
        RefitError::invalid_request(format!(
            "Cannot build file URI for '{}': {}",
            path.display(),
            e
        ))
    })
}

pub fn uri_to_path(uri: &Uri) -> RefitResult<PathBuf> {
    if !uri.as_str().starts_with("file:") {
        return Err(RefitError::lsp(format!(
            "Unsupported URI scheme in '{}'",
            uri.as_str()
        )));
    }
    let decoded = urlencoding::decode(uri.path().as_str())
        .map_err(|e| RefitError::lsp(format!("Invalid URI '{}': {}", uri.as_str(), e)))?;
    Ok(PathBuf::from(decoded.into_owned()))
}

pub fn position_to_lsp(position: Position) -> lsp_types::Position {
    lsp_types::Position {
        line: position.line,
        character: position.character,
    }
}

pub fn range_from_lsp(range: lsp_types::Range) -> EditLocation {
    EditLocation::new(
        range.start.line,
        range.start.character,
        range.end.line,
        range.end.character,
    )
}

pub fn location_from_lsp(location: lsp_types::Location) -> RefitResult<Location> {
    Ok(Location {
        path: uri_to_path(&location.uri)?,
        range: range_from_lsp(location.range),
    })
}

fn text_edit_from_lsp(edit: lsp_types::TextEdit) -> TextEdit {
    TextEdit::replace(range_from_lsp(edit.range), String::new(), edit.new_text)
        .with_type(EditType::Rename)
}

fn push_document_edit(target: &mut WorkspaceEdit, doc: TextDocumentEdit) -> RefitResult<()> {
    let path = uri_to_path(&doc.text_document.uri)?;
    let edits = doc.edits.into_iter().map(|edit| match edit {
        OneOf::Left(plain) => text_edit_from_lsp(plain),
        OneOf::Right(annotated) => text_edit_from_lsp(annotated.text_edit),
    });
    target.add_edits(path, edits);
    Ok(())
}

fn push_resource_op(target: &mut WorkspaceEdit, op: ResourceOp) -> RefitResult<()> {
    let operation = match op {
        ResourceOp::Create(create) => FileOperation::Create {
            path: uri_to_path(&create.uri)?,
            content: String::new(),
            overwrite: create
                .options
                .and_then(|o| o.overwrite)
                .unwrap_or(false),
        },
        ResourceOp::Rename(rename) => FileOperation::Move {
            from: uri_to_path(&rename.old_uri)?,
            to: uri_to_path(&rename.new_uri)?,
            overwrite: rename
                .options
                .and_then(|o| o.overwrite)
                .unwrap_or(false),
        },
        ResourceOp::Delete(delete) => FileOperation::Delete {
            path: uri_to_path(&delete.uri)?,
        },
    };
    target.add_operation(operation);
    Ok(())
}

/// Convert a server-computed workspace edit. Both the `changes` map and
/// `documentChanges` (plain edits or mixed resource operations) are accepted.
pub fn workspace_edit_from_lsp(edit: lsp_types::WorkspaceEdit) -> RefitResult<WorkspaceEdit> {
    let mut result = WorkspaceEdit::new();

    if let Some(changes) = edit.changes {
        for (uri, edits) in changes {
            let path = uri_to_path(&uri)?;
            result.add_edits(path, edits.into_iter().map(text_edit_from_lsp));
        }
    }

    match edit.document_changes {
        Some(DocumentChanges::Edits(docs)) => {
            for doc in docs {
                push_document_edit(&mut result, doc)?;
            }
        }
        Some(DocumentChanges::Operations(ops)) => {
            for op in ops {
                match op {
                    DocumentChangeOperation::Edit(doc) => push_document_edit(&mut result, doc)?,
                    DocumentChangeOperation::Op(resource) => push_resource_op(&mut result, resource)?,
                }
            }
        }
        None => {}
    }

    Ok(result)
}

pub fn symbol_kind_name(kind: SymbolKind) -> &'static str {
    match kind {
        k if k == SymbolKind::FILE => "file",
        k if k == SymbolKind::MODULE => "module",
        k if k == SymbolKind::NAMESPACE => "namespace",
        k if k == SymbolKind::CLASS => "class",
        k if k == SymbolKind::METHOD => "method",
        k if k == SymbolKind::PROPERTY => "property",
        k if k == SymbolKind::FIELD => "field",
        k if k == SymbolKind::CONSTRUCTOR => "constructor",
        k if k == SymbolKind::ENUM => "enum",
        k if k == SymbolKind::INTERFACE => "interface",
        k if k == SymbolKind::FUNCTION => "function",
        k if k == SymbolKind::VARIABLE => "variable",
        k if k == SymbolKind::CONSTANT => "constant",
        k if k == SymbolKind::ENUM_MEMBER => "enum_member",
        k if k == SymbolKind::STRUCT => "struct",
        k if k == SymbolKind::TYPE_PARAMETER => "type_parameter",
        _ => "symbol",
    }
}

/// Convert a `workspace/symbol` response. Symbols whose location has no range
/// (`WorkspaceLocation`) are dropped because they cannot anchor a rename.
pub fn symbols_from_lsp(response: lsp_types::WorkspaceSymbolResponse) -> Vec<SymbolCandidate> {
    let mut out = Vec::new();
    match response {
        lsp_types::WorkspaceSymbolResponse::Flat(items) => {
            for item in items {
                if let Ok(location) = location_from_lsp(item.location) {
                    out.push(SymbolCandidate {
                        name: item.name,
                        kind: symbol_kind_name(item.kind).to_string(),
                        location,
                        container: item.container_name,
                    });
                }
            }
        }
        lsp_types::WorkspaceSymbolResponse::Nested(items) => {
            for item in items {
                let OneOf::Left(loc) = item.location else {
                    continue;
                };
                if let Ok(location) = location_from_lsp(loc) {
                    out.push(SymbolCandidate {
                        name: item.name,
                        kind: symbol_kind_name(item.kind).to_string(),
                        location,
                        container: item.container_name,
                    });
                }
            }
        }
    }
    out
}

pub fn diagnostic_from_lsp(path: &Path, diagnostic: lsp_types::Diagnostic) -> Diagnostic {
    let severity = match diagnostic.severity {
        Some(s) if s == lsp_types::DiagnosticSeverity::WARNING => DiagnosticSeverity::Warning,
        Some(s) if s == lsp_types::DiagnosticSeverity::INFORMATION => {
            DiagnosticSeverity::Information
        }
        Some(s) if s == lsp_types::DiagnosticSeverity::HINT => DiagnosticSeverity::Hint,
        _ => DiagnosticSeverity::Error,
    };
    Diagnostic {
        path: path.to_path_buf(),
        range: range_from_lsp(diagnostic.range),
        severity,
        message: diagnostic.message,
        source: diagnostic.source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_uri_roundtrip_with_spaces() {
        let path = Path::new("/tmp/my project/src/a.ts");
        let uri = path_to_uri(path).unwrap();
        assert_eq!(uri.as_str(), "file:///tmp/my%20project/src/a.ts");
        assert_eq!(uri_to_path(&uri).unwrap(), path);
    }

    #[test]
    fn test_non_file_uri_rejected() {
        let uri = Uri::from_str("https://example.com/a.ts").unwrap();
        assert!(uri_to_path(&uri).is_err());
    }

    #[test]
    fn test_workspace_edit_from_document_changes() {
        let edit: lsp_types::WorkspaceEdit = serde_json::from_value(json!({
            "documentChanges": [
                {
                    "textDocument": { "uri": "file:///p/src/a.ts", "version": 1 },
                    "edits": [{
                        "range": { "start": { "line": 0, "character": 16 }, "end": { "line": 0, "character": 19 } },
                        "newText": "bar"
                    }]
                },
                { "kind": "rename", "oldUri": "file:///p/src/a.ts", "newUri": "file:///p/src/b.ts" }
            ]
        }))
        .unwrap();

        let converted = workspace_edit_from_lsp(edit).unwrap();
        let edits = &converted.changes[Path::new("/p/src/a.ts")];
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].new_text, "bar");
        assert_eq!(edits[0].location, EditLocation::on_line(0, 16, 3));
        assert_eq!(
            converted.file_operations,
            vec![FileOperation::Move {
                from: "/p/src/a.ts".into(),
                to: "/p/src/b.ts".into(),
                overwrite: false,
            }]
        );
    }

    #[test]
    fn test_flat_symbols() {
        let response: lsp_types::WorkspaceSymbolResponse = serde_json::from_value(json!([
            {
                "name": "getUserData",
                "kind": 12,
                "location": {
                    "uri": "file:///p/src/api.ts",
                    "range": { "start": { "line": 3, "character": 16 }, "end": { "line": 3, "character": 27 } }
                },
                "containerName": "api"
            }
        ]))
        .unwrap();

        let symbols = symbols_from_lsp(response);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].kind, "function");
        assert_eq!(symbols[0].location.path, PathBuf::from("/p/src/api.ts"));
        assert_eq!(symbols[0].container.as_deref(), Some("api"));
    }
}

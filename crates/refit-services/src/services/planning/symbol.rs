//! Symbol rename planning
//!
//! Reference locations come from code intelligence only. Each location is
//! checked to hold exactly the old name as a whole token before it is edited.

use super::{Draft, PlanBuilder};
use crate::services::path_utils::display_relative;
use refit_foundation::{
    byte_offset, position_at, warning_codes, EditLocation, EditType, Location, PlanWarning,
    Position, RefitError, RefitResult, SymbolCandidate, SymbolTarget, TextEdit, WorkspaceEdit,
};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap());

/// Whether `name` can replace an identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

pub(super) enum SymbolPlan {
    Draft(Draft),
    Candidates(Vec<SymbolCandidate>),
}

pub(super) enum ResolvedTarget {
    At { file: PathBuf, position: Position },
    Ambiguous(Vec<SymbolCandidate>),
}

impl PlanBuilder {
    /// Turn a symbol target into one position, or the candidates to choose from.
    pub(super) async fn resolve_symbol_target(
        &self,
        target: &SymbolTarget,
    ) -> RefitResult<ResolvedTarget> {
        match target {
            SymbolTarget::Position { file, position } => {
                self.ensure_in_root(file)?;
                if !self.fs.exists(file).await {
                    return Err(RefitError::file_not_found(file.display().to_string()));
                }
                Ok(ResolvedTarget::At {
                    file: file.clone(),
                    position: *position,
                })
            }
            SymbolTarget::Name { name, file } => {
                let mut candidates: Vec<SymbolCandidate> = self
                    .intelligence
                    .find_symbols(name)
                    .await?
                    .into_iter()
                    .filter(|c| &c.name == name)
                    .filter(|c| file.as_ref().is_none_or(|f| &c.location.path == f))
                    .collect();
                candidates.sort_by(|a, b| {
                    (&a.location.path, a.location.range.start())
                        .cmp(&(&b.location.path, b.location.range.start()))
                });
                candidates.dedup_by(|a, b| a.location == b.location);

                match candidates.len() {
                    0 => Err(RefitError::symbol_not_found(
                        name.clone(),
                        file.as_ref().map(|f| f.display().to_string()),
                    )),
                    1 => {
                        let candidate = &candidates[0];
                        // Servers report the whole declaration, keyword included
                        let content = self.read(&candidate.location.path).await?;
                        let position = name_position(&content, &candidate.location.range, name)
                            .unwrap_or_else(|| candidate.location.range.start());
                        debug!(
                            file_path = %candidate.location.path.display(),
                            line = position.line,
                            character = position.character,
                            "Resolved symbol name"
                        );
                        Ok(ResolvedTarget::At {
                            file: candidate.location.path.clone(),
                            position,
                        })
                    }
                    _ => Ok(ResolvedTarget::Ambiguous(candidates)),
                }
            }
        }
    }

    pub(super) async fn plan_symbol_rename(
        &self,
        target: &SymbolTarget,
        new_name: &str,
    ) -> RefitResult<SymbolPlan> {
        if !is_valid_identifier(new_name) {
            return Err(RefitError::invalid_request(format!(
                "'{}' is not a valid identifier",
                new_name
            )));
        }

        let (file, position) = match self.resolve_symbol_target(target).await? {
            ResolvedTarget::At { file, position } => (file, position),
            ResolvedTarget::Ambiguous(candidates) => return Ok(SymbolPlan::Candidates(candidates)),
        };

        let mut contents: BTreeMap<PathBuf, String> = BTreeMap::new();
        let source = self.read(&file).await?;
        let old_name = match target {
            SymbolTarget::Name { name, .. } => name.clone(),
            SymbolTarget::Position { .. } => identifier_at(&source, position).ok_or_else(|| {
                RefitError::symbol_not_found(
                    format!("{}:{}", position.line + 1, position.character + 1),
                    Some(file.display().to_string()),
                )
            })?,
        };
        contents.insert(file.clone(), source);

        if old_name == new_name {
            return Err(RefitError::invalid_request(format!(
                "Symbol is already named '{}'",
                new_name
            )));
        }

        info!(
            file_path = %file.display(),
            old_name = %old_name,
            new_name = %new_name,
            "Planning symbol rename"
        );

        let locations = self.intelligence.find_references(&file, position).await?;
        if locations.is_empty() {
            return Err(RefitError::symbol_not_found(
                old_name,
                Some(file.display().to_string()),
            ));
        }

        let mut edit = WorkspaceEdit::new();
        let mut warnings = Vec::new();
        let mut dependents = Vec::new();
        for location in &locations {
            if !location.path.starts_with(&self.project_root) {
                debug!(file_path = %location.path.display(), "Skipping reference outside project");
                continue;
            }
            if !contents.contains_key(&location.path) {
                let content = self.read(&location.path).await?;
                contents.insert(location.path.clone(), content);
            }
            let content = &contents[&location.path];

            if is_whole_token(content, location, &old_name) {
                edit.add_edit(
                    &location.path,
                    TextEdit::replace(location.range, old_name.clone(), new_name)
                        .with_type(EditType::Rename)
                        .with_description(format!("Rename '{}' to '{}'", old_name, new_name)),
                );
                dependents.push(location.path.clone());
            } else {
                warn!(
                    file_path = %location.path.display(),
                    line = location.range.start_line,
                    "Reference location does not hold the symbol name"
                );
                warnings.push(PlanWarning::new(
                    warning_codes::SKIPPED_REFERENCE,
                    format!(
                        "Skipped reference at {}:{}:{}: text is not the identifier '{}'",
                        display_relative(&self.project_root, &location.path),
                        location.range.start_line + 1,
                        location.range.start_column + 1,
                        old_name
                    ),
                ));
            }
        }

        if edit.edit_count() == 0 {
            return Err(RefitError::symbol_not_found(
                old_name,
                Some(file.display().to_string()),
            ));
        }

        let mut draft = Draft::new(edit);
        draft.warnings = warnings;
        draft.dependents = dependents;
        Ok(SymbolPlan::Draft(draft))
    }

    pub(super) async fn read(&self, path: &std::path::Path) -> RefitResult<String> {
        self.fs.read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RefitError::file_not_found(path.display().to_string())
            } else {
                RefitError::io_at(path, e)
            }
        })
    }
}

/// The identifier covering `position`, if any.
fn identifier_at(content: &str, position: Position) -> Option<String> {
    let offset = byte_offset(content, position)?;
    let start = content[..offset]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_identifier_char(*c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(offset);
    let end = content[offset..]
        .char_indices()
        .find(|(_, c)| !is_identifier_char(*c))
        .map(|(i, _)| offset + i)
        .unwrap_or(content.len());
    let name = &content[start..end];
    is_valid_identifier(name).then(|| name.to_string())
}

/// First whole-token occurrence of `name` inside `range`.
fn name_position(content: &str, range: &EditLocation, name: &str) -> Option<Position> {
    let start = byte_offset(content, range.start())?;
    let end = range
        .to_byte_range(content)
        .map_or(content.len(), |(_, end)| end)
        .max(start);
    content[start..end]
        .match_indices(name)
        .map(|(i, _)| start + i)
        .find(|&offset| {
            let before = content[..offset].chars().next_back();
            let after = content[offset + name.len()..].chars().next();
            !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char)
        })
        .map(|offset| position_at(content, offset))
}

/// The location holds exactly `name`, bounded by non-identifier characters.
fn is_whole_token(content: &str, location: &Location, name: &str) -> bool {
    let Some((start, end)) = location.range.to_byte_range(content) else {
        return false;
    };
    if &content[start..end] != name {
        return false;
    }
    let before = content[..start].chars().next_back();
    let after = content[end..].chars().next();
    !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char)
}

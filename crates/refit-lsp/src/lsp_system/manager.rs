//! LSP-backed code intelligence
//!
//! One client per configured server, created on first use for a file
//! extension the server claims. A client whose process has exited is dropped
//! and reported as unavailable; the next call (or an explicit restart) spawns
//! a fresh one.

use super::client::LspClient;
use crate::code_intelligence::CodeIntelligence;
use crate::convert::{
    diagnostic_from_lsp, location_from_lsp, path_to_uri, position_to_lsp, symbols_from_lsp,
    workspace_edit_from_lsp,
};
use async_trait::async_trait;
use refit_config::{LspConfig, LspServerConfig};
use refit_foundation::{
    Diagnostic, Location, Position, RefitError, RefitResult, SymbolCandidate, WorkspaceEdit,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct LspCodeIntelligence {
    config: LspConfig,
    project_root: PathBuf,
    request_timeout: Duration,
    /// Live clients keyed by index into `config.servers`
    clients: Mutex<HashMap<usize, Arc<LspClient>>>,
}

impl LspCodeIntelligence {
    pub fn new(config: LspConfig, project_root: impl Into<PathBuf>) -> Self {
        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        Self {
            config,
            project_root: project_root.into(),
            request_timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn server_index_for_extension(&self, extension: &str) -> Option<usize> {
        self.config.servers.iter().position(|server| {
            server
                .extensions
                .iter()
                .any(|ext| ext.eq_ignore_ascii_case(extension))
        })
    }

    fn server_index_for_path(&self, path: &Path) -> RefitResult<usize> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        self.server_index_for_extension(extension).ok_or_else(|| {
            RefitError::unavailable(
                "lsp",
                format!("No LSP server configured for extension: '{}'", extension),
            )
        })
    }

    /// Number of running clients
    pub async fn active_clients(&self) -> usize {
        self.clients.lock().await.len()
    }

    async fn get_or_create_client(&self, index: usize) -> RefitResult<Arc<LspClient>> {
        let server_config: LspServerConfig = self
            .config
            .servers
            .get(index)
            .cloned()
            .ok_or_else(|| RefitError::internal(format!("No LSP server at index {}", index)))?;

        {
            let mut clients = self.clients.lock().await;
            if let Some(client) = clients.get(&index) {
                if client.is_alive().await {
                    debug!(server = %server_config.command.join(" "), "Reusing existing, live LSP client");
                    return Ok(client.clone());
                }

                warn!(
                    server = %server_config.command.join(" "),
                    "Found dead LSP client in cache, removing it"
                );
                clients.remove(&index);
                return Err(RefitError::unavailable(
                    "lsp",
                    format!(
                        "LSP server '{}' exited unexpectedly; retry or restart it",
                        server_config.command.join(" ")
                    ),
                ));
            }
        }

        // Client creation runs the initialize handshake, so the map lock is not held across it
        let client = Arc::new(
            LspClient::new(
                server_config,
                self.project_root.clone(),
                self.request_timeout,
            )
            .await?,
        );

        let mut clients = self.clients.lock().await;
        let client = clients.entry(index).or_insert(client).clone();
        Ok(client)
    }

    async fn client_for_path(&self, path: &Path) -> RefitResult<Arc<LspClient>> {
        let index = self.server_index_for_path(path)?;
        self.get_or_create_client(index).await
    }

    /// Send a text document request after syncing the file with the server.
    async fn document_request(&self, file: &Path, method: &str, params: Value) -> RefitResult<Value> {
        let client = self.client_for_path(file).await?;
        client.sync_document(file).await?;
        client.send_request(method, params).await
    }

    async fn shutdown_clients(&self, indices: Vec<usize>) {
        let removed: Vec<Arc<LspClient>> = {
            let mut clients = self.clients.lock().await;
            indices
                .into_iter()
                .filter_map(|index| clients.remove(&index))
                .collect()
        };

        for client in removed {
            let command = client.config().command.join(" ");
            if let Err(e) = client.shutdown().await {
                warn!(server = %command, error = %e, "LSP shutdown failed");
            } else {
                info!(server = %command, "LSP server stopped");
            }
        }
    }
}

#[async_trait]
impl CodeIntelligence for LspCodeIntelligence {
    async fn find_references(&self, file: &Path, position: Position) -> RefitResult<Vec<Location>> {
        let uri = path_to_uri(file)?;
        let params = json!({
            "textDocument": { "uri": uri.as_str() },
            "position": position_to_lsp(position),
            "context": { "includeDeclaration": true }
        });

        let response = self
            .document_request(file, "textDocument/references", params)
            .await?;

        let locations: Option<Vec<lsp_types::Location>> = serde_json::from_value(response)?;
        let mut result = Vec::new();
        for location in locations.unwrap_or_default() {
            match location_from_lsp(location) {
                Ok(location) => result.push(location),
                Err(e) => warn!(error = %e, "Skipping reference with unusable URI"),
            }
        }

        debug!(
            file_path = %file.display(),
            reference_count = result.len(),
            "Found references"
        );
        Ok(result)
    }

    async fn rename_symbol(
        &self,
        file: &Path,
        position: Position,
        new_name: &str,
    ) -> RefitResult<WorkspaceEdit> {
        let uri = path_to_uri(file)?;
        let params = json!({
            "textDocument": { "uri": uri.as_str() },
            "position": position_to_lsp(position),
            "newName": new_name
        });

        let response = self
            .document_request(file, "textDocument/rename", params)
            .await?;

        let edit: Option<lsp_types::WorkspaceEdit> = serde_json::from_value(response)?;
        match edit {
            Some(edit) => workspace_edit_from_lsp(edit),
            None => Ok(WorkspaceEdit::new()),
        }
    }

    async fn find_symbols(&self, name: &str) -> RefitResult<Vec<SymbolCandidate>> {
        if self.config.servers.is_empty() {
            return Err(RefitError::unavailable("lsp", "No LSP servers configured"));
        }

        let mut symbols = Vec::new();
        let mut last_error = None;
        let mut queried = 0usize;

        for index in 0..self.config.servers.len() {
            let client = match self.get_or_create_client(index).await {
                Ok(client) => client,
                Err(e) => {
                    warn!(error = %e, "Skipping LSP server for workspace/symbol");
                    last_error = Some(e);
                    continue;
                }
            };

            if !client.supports_workspace_symbols().await {
                debug!(
                    server = %client.config().command.join(" "),
                    "LSP server does not support workspace/symbol, skipping"
                );
                continue;
            }

            match client
                .send_request("workspace/symbol", json!({ "query": name }))
                .await
            {
                Ok(Value::Null) => queried += 1,
                Ok(response) => {
                    queried += 1;
                    match serde_json::from_value::<lsp_types::WorkspaceSymbolResponse>(response) {
                        Ok(parsed) => symbols.extend(symbols_from_lsp(parsed)),
                        Err(e) => warn!(error = %e, "Failed to parse workspace/symbol response"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "workspace/symbol request failed");
                    last_error = Some(e);
                }
            }
        }

        if queried == 0 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        // workspace/symbol is a fuzzy query; only exact names are candidates
        symbols.retain(|s| s.name == name);
        symbols.sort_by(|a, b| {
            (&a.location.path, a.location.range.start())
                .cmp(&(&b.location.path, b.location.range.start()))
        });
        symbols.dedup_by(|a, b| a.location == b.location);
        Ok(symbols)
    }

    async fn get_diagnostics(&self, file: &Path) -> RefitResult<Vec<Diagnostic>> {
        let client = self.client_for_path(file).await?;
        client.sync_document(file).await?;
        let uri = path_to_uri(file)?;

        if client.supports_diagnostic_pull().await {
            let params = json!({ "textDocument": { "uri": uri.as_str() } });
            match client.send_request("textDocument/diagnostic", params).await {
                Ok(response) => {
                    let items = response.get("items").cloned().unwrap_or(Value::Array(vec![]));
                    let items: Vec<lsp_types::Diagnostic> = serde_json::from_value(items)?;
                    return Ok(items
                        .into_iter()
                        .map(|d| diagnostic_from_lsp(file, d))
                        .collect());
                }
                Err(e) => {
                    debug!(error = %e, "Diagnostic pull failed, using cached publishDiagnostics");
                }
            }
        }

        Ok(client
            .get_cached_diagnostics(&uri)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|d| diagnostic_from_lsp(file, d))
            .collect())
    }

    async fn restart(&self, extensions: Option<Vec<String>>) -> RefitResult<()> {
        let indices: Vec<usize> = match extensions {
            None => (0..self.config.servers.len()).collect(),
            Some(extensions) => {
                let mut indices: Vec<usize> = extensions
                    .iter()
                    .filter_map(|ext| self.server_index_for_extension(ext.trim_start_matches('.')))
                    .collect();
                indices.sort_unstable();
                indices.dedup();
                indices
            }
        };

        info!(servers = indices.len(), "Restarting LSP servers");
        self.shutdown_clients(indices).await;
        Ok(())
    }

    async fn shutdown(&self) -> RefitResult<()> {
        let indices: Vec<usize> = self.clients.lock().await.keys().copied().collect();
        self.shutdown_clients(indices).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(command: &str) -> LspConfig {
        LspConfig {
            servers: vec![LspServerConfig {
                extensions: vec!["ts".to_string(), "tsx".to_string()],
                command: vec![command.to_string()],
                root_dir: None,
                initialization_options: None,
            }],
            request_timeout_ms: 300,
        }
    }

    #[tokio::test]
    async fn test_unconfigured_extension_is_unavailable() {
        let service = LspCodeIntelligence::new(config_with("typescript-language-server"), "/tmp");
        let err = service
            .find_references(Path::new("/tmp/notes.py"), Position::new(0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RefitError::Unavailable { .. }));
        assert_eq!(service.active_clients().await, 0);
    }

    #[tokio::test]
    async fn test_missing_server_binary_is_unavailable_error_kind() {
        let service =
            LspCodeIntelligence::new(config_with("refit-missing-language-server"), std::env::temp_dir());
        let err = service
            .rename_symbol(Path::new("/tmp/a.ts"), Position::new(0, 0), "b")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), refit_foundation::ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_restart_without_clients_is_noop() {
        let service = LspCodeIntelligence::new(config_with("refit-missing-language-server"), "/tmp");
        service.restart(Some(vec![".ts".to_string()])).await.unwrap();
        service.restart(None).await.unwrap();
        service.shutdown().await.unwrap();
    }

    #[test]
    fn test_extension_lookup_is_case_insensitive() {
        let service = LspCodeIntelligence::new(config_with("x"), "/tmp");
        assert_eq!(service.server_index_for_extension("TSX"), Some(0));
        assert_eq!(service.server_index_for_extension("rs"), None);
    }
}

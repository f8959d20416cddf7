//! Client for a single language server spoken to over stdio

use super::jsonrpc::{self, Incoming, RpcFailure};
use crate::convert::path_to_uri;
use lsp_types::{Diagnostic, ServerCapabilities, Uri};
use refit_config::LspServerConfig;
use refit_foundation::{RefitError, RefitResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{timeout, Duration, Instant};
use tracing::{debug, error, info, warn};

const OUTBOX_CAPACITY: usize = 256;
/// How long to wait for the process to exit after `exit`
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

type Waiters = Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value, RpcFailure>>>>>;

/// publishDiagnostics results keyed by document URI
pub type DiagnosticsCache = Arc<Mutex<HashMap<Uri, Vec<Diagnostic>>>>;

#[derive(Debug, Clone)]
struct OpenDocument {
    version: i32,
    text: String,
}

/// Connection to one running language server
pub struct LspClient {
    process: Mutex<Child>,
    outbox: mpsc::Sender<Value>,
    waiters: Waiters,
    next_id: AtomicI64,
    config: LspServerConfig,
    root_dir: PathBuf,
    request_timeout: Duration,
    capabilities: Mutex<Option<ServerCapabilities>>,
    diagnostics: DiagnosticsCache,
    /// Documents the server was told about with didOpen
    documents: Mutex<HashMap<PathBuf, OpenDocument>>,
}

impl LspClient {
    /// Spawn the server and run the initialize handshake.
    pub async fn new(
        config: LspServerConfig,
        root_dir: PathBuf,
        request_timeout: Duration,
    ) -> RefitResult<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| RefitError::config("LSP server command cannot be empty"))?;
        let root_dir = config.root_dir.clone().unwrap_or(root_dir);
        let command_line = config.command.join(" ");

        debug!(command = %command_line, root_dir = %root_dir.display(), "Spawning LSP server");
        let mut child = Command::new(program)
            .args(args)
            .current_dir(&root_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!(command = %command_line, error = %e, "Failed to spawn LSP server");
                RefitError::unavailable(
                    "lsp",
                    format!("Failed to start LSP server '{}': {}", command_line, e),
                )
            })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(RefitError::internal("LSP server stdio was not captured"));
        };

        let waiters: Waiters = Arc::new(Mutex::new(HashMap::new()));
        let diagnostics: DiagnosticsCache = Arc::new(Mutex::new(HashMap::new()));
        let (outbox, inbox) = mpsc::channel(OUTBOX_CAPACITY);

        tokio::spawn(write_loop(stdin, inbox, waiters.clone()));
        tokio::spawn(drain_stderr(stderr, program.clone()));
        tokio::spawn(read_loop(
            stdout,
            outbox.clone(),
            waiters.clone(),
            diagnostics.clone(),
        ));

        let client = Self {
            process: Mutex::new(child),
            outbox,
            waiters,
            next_id: AtomicI64::new(1),
            config,
            root_dir,
            request_timeout,
            capabilities: Mutex::new(None),
            diagnostics,
            documents: Mutex::new(HashMap::new()),
        };

        client.initialize().await?;
        if !client.is_alive().await {
            return Err(RefitError::unavailable(
                "lsp",
                format!("LSP server '{}' exited right after startup", command_line),
            ));
        }
        Ok(client)
    }

    /// Send a request and wait at most the configured timeout for its answer.
    pub async fn send_request(&self, method: &str, params: Value) -> RefitResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(id, tx);

        if self
            .outbox
            .send(jsonrpc::request(id, method, params))
            .await
            .is_err()
        {
            self.waiters.lock().await.remove(&id);
            return Err(RefitError::unavailable("lsp", "LSP server connection closed"));
        }

        let started = Instant::now();
        let answer = timeout(self.request_timeout, rx).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match answer {
            Ok(Ok(Ok(result))) => {
                debug!(lsp_method = %method, id, elapsed_ms, "LSP response");
                Ok(result)
            }
            Ok(Ok(Err(RpcFailure::Server(message)))) => {
                debug!(lsp_method = %method, id, error = %message, "LSP error response");
                Err(RefitError::lsp(format!("{} failed: {}", method, message)))
            }
            Ok(Ok(Err(RpcFailure::Disconnected(reason)))) => {
                Err(RefitError::unavailable("lsp", reason))
            }
            Ok(Err(_)) => Err(RefitError::unavailable("lsp", "Response channel closed")),
            Err(_) => {
                self.waiters.lock().await.remove(&id);
                warn!(lsp_method = %method, id, elapsed_ms, "LSP request timed out");
                Err(RefitError::timeout(
                    format!("LSP request {}", method),
                    Some(self.request_timeout.as_millis() as u64),
                ))
            }
        }
    }

    /// Send a notification; no answer is expected.
    pub async fn send_notification(&self, method: &str, params: Value) -> RefitResult<()> {
        self.outbox
            .send(jsonrpc::notification(method, params))
            .await
            .map_err(|_| RefitError::unavailable("lsp", "LSP server connection closed"))
    }

    async fn initialize(&self) -> RefitResult<()> {
        let root_uri = path_to_uri(&self.root_dir)?;
        let mut params = json!({
            "processId": std::process::id(),
            "clientInfo": { "name": "refit", "version": env!("CARGO_PKG_VERSION") },
            "rootUri": root_uri.as_str(),
            "workspaceFolders": [{ "uri": root_uri.as_str(), "name": "workspace" }],
            "capabilities": {
                "textDocument": {
                    "synchronization": { "didOpen": true, "didChange": true, "didClose": true },
                    "references": { "dynamicRegistration": false },
                    "rename": { "prepareSupport": false },
                    "diagnostic": { "dynamicRegistration": false },
                    "publishDiagnostics": {}
                },
                "workspace": {
                    "workspaceEdit": {
                        "documentChanges": true,
                        "resourceOperations": ["create", "rename", "delete"]
                    },
                    "symbol": {},
                    "workspaceFolders": true
                }
            }
        });
        if let (Some(options), Some(object)) = (
            self.config.initialization_options.as_ref(),
            params.as_object_mut(),
        ) {
            object.insert("initializationOptions".to_string(), options.clone());
        }

        let result = self.send_request("initialize", params).await?;
        match serde_json::from_value::<lsp_types::InitializeResult>(result) {
            Ok(init) => *self.capabilities.lock().await = Some(init.capabilities),
            Err(e) => warn!(error = %e, "Unparseable InitializeResult, assuming full capabilities"),
        }
        self.send_notification("initialized", json!({})).await?;
        info!(command = %self.config.command.join(" "), "LSP server initialized");
        Ok(())
    }

    pub async fn capabilities(&self) -> Option<ServerCapabilities> {
        self.capabilities.lock().await.clone()
    }

    /// Unknown capabilities count as supported.
    pub async fn supports_diagnostic_pull(&self) -> bool {
        self.capabilities
            .lock()
            .await
            .as_ref()
            .map_or(true, |c| c.diagnostic_provider.is_some())
    }

    /// Unknown capabilities count as supported.
    pub async fn supports_workspace_symbols(&self) -> bool {
        self.capabilities
            .lock()
            .await
            .as_ref()
            .map_or(true, |c| c.workspace_symbol_provider.is_some())
    }

    pub async fn get_cached_diagnostics(&self, uri: &Uri) -> Option<Vec<Diagnostic>> {
        self.diagnostics.lock().await.get(uri).cloned()
    }

    pub fn config(&self) -> &LspServerConfig {
        &self.config
    }

    pub async fn is_alive(&self) -> bool {
        match self.process.lock().await.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!(status = %status, "LSP process exited");
                false
            }
            Err(e) => {
                warn!(error = %e, "Could not query LSP process status");
                false
            }
        }
    }

    /// Make sure the server sees the current content of `file_path`.
    ///
    /// The first call sends `didOpen`; later calls send a full-text `didChange`
    /// when the file changed on disk since the server last saw it.
    pub async fn sync_document(&self, file_path: &Path) -> RefitResult<()> {
        let text = match tokio::fs::read_to_string(file_path).await {
            Ok(text) => text,
            Err(e) => {
                warn!(file_path = %file_path.display(), error = %e, "Skipping document sync");
                return Ok(());
            }
        };
        let uri = path_to_uri(file_path)?;

        let mut documents = self.documents.lock().await;
        match documents.get_mut(file_path) {
            None => {
                let params = json!({
                    "textDocument": {
                        "uri": uri.as_str(),
                        "languageId": language_id(file_path),
                        "version": 1,
                        "text": text
                    }
                });
                self.send_notification("textDocument/didOpen", params).await?;
                documents.insert(file_path.to_path_buf(), OpenDocument { version: 1, text });
            }
            Some(doc) if doc.text != text => {
                doc.version += 1;
                let params = json!({
                    "textDocument": { "uri": uri.as_str(), "version": doc.version },
                    "contentChanges": [{ "text": text }]
                });
                self.send_notification("textDocument/didChange", params).await?;
                doc.text = text;
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Send `shutdown` and `exit`, killing the process if it lingers.
    pub async fn shutdown(&self) -> RefitResult<()> {
        if let Err(e) = self.send_request("shutdown", Value::Null).await {
            warn!(error = %e, "LSP shutdown request failed");
        }
        if let Err(e) = self.send_notification("exit", Value::Null).await {
            warn!(error = %e, "LSP exit notification failed");
        }

        let mut process = self.process.lock().await;
        match timeout(SHUTDOWN_GRACE, process.wait()).await {
            Ok(Ok(status)) => {
                debug!(exit_status = ?status, "LSP server exited");
                Ok(())
            }
            Ok(Err(e)) => Err(RefitError::internal(format!(
                "Failed to wait for LSP server: {}",
                e
            ))),
            Err(_) => {
                warn!("LSP server ignored exit, killing");
                process
                    .kill()
                    .await
                    .map_err(|e| RefitError::internal(format!("Failed to kill LSP server: {}", e)))
            }
        }
    }
}

async fn write_loop(mut stdin: ChildStdin, mut inbox: mpsc::Receiver<Value>, waiters: Waiters) {
    while let Some(message) = inbox.recv().await {
        let frame = match jsonrpc::encode(&message) {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "Failed to encode LSP message");
                continue;
            }
        };
        let written = match stdin.write_all(&frame).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            error!(error_category = "lsp_communication", error = %e, "LSP stdin closed");
            fail_all(&waiters, format!("Write to LSP server failed: {}", e)).await;
            break;
        }
    }
}

async fn drain_stderr(stderr: ChildStderr, server: String) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let lowered = line.to_ascii_lowercase();
        if ["error", "panic", "fatal"].iter().any(|w| lowered.contains(w)) {
            warn!(server = %server, stderr = %line, "LSP stderr");
        } else {
            debug!(server = %server, stderr = %line, "LSP stderr");
        }
    }
}

async fn read_loop(
    stdout: ChildStdout,
    outbox: mpsc::Sender<Value>,
    waiters: Waiters,
    diagnostics: DiagnosticsCache,
) {
    let mut reader = BufReader::new(stdout);
    loop {
        let message = match jsonrpc::read_frame(&mut reader).await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(e) => {
                error!(error_category = "lsp_communication", error = %e, "Bad frame from LSP server");
                break;
            }
        };
        match Incoming::classify(message) {
            Some(Incoming::Response { id, outcome }) => match waiters.lock().await.remove(&id) {
                Some(waiter) => {
                    let _ = waiter.send(outcome);
                }
                None => debug!(id, "Late response for a request that already timed out"),
            },
            Some(Incoming::ServerRequest { id, method, params }) => {
                if outbox.send(answer_server_request(id, &method, &params)).await.is_err() {
                    break;
                }
            }
            Some(Incoming::Notification { method, params }) => {
                if method == "textDocument/publishDiagnostics" {
                    cache_diagnostics(&diagnostics, params).await;
                }
            }
            None => warn!("Ignoring malformed message from LSP server"),
        }
    }
    // Outstanding requests fail now rather than at their timeout
    fail_all(&waiters, "LSP server exited".to_string()).await;
}

async fn fail_all(waiters: &Waiters, reason: String) {
    for (_, waiter) in waiters.lock().await.drain() {
        let _ = waiter.send(Err(RpcFailure::Disconnected(reason.clone())));
    }
}

async fn cache_diagnostics(diagnostics: &DiagnosticsCache, params: Value) {
    match serde_json::from_value::<lsp_types::PublishDiagnosticsParams>(params) {
        Ok(published) => {
            debug!(
                uri = %published.uri.as_str(),
                count = published.diagnostics.len(),
                "Cached published diagnostics"
            );
            diagnostics
                .lock()
                .await
                .insert(published.uri, published.diagnostics);
        }
        Err(e) => debug!(error = %e, "Unparseable publishDiagnostics"),
    }
}

/// Reply to a server-initiated request.
///
/// `workspace/applyEdit` is always declined: edits reach disk only through a
/// plan and the atomic applier.
fn answer_server_request(id: Value, method: &str, params: &Value) -> Value {
    match method {
        "workspace/configuration" => {
            let items = params
                .get("items")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            jsonrpc::response(id, Value::Array(vec![Value::Null; items]))
        }
        "client/registerCapability" | "window/workDoneProgress/create" => {
            jsonrpc::response(id, Value::Null)
        }
        "workspace/workspaceFolders" => jsonrpc::response(id, json!([])),
        "workspace/applyEdit" => {
            info!("Declining workspace/applyEdit from LSP server");
            jsonrpc::response(
                id,
                json!({ "applied": false, "failureReason": "edits are applied through refit plans" }),
            )
        }
        other => {
            warn!(method = %other, "Unsupported server request");
            jsonrpc::method_not_found(id)
        }
    }
}

fn language_id(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("ts" | "mts" | "cts") => "typescript",
        Some("tsx") => "typescriptreact",
        Some("js" | "mjs" | "cjs") => "javascript",
        Some("jsx") => "javascriptreact",
        Some("py") => "python",
        Some("rs") => "rust",
        Some("go") => "go",
        Some("md" | "markdown") => "markdown",
        _ => "plaintext",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(command: &[&str]) -> LspServerConfig {
        LspServerConfig {
            extensions: vec!["ts".to_string()],
            command: command.iter().map(|s| s.to_string()).collect(),
            root_dir: None,
            initialization_options: None,
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let result = LspClient::new(
            server(&["refit-definitely-missing-lsp-binary"]),
            std::env::temp_dir(),
            Duration::from_millis(500),
        )
        .await;
        assert!(matches!(result, Err(RefitError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_empty_command_is_config_error() {
        let result = LspClient::new(server(&[]), std::env::temp_dir(), Duration::from_millis(500)).await;
        assert!(matches!(result, Err(RefitError::Config { .. })));
    }

    #[tokio::test]
    async fn test_non_lsp_process_fails_fast() {
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            LspClient::new(
                server(&["echo", "test"]),
                std::env::temp_dir(),
                Duration::from_millis(1000),
            ),
        )
        .await;

        // Either the handshake errors or the bounded request times out
        if let Ok(client_result) = result {
            assert!(client_result.is_err());
        }
    }

    #[test]
    fn test_server_requests_answered() {
        let reply = answer_server_request(
            json!(3),
            "workspace/configuration",
            &json!({ "items": [{}, {}] }),
        );
        assert_eq!(reply["result"], json!([null, null]));

        let reply = answer_server_request(json!(4), "workspace/applyEdit", &Value::Null);
        assert_eq!(reply["result"]["applied"], false);

        let reply = answer_server_request(json!(5), "custom/thing", &Value::Null);
        assert_eq!(reply["error"]["code"], -32601);
    }

    #[test]
    fn test_language_id() {
        assert_eq!(language_id(Path::new("a.tsx")), "typescriptreact");
        assert_eq!(language_id(Path::new("README")), "plaintext");
    }
}

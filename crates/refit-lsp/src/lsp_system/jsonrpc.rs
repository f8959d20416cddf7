//! JSON-RPC framing and message classification for the stdio transport

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

const METHOD_NOT_FOUND: i64 = -32601;

/// Why a request produced no result
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RpcFailure {
    /// The server answered with a JSON-RPC error object.
    Server(String),
    /// The transport went away before an answer arrived.
    Disconnected(String),
}

/// A message read from the server, sorted by what the client must do with it
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Incoming {
    /// Answer to one of our requests.
    Response {
        id: i64,
        outcome: Result<Value, RpcFailure>,
    },
    /// Request the server expects us to answer.
    ServerRequest {
        id: Value,
        method: String,
        params: Value,
    },
    Notification { method: String, params: Value },
}

impl Incoming {
    pub(crate) fn classify(message: Value) -> Option<Self> {
        let Value::Object(mut object) = message else {
            return None;
        };
        let method = object
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_string);
        let params = object.remove("params").unwrap_or(Value::Null);
        let id = object.remove("id");

        match (method, id) {
            (Some(method), Some(id)) => Some(Incoming::ServerRequest { id, method, params }),
            (Some(method), None) => Some(Incoming::Notification { method, params }),
            (None, Some(id)) => {
                let id = id.as_i64()?;
                let outcome = if let Some(error) = object.get("error") {
                    let message = error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown server error");
                    Err(RpcFailure::Server(message.to_string()))
                } else {
                    Ok(object.remove("result").unwrap_or(Value::Null))
                };
                Some(Incoming::Response { id, outcome })
            }
            (None, None) => None,
        }
    }
}

pub(crate) fn request(id: i64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

pub(crate) fn notification(method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "method": method, "params": params })
}

pub(crate) fn response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

pub(crate) fn method_not_found(id: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": METHOD_NOT_FOUND, "message": "Method not found" }
    })
}

/// Frame a message with its `Content-Length` header.
pub(crate) fn encode(message: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let body = serde_json::to_vec(message)?;
    let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    frame.extend_from_slice(&body);
    Ok(frame)
}

fn content_length(header: &str) -> Option<usize> {
    let (name, value) = header.split_once(':')?;
    if name.trim().eq_ignore_ascii_case("content-length") {
        value.trim().parse().ok()
    } else {
        None
    }
}

/// Read one framed message. `Ok(None)` means the stream ended cleanly.
pub(crate) async fn read_frame<R>(reader: &mut R) -> std::io::Result<Option<Value>>
where
    R: AsyncBufRead + Unpin,
{
    let mut length = None;
    let mut header = String::new();
    loop {
        header.clear();
        if reader.read_line(&mut header).await? == 0 {
            return Ok(None);
        }
        let line = header.trim();
        if line.is_empty() {
            if length.is_some() {
                break;
            }
            continue;
        }
        if let Some(n) = content_length(line) {
            length = Some(n);
        }
    }

    let mut body = vec![0u8; length.unwrap_or(0)];
    reader.read_exact(&mut body).await?;
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::BufReader;

    #[test]
    fn test_content_length_header() {
        assert_eq!(content_length("Content-Length: 123"), Some(123));
        assert_eq!(content_length("content-length:7"), Some(7));
        assert_eq!(content_length("Content-Type: application/json"), None);
        assert_eq!(content_length("Content-Length: many"), None);
    }

    #[tokio::test]
    async fn test_read_frames_skipping_other_headers() {
        let mut stream = encode(&json!({ "jsonrpc": "2.0", "id": 1, "result": null })).unwrap();
        let body = r#"{"jsonrpc":"2.0","method":"x"}"#;
        stream.extend_from_slice(
            format!(
                "Content-Length: {}\r\nContent-Type: application/vscode-jsonrpc; charset=utf-8\r\n\r\n{}",
                body.len(),
                body
            )
            .as_bytes(),
        );
        let mut reader = BufReader::new(stream.as_slice());

        let first = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(first["id"], 1);
        let second = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(second["method"], "x");
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            Incoming::classify(json!({ "id": 4, "result": [1] })),
            Some(Incoming::Response {
                id: 4,
                outcome: Ok(json!([1]))
            })
        );
        assert_eq!(
            Incoming::classify(json!({ "id": 5, "error": { "code": -1, "message": "nope" } })),
            Some(Incoming::Response {
                id: 5,
                outcome: Err(RpcFailure::Server("nope".to_string()))
            })
        );
        assert!(matches!(
            Incoming::classify(json!({ "id": "a", "method": "workspace/configuration", "params": {} })),
            Some(Incoming::ServerRequest { .. })
        ));
        assert!(matches!(
            Incoming::classify(json!({ "method": "window/logMessage" })),
            Some(Incoming::Notification { .. })
        ));
        assert_eq!(Incoming::classify(json!({ "jsonrpc": "2.0" })), None);
        assert_eq!(Incoming::classify(json!([1, 2])), None);
    }
}

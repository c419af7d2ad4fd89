//! JSON-RPC 2.0 envelopes around `lsp_types` methods.
//!
//! Method names, parameter and result types come from `lsp_types`; this
//! module only wraps them into request/notification/response envelopes,
//! classifies incoming frames into [`Incoming`] variants (so that a server
//! error payload and a malformed message are told apart in one place), and
//! converts between file paths, URIs and 1-based positions.

use super::ReferenceLocation;
use crate::error::{GocallsError, Result};
use lsp_types::notification::Notification;
use lsp_types::request::Request;
use lsp_types::{Location, Position, Uri};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

/// JSON-RPC protocol version tag.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id (what gocalls sends).
    Number(i64),
    /// String id (allowed for server-initiated requests).
    String(String),
}

/// An outgoing request.
#[derive(Debug, Serialize)]
pub struct RequestMessage {
    jsonrpc: &'static str,
    id: RequestId,
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl RequestMessage {
    /// Build a request for method `R`.
    pub fn new<R: Request>(id: i64, params: R::Params) -> Result<Self> {
        Ok(RequestMessage {
            jsonrpc: JSONRPC_VERSION,
            id: RequestId::Number(id),
            method: R::METHOD,
            params: params_value(params)?,
        })
    }
}

/// An outgoing notification.
#[derive(Debug, Serialize)]
pub struct NotificationMessage {
    jsonrpc: &'static str,
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl NotificationMessage {
    /// Build a notification for method `N`.
    pub fn new<N: Notification>(params: N::Params) -> Result<Self> {
        Ok(NotificationMessage {
            jsonrpc: JSONRPC_VERSION,
            method: N::METHOD,
            params: params_value(params)?,
        })
    }
}

/// An outgoing response to a server-initiated request.
#[derive(Debug, Serialize)]
pub struct ResponseMessage {
    jsonrpc: &'static str,
    id: RequestId,
    result: Value,
}

impl ResponseMessage {
    /// Successful response carrying `result`.
    pub fn new(id: RequestId, result: Value) -> Self {
        ResponseMessage {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// `()` params serialise to `null`, which is left off the wire.
fn params_value<P: Serialize>(params: P) -> Result<Option<Value>> {
    match serde_json::to_value(params)? {
        Value::Null => Ok(None),
        value => Ok(Some(value)),
    }
}

/// Error payload of a failed response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseError {
    /// JSON-RPC error code.
    pub code: i64,
    /// Human readable message.
    pub message: String,
    /// Optional extra data.
    #[serde(default)]
    pub data: Option<Value>,
}

/// A decoded incoming message.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Response to one of our requests.
    Response {
        /// Request id; only absent on error responses to unparseable input.
        id: Option<RequestId>,
        /// Result value or error payload.
        outcome: std::result::Result<Value, ResponseError>,
    },
    /// Request initiated by the server.
    Request {
        /// Server-chosen id.
        id: RequestId,
        /// Method name.
        method: String,
        /// Parameters (`null` when absent).
        params: Value,
    },
    /// Notification from the server.
    Notification {
        /// Method name.
        method: String,
        /// Parameters (`null` when absent).
        params: Value,
    },
}

#[derive(Deserialize)]
struct RawMessage {
    jsonrpc: String,
    #[serde(default)]
    id: Option<RequestId>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ResponseError>,
}

impl Incoming {
    /// Decode and classify one frame body.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let raw: RawMessage = serde_json::from_slice(body)
            .map_err(|e| GocallsError::Protocol(format!("invalid JSON-RPC message: {}", e)))?;
        if raw.jsonrpc != JSONRPC_VERSION {
            return Err(GocallsError::Protocol(format!(
                "unsupported jsonrpc version '{}'",
                raw.jsonrpc
            )));
        }

        let params = raw.params.unwrap_or(Value::Null);
        match (raw.method, raw.id) {
            (Some(method), Some(id)) => Ok(Incoming::Request { id, method, params }),
            (Some(method), None) => Ok(Incoming::Notification { method, params }),
            (None, id) => match raw.error {
                Some(error) => Ok(Incoming::Response {
                    id,
                    outcome: Err(error),
                }),
                None if id.is_some() => Ok(Incoming::Response {
                    id,
                    outcome: Ok(raw.result.unwrap_or(Value::Null)),
                }),
                None => Err(GocallsError::Protocol(
                    "message has neither method nor id".to_string(),
                )),
            },
        }
    }
}

/// Protocol position of a 1-based (line, column); `None` for zero or
/// oversized input.
pub fn position_from_one_based(line: usize, column: usize) -> Option<Position> {
    Some(Position::new(
        u32::try_from(line.checked_sub(1)?).ok()?,
        u32::try_from(column.checked_sub(1)?).ok()?,
    ))
}

/// The 1-based (line, column) of a protocol position.
pub fn position_to_one_based(position: Position) -> (usize, usize) {
    (position.line as usize + 1, position.character as usize + 1)
}

impl TryFrom<Location> for ReferenceLocation {
    type Error = GocallsError;

    /// The only place server positions become 1-based.
    fn try_from(location: Location) -> Result<Self> {
        let file = uri_to_path(&location.uri)?;
        let (start_line, start_column) = position_to_one_based(location.range.start);
        let (end_line, end_column) = position_to_one_based(location.range.end);
        Ok(ReferenceLocation {
            uri: location.uri.as_str().to_string(),
            file,
            start_line,
            start_column,
            end_line,
            end_column,
        })
    }
}

/// `file://` URI for an absolute path.
pub fn path_to_uri(path: &Path) -> Result<Uri> {
    let url = Url::from_file_path(path).map_err(|()| {
        GocallsError::Protocol(format!(
            "cannot express {} as a file URI (path must be absolute)",
            path.display()
        ))
    })?;
    Uri::from_str(url.as_str())
        .map_err(|e| GocallsError::Protocol(format!("invalid URI {}: {}", url, e)))
}

/// Filesystem path of a `file://` URI.
pub fn uri_to_path(uri: &Uri) -> Result<PathBuf> {
    let text = uri.as_str();
    let url = Url::parse(text)
        .map_err(|e| GocallsError::Protocol(format!("invalid URI {}: {}", text, e)))?;
    if url.scheme() != "file" {
        return Err(GocallsError::Protocol(format!("not a file URI: {}", text)));
    }
    url.to_file_path()
        .map_err(|()| GocallsError::Protocol(format!("cannot map {} to a path", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::notification::Initialized;
    use lsp_types::request::{References, Shutdown};
    use lsp_types::{
        InitializedParams, PartialResultParams, ReferenceContext, ReferenceParams,
        TextDocumentIdentifier, TextDocumentPositionParams, WorkDoneProgressParams,
    };
    use serde_json::json;

    #[test]
    fn test_request_serialisation() {
        let params = ReferenceParams {
            text_document_position: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier {
                    uri: path_to_uri(Path::new("/w/a.go")).unwrap(),
                },
                position: position_from_one_based(3, 7).unwrap(),
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
            context: ReferenceContext {
                include_declaration: true,
            },
        };
        let msg = RequestMessage::new::<References>(4, params).unwrap();
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "id": 4,
                "method": "textDocument/references",
                "params": {
                    "textDocument": {"uri": "file:///w/a.go"},
                    "position": {"line": 2, "character": 6},
                    "context": {"includeDeclaration": true}
                }
            })
        );
    }

    #[test]
    fn test_unit_params_are_omitted() {
        let msg = RequestMessage::new::<Shutdown>(9, ()).unwrap();
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"jsonrpc": "2.0", "id": 9, "method": "shutdown"})
        );
        let msg = NotificationMessage::new::<Initialized>(InitializedParams {}).unwrap();
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"jsonrpc": "2.0", "method": "initialized", "params": {}})
        );
    }

    #[test]
    fn test_decode_classifies_messages() {
        let response = Incoming::decode(br#"{"jsonrpc":"2.0","id":2,"result":null}"#).unwrap();
        assert_eq!(
            response,
            Incoming::Response {
                id: Some(RequestId::Number(2)),
                outcome: Ok(Value::Null)
            }
        );

        let notification =
            Incoming::decode(br#"{"jsonrpc":"2.0","method":"window/logMessage","params":{"type":3}}"#)
                .unwrap();
        assert!(matches!(notification, Incoming::Notification { ref method, .. } if method == "window/logMessage"));

        let request = Incoming::decode(
            br#"{"jsonrpc":"2.0","id":"a1","method":"workspace/configuration","params":{"items":[{}]}}"#,
        )
        .unwrap();
        assert!(matches!(request, Incoming::Request { id: RequestId::String(_), .. }));

        let error = Incoming::decode(
            br#"{"jsonrpc":"2.0","id":3,"error":{"code":-32602,"message":"no package for file"}}"#,
        )
        .unwrap();
        match error {
            Incoming::Response { outcome: Err(e), .. } => {
                assert_eq!(e.code, -32602);
                assert_eq!(e.message, "no package for file");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_malformed_messages() {
        let bodies: [&[u8]; 4] = [
            br#"not json"#,
            br#"{"jsonrpc":"1.0","id":1,"result":null}"#,
            br#"{"jsonrpc":"2.0","result":null}"#,
            br#"{"id":1,"result":null}"#,
        ];
        for body in bodies {
            assert!(
                matches!(Incoming::decode(body), Err(GocallsError::Protocol(_))),
                "accepted {}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_location_converts_to_one_based_once() {
        let location: Location = serde_json::from_value(json!({
            "uri": "file:///w/pkg/a%20b.go",
            "range": {
                "start": {"line": 9, "character": 1},
                "end": {"line": 9, "character": 4}
            }
        }))
        .unwrap();
        let reference = ReferenceLocation::try_from(location).unwrap();
        assert_eq!(reference.file, PathBuf::from("/w/pkg/a b.go"));
        assert_eq!((reference.start_line, reference.start_column), (10, 2));
        assert_eq!((reference.end_line, reference.end_column), (10, 5));
    }

    #[test]
    fn test_position_round_trip() {
        for (line, column) in [(1, 1), (10, 3), (4000, 120)] {
            let p = position_from_one_based(line, column).unwrap();
            assert_eq!(position_to_one_based(p), (line, column));
        }
        assert!(position_from_one_based(0, 1).is_none());
        assert!(position_from_one_based(1, 0).is_none());
    }

    #[test]
    fn test_uris() {
        assert_eq!(
            path_to_uri(Path::new("/home/dev/proj/main.go")).unwrap().as_str(),
            "file:///home/dev/proj/main.go"
        );
        assert!(path_to_uri(Path::new("relative/main.go")).is_err());

        let remote = Uri::from_str("https://example.com/a.go").unwrap();
        assert!(uri_to_path(&remote).is_err());

        let local = Uri::from_str("file:///home/dev/proj/main.go").unwrap();
        assert_eq!(
            uri_to_path(&local).unwrap(),
            PathBuf::from("/home/dev/proj/main.go")
        );
    }
}

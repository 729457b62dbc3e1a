//! In-process MCP server stub for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

pub const GOOD_TOKEN: &str = "good-token";
pub const SESSION_ID: &str = "stub-session-1";

/// How the stub answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubMode {
    /// Plain JSON replies
    Json,
    /// Replies wrapped in a single SSE event
    EventStream,
    /// HTTP 401 for every request without the good token
    RejectAtHttp,
    /// tools/call answers HTTP 500
    ServerError,
    /// tools/call answers 200 with a non-JSON body
    Malformed,
}

#[derive(Default)]
struct Recorded {
    deleted_sessions: Vec<String>,
    tool_calls: Vec<Value>,
}

#[derive(Clone)]
struct StubState {
    mode: StubMode,
    recorded: Arc<Mutex<Recorded>>,
}

pub struct McpStub {
    addr: SocketAddr,
    recorded: Arc<Mutex<Recorded>>,
    task: JoinHandle<()>,
}

impl McpStub {
    pub async fn start(mode: StubMode) -> Self {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let state = StubState {
            mode,
            recorded: Arc::clone(&recorded),
        };
        let app = Router::new()
            .route("/mcp", post(handle_rpc).delete(handle_delete))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, recorded, task }
    }

    pub fn url(&self) -> String {
        format!("http://{}/mcp", self.addr)
    }

    pub fn deleted_sessions(&self) -> Vec<String> {
        self.recorded.lock().unwrap().deleted_sessions.clone()
    }

    pub fn tool_calls(&self) -> Vec<Value> {
        self.recorded.lock().unwrap().tool_calls.clone()
    }
}

impl Drop for McpStub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(&format!("Bearer {}", GOOD_TOKEN)[..])
}

async fn handle_delete(State(state): State<StubState>, headers: HeaderMap) -> StatusCode {
    if let Some(id) = headers.get("mcp-session-id").and_then(|v| v.to_str().ok()) {
        state.recorded.lock().unwrap().deleted_sessions.push(id.to_string());
    }
    StatusCode::NO_CONTENT
}

async fn handle_rpc(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let id = request["id"].clone();

    if state.mode == StubMode::RejectAtHttp && !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "invalid bearer token").into_response();
    }

    let result = match method.as_str() {
        "initialize" => json!({
            "protocolVersion": "2025-03-26",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "kubectl-mtv", "version": "0.0.0-stub"},
        }),
        "notifications/initialized" => return StatusCode::ACCEPTED.into_response(),
        "tools/list" => json!({
            "tools": [
                {"name": "mtv_read", "description": "read"},
                {"name": "mtv_write", "description": "write"},
                {"name": "mtv_help", "description": "help"},
            ]
        }),
        "tools/call" => {
            state.recorded.lock().unwrap().tool_calls.push(request["params"].clone());
            match state.mode {
                StubMode::ServerError => {
                    return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
                }
                StubMode::Malformed => {
                    return ([(header::CONTENT_TYPE, "application/json")], "<html>oops</html>")
                        .into_response()
                }
                _ => {}
            }
            if !authorized(&headers) {
                text_result(
                    "error: You must be logged in to the server (Unauthorized)",
                    true,
                )
            } else {
                match tool_call(&request["params"]) {
                    Ok(structured) => json!({
                        "content": [{"type": "text", "text": structured.to_string()}],
                        "structuredContent": structured,
                    }),
                    Err(message) => {
                        let reply = json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "error": {"code": -32602, "message": message},
                        });
                        return reply_response(state.mode, reply);
                    }
                }
            }
        }
        other => {
            let reply = json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": format!("method not found: {other}")},
            });
            return reply_response(state.mode, reply);
        }
    };

    reply_response(state.mode, json!({"jsonrpc": "2.0", "id": id, "result": result}))
}

fn text_result(text: &str, is_error: bool) -> Value {
    json!({"content": [{"type": "text", "text": text}], "isError": is_error})
}

fn reply_response(mode: StubMode, reply: Value) -> Response {
    let session = [("mcp-session-id", SESSION_ID)];
    if mode == StubMode::EventStream {
        let body = format!("event: message\ndata: {}\n\n", reply);
        (session, [(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
    } else {
        (session, Json(reply)).into_response()
    }
}

/// Answers for the handful of commands the tests use
fn tool_call(params: &Value) -> Result<Value, String> {
    let tool = params["name"].as_str().unwrap_or_default();
    let command = params["arguments"]["command"].as_str().unwrap_or_default();
    let flags = &params["arguments"]["flags"];
    let name = flags["name"].as_str();

    let provider = |n: &str| json!({"metadata": {"name": n}, "spec": {"type": "openshift"}});

    match (tool, command) {
        ("mtv_read", "get provider") => Ok(match name {
            Some("missing") => json!({
                "return_value": 1,
                "output": "",
                "error": "providers.forklift.konveyor.io \"missing\" not found",
            }),
            Some(n) => json!({"return_value": 0, "output": "", "data": provider(n)}),
            None => json!({
                "return_value": 0,
                "output": "",
                "data": {"kind": "ProviderList", "items": [provider("host"), provider("vsphere")]},
            }),
        }),
        ("mtv_read", "get plan") => Ok(json!({
            "return_value": 0,
            "output": "",
            "data": [{"metadata": {"name": "p1"}}],
        })),
        ("mtv_read", "health") => Ok(json!({"return_value": 0, "output": "healthy"})),
        ("mtv_write", "create provider") if name == Some("host") => Ok(json!({
            "return_value": 1,
            "output": "",
            "error": "provider 'host' already exists",
        })),
        ("mtv_write", "create provider") | ("mtv_write", "create plan") => Ok(json!({
            "return_value": 0,
            "output": format!("{} created", name.unwrap_or("resource")),
        })),
        ("mtv_help", _) => Ok(json!({"return_value": 0, "output": "Flags:\n  --source string"})),
        _ => Err(format!("unsupported command {tool} {command}")),
    }
}

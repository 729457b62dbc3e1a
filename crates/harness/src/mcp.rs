//! MCP tool-invocation client
//!
//! Speaks JSON-RPC 2.0 over streamable HTTP to the kubectl-mtv MCP server:
//! `initialize` opens a session (the server answers with an `Mcp-Session-Id` header),
//! `tools/call` runs a command, and an HTTP `DELETE` releases the session. Replies may
//! come back as plain JSON or as a single-event `text/event-stream` body.
//!
//! Failures are typed: unreachable server or malformed payloads are
//! [`HarnessError::Transport`], rejected credentials are
//! [`HarnessError::Authentication`], and a tool that ran but reported an error is
//! [`HarnessError::ToolError`]. A nonzero `return_value` is a successful call whose
//! result the caller must inspect.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ErrorCategory, HarnessError, HarnessResult};
use crate::flags::ToolCommand;
use crate::poller::{self, Probe};

/// Read-only kubectl-mtv commands
pub const MTV_READ: &str = "mtv_read";
/// Mutating kubectl-mtv commands
pub const MTV_WRITE: &str = "mtv_write";
/// Command help
pub const MTV_HELP: &str = "mtv_help";

const PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "mcp-session-id";
const ACCEPT_BOTH: &str = "application/json, text/event-stream";
const REDACTED_KEYS: &[&str] = &["password", "token"];

/// One recorded JSON-RPC exchange
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub sequence: u64,
    pub method: String,
    pub request: Value,
    pub response: Value,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize, Serialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn is_reply(&self) -> bool {
        self.result.is_some() || self.error.is_some()
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallToolResult {
    #[serde(default)]
    content: Vec<ContentItem>,
    #[serde(default)]
    structured_content: Option<Value>,
    #[serde(default)]
    is_error: bool,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToolListResult {
    tools: Vec<ToolInfo>,
}

/// A tool advertised by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

/// Server identity reported during `initialize`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Structured payload of a tool call that completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireToolResult")]
pub struct ToolResult {
    /// Exit status of the underlying command; zero is the only success signal
    pub return_value: i64,

    /// Human-readable output
    pub output: String,

    /// Structured output: a single object, a list, or absent
    pub data: Option<Value>,

    /// Structured error detail, when the command provided one
    #[serde(rename = "error")]
    pub error_detail: Option<Value>,
}

/// Tool result as sent; servers may use `stdout`/`stderr`, the newer names, or both
#[derive(Deserialize)]
struct WireToolResult {
    return_value: i64,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    stderr: Option<Value>,
}

impl From<WireToolResult> for ToolResult {
    fn from(wire: WireToolResult) -> Self {
        Self {
            return_value: wire.return_value,
            output: wire.output.or(wire.stdout).unwrap_or_default(),
            data: wire.data,
            error_detail: wire.error.or(wire.stderr),
        }
    }
}

impl ToolResult {
    pub fn succeeded(&self) -> bool {
        self.return_value == 0
    }

    /// `data` as a list, whatever shape the server sent.
    ///
    /// Absent or null is empty, a list is itself, a Kubernetes `*List` object yields its
    /// `items`, any other object is a one-element list, and a string holding JSON is
    /// decoded first.
    pub fn items(&self) -> Vec<Value> {
        match &self.data {
            Some(value) => normalize_items(value),
            None => Vec::new(),
        }
    }

    /// Decode `data` into a typed value
    pub fn data_as<T: DeserializeOwned>(&self) -> HarnessResult<T> {
        let data = self.data.clone().unwrap_or(Value::Null);
        Ok(serde_json::from_value(data)?)
    }

    /// Whether any item in `data` is named `name`
    pub fn contains_name(&self, name: &str) -> bool {
        self.items().iter().any(|item| item_name(item) == Some(name))
    }

    /// Output and error detail, for diagnostics and classification
    pub fn diagnostics(&self) -> String {
        match &self.error_detail {
            Some(Value::String(detail)) if !detail.is_empty() => {
                format!("{}\n{}", self.output, detail)
            }
            Some(Value::Null) | None => self.output.clone(),
            Some(detail) => format!("{}\n{}", self.output, detail),
        }
    }

    /// Expected-error category of a failed call
    pub fn category(&self) -> Option<ErrorCategory> {
        if self.succeeded() {
            None
        } else {
            Some(ErrorCategory::classify(&self.diagnostics()))
        }
    }

    /// Turn a nonzero return value into [`HarnessError::ToolError`]
    pub fn into_success(self, tool: &str) -> HarnessResult<Self> {
        if self.succeeded() {
            Ok(self)
        } else {
            Err(HarnessError::ToolError {
                tool: tool.to_string(),
                message: format!(
                    "return_value {}: {}",
                    self.return_value,
                    self.diagnostics().trim()
                ),
            })
        }
    }
}

/// Resource name of a Kubernetes-style or flat JSON object
pub fn item_name(item: &Value) -> Option<&str> {
    item.pointer("/metadata/name")
        .or_else(|| item.get("name"))
        .and_then(Value::as_str)
}

/// Flatten a JSON payload into a list of items, as [`ToolResult::items`] does
pub fn normalize_items(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get("items") {
            Some(Value::Array(items)) if map.contains_key("kind") || map.len() == 1 => {
                items.clone()
            }
            _ => vec![value.clone()],
        },
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(decoded @ (Value::Array(_) | Value::Object(_))) => normalize_items(&decoded),
            _ if text.trim().is_empty() => Vec::new(),
            _ => vec![value.clone()],
        },
        other => vec![other.clone()],
    }
}

/// Headers sent with every request of a session
#[derive(Clone, Default)]
pub struct SessionHeaders {
    bearer_token: Option<String>,
    extra: Vec<(String, String)>,
}

impl SessionHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `Authorization: Bearer <token>`
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    pub fn has_bearer(&self) -> bool {
        self.bearer_token.is_some()
    }

    fn to_header_map(&self) -> HarnessResult<HeaderMap> {
        let mut map = HeaderMap::new();
        if let Some(token) = &self.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| HarnessError::Config("bearer token is not a valid header value".to_string()))?;
            map.insert(AUTHORIZATION, value);
        }
        for (name, value) in &self.extra {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HarnessError::Config(format!("invalid header name '{}'", name)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| HarnessError::Config(format!("invalid value for header '{}'", name)))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

impl std::fmt::Debug for SessionHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHeaders")
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("extra", &self.extra.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish()
    }
}

/// HTTP client for one MCP endpoint, shared by every session opened from it
#[derive(Clone)]
pub struct McpClient {
    endpoint: String,
    http: Client,
    next_id: Arc<AtomicU64>,
    transcript: Arc<Mutex<Vec<TranscriptEntry>>>,
}

impl McpClient {
    /// Create a client with a per-request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> HarnessResult<Self> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| HarnessError::Transport {
            status: None,
            body: format!("failed to build http client: {}", e),
        })?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
            next_id: Arc::new(AtomicU64::new(1)),
            transcript: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Snapshot of every exchange so far, across all sessions
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.transcript.lock().clone()
    }

    /// Write the transcript as pretty JSON
    pub fn write_transcript(&self, path: &Path) -> HarnessResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.transcript())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Run the `initialize` handshake and return a live session
    pub async fn open_session(&self, headers: SessionHeaders) -> HarnessResult<McpSession> {
        let header_map = headers.to_header_map()?;
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "mtv-e2e",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });

        let (session_id, reply) = self
            .exchange(&header_map, None, "initialize", Some(params), true)
            .await?;
        let result = reply_result("initialize", reply)?;
        let server: Option<ServerInfo> = result
            .get("serverInfo")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok());

        self.exchange(&header_map, session_id.as_deref(), "notifications/initialized", None, false)
            .await?;

        info!(
            "MCP session open at {} (session: {}, server: {})",
            self.endpoint,
            session_id.as_deref().unwrap_or("stateless"),
            server.as_ref().map(|s| s.name.as_str()).unwrap_or("unknown")
        );

        Ok(McpSession {
            client: self.clone(),
            headers: header_map,
            session_id,
            server,
        })
    }

    /// Open a session, run `f` with it, and close it on every exit path
    pub async fn with_session<T, F>(&self, headers: SessionHeaders, f: F) -> HarnessResult<T>
    where
        F: for<'s> FnOnce(&'s McpSession) -> BoxFuture<'s, HarnessResult<T>>,
    {
        let session = self.open_session(headers).await?;
        let result = AssertUnwindSafe(f(&session)).catch_unwind().await;
        session.close().await;
        match result {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Poll until a session opens and answers `tools/list`, tolerating transport
    /// failures meanwhile
    pub async fn wait_ready(
        &self,
        headers: SessionHeaders,
        timeout: Duration,
        interval: Duration,
    ) -> HarnessResult<McpSession> {
        let condition = format!("MCP server at {} to list tools", self.endpoint);
        let headers = &headers;
        let satisfied = poller::wait_for(&condition, timeout, interval, || async move {
            let session = match self.open_session(headers.clone()).await {
                Ok(session) => session,
                Err(e @ HarnessError::Transport { .. }) => return Ok(Probe::pending(e.to_string())),
                Err(e) => return Err(e),
            };
            match session.list_tools().await {
                Ok(_) => Ok(Probe::Ready(session)),
                Err(e @ HarnessError::Transport { .. }) => {
                    session.close().await;
                    Ok(Probe::pending(e.to_string()))
                }
                Err(e) => Err(e),
            }
        })
        .await?;
        Ok(satisfied.value)
    }

    async fn exchange(
        &self,
        headers: &HeaderMap,
        session_id: Option<&str>,
        method: &str,
        params: Option<Value>,
        expect_reply: bool,
    ) -> HarnessResult<(Option<String>, Option<JsonRpcResponse>)> {
        let id = expect_reply.then(|| self.next_id.fetch_add(1, Ordering::SeqCst));
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let request_value = serde_json::to_value(&request)?;

        let mut http = self
            .http
            .post(&self.endpoint)
            .headers(headers.clone())
            .header(ACCEPT, ACCEPT_BOTH)
            .json(&request_value);
        if let Some(session_id) = session_id {
            http = http.header(SESSION_HEADER, session_id);
        }

        debug!("MCP -> {} (id {:?})", method, id);
        let response = match http.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = HarnessError::Transport {
                    status: None,
                    body: format!("{} request failed: {}", method, e),
                };
                self.record(method, &request_value, Value::Null, Some(err.to_string()));
                return Err(err);
            }
        };

        let status = response.status();
        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .or_else(|| session_id.map(String::from));
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            let err = HarnessError::Authentication(format!(
                "{} rejected with HTTP {}: {}",
                method,
                status.as_u16(),
                body.trim()
            ));
            self.record(method, &request_value, Value::String(body), Some(err.to_string()));
            return Err(err);
        }

        let body = response.text().await.map_err(|e| HarnessError::Transport {
            status: Some(status.as_u16()),
            body: format!("failed to read {} response: {}", method, e),
        })?;

        if !status.is_success() {
            let err = HarnessError::Transport {
                status: Some(status.as_u16()),
                body: body.clone(),
            };
            self.record(method, &request_value, Value::String(body), Some(err.to_string()));
            return Err(err);
        }

        if !expect_reply {
            self.record(method, &request_value, Value::Null, None);
            return Ok((session, None));
        }

        let Some(reply) = parse_reply(&content_type, &body, id) else {
            let err = HarnessError::Transport {
                status: Some(status.as_u16()),
                body: body.clone(),
            };
            self.record(method, &request_value, Value::String(body), Some("malformed reply".to_string()));
            return Err(err);
        };

        let error = reply.error.as_ref().map(|e| e.message.clone());
        self.record(
            method,
            &request_value,
            serde_json::to_value(&reply).unwrap_or(Value::Null),
            error,
        );
        Ok((session, Some(reply)))
    }

    fn record(&self, method: &str, request: &Value, mut response: Value, error: Option<String>) {
        let mut request = request.clone();
        redact(&mut request);
        redact(&mut response);
        let mut transcript = self.transcript.lock();
        let sequence = transcript.len() as u64 + 1;
        transcript.push(TranscriptEntry {
            sequence,
            method: method.to_string(),
            request,
            response,
            error,
        });
    }
}

/// A live MCP session.
///
/// Headers are fixed at open time; callers needing other credentials open another
/// session. Dropping an unclosed session releases it in the background.
pub struct McpSession {
    client: McpClient,
    headers: HeaderMap,
    session_id: Option<String>,
    server: Option<ServerInfo>,
}

impl McpSession {
    /// Server-assigned session id (None for stateless servers)
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn server(&self) -> Option<&ServerInfo> {
        self.server.as_ref()
    }

    /// Invoke `tool` with a command and its flags.
    ///
    /// A completed call returns `Ok` even when `return_value` is nonzero, except when
    /// the command failed on credentials: that is always [`HarnessError::Authentication`].
    pub async fn call_tool(
        &self,
        tool: &str,
        command: &ToolCommand,
        verbosity: u8,
    ) -> HarnessResult<ToolResult> {
        let mut arguments = json!({
            "command": command.command(),
            "flags": command.wire_flags(),
        });
        if verbosity > 0 {
            arguments["verbose"] = json!(verbosity);
        }
        let params = json!({ "name": tool, "arguments": arguments });

        let (_, reply) = self
            .client
            .exchange(&self.headers, self.session_id.as_deref(), "tools/call", Some(params), true)
            .await?;
        let result = reply_result(tool, reply)?;
        let result = decode_tool_result(tool, result)?;

        if result.category() == Some(ErrorCategory::Unauthorized) {
            return Err(HarnessError::Authentication(format!(
                "{} `{}`: {}",
                tool,
                command.command(),
                result.diagnostics().trim()
            )));
        }

        debug!(
            "{} `{}` -> return_value {}",
            tool,
            command.command(),
            result.return_value
        );
        Ok(result)
    }

    /// List the tools the server advertises
    pub async fn list_tools(&self) -> HarnessResult<Vec<ToolInfo>> {
        let (_, reply) = self
            .client
            .exchange(&self.headers, self.session_id.as_deref(), "tools/list", None, true)
            .await?;
        let result = reply_result("tools/list", reply)?;
        let parsed: ToolListResult = serde_json::from_value(result.clone()).map_err(|e| {
            HarnessError::Transport {
                status: None,
                body: format!("invalid tools/list payload ({}): {}", e, result),
            }
        })?;
        Ok(parsed.tools)
    }

    /// Release the session on the server
    pub async fn close(mut self) {
        let Some(session_id) = self.session_id.take() else {
            return;
        };
        let response = self
            .client
            .http
            .delete(&self.client.endpoint)
            .headers(self.headers.clone())
            .header(SESSION_HEADER, &session_id)
            .send()
            .await;
        match response {
            Ok(r) if r.status().is_success() || r.status() == StatusCode::METHOD_NOT_ALLOWED => {
                debug!("MCP session {} closed", session_id);
            }
            Ok(r) => warn!("Closing MCP session {} returned {}", session_id, r.status()),
            Err(e) => warn!("Closing MCP session {} failed: {}", session_id, e),
        }
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        let Some(session_id) = self.session_id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let request = self
                    .client
                    .http
                    .delete(&self.client.endpoint)
                    .headers(self.headers.clone())
                    .header(SESSION_HEADER, session_id);
                handle.spawn(async move {
                    let _ = request.send().await;
                });
            }
            Err(_) => warn!(
                "MCP session {} dropped outside a runtime; leaving it to expire",
                session_id
            ),
        }
    }
}

impl std::fmt::Debug for McpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpSession")
            .field("endpoint", &self.client.endpoint)
            .field("session_id", &self.session_id)
            .field("server", &self.server)
            .finish()
    }
}

/// Result of a reply, or the typed failure it carries
fn reply_result(target: &str, reply: Option<JsonRpcResponse>) -> HarnessResult<Value> {
    let reply = reply.ok_or_else(|| HarnessError::Transport {
        status: None,
        body: format!("no reply to {}", target),
    })?;
    if let Some(error) = reply.error {
        let mut message = error.message;
        if let Some(Value::String(detail)) = error.data {
            message = format!("{}: {}", message, detail);
        }
        return Err(tool_failure(target, message));
    }
    reply.result.ok_or_else(|| HarnessError::Transport {
        status: None,
        body: format!("reply to {} has neither result nor error", target),
    })
}

fn tool_failure(tool: &str, message: String) -> HarnessError {
    if ErrorCategory::classify(&message) == ErrorCategory::Unauthorized {
        HarnessError::Authentication(message)
    } else {
        HarnessError::ToolError {
            tool: tool.to_string(),
            message,
        }
    }
}

fn decode_tool_result(tool: &str, result: Value) -> HarnessResult<ToolResult> {
    let parsed: CallToolResult = serde_json::from_value(result.clone()).map_err(|e| {
        HarnessError::Transport {
            status: None,
            body: format!("invalid tools/call payload for {} ({}): {}", tool, e, result),
        }
    })?;

    let text = parsed
        .content
        .iter()
        .filter(|c| c.kind == "text")
        .filter_map(|c| c.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n");

    if parsed.is_error {
        let message = if text.trim().is_empty() {
            parsed
                .structured_content
                .as_ref()
                .map(Value::to_string)
                .unwrap_or_else(|| "tool reported an error without a message".to_string())
        } else {
            text
        };
        return Err(tool_failure(tool, message));
    }

    let structured = match parsed.structured_content {
        Some(value) => value,
        None => serde_json::from_str::<Value>(&text).map_err(|_| HarnessError::Transport {
            status: None,
            body: format!("{} returned no structured content: {}", tool, text),
        })?,
    };

    serde_json::from_value(structured.clone()).map_err(|e| HarnessError::Transport {
        status: None,
        body: format!("{} returned an unexpected result shape ({}): {}", tool, e, structured),
    })
}

/// Pick the JSON-RPC reply to request `id` out of a JSON or SSE body.
///
/// A reply to some other request is not an answer. An error reply with a null id
/// (the server could not read the request) still counts.
fn parse_reply(content_type: &str, body: &str, id: Option<u64>) -> Option<JsonRpcResponse> {
    let wanted = id.map(|id| json!(id));
    let answers = |reply: &JsonRpcResponse| {
        reply.is_reply()
            && (wanted.is_none()
                || reply.id == wanted
                || (reply.id.is_none() && reply.error.is_some()))
    };

    if content_type.starts_with("text/event-stream") {
        sse_messages(body)
            .iter()
            .filter_map(|data| serde_json::from_str::<JsonRpcResponse>(data).ok())
            .filter(|reply| answers(reply))
            .last()
    } else {
        serde_json::from_str::<JsonRpcResponse>(body)
            .ok()
            .filter(|reply| answers(reply))
    }
}

/// `data:` payloads of each event in an SSE body
fn sse_messages(body: &str) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in body.lines() {
        if line.is_empty() {
            if !current.is_empty() {
                messages.push(current.join("\n"));
                current.clear();
            }
            continue;
        }
        if let Some(data) = line.strip_prefix("data:") {
            current.push(data.strip_prefix(' ').unwrap_or(data));
        }
    }
    if !current.is_empty() {
        messages.push(current.join("\n"));
    }
    messages
}

fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map.iter_mut() {
                if REDACTED_KEYS.contains(&key.as_str()) && inner.is_string() {
                    *inner = Value::String("<redacted>".to_string());
                } else {
                    redact(inner);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

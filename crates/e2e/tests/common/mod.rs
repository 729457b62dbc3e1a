//! Stateful in-process kubectl-mtv tool server for scenario tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use mtv_harness::ledger::{DeleteStatus, TrackedResource};
use mtv_harness::{HarnessConfig, HarnessResult, ResourceDeleter, SessionContext};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

pub const GOOD_TOKEN: &str = "good-token";
pub const NAMESPACE: &str = "mtv-e2e-test";
pub const HOST_IP: &str = "10.0.0.9";

#[derive(Default)]
struct Cluster {
    providers: Vec<String>,
    plans: Vec<String>,
    hosts: Vec<String>,
    /// Created plans are left out of unnamed listings
    hide_plans: bool,
    calls: Vec<String>,
}

pub struct ToolServer {
    addr: SocketAddr,
    cluster: Arc<Mutex<Cluster>>,
    task: JoinHandle<()>,
}

impl ToolServer {
    pub async fn start() -> Self {
        let cluster = Arc::new(Mutex::new(Cluster::default()));
        let app = Router::new()
            .route("/mcp", post(handle_rpc).delete(|| async { StatusCode::NO_CONTENT }))
            .with_state(Arc::clone(&cluster));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, cluster, task }
    }

    pub fn url(&self) -> String {
        format!("http://{}/mcp", self.addr)
    }

    /// A provider that exists before the run starts
    pub fn seed_provider(&self, name: &str) {
        self.cluster.lock().unwrap().providers.push(name.to_string());
    }

    pub fn hide_plans(&self) {
        self.cluster.lock().unwrap().hide_plans = true;
    }

    pub fn providers(&self) -> Vec<String> {
        self.cluster.lock().unwrap().providers.clone()
    }

    pub fn plans(&self) -> Vec<String> {
        self.cluster.lock().unwrap().plans.clone()
    }

    pub fn hosts(&self) -> Vec<String> {
        self.cluster.lock().unwrap().hosts.clone()
    }

    /// `tool command` of every call, in order
    pub fn calls(&self) -> Vec<String> {
        self.cluster.lock().unwrap().calls.clone()
    }
}

impl Drop for ToolServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Records what teardown deletes instead of calling kubectl
#[derive(Default)]
pub struct RecordingDeleter {
    deleted: Mutex<Vec<String>>,
}

impl RecordingDeleter {
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceDeleter for RecordingDeleter {
    async fn delete(&self, resource: &TrackedResource) -> HarnessResult<DeleteStatus> {
        self.deleted
            .lock()
            .unwrap()
            .push(format!("{}/{}", resource.kind, resource.name));
        Ok(DeleteStatus::Deleted)
    }
}

/// Context pointed at `server` with vSphere and host credentials and a ready namespace
pub fn context(server: &ToolServer, deleter: Arc<RecordingDeleter>) -> SessionContext {
    let config: HarnessConfig = toml::from_str(&format!(
        r#"
        [cluster]
        namespace = "{NAMESPACE}"
        token = "{GOOD_TOKEN}"

        [mcp]
        url = "{url}"

        [providers.vsphere]
        url = "https://vcenter.example/sdk"
        username = "administrator@vsphere.local"
        password = "secret"
        insecure_skip_tls = true

        [providers.esxi_host]
        ip_address = "{HOST_IP}"
        username = "root"
        password = "secret"

        [timeouts]
        resource_ready_secs = 2
        poll_interval_ms = 20
        "#,
        url = server.url(),
    ))
    .unwrap();
    let mut ctx = SessionContext::new(config).with_deleter(deleter);
    ctx.mark_namespace_ready();
    ctx
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(&format!("Bearer {}", GOOD_TOKEN)[..])
}

async fn handle_rpc(
    State(cluster): State<Arc<Mutex<Cluster>>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    let id = request["id"].clone();
    let result = match request["method"].as_str().unwrap_or_default() {
        "initialize" => json!({
            "protocolVersion": "2025-03-26",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "kubectl-mtv", "version": "0.0.0-test"},
        }),
        "notifications/initialized" => return StatusCode::ACCEPTED.into_response(),
        "tools/list" => json!({
            "tools": [{"name": "mtv_read"}, {"name": "mtv_write"}, {"name": "mtv_help"}]
        }),
        "tools/call" if !authorized(&headers) => json!({
            "content": [{"type": "text", "text": "error: You must be logged in to the server (Unauthorized)"}],
            "isError": true,
        }),
        "tools/call" => {
            let structured = call(&mut cluster.lock().unwrap(), &request["params"]);
            json!({"content": [{"type": "text", "text": structured.to_string()}], "structuredContent": structured})
        }
        other => {
            let reply = json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": format!("method not found: {other}")},
            });
            return Json(reply).into_response();
        }
    };
    ([("mcp-session-id", "scenario-session")], Json(json!({"jsonrpc": "2.0", "id": id, "result": result})))
        .into_response()
}

fn ok(data: Value) -> Value {
    json!({"return_value": 0, "output": "", "data": data})
}

fn fail(error: String) -> Value {
    json!({"return_value": 1, "output": "", "error": error})
}

fn object(name: &str) -> Value {
    json!({"metadata": {"name": name}, "status": {"conditions": [{"type": "Ready", "status": "True"}]}})
}

fn call(cluster: &mut Cluster, params: &Value) -> Value {
    let tool = params["name"].as_str().unwrap_or_default();
    let command = params["arguments"]["command"].as_str().unwrap_or_default();
    let flags = &params["arguments"]["flags"];
    let name = flags["name"].as_str().map(String::from);
    cluster.calls.push(format!("{tool} {command}"));

    match (tool, command, name) {
        ("mtv_write", "create provider", Some(n)) => {
            if cluster.providers.contains(&n) {
                fail(format!("provider '{n}' already exists"))
            } else {
                cluster.providers.push(n);
                ok(Value::Null)
            }
        }
        ("mtv_read", "get provider", Some(n)) => match cluster.providers.contains(&n) {
            true => ok(object(&n)),
            false => fail(format!("providers.forklift.konveyor.io \"{n}\" not found")),
        },
        ("mtv_read", "get provider", None) => ok(json!({
            "kind": "ProviderList",
            "items": cluster.providers.iter().map(|p| object(p)).collect::<Vec<_>>(),
        })),
        ("mtv_write", "delete provider", Some(n)) => match cluster.providers.iter().position(|p| *p == n) {
            Some(i) => {
                cluster.providers.remove(i);
                ok(Value::Null)
            }
            None => fail(format!("providers.forklift.konveyor.io \"{n}\" not found")),
        },
        ("mtv_read", "get inventory vm", _) => ok(json!([{"id": "vm-42", "name": "rhel9-small"}])),
        ("mtv_read", "get inventory network", _) => ok(json!([{"id": "net-1", "name": "VM Network"}])),
        ("mtv_read", "get inventory host", _) => ok(json!([
            {"id": "host-7", "name": "10.0.0.7"},
            {"id": "host-9", "name": HOST_IP},
        ])),
        ("mtv_write", "create host", Some(n)) => {
            cluster.hosts.push(n);
            ok(Value::Null)
        }
        ("mtv_write", "create plan", Some(n)) => {
            cluster.plans.push(n);
            ok(Value::Null)
        }
        ("mtv_read", "get plan", Some(n)) if cluster.plans.contains(&n) => ok(object(&n)),
        ("mtv_read", "get plan", None) if !cluster.hide_plans => {
            ok(json!(cluster.plans.iter().map(|p| object(p)).collect::<Vec<_>>()))
        }
        ("mtv_read", "get plan", None) => ok(json!([])),
        ("mtv_write", "delete plan", Some(n)) => {
            cluster.plans.retain(|p| *p != n);
            ok(Value::Null)
        }
        ("mtv_read", "get mapping network", _) => {
            let mut maps: Vec<Value> = cluster
                .plans
                .iter()
                .map(|p| json!({"metadata": {"name": format!("{p}-abc12")}}))
                .collect();
            maps.push(json!({"metadata": {"name": "shared-network-map"}}));
            ok(json!(maps))
        }
        ("mtv_read", "health", _) => json!({"return_value": 0, "output": "All checks passed"}),
        ("mtv_help", _, _) => json!({"return_value": 0, "output": "Usage: create plan\n  --source string"}),
        _ => fail(format!("unsupported command {tool} {command}")),
    }
}

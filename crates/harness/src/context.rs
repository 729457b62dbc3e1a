//! Per-run session context
//!
//! One [`SessionContext`] lives for the whole run and is handed to each scenario in
//! turn as `&mut`. It owns the shared MCP session, the resolved CLI arguments, the
//! resource ledger and a write-once channel for values scenarios pass forward.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cli::{binary_available, CliRunner};
use crate::cluster::Cluster;
use crate::config::HarnessConfig;
use crate::error::{ErrorKind, HarnessError, HarnessResult};
use crate::executor::{CommandExecutor, CommandOutput};
use crate::flags::ToolCommand;
use crate::ledger::{DeletionOrder, Release, ResourceDeleter, ResourceLedger};
use crate::mcp::{McpClient, McpSession, SessionHeaders, ToolResult, TranscriptEntry};

/// A published value's key and the scenario expected to publish it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharedKey {
    pub name: &'static str,
    pub producer: &'static str,
}

impl SharedKey {
    pub const fn new(name: &'static str, producer: &'static str) -> Self {
        Self { name, producer }
    }
}

/// Source provider families a scenario may need credentials for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// The cluster the run targets; needs no extra credentials
    Openshift,
    Vsphere,
}

/// Something a scenario needs before it can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fixture {
    /// kubectl-mtv binary resolvable
    Cli,
    /// MCP server configured
    ToolSession,
    /// Run namespace created and usable
    Namespace,
    ProviderCredentials(ProviderKind),
    HostCredentials,
}

#[derive(Debug)]
struct Published {
    value: Value,
    publisher: String,
}

/// Shared state for one run
pub struct SessionContext {
    config: HarnessConfig,
    executor: CommandExecutor,
    cluster: Cluster,
    deleter: Arc<dyn ResourceDeleter>,
    cli: Option<CliRunner>,
    mcp: Option<McpClient>,
    session: Option<McpSession>,
    values: HashMap<&'static str, Published>,
    ledger: ResourceLedger,
    namespace_ready: bool,
    current_scenario: Option<String>,
}

impl SessionContext {
    pub fn new(config: HarnessConfig) -> Self {
        let executor = CommandExecutor::new(config.timeouts.command());
        let cluster = Cluster::new(&config, executor.clone());
        Self {
            deleter: Arc::new(cluster.clone()),
            config,
            executor,
            cluster,
            cli: None,
            mcp: None,
            session: None,
            values: HashMap::new(),
            ledger: ResourceLedger::new(),
            namespace_ready: false,
            current_scenario: None,
        }
    }

    /// Release tracked resources through `deleter` instead of kubectl
    pub fn with_deleter(mut self, deleter: Arc<dyn ResourceDeleter>) -> Self {
        self.deleter = deleter;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The run namespace
    pub fn namespace(&self) -> &str {
        &self.config.cluster.namespace
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn current_scenario(&self) -> Option<&str> {
        self.current_scenario.as_deref()
    }

    pub fn enter_scenario(&mut self, name: &str) {
        self.current_scenario = Some(name.to_string());
    }

    pub fn exit_scenario(&mut self) {
        self.current_scenario = None;
    }

    /// Record that the run namespace is usable
    pub fn mark_namespace_ready(&mut self) {
        self.namespace_ready = true;
    }

    /// kubectl-mtv runner, resolved on first use
    pub fn cli(&mut self) -> &CliRunner {
        let config = &self.config;
        let executor = &self.executor;
        self.cli
            .get_or_insert_with(|| CliRunner::from_config(config, executor.clone()))
    }

    /// Endpoint and credential arguments for kubectl-mtv
    pub fn base_cli_args(&mut self) -> Vec<String> {
        self.cli().base_args().to_vec()
    }

    pub async fn run_cli(&mut self, command: &ToolCommand) -> HarnessResult<CommandOutput> {
        self.cli().run(command).await
    }

    pub async fn run_cli_raw(&mut self, words: &[&str]) -> HarnessResult<CommandOutput> {
        self.cli().run_raw(words).await
    }

    /// MCP client for the configured endpoint, built on first use
    pub fn mcp_client(&mut self) -> HarnessResult<&McpClient> {
        if self.mcp.is_none() {
            let url = self
                .config
                .mcp
                .url
                .clone()
                .ok_or_else(|| HarnessError::Config("no MCP server url configured".to_string()))?;
            self.mcp = Some(McpClient::new(url, self.config.timeouts.request())?);
        }
        self.mcp
            .as_ref()
            .ok_or_else(|| HarnessError::Config("no MCP server url configured".to_string()))
    }

    /// Headers carrying the run's own credentials
    pub fn session_headers(&self) -> SessionHeaders {
        match &self.config.cluster.token {
            Some(token) => SessionHeaders::new().bearer(token),
            None => SessionHeaders::new(),
        }
    }

    /// The shared MCP session, opened on first use and reused for the run
    pub async fn session(&mut self) -> HarnessResult<&McpSession> {
        if self.session.is_none() {
            let headers = self.session_headers();
            let client = self.mcp_client()?.clone();
            let session = client.open_session(headers).await?;
            self.session = Some(session);
        }
        self.session
            .as_ref()
            .ok_or_else(|| HarnessError::Config("MCP session unavailable".to_string()))
    }

    /// The shared MCP session, waiting for the server to list its tools first
    pub async fn wait_session_ready(&mut self) -> HarnessResult<&McpSession> {
        if self.session.is_none() {
            let headers = self.session_headers();
            let timeout = self.config.timeouts.resource_ready();
            let interval = self.config.timeouts.poll_interval();
            let client = self.mcp_client()?.clone();
            self.session = Some(client.wait_ready(headers, timeout, interval).await?);
        }
        self.session
            .as_ref()
            .ok_or_else(|| HarnessError::Config("MCP session unavailable".to_string()))
    }

    /// Open a separate session with other headers; the shared one is untouched
    pub async fn open_scoped_session(&mut self, headers: SessionHeaders) -> HarnessResult<McpSession> {
        let client = self.mcp_client()?.clone();
        client.open_session(headers).await
    }

    /// Call a tool on the shared session with the configured verbosity
    pub async fn call_tool(&mut self, tool: &str, command: &ToolCommand) -> HarnessResult<ToolResult> {
        let verbosity = self.config.mcp.verbosity;
        let session = self.session().await?;
        session.call_tool(tool, command, verbosity).await
    }

    /// Publish a value for later scenarios. Each key can be published once per run.
    pub fn publish<V: Serialize>(&mut self, key: SharedKey, value: V) -> HarnessResult<()> {
        if let Some(existing) = self.values.get(key.name) {
            return Err(HarnessError::DuplicatePublish {
                key: key.name.to_string(),
                publisher: existing.publisher.clone(),
            });
        }
        let publisher = self
            .current_scenario
            .clone()
            .unwrap_or_else(|| "<setup>".to_string());
        debug!("{} published {}", publisher, key.name);
        self.values.insert(
            key.name,
            Published {
                value: serde_json::to_value(value)?,
                publisher,
            },
        );
        Ok(())
    }

    /// Read a published value, failing if its producer never published it
    pub fn require<V: DeserializeOwned>(&self, key: SharedKey) -> HarnessResult<V> {
        let published = self
            .values
            .get(key.name)
            .ok_or_else(|| HarnessError::MissingPrerequisite {
                key: key.name.to_string(),
                producer: key.producer.to_string(),
            })?;
        Ok(serde_json::from_value(published.value.clone())?)
    }

    pub fn is_published(&self, key: SharedKey) -> bool {
        self.values.contains_key(key.name)
    }

    /// Track an object in the run namespace
    pub fn track(&self, kind: &str, name: &str) -> bool {
        self.ledger.track(kind, name, Some(self.namespace()))
    }

    /// Track the object a create call named, unless the call shows this run did not
    /// make it. A nonzero return value or rejected credentials mean nothing was
    /// created; a transport failure leaves the outcome unknown and still tracks.
    pub fn track_created(&self, kind: &str, name: &str, result: &HarnessResult<ToolResult>) -> bool {
        let created = match result {
            Ok(result) => result.succeeded(),
            Err(e) => e.kind() == ErrorKind::Transport,
        };
        if !created {
            debug!("Not tracking {} {}: create did not succeed", kind, name);
            return false;
        }
        self.track(kind, name)
    }

    /// Track a cluster-scoped object
    pub fn track_cluster_scoped(&self, kind: &str, name: &str) -> bool {
        self.ledger.track(kind, name, None)
    }

    pub fn untrack(&self, kind: &str, name: &str) -> bool {
        self.ledger.untrack(kind, name, Some(self.namespace()))
    }

    /// First fixture the configuration cannot satisfy, as a skip reason
    pub fn missing_fixture(&self, fixtures: &[Fixture]) -> Option<String> {
        fixtures.iter().find_map(|fixture| match fixture {
            Fixture::Cli if !binary_available(&self.config.cli.binary) => Some(format!(
                "kubectl-mtv binary '{}' not found",
                self.config.cli.binary.display()
            )),
            Fixture::ToolSession if self.config.mcp.url.is_none() => {
                Some("no MCP server url configured".to_string())
            }
            Fixture::Namespace if !self.namespace_ready => {
                Some(format!("namespace {} was not set up", self.namespace()))
            }
            Fixture::ProviderCredentials(ProviderKind::Vsphere)
                if self.config.providers.vsphere.is_none() =>
            {
                Some("no vSphere credentials configured".to_string())
            }
            Fixture::HostCredentials if self.config.providers.esxi_host.is_none() => {
                Some("no ESXi host credentials configured".to_string())
            }
            _ => None,
        })
    }

    /// MCP exchanges recorded so far
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.mcp.as_ref().map(McpClient::transcript).unwrap_or_default()
    }

    /// Release every tracked object and close the shared session
    pub async fn teardown(&mut self, order: &DeletionOrder) -> Vec<Release> {
        let releases = self
            .ledger
            .release_all_ordered(self.deleter.as_ref(), order)
            .await;
        if let Some(session) = self.session.take() {
            session.close().await;
        }
        info!("Teardown released {} resource(s)", releases.len());
        releases
    }
}

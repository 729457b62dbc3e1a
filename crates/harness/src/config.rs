//! Run configuration
//!
//! Every value is resolved before the first scenario executes. The runner binary
//! layers CLI flags and environment variables over an optional TOML file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{HarnessError, HarnessResult};

/// Complete configuration for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Cluster endpoint and credentials
    pub cluster: ClusterConfig,

    /// kubectl-mtv binary selection
    pub cli: CliConfig,

    /// MCP tool server
    pub mcp: McpConfig,

    /// Source provider and host credentials
    pub providers: ProviderCredentials,

    /// Timeouts and poll cadence
    pub timeouts: TimeoutConfig,
}

/// Cluster endpoint, credentials and the namespace the run works in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// API server URL (None = current kubeconfig context)
    pub api_url: Option<String>,

    /// Bearer token for the API server
    pub token: Option<String>,

    /// Skip TLS verification against the API server
    pub insecure_skip_tls: bool,

    /// Path to the kubectl binary
    pub kubectl_binary: PathBuf,

    /// Namespace created and used by the run
    pub namespace: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            token: None,
            insecure_skip_tls: false,
            kubectl_binary: PathBuf::from("kubectl"),
            namespace: generated_namespace(),
        }
    }
}

/// kubectl-mtv binary selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub binary: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("kubectl-mtv"),
        }
    }
}

/// MCP tool server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Streamable HTTP endpoint, e.g. `http://127.0.0.1:8080/mcp`
    pub url: Option<String>,

    /// Verbosity passed along with every tool call
    pub verbosity: u8,
}

/// Credentials for external systems some scenarios need
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCredentials {
    pub vsphere: Option<VsphereCredentials>,
    pub esxi_host: Option<HostCredentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VsphereCredentials {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub insecure_skip_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostCredentials {
    pub ip_address: String,
    pub username: String,
    pub password: String,
}

/// Timeouts and poll cadence, in whole seconds / milliseconds for TOML friendliness
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per external command
    pub command_secs: u64,

    /// Per MCP HTTP request
    pub request_secs: u64,

    /// Namespace becoming Active after create
    pub namespace_active_secs: u64,

    /// Namespace disappearing after delete
    pub namespace_deleted_secs: u64,

    /// Custom resources reaching Ready
    pub resource_ready_secs: u64,

    /// Cadence for every condition poll
    pub poll_interval_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            command_secs: 120,
            request_secs: 60,
            namespace_active_secs: 60,
            namespace_deleted_secs: 120,
            resource_ready_secs: 300,
            poll_interval_ms: 2000,
        }
    }
}

impl TimeoutConfig {
    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn namespace_active(&self) -> Duration {
        Duration::from_secs(self.namespace_active_secs)
    }

    pub fn namespace_deleted(&self) -> Duration {
        Duration::from_secs(self.namespace_deleted_secs)
    }

    pub fn resource_ready(&self) -> Duration {
        Duration::from_secs(self.resource_ready_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from a file when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> HarnessResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Check the configuration is usable before anything runs
    pub fn validate(&self) -> HarnessResult<()> {
        if !is_dns_label(&self.cluster.namespace) {
            return Err(HarnessError::Config(format!(
                "namespace '{}' is not a valid DNS-1123 label",
                self.cluster.namespace
            )));
        }

        if let Some(url) = &self.cluster.api_url {
            reqwest::Url::parse(url)
                .map_err(|e| HarnessError::Config(format!("cluster api_url '{}': {}", url, e)))?;
        }

        if let Some(url) = &self.mcp.url {
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| HarnessError::Config(format!("mcp url '{}': {}", url, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(HarnessError::Config(format!(
                    "mcp url '{}' must be http or https",
                    url
                )));
            }
        }

        let t = &self.timeouts;
        if t.command_secs == 0
            || t.request_secs == 0
            || t.namespace_active_secs == 0
            || t.namespace_deleted_secs == 0
            || t.resource_ready_secs == 0
            || t.poll_interval_ms == 0
        {
            return Err(HarnessError::Config("timeouts must be greater than zero".to_string()));
        }

        Ok(())
    }

    /// Base arguments for kubectl and kubectl-mtv: endpoint and credentials
    pub fn base_cli_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(url) = &self.cluster.api_url {
            args.push(format!("--server={}", url));
        }
        if let Some(token) = &self.cluster.token {
            args.push(format!("--token={}", token));
        }
        if self.cluster.insecure_skip_tls {
            args.push("--insecure-skip-tls-verify".to_string());
        }
        args
    }
}

/// Replace credential values in an argument list so it can be logged.
///
/// Handles both `--token=value` and `--token value` forms.
pub fn redact_args(args: &[String]) -> Vec<String> {
    let mut redacted = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            redacted.push("<redacted>".to_string());
            hide_next = false;
            continue;
        }
        match SECRET_FLAGS.iter().find(|flag| arg.starts_with(*flag)) {
            Some(flag) if arg.len() == flag.len() => {
                redacted.push(arg.clone());
                hide_next = true;
            }
            Some(flag) if arg[flag.len()..].starts_with('=') => {
                redacted.push(format!("{}=<redacted>", flag));
            }
            _ => redacted.push(arg.clone()),
        }
    }
    redacted
}

const SECRET_FLAGS: &[&str] = &["--token", "--password"];

/// `mtv-e2e-` plus eight hex characters
fn generated_namespace() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("mtv-e2e-{}", &id[..8])
}

fn is_dns_label(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}

//! mtv-e2e - End-to-end runner for kubectl-mtv and its MCP tool server
//!
//! Resolves configuration from an optional TOML file overlaid with flags and
//! environment variables, runs the selected scenarios, writes the run report and
//! MCP transcript, and exits 0 on success, 1 on scenario failures, 2 when the run
//! could not start.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use mtv_harness::config::{HostCredentials, VsphereCredentials};
use mtv_harness::{HarnessConfig, ReportFormat, SessionContext, Selection};
use tracing::{error, info, warn};

/// Run the kubectl-mtv end-to-end suite
#[derive(Parser, Debug)]
#[command(name = "mtv-e2e")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "MTV_E2E_CONFIG")]
    config: Option<PathBuf>,

    /// Run only scenarios carrying this tag (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Never run scenarios carrying this tag (repeatable)
    #[arg(long = "exclude-tag")]
    exclude_tags: Vec<String>,

    /// Run only scenarios whose name contains this text
    #[arg(long)]
    name: Option<String>,

    /// Directory for the run report and MCP transcript
    #[arg(short, long, default_value = "test-results")]
    output: PathBuf,

    /// Run report format (json or yaml)
    #[arg(long, default_value = "json")]
    format: ReportFormat,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the scenario plan and exit
    #[arg(long)]
    list: bool,

    #[command(flatten)]
    overrides: Overrides,
}

/// Configuration values that override the file
#[derive(clap::Args, Debug, Default)]
struct Overrides {
    /// Kubernetes API server URL
    #[arg(long, env = "KUBE_API_URL")]
    api_url: Option<String>,

    /// Bearer token for the API server and the tool server
    #[arg(long, env = "KUBE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Skip TLS verification against the API server
    #[arg(long, env = "KUBE_INSECURE_SKIP_TLS")]
    insecure_skip_tls: bool,

    #[arg(long, env = "KUBECTL_BINARY")]
    kubectl: Option<PathBuf>,

    #[arg(long, env = "KUBECTL_MTV_BINARY")]
    kubectl_mtv: Option<PathBuf>,

    /// Namespace the run creates and works in
    #[arg(long, env = "TEST_NAMESPACE")]
    namespace: Option<String>,

    /// MCP tool server endpoint
    #[arg(long, env = "MCP_URL")]
    mcp_url: Option<String>,

    /// Verbosity forwarded with every tool call
    #[arg(long, env = "MCP_VERBOSE")]
    mcp_verbose: Option<u8>,

    #[arg(long, env = "VSPHERE_URL")]
    vsphere_url: Option<String>,

    #[arg(long, env = "VSPHERE_USERNAME")]
    vsphere_username: Option<String>,

    #[arg(long, env = "VSPHERE_PASSWORD", hide_env_values = true)]
    vsphere_password: Option<String>,

    #[arg(long, env = "VSPHERE_INSECURE_SKIP_TLS")]
    vsphere_insecure_skip_tls: bool,

    #[arg(long, env = "ESXI_HOST_IP")]
    esxi_host_ip: Option<String>,

    #[arg(long, env = "ESXI_USERNAME")]
    esxi_username: Option<String>,

    #[arg(long, env = "ESXI_PASSWORD", hide_env_values = true)]
    esxi_password: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut HarnessConfig) -> anyhow::Result<()> {
        if let Some(url) = self.api_url {
            config.cluster.api_url = Some(url);
        }
        if let Some(token) = self.token {
            config.cluster.token = Some(token);
        }
        if self.insecure_skip_tls {
            config.cluster.insecure_skip_tls = true;
        }
        if let Some(kubectl) = self.kubectl {
            config.cluster.kubectl_binary = kubectl;
        }
        if let Some(binary) = self.kubectl_mtv {
            config.cli.binary = binary;
        }
        if let Some(namespace) = self.namespace {
            config.cluster.namespace = namespace;
        }
        if let Some(url) = self.mcp_url {
            config.mcp.url = Some(url);
        }
        if let Some(verbosity) = self.mcp_verbose {
            config.mcp.verbosity = verbosity;
        }

        match (
            config.providers.vsphere.take(),
            self.vsphere_url,
            self.vsphere_username,
            self.vsphere_password,
        ) {
            (Some(mut creds), url, username, password) => {
                creds.url = url.unwrap_or(creds.url);
                creds.username = username.unwrap_or(creds.username);
                creds.password = password.unwrap_or(creds.password);
                creds.insecure_skip_tls |= self.vsphere_insecure_skip_tls;
                config.providers.vsphere = Some(creds);
            }
            (None, Some(url), Some(username), Some(password)) => {
                config.providers.vsphere = Some(VsphereCredentials {
                    url,
                    username,
                    password,
                    insecure_skip_tls: self.vsphere_insecure_skip_tls,
                });
            }
            (None, None, None, None) => {}
            (None, ..) => bail!("vSphere credentials need VSPHERE_URL, VSPHERE_USERNAME and VSPHERE_PASSWORD together"),
        }

        match (
            config.providers.esxi_host.take(),
            self.esxi_host_ip,
            self.esxi_username,
            self.esxi_password,
        ) {
            (Some(mut creds), ip, username, password) => {
                creds.ip_address = ip.unwrap_or(creds.ip_address);
                creds.username = username.unwrap_or(creds.username);
                creds.password = password.unwrap_or(creds.password);
                config.providers.esxi_host = Some(creds);
            }
            (None, Some(ip_address), Some(username), Some(password)) => {
                config.providers.esxi_host = Some(HostCredentials {
                    ip_address,
                    username,
                    password,
                });
            }
            (None, None, None, None) => {}
            (None, ..) => bail!("ESXi host credentials need ESXI_HOST_IP, ESXI_USERNAME and ESXI_PASSWORD together"),
        }

        Ok(())
    }
}

fn resolve_config(args: &mut Args) -> anyhow::Result<HarnessConfig> {
    let mut config = HarnessConfig::load_or_default(args.config.as_deref())
        .context("loading configuration")?;
    std::mem::take(&mut args.overrides).apply(&mut config)?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let registry = mtv_e2e::suite();
    if args.list {
        for (priority, name) in registry.plan() {
            println!("{:>3}  {}", priority, name);
        }
        return ExitCode::SUCCESS;
    }

    let config = match resolve_config(&mut args) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(2);
        }
    };
    info!(
        "Running {} scenario(s) in namespace {} (mcp: {})",
        registry.len(),
        config.cluster.namespace,
        config.mcp.url.as_deref().unwrap_or("not configured")
    );

    let selection = Selection {
        include_tags: args.tags,
        exclude_tags: args.exclude_tags,
        name_filter: args.name,
    };
    let mut ctx = SessionContext::new(config);
    let report = registry.run_all(&mut ctx, &selection).await;

    mtv_e2e::output::print_report(&report);

    match report.write(&args.output, args.format) {
        Ok(path) => info!("Report written to {}", path.display()),
        Err(e) => warn!("Could not write report: {}", e),
    }
    if !ctx.transcript().is_empty() {
        let path = args.output.join("mcp-transcript.json");
        if let Ok(client) = ctx.mcp_client() {
            match client.write_transcript(&path) {
                Ok(()) => info!("MCP transcript written to {}", path.display()),
                Err(e) => warn!("Could not write MCP transcript: {}", e),
            }
        }
    }

    if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

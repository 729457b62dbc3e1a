//! The scenario suite
//!
//! Priorities are spaced by tens so modules interleave: 0 gate, 0x namespaces,
//! 1x tool server, 2x providers, 3x inventory and hosts, 4x plans, 5x health,
//! 6x authentication, 9x explicit deletes.

pub mod auth;
pub mod cli;
pub mod inventory;
pub mod namespace;
pub mod plan;
pub mod provider;
pub mod server;

use mtv_harness::mcp::MTV_READ;
use mtv_harness::poller::{wait_for, Probe};
use mtv_harness::{
    ErrorCategory, ErrorKind, Fixture, HarnessError, HarnessResult, ProviderKind, Scenario,
    ScenarioRegistry, SessionContext, ToolCommand, ToolResult,
};
use serde_json::Value;

/// Every scenario, registered in priority order
pub fn suite() -> ScenarioRegistry {
    use Fixture::*;
    const VSPHERE: Fixture = ProviderCredentials(ProviderKind::Vsphere);

    let mut registry = ScenarioRegistry::new();

    registry.register(Scenario::new("version", 0, cli::version).tag("cli").fatal());
    registry.register(Scenario::new("namespace_lifecycle", 5, namespace::lifecycle).tag("cluster"));
    registry.register(Scenario::new("namespace_setup", 10, namespace::setup).tag("cluster"));

    registry.register(Scenario::new("mcp_ready", 15, server::ready).tag("tool").requires(ToolSession));
    registry.register(Scenario::new("mcp_help", 16, server::help).tag("tool").requires(ToolSession));

    registry.register(
        Scenario::new("create_openshift_provider", 20, provider::create_openshift)
            .tag("tool")
            .requires(ToolSession)
            .requires(Namespace),
    );
    registry.register(
        Scenario::new("create_vsphere_provider", 21, provider::create_vsphere)
            .tag("tool")
            .tag("external")
            .requires(ToolSession)
            .requires(Namespace)
            .requires(VSPHERE),
    );
    registry.register(
        Scenario::new("duplicate_provider", 22, provider::duplicate)
            .tag("tool")
            .tag("negative")
            .requires(ToolSession)
            .requires(Namespace),
    );
    registry.register(
        Scenario::new("get_providers", 23, provider::list)
            .tag("tool")
            .requires(ToolSession)
            .requires(Namespace),
    );
    registry.register(
        Scenario::new("nonexistent_provider", 24, provider::nonexistent)
            .tag("tool")
            .tag("negative")
            .requires(ToolSession)
            .requires(Namespace),
    );
    registry.register(
        Scenario::new("provider_cli", 25, cli::providers)
            .tag("cli")
            .requires(Cli)
            .requires(Namespace),
    );

    registry.register(
        Scenario::new("inventory_vms", 30, inventory::vms)
            .tag("tool")
            .tag("external")
            .requires(ToolSession)
            .requires(Namespace)
            .requires(VSPHERE),
    );
    registry.register(
        Scenario::new("inventory_networks", 31, inventory::networks)
            .tag("tool")
            .tag("external")
            .requires(ToolSession)
            .requires(Namespace)
            .requires(VSPHERE),
    );
    registry.register(
        Scenario::new("create_host", 35, inventory::create_host)
            .tag("tool")
            .tag("external")
            .requires(ToolSession)
            .requires(Namespace)
            .requires(VSPHERE)
            .requires(HostCredentials),
    );

    registry.register(
        Scenario::new("create_plan", 40, plan::create)
            .tag("tool")
            .tag("external")
            .requires(ToolSession)
            .requires(Namespace)
            .requires(VSPHERE),
    );
    registry.register(
        Scenario::new("get_mapping_network", 41, plan::network_mappings)
            .tag("tool")
            .requires(ToolSession)
            .requires(Namespace),
    );
    registry.register(
        Scenario::new("plan_ready", 42, plan::ready)
            .tag("tool")
            .requires(ToolSession)
            .requires(Namespace),
    );

    registry.register(Scenario::new("health", 50, server::health).tag("tool").requires(ToolSession));

    registry.register(
        Scenario::new("auth_invalid_token", 60, auth::invalid_token)
            .tag("tool")
            .tag("auth")
            .tag("negative")
            .requires(ToolSession),
    );
    registry.register(
        Scenario::new("auth_cli_invalid_token", 61, auth::cli_invalid_token)
            .tag("cli")
            .tag("auth")
            .tag("negative")
            .requires(Cli)
            .requires(Namespace),
    );

    registry.register(
        Scenario::new("delete_plan", 90, plan::delete)
            .tag("tool")
            .requires(ToolSession)
            .requires(Namespace),
    );

    registry
}

/// `<verb> <resource>` scoped to the run namespace
pub(crate) fn namespaced(ctx: &SessionContext, command: &str) -> HarnessResult<ToolCommand> {
    ToolCommand::new(command)?.flag("namespace", ctx.namespace())
}

/// Category of an expected failure, whether reported in the result or raised by the tool
pub(crate) fn failure_category(
    what: &str,
    result: HarnessResult<ToolResult>,
) -> HarnessResult<ErrorCategory> {
    match result {
        Ok(result) if result.succeeded() => Err(HarnessError::AssertionFailed(format!(
            "{} succeeded but was expected to fail: {}",
            what,
            result.output.trim()
        ))),
        Ok(result) => Ok(result.category().unwrap_or(ErrorCategory::Other)),
        Err(e) if e.kind() == ErrorKind::ToolReported => Ok(e.category()),
        Err(e) => Err(e),
    }
}

/// Whether a Forklift object reports Ready, by phase or by condition
pub(crate) fn is_ready(item: &Value) -> bool {
    let status = &item["status"];
    if status["phase"].as_str() == Some("Ready") {
        return true;
    }
    status["conditions"]
        .as_array()
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c["type"] == "Ready" && c["status"] == "True")
        })
        .unwrap_or(false)
}

/// Short description of an object's status for timeout messages
pub(crate) fn describe_status(item: &Value) -> String {
    let status = &item["status"];
    if let Some(phase) = status["phase"].as_str() {
        return format!("phase={}", phase);
    }
    let conditions: Vec<String> = status["conditions"]
        .as_array()
        .map(|conditions| {
            conditions
                .iter()
                .filter(|c| c["status"] == "True")
                .filter_map(|c| c["type"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    if conditions.is_empty() {
        "no conditions yet".to_string()
    } else {
        format!("conditions={}", conditions.join(","))
    }
}

/// Poll `get <resource> <name>` through the tool server until the object is Ready
pub(crate) async fn wait_ready(
    ctx: &mut SessionContext,
    resource: &str,
    name: &str,
) -> HarnessResult<Value> {
    let timeout = ctx.config().timeouts.resource_ready();
    let interval = ctx.config().timeouts.poll_interval();
    let verbosity = ctx.config().mcp.verbosity;
    let command = namespaced(ctx, &format!("get {}", resource))?.flag("name", name)?;
    let condition = format!("{} {} to be Ready", resource, name);

    let session = ctx.session().await?;
    let command = &command;
    let satisfied = wait_for(&condition, timeout, interval, || async move {
        let result = session.call_tool(MTV_READ, command, verbosity).await?;
        if !result.succeeded() {
            return Ok(Probe::pending(result.diagnostics().trim().to_string()));
        }
        Ok(match result.items().into_iter().next() {
            Some(item) if is_ready(&item) => Probe::Ready(item),
            Some(item) => Probe::pending(describe_status(&item)),
            None => Probe::pending("not listed"),
        })
    })
    .await?;
    Ok(satisfied.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_suite_plan_order() {
        let registry = suite();
        let plan = registry.plan();
        assert_eq!(plan.first().map(|(_, n)| *n), Some("version"));
        assert_eq!(plan.last().map(|(_, n)| *n), Some("delete_plan"));
        assert!(plan.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(plan.len(), registry.len());
    }

    #[test]
    fn test_readiness_detection() {
        assert!(is_ready(&json!({"status": {"phase": "Ready"}})));
        assert!(is_ready(&json!({"status": {"conditions": [
            {"type": "Validated", "status": "True"},
            {"type": "Ready", "status": "True"},
        ]}})));
        let pending = json!({"status": {"conditions": [{"type": "Validated", "status": "True"}]}});
        assert!(!is_ready(&pending));
        assert_eq!(describe_status(&pending), "conditions=Validated");
        assert_eq!(describe_status(&json!({})), "no conditions yet");
    }

    #[test]
    fn test_failure_category() {
        let failed = ToolResult {
            return_value: 1,
            output: String::new(),
            data: None,
            error_detail: Some(json!("provider host already exists")),
        };
        assert_eq!(
            failure_category("dup", Ok(failed)).unwrap(),
            ErrorCategory::AlreadyExists
        );

        let ok = ToolResult {
            return_value: 0,
            output: "created".to_string(),
            data: None,
            error_detail: None,
        };
        assert!(failure_category("dup", Ok(ok)).is_err());

        let raised = Err(HarnessError::ToolError {
            tool: "mtv_read".to_string(),
            message: "provider nope not found".to_string(),
        });
        assert_eq!(failure_category("get", raised).unwrap(), ErrorCategory::NotFound);
    }
}

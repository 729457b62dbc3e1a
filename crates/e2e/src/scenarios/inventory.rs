//! Source provider inventory and ESXi host scenarios

use mtv_harness::mcp::{item_name, MTV_READ, MTV_WRITE};
use mtv_harness::{ensure, HarnessError, ScenarioFuture, SessionContext};
use serde_json::Value;
use tracing::info;

use super::namespaced;
use crate::keys;

/// The source inventory lists VMs; the first one is published for the plan
pub fn vms(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let source: String = ctx.require(keys::PROVIDER_SOURCE)?;
        let command = namespaced(ctx, "get inventory vm")?.flag("provider", source.as_str())?;
        let result = ctx.call_tool(MTV_READ, &command).await?.into_success(MTV_READ)?;

        let items = result.items();
        let vm = items
            .iter()
            .find_map(item_name)
            .ok_or_else(|| {
                HarnessError::AssertionFailed(format!("provider {} lists no named VMs", source))
            })?
            .to_string();
        info!("Inventory of {} lists {} VM(s); using {}", source, items.len(), vm);
        ctx.publish(keys::INVENTORY_VM, vm)?;
        Ok(())
    })
}

/// The source inventory lists networks
pub fn networks(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let source: String = ctx.require(keys::PROVIDER_SOURCE)?;
        let command = namespaced(ctx, "get inventory network")?.flag("provider", source.as_str())?;
        let result = ctx.call_tool(MTV_READ, &command).await?.into_success(MTV_READ)?;
        ensure!(
            !result.items().is_empty(),
            "provider {} lists no networks",
            source
        );
        Ok(())
    })
}

/// Inventory id of the host whose address matches, else of the first host listed
fn pick_host<'a>(hosts: &'a [Value], ip_address: &str) -> Option<&'a str> {
    let id = |host: &'a Value| host.get("id").and_then(Value::as_str).or_else(|| item_name(host));
    let matches_ip = |host: &&'a Value| {
        host.get("name").and_then(Value::as_str) == Some(ip_address)
            || host
                .get("networkAdapters")
                .and_then(Value::as_array)
                .map(|adapters| adapters.iter().any(|a| a["ipAddress"] == ip_address))
                .unwrap_or(false)
    };
    hosts
        .iter()
        .find(matches_ip)
        .and_then(id)
        .or_else(|| hosts.iter().find_map(id))
}

/// Register an ESXi host of the source provider with its own credentials
pub fn create_host(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let source: String = ctx.require(keys::PROVIDER_SOURCE)?;
        let creds = ctx
            .config()
            .providers
            .esxi_host
            .clone()
            .ok_or_else(|| HarnessError::Skipped("no ESXi host credentials configured".to_string()))?;

        let list = namespaced(ctx, "get inventory host")?.flag("provider", source.as_str())?;
        let hosts = ctx.call_tool(MTV_READ, &list).await?.into_success(MTV_READ)?.items();
        let host_id = pick_host(&hosts, &creds.ip_address)
            .ok_or_else(|| {
                HarnessError::AssertionFailed(format!("provider {} lists no hosts", source))
            })?
            .to_string();

        let command = namespaced(ctx, "create host")?
            .flag("name", host_id.as_str())?
            .flag("provider", source.as_str())?
            .flag("ip-address", creds.ip_address.as_str())?
            .flag("username", creds.username.as_str())?
            .flag("password", creds.password.as_str())?
            .flag("host-insecure-skip-tls", true)?;

        let result = ctx.call_tool(MTV_WRITE, &command).await;
        ctx.track_created("host", &host_id, &result);
        result?.into_success(MTV_WRITE)?;
        info!("Created host {} for provider {}", host_id, source);
        Ok(())
    })
}

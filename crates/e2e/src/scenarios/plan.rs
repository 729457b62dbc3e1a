//! Migration plan scenarios

use mtv_harness::mcp::{item_name, MTV_READ, MTV_WRITE};
use mtv_harness::{ensure, ScenarioFuture, SessionContext};
use tracing::info;

use super::{namespaced, wait_ready};
use crate::keys;

/// Create a plan moving the discovered VM from the source to the target provider
pub fn create(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let source: String = ctx.require(keys::PROVIDER_SOURCE)?;
        let target: String = ctx.require(keys::PROVIDER_TARGET)?;
        let vm: String = ctx.require(keys::INVENTORY_VM)?;
        let name = keys::PLAN;

        let command = namespaced(ctx, "create plan")?
            .flag("name", name)?
            .flag("source", source.as_str())?
            .flag("target", target.as_str())?
            .flag("vms", vm.as_str())?
            .flag("target-namespace", ctx.namespace())?;

        let result = ctx.call_tool(MTV_WRITE, &command).await;
        ctx.track_created("plan", name, &result);
        result?.into_success(MTV_WRITE)?;

        let get = namespaced(ctx, "get plan")?;
        let listed = ctx.call_tool(MTV_READ, &get).await?.into_success(MTV_READ)?;
        ensure!(
            listed.contains_name(name),
            "plan {} missing from {} listed plan(s)",
            name,
            listed.items().len()
        );

        ctx.publish(keys::PLAN_NAME, name)?;
        info!("Created plan {} ({} -> {}, vm {})", name, source, target, vm);
        Ok(())
    })
}

/// Network mappings are listed; the ones generated for the plan are tracked
pub fn network_mappings(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let plan: String = ctx.require(keys::PLAN_NAME)?;
        let command = namespaced(ctx, "get mapping network")?;
        let result = ctx.call_tool(MTV_READ, &command).await?.into_success(MTV_READ)?;

        let items = result.items();
        ensure!(!items.is_empty(), "no network mappings listed");

        let generated: Vec<&str> = items
            .iter()
            .filter_map(item_name)
            .filter(|name| name.starts_with(plan.as_str()))
            .collect();
        for name in &generated {
            ctx.track("networkmap", name);
        }
        info!(
            "{} network mapping(s) listed, {} generated for {}",
            items.len(),
            generated.len(),
            plan
        );
        Ok(())
    })
}

/// The plan validates and reaches Ready
pub fn ready(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let plan: String = ctx.require(keys::PLAN_NAME)?;
        wait_ready(ctx, "plan", &plan).await?;
        Ok(())
    })
}

/// Delete the plan through the write tool and wait until the cluster no longer has it
pub fn delete(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let plan: String = ctx.require(keys::PLAN_NAME)?;
        let command = namespaced(ctx, "delete plan")?.flag("name", plan.as_str())?;
        ctx.call_tool(MTV_WRITE, &command).await?.into_success(MTV_WRITE)?;
        ctx.untrack("plan", &plan);

        let namespace = ctx.namespace().to_string();
        ctx.cluster()
            .wait_resource_gone("plan", &plan, Some(&namespace))
            .await?;
        info!("Plan {} deleted", plan);
        Ok(())
    })
}

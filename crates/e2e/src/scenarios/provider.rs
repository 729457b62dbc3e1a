//! Provider scenarios through the write and read tools

use mtv_harness::mcp::{MTV_READ, MTV_WRITE};
use mtv_harness::{ensure, ErrorCategory, HarnessError, ScenarioFuture, SessionContext};
use tracing::info;
use uuid::Uuid;

use super::{failure_category, namespaced, wait_ready};
use crate::keys;

/// Create the openshift provider for the local cluster and publish its name
pub fn create_openshift(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let name = keys::TARGET_PROVIDER_NAME;
        let command = namespaced(ctx, "create provider")?
            .flag("name", name)?
            .flag("type", "openshift")?;

        let result = ctx.call_tool(MTV_WRITE, &command).await;
        ctx.track_created("provider", name, &result);
        result?.into_success(MTV_WRITE)?;

        let get = namespaced(ctx, "get provider")?.flag("name", name)?;
        let listed = ctx.call_tool(MTV_READ, &get).await?.into_success(MTV_READ)?;
        ensure!(listed.contains_name(name), "provider {} not returned by get", name);

        ctx.publish(keys::PROVIDER_TARGET, name)?;
        info!("Created openshift provider {}", name);
        Ok(())
    })
}

/// Create the vSphere source provider and wait for its inventory to be Ready
pub fn create_vsphere(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let creds = ctx
            .config()
            .providers
            .vsphere
            .clone()
            .ok_or_else(|| HarnessError::Skipped("no vSphere credentials configured".to_string()))?;
        let name = keys::SOURCE_PROVIDER_NAME;
        let command = namespaced(ctx, "create provider")?
            .flag("name", name)?
            .flag("type", "vsphere")?
            .flag("url", creds.url.as_str())?
            .flag("username", creds.username.as_str())?
            .flag("password", creds.password.as_str())?
            .flag("provider-insecure-skip-tls", creds.insecure_skip_tls)?;

        let result = ctx.call_tool(MTV_WRITE, &command).await;
        ctx.track_created("provider", name, &result);
        result?.into_success(MTV_WRITE)?;
        ctx.publish(keys::PROVIDER_SOURCE, name)?;

        wait_ready(ctx, "provider", name).await?;
        info!("vSphere provider {} is Ready", name);
        Ok(())
    })
}

/// Creating the target provider a second time reports that it already exists
pub fn duplicate(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let name: String = ctx.require(keys::PROVIDER_TARGET)?;
        let command = namespaced(ctx, "create provider")?
            .flag("name", name.as_str())?
            .flag("type", "openshift")?;

        let result = ctx.call_tool(MTV_WRITE, &command).await;
        let category = failure_category("duplicate create provider", result)?;
        ensure!(
            category == ErrorCategory::AlreadyExists,
            "expected already-exists for provider {}, got {:?}",
            name,
            category
        );
        Ok(())
    })
}

/// Listing providers without a name includes the target provider
pub fn list(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let target: String = ctx.require(keys::PROVIDER_TARGET)?;
        let command = namespaced(ctx, "get provider")?;
        let result = ctx.call_tool(MTV_READ, &command).await?.into_success(MTV_READ)?;
        ensure!(
            result.contains_name(&target),
            "provider {} missing from {} listed provider(s)",
            target,
            result.items().len()
        );
        Ok(())
    })
}

/// Reading and deleting a provider that was never created both report not-found
pub fn nonexistent(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let name = format!("mtv-e2e-missing-{}", Uuid::new_v4().simple());

        let get = namespaced(ctx, "get provider")?.flag("name", name.as_str())?;
        let result = ctx.call_tool(MTV_READ, &get).await;
        let category = failure_category("get of a missing provider", result)?;
        ensure!(
            category == ErrorCategory::NotFound,
            "expected not-found from get, got {:?}",
            category
        );

        let delete = namespaced(ctx, "delete provider")?.flag("name", name.as_str())?;
        let result = ctx.call_tool(MTV_WRITE, &delete).await;
        let category = failure_category("delete of a missing provider", result)?;
        ensure!(
            category == ErrorCategory::NotFound,
            "expected not-found from delete, got {:?}",
            category
        );
        Ok(())
    })
}

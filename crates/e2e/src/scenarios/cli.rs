//! kubectl-mtv binary scenarios

use mtv_harness::mcp::{item_name, normalize_items};
use mtv_harness::{ensure, HarnessError, ScenarioFuture, SessionContext, ToolCommand};
use tracing::info;

use crate::keys;

/// The binary runs and reports a version. A missing binary fails here, which aborts the run.
pub fn version(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let out = ctx.run_cli_raw(&["version"]).await?.into_success()?;
        ensure!(
            out.stdout.to_ascii_lowercase().contains("version"),
            "`kubectl-mtv version` printed no version: {}",
            out.stdout.trim()
        );
        info!("{}", out.stdout.lines().next().unwrap_or_default().trim());
        Ok(())
    })
}

/// The CLI lists the provider the tool server created
pub fn providers(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let target: String = ctx.require(keys::PROVIDER_TARGET)?;
        let command = ToolCommand::new("get provider")?
            .flag("namespace", ctx.namespace())?
            .flag("output", "json")?;

        let out = ctx.run_cli(&command).await?.into_success()?;
        let items = normalize_items(&out.json()?);
        let names: Vec<&str> = items.iter().filter_map(item_name).collect();
        if !names.contains(&target.as_str()) {
            return Err(HarnessError::AssertionFailed(format!(
                "provider {} missing from `kubectl-mtv get provider`: {:?}",
                target, names
            )));
        }
        Ok(())
    })
}

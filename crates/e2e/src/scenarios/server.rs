//! MCP tool server scenarios that touch no cluster objects

use mtv_harness::mcp::{MTV_HELP, MTV_READ, MTV_WRITE};
use mtv_harness::{ensure, HarnessError, ScenarioFuture, SessionContext, ToolCommand};
use tracing::info;

/// The server comes up and advertises the read, write, and help tools
pub fn ready(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let session = ctx.wait_session_ready().await?;
        if let Some(server) = session.server() {
            info!("Connected to {} {}", server.name, server.version);
        }

        let tools = session.list_tools().await?;
        let missing: Vec<&str> = [MTV_READ, MTV_WRITE, MTV_HELP]
            .into_iter()
            .filter(|expected| !tools.iter().any(|t| t.name == *expected))
            .collect();
        ensure!(missing.is_empty(), "server does not advertise {:?}", missing);
        Ok(())
    })
}

/// Help for `create plan` documents its flags
pub fn help(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let command = ToolCommand::new("create plan")?;
        let result = ctx.call_tool(MTV_HELP, &command).await?.into_success(MTV_HELP)?;
        let text = match &result.data {
            Some(data) => format!("{}\n{}", result.output, data),
            None => result.output.clone(),
        };
        ensure!(
            text.contains("--source"),
            "help for `create plan` does not mention --source"
        );
        Ok(())
    })
}

/// The health command runs through the read tool
pub fn health(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let command = ToolCommand::new("health")?.flag("namespace", ctx.namespace())?;
        let result = ctx.call_tool(MTV_READ, &command).await?;
        if !result.succeeded() {
            return Err(HarnessError::AssertionFailed(format!(
                "health returned {}: {}",
                result.return_value,
                result.diagnostics().trim()
            )));
        }
        Ok(())
    })
}

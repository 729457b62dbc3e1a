//! Rejected-credential scenarios

use mtv_harness::mcp::MTV_READ;
use mtv_harness::{
    ErrorCategory, ErrorKind, HarnessError, HarnessResult, ScenarioFuture, SessionContext,
    SessionHeaders, ToolCommand,
};
use tracing::info;

use crate::keys;

const READ_COMMANDS: &[&str] = &["get provider", "get plan", "get mapping network", "health"];

/// Every read through a session carrying a bogus token fails on authentication
pub fn invalid_token(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let verbosity = ctx.config().mcp.verbosity;
        let commands = READ_COMMANDS
            .iter()
            .map(|command| ToolCommand::new(command)?.flag("namespace", ctx.namespace()))
            .collect::<HarnessResult<Vec<_>>>()?;

        let client = ctx.mcp_client()?.clone();
        let headers = SessionHeaders::new().bearer(keys::BOGUS_TOKEN);
        let outcome = client
            .with_session(headers, move |session| {
                Box::pin(async move {
                    for command in &commands {
                        match session.call_tool(MTV_READ, command, verbosity).await {
                            Err(e) if e.kind() == ErrorKind::Authentication => {
                                info!("`{}` rejected: {}", command.command(), e);
                            }
                            Err(e) => {
                                return Err(HarnessError::AssertionFailed(format!(
                                    "`{}` with an invalid token failed with {} instead of authentication: {}",
                                    command.command(),
                                    e.kind(),
                                    e
                                )))
                            }
                            Ok(result) => {
                                return Err(HarnessError::AssertionFailed(format!(
                                    "`{}` with an invalid token returned {}",
                                    command.command(),
                                    result.return_value
                                )))
                            }
                        }
                    }
                    Ok(())
                })
            })
            .await;

        match outcome {
            Err(e) if e.kind() == ErrorKind::Authentication => {
                info!("Session with an invalid token refused at open: {}", e);
                Ok(())
            }
            other => other,
        }
    })
}

/// kubectl-mtv run with a bogus token exits nonzero with an authorization error
pub fn cli_invalid_token(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let command = ToolCommand::new("get provider")?.flag("namespace", ctx.namespace())?;
        let runner = ctx.cli().with_token(keys::BOGUS_TOKEN);
        let out = runner.run(&command).await?;

        if out.success() {
            return Err(HarnessError::AssertionFailed(
                "kubectl-mtv accepted an invalid token".to_string(),
            ));
        }
        let category = ErrorCategory::classify(&format!("{}\n{}", out.stdout, out.stderr));
        if category != ErrorCategory::Unauthorized {
            return Err(HarnessError::AssertionFailed(format!(
                "kubectl-mtv exited {} without an authorization error: {}",
                out.exit_code,
                out.stderr.trim()
            )));
        }
        Ok(())
    })
}

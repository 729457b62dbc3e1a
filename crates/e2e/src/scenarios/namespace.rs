//! Namespace scenarios, driven through kubectl

use mtv_harness::{ErrorCategory, ScenarioFuture, SessionContext};
use tracing::info;

/// Create, delete, and re-create a throwaway namespace, waiting out each transition
pub fn lifecycle(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let name = format!("{}-lifecycle", ctx.namespace());
        let cluster = ctx.cluster();

        for round in 1..=2 {
            cluster.create_namespace(&name).await?;
            ctx.track_cluster_scoped("namespace", &name);
            cluster.wait_namespace_active(&name).await?;
            cluster.delete_namespace(&name).await?;
            cluster.wait_namespace_gone(&name).await?;
            info!("Namespace {} round {} complete", name, round);
        }

        ctx.ledger().untrack("namespace", &name, None);
        Ok(())
    })
}

/// Create the run namespace and wait until pods could be scheduled in it
pub fn setup(ctx: &mut SessionContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let name = ctx.namespace().to_string();
        match ctx.cluster().create_namespace(&name).await {
            Ok(()) => {
                ctx.track_cluster_scoped("namespace", &name);
            }
            Err(e) if e.category() == ErrorCategory::AlreadyExists => {
                info!("Namespace {} already exists; it will not be deleted", name);
            }
            Err(e) => return Err(e),
        }

        ctx.cluster().wait_namespace_usable(&name).await?;
        ctx.mark_namespace_ready();
        Ok(())
    })
}

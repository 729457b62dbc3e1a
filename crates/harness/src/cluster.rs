//! kubectl-backed cluster helpers: namespace lifecycle, existence checks and deletion

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{HarnessConfig, TimeoutConfig};
use crate::error::{ErrorCategory, HarnessResult};
use crate::executor::{CommandExecutor, CommandOutput};
use crate::ledger::{DeleteStatus, ResourceDeleter, TrackedResource};
use crate::poller::{self, Probe};

/// Fully qualified kubectl resource for a ledger kind
fn kubectl_resource(kind: &str) -> &str {
    match kind {
        "provider" => "providers.forklift.konveyor.io",
        "plan" => "plans.forklift.konveyor.io",
        "migration" => "migrations.forklift.konveyor.io",
        "host" => "hosts.forklift.konveyor.io",
        "hook" => "hooks.forklift.konveyor.io",
        "networkmap" => "networkmaps.forklift.konveyor.io",
        "storagemap" => "storagemaps.forklift.konveyor.io",
        other => other,
    }
}

/// Thin kubectl wrapper bound to one cluster endpoint
#[derive(Debug, Clone)]
pub struct Cluster {
    executor: CommandExecutor,
    kubectl: String,
    base_args: Vec<String>,
    timeouts: TimeoutConfig,
}

impl Cluster {
    pub fn new(config: &HarnessConfig, executor: CommandExecutor) -> Self {
        Self::with_binary(
            config.cluster.kubectl_binary.to_string_lossy(),
            config.base_cli_args(),
            executor,
            config.timeouts.clone(),
        )
    }

    /// Use an explicit binary and leading arguments
    pub fn with_binary(
        kubectl: impl Into<String>,
        base_args: Vec<String>,
        executor: CommandExecutor,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            executor,
            kubectl: kubectl.into(),
            base_args,
            timeouts,
        }
    }

    /// Run kubectl with the base arguments prepended
    pub async fn kubectl(&self, args: &[&str]) -> HarnessResult<CommandOutput> {
        let mut argv = Vec::with_capacity(1 + self.base_args.len() + args.len());
        argv.push(self.kubectl.clone());
        argv.extend(self.base_args.iter().cloned());
        argv.extend(args.iter().map(|a| a.to_string()));
        self.executor.run_default(&argv).await
    }

    pub async fn create_namespace(&self, name: &str) -> HarnessResult<()> {
        self.kubectl(&["create", "namespace", name]).await?.into_success()?;
        info!("Created namespace {}", name);
        Ok(())
    }

    pub async fn delete_namespace(&self, name: &str) -> HarnessResult<DeleteStatus> {
        self.delete_resource("namespace", name, None).await
    }

    /// `status.phase` of a namespace, None when it does not exist
    pub async fn namespace_phase(&self, name: &str) -> HarnessResult<Option<String>> {
        let out = self
            .kubectl(&["get", "namespace", name, "-o", "jsonpath={.status.phase}"])
            .await?;
        if out.success() {
            return Ok(Some(out.stdout.trim().to_string()));
        }
        if ErrorCategory::classify(&out.stderr) == ErrorCategory::NotFound {
            return Ok(None);
        }
        out.into_success().map(|_| None)
    }

    pub async fn namespace_exists(&self, name: &str) -> HarnessResult<bool> {
        Ok(self.namespace_phase(name).await?.is_some())
    }

    pub async fn service_account_exists(&self, namespace: &str, name: &str) -> HarnessResult<bool> {
        self.resource_exists("serviceaccount", name, Some(namespace)).await
    }

    pub async fn resource_exists(
        &self,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
    ) -> HarnessResult<bool> {
        let mut args = vec!["get", kubectl_resource(kind), name, "-o", "name"];
        if let Some(ns) = namespace {
            args.extend(["-n", ns]);
        }
        let out = self.kubectl(&args).await?;
        if out.success() {
            return Ok(true);
        }
        if ErrorCategory::classify(&out.stderr) == ErrorCategory::NotFound {
            return Ok(false);
        }
        out.into_success().map(|_| false)
    }

    /// Request deletion without waiting for finalizers
    pub async fn delete_resource(
        &self,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
    ) -> HarnessResult<DeleteStatus> {
        let mut args = vec!["delete", kubectl_resource(kind), name, "--wait=false"];
        if let Some(ns) = namespace {
            args.extend(["-n", ns]);
        }
        let out = self.kubectl(&args).await?;
        if out.success() {
            return Ok(DeleteStatus::Deleted);
        }
        if ErrorCategory::classify(&out.stderr) == ErrorCategory::NotFound {
            debug!("{} {} already gone", kind, name);
            return Ok(DeleteStatus::AlreadyGone);
        }
        out.into_success().map(|_| DeleteStatus::Deleted)
    }

    fn interval(&self) -> Duration {
        self.timeouts.poll_interval()
    }

    pub async fn wait_namespace_active(&self, name: &str) -> HarnessResult<()> {
        let condition = format!("namespace {} to be Active", name);
        poller::wait_for(&condition, self.timeouts.namespace_active(), self.interval(), || async move {
            Ok(match self.namespace_phase(name).await? {
                Some(phase) if phase == "Active" => Probe::Ready(()),
                Some(phase) => Probe::pending(format!("phase={}", phase)),
                None => Probe::pending("not found"),
            })
        })
        .await?;
        Ok(())
    }

    pub async fn wait_namespace_gone(&self, name: &str) -> HarnessResult<()> {
        let condition = format!("namespace {} to be deleted", name);
        poller::wait_for(&condition, self.timeouts.namespace_deleted(), self.interval(), || async move {
            Ok(match self.namespace_phase(name).await? {
                None => Probe::Ready(()),
                Some(phase) => Probe::pending(format!("phase={}", phase)),
            })
        })
        .await?;
        Ok(())
    }

    /// Active and with its `default` service account provisioned
    pub async fn wait_namespace_usable(&self, name: &str) -> HarnessResult<()> {
        self.wait_namespace_active(name).await?;
        let condition = format!("default service account in {}", name);
        poller::wait_for(&condition, self.timeouts.namespace_active(), self.interval(), || async move {
            Ok(if self.service_account_exists(name, "default").await? {
                Probe::Ready(())
            } else {
                Probe::pending("serviceaccount/default not found")
            })
        })
        .await?;
        Ok(())
    }

    pub async fn wait_resource_gone(
        &self,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
    ) -> HarnessResult<()> {
        let condition = format!("{} {} to be deleted", kind, name);
        poller::wait_for(&condition, self.timeouts.resource_ready(), self.interval(), || async move {
            Ok(if self.resource_exists(kind, name, namespace).await? {
                Probe::pending("still present")
            } else {
                Probe::Ready(())
            })
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceDeleter for Cluster {
    async fn delete(&self, resource: &TrackedResource) -> HarnessResult<DeleteStatus> {
        self.delete_resource(&resource.kind, &resource.name, resource.namespace.as_deref())
            .await
    }
}

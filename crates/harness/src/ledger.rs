//! Resource ledger
//!
//! Every cluster object a run creates is recorded here the moment its creation is
//! requested, before anything checks whether the creation worked. Teardown walks the
//! ledger and deletes each entry, continuing past failures.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::HarnessResult;

/// A cluster object scheduled for deletion at teardown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedResource {
    /// Lowercase kind as kubectl accepts it (`provider`, `plan`, `namespace`, ...)
    pub kind: String,
    pub name: String,
    /// None for cluster-scoped kinds
    pub namespace: Option<String>,
    /// Position in tracking order
    pub sequence: u64,
}

impl TrackedResource {
    fn same_object(&self, kind: &str, name: &str, namespace: Option<&str>) -> bool {
        self.kind == kind && self.name == name && self.namespace.as_deref() == namespace
    }
}

impl std::fmt::Display for TrackedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{} in {}", self.kind, self.name, ns),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Result of one successful delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    Deleted,
    AlreadyGone,
}

/// Deletes tracked objects from the cluster
#[async_trait]
pub trait ResourceDeleter: Send + Sync {
    async fn delete(&self, resource: &TrackedResource) -> HarnessResult<DeleteStatus>;
}

/// Outcome of releasing one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ReleaseOutcome {
    Deleted,
    AlreadyGone,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub resource: TrackedResource,
    pub outcome: ReleaseOutcome,
}

/// Kind ranking for dependency-aware teardown.
///
/// Kinds earlier in the list are deleted first; unranked kinds go after every
/// ranked one, in tracking order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOrder {
    ranks: Vec<String>,
}

impl DeletionOrder {
    pub fn new<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ranks: kinds.into_iter().map(|k| k.into().to_ascii_lowercase()).collect(),
        }
    }

    fn rank(&self, kind: &str) -> usize {
        self.ranks
            .iter()
            .position(|k| k == kind)
            .unwrap_or(self.ranks.len())
    }
}

impl Default for DeletionOrder {
    /// Dependents before what they reference, namespace last
    fn default() -> Self {
        Self::new([
            "plan",
            "migration",
            "hook",
            "networkmap",
            "storagemap",
            "host",
            "provider",
            "secret",
            "namespace",
        ])
    }
}

/// Ordered record of created objects
#[derive(Debug, Default)]
pub struct ResourceLedger {
    inner: Mutex<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: Vec<TrackedResource>,
    next_sequence: u64,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an object. Tracking the same object twice is a no-op; returns whether
    /// a new entry was added.
    pub fn track(&self, kind: &str, name: &str, namespace: Option<&str>) -> bool {
        let kind = kind.to_ascii_lowercase();
        let mut state = self.inner.lock();
        if state.entries.iter().any(|r| r.same_object(&kind, name, namespace)) {
            return false;
        }
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.push(TrackedResource {
            kind,
            name: name.to_string(),
            namespace: namespace.map(String::from),
            sequence,
        });
        true
    }

    /// Forget an object a scenario already deleted itself
    pub fn untrack(&self, kind: &str, name: &str, namespace: Option<&str>) -> bool {
        let kind = kind.to_ascii_lowercase();
        let mut state = self.inner.lock();
        let before = state.entries.len();
        state.entries.retain(|r| !r.same_object(&kind, name, namespace));
        state.entries.len() != before
    }

    pub fn contains(&self, kind: &str, name: &str, namespace: Option<&str>) -> bool {
        let kind = kind.to_ascii_lowercase();
        self.inner
            .lock()
            .entries
            .iter()
            .any(|r| r.same_object(&kind, name, namespace))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot in tracking order
    pub fn tracked(&self) -> Vec<TrackedResource> {
        self.inner.lock().entries.clone()
    }

    /// Delete every entry in tracking order.
    ///
    /// Each entry is attempted exactly once and yields exactly one outcome. Entries are
    /// drained up front, so a second call only sees objects tracked since.
    pub async fn release_all(&self, deleter: &dyn ResourceDeleter) -> Vec<Release> {
        let entries = self.drain();
        release(entries, deleter).await
    }

    /// Delete every entry ranked by kind, tracking order within a kind
    pub async fn release_all_ordered(
        &self,
        deleter: &dyn ResourceDeleter,
        order: &DeletionOrder,
    ) -> Vec<Release> {
        let mut entries = self.drain();
        entries.sort_by_key(|r| (order.rank(&r.kind), r.sequence));
        release(entries, deleter).await
    }

    fn drain(&self) -> Vec<TrackedResource> {
        std::mem::take(&mut self.inner.lock().entries)
    }
}

async fn release(entries: Vec<TrackedResource>, deleter: &dyn ResourceDeleter) -> Vec<Release> {
    if !entries.is_empty() {
        info!("Releasing {} tracked resource(s)", entries.len());
    }

    let mut releases = Vec::with_capacity(entries.len());
    for resource in entries {
        let outcome = match deleter.delete(&resource).await {
            Ok(DeleteStatus::Deleted) => {
                info!("Deleted {}", resource);
                ReleaseOutcome::Deleted
            }
            Ok(DeleteStatus::AlreadyGone) => {
                info!("Already gone: {}", resource);
                ReleaseOutcome::AlreadyGone
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", resource, e);
                ReleaseOutcome::Failed(e.to_string())
            }
        };
        releases.push(Release { resource, outcome });
    }
    releases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;

    /// Fails for names listed in `failing`, reports names in `gone` as already deleted
    #[derive(Default)]
    struct ScriptedDeleter {
        failing: Vec<&'static str>,
        gone: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResourceDeleter for ScriptedDeleter {
        async fn delete(&self, resource: &TrackedResource) -> HarnessResult<DeleteStatus> {
            self.calls.lock().push(format!("{}/{}", resource.kind, resource.name));
            if self.failing.contains(&resource.name.as_str()) {
                Err(HarnessError::CommandFailed {
                    command: "kubectl delete".to_string(),
                    exit_code: 1,
                    stderr: "the server is currently unable to handle the request".to_string(),
                })
            } else if self.gone.contains(&resource.name.as_str()) {
                Ok(DeleteStatus::AlreadyGone)
            } else {
                Ok(DeleteStatus::Deleted)
            }
        }
    }

    #[test]
    fn test_track_is_idempotent() {
        let ledger = ResourceLedger::new();
        assert!(ledger.track("Provider", "src", Some("ns")));
        assert!(!ledger.track("provider", "src", Some("ns")));
        assert!(ledger.track("provider", "src", Some("other")));
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains("PROVIDER", "src", Some("ns")));
    }

    #[test]
    fn test_untrack() {
        let ledger = ResourceLedger::new();
        ledger.track("plan", "p1", Some("ns"));
        assert!(ledger.untrack("plan", "p1", Some("ns")));
        assert!(!ledger.untrack("plan", "p1", Some("ns")));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_every_entry_attempted_despite_failures() {
        let ledger = ResourceLedger::new();
        for name in ["a", "b", "c", "d", "e"] {
            ledger.track("provider", name, Some("ns"));
        }
        let deleter = ScriptedDeleter {
            failing: vec!["b", "d"],
            gone: vec!["e"],
            ..Default::default()
        };

        let releases = ledger.release_all(&deleter).await;

        assert_eq!(releases.len(), 5);
        assert_eq!(deleter.calls.lock().len(), 5);
        let failed = releases
            .iter()
            .filter(|r| matches!(r.outcome, ReleaseOutcome::Failed(_)))
            .count();
        assert_eq!(failed, 2);
        assert_eq!(releases[4].outcome, ReleaseOutcome::AlreadyGone);
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_release_is_fifo_and_reentrant() {
        let ledger = ResourceLedger::new();
        ledger.track("namespace", "ns", None);
        ledger.track("provider", "src", Some("ns"));
        ledger.track("plan", "p1", Some("ns"));

        let deleter = ScriptedDeleter::default();
        ledger.release_all(&deleter).await;
        assert_eq!(
            *deleter.calls.lock(),
            vec!["namespace/ns", "provider/src", "plan/p1"]
        );

        let again = ledger.release_all(&deleter).await;
        assert!(again.is_empty());
        assert_eq!(deleter.calls.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_ordered_release_ranks_kinds() {
        let ledger = ResourceLedger::new();
        ledger.track("namespace", "ns", None);
        ledger.track("provider", "src", Some("ns"));
        ledger.track("virtualmachine", "vm1", Some("ns"));
        ledger.track("plan", "p1", Some("ns"));
        ledger.track("provider", "dst", Some("ns"));

        let deleter = ScriptedDeleter::default();
        ledger
            .release_all_ordered(&deleter, &DeletionOrder::default())
            .await;
        assert_eq!(
            *deleter.calls.lock(),
            vec![
                "plan/p1",
                "provider/src",
                "provider/dst",
                "namespace/ns",
                "virtualmachine/vm1",
            ]
        );
    }
}

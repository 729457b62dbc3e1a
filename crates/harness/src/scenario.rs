//! Scenario registry and orderer
//!
//! Scenarios are registered once, sorted by priority (registration order breaks ties)
//! into an execution plan, and run one at a time against the shared
//! [`SessionContext`]. Teardown runs after the last scenario no matter how the run
//! went.

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::context::{Fixture, SessionContext};
use crate::error::{ErrorKind, HarnessError, HarnessResult};
use crate::ledger::DeletionOrder;
use crate::report::{Outcome, RunReport, ScenarioReport, SkipReason};

/// Future returned by a scenario body
pub type ScenarioFuture<'a> = BoxFuture<'a, HarnessResult<()>>;

type RunFn = Box<dyn for<'a> Fn(&'a mut SessionContext) -> ScenarioFuture<'a> + Send + Sync>;

/// One named, prioritized test step
pub struct Scenario {
    name: String,
    priority: i32,
    fixtures: Vec<Fixture>,
    tags: BTreeSet<String>,
    fatal: bool,
    run: RunFn,
}

impl Scenario {
    pub fn new<F>(name: impl Into<String>, priority: i32, run: F) -> Self
    where
        F: for<'a> Fn(&'a mut SessionContext) -> ScenarioFuture<'a> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            priority,
            fixtures: Vec::new(),
            tags: BTreeSet::new(),
            fatal: false,
            run: Box::new(run),
        }
    }

    pub fn requires(mut self, fixture: Fixture) -> Self {
        self.fixtures.push(fixture);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// A failure of this scenario stops the run
    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("fixtures", &self.fixtures)
            .field("tags", &self.tags)
            .field("fatal", &self.fatal)
            .finish()
    }
}

/// Which scenarios a run executes. Fatal scenarios run regardless.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Run only scenarios carrying at least one of these tags (empty = all)
    pub include_tags: Vec<String>,
    /// Never run scenarios carrying any of these tags
    pub exclude_tags: Vec<String>,
    /// Run only scenarios whose name contains this substring
    pub name_filter: Option<String>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn selects(&self, scenario: &Scenario) -> bool {
        if let Some(filter) = &self.name_filter {
            if !scenario.name.contains(filter.as_str()) {
                return false;
            }
        }
        if self.exclude_tags.iter().any(|t| scenario.tags.contains(t)) {
            return false;
        }
        self.include_tags.is_empty() || self.include_tags.iter().any(|t| scenario.tags.contains(t))
    }
}

/// Registered scenarios and the teardown order for their resources
#[derive(Default)]
pub struct ScenarioRegistry {
    scenarios: Vec<Scenario>,
    deletion_order: DeletionOrder,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deletion_order(mut self, order: DeletionOrder) -> Self {
        self.deletion_order = order;
        self
    }

    pub fn register(&mut self, scenario: Scenario) {
        self.scenarios.push(scenario);
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Scenario names in execution order
    pub fn plan(&self) -> Vec<(i32, &str)> {
        let mut plan: Vec<(i32, &str)> = self
            .scenarios
            .iter()
            .map(|s| (s.priority, s.name.as_str()))
            .collect();
        plan.sort_by_key(|(priority, _)| *priority);
        plan
    }

    /// Run every scenario once, in order, then tear down
    pub async fn run_all(self, ctx: &mut SessionContext, selection: &Selection) -> RunReport {
        let ScenarioRegistry {
            mut scenarios,
            deletion_order,
        } = self;
        // stable: equal priorities keep registration order
        scenarios.sort_by_key(|s| s.priority);

        let started_at = Utc::now();
        let run_start = Instant::now();
        let mut aborted_by: Option<String> = None;
        let mut reports = Vec::with_capacity(scenarios.len());

        info!("Running {} scenario(s)", scenarios.len());

        for scenario in &scenarios {
            let start = Instant::now();
            let outcome = match skip_reason(scenario, ctx, selection, aborted_by.as_deref()) {
                Some(reason) => Outcome::Skipped { reason },
                None => {
                    let outcome = run_one(scenario, ctx).await;
                    if let Outcome::Failed { kind, .. } = &outcome {
                        if scenario.fatal || *kind == ErrorKind::Transport {
                            error!(scenario = %scenario.name, "Fatal failure, skipping the rest of the run");
                            aborted_by = Some(scenario.name.clone());
                        }
                    }
                    outcome
                }
            };

            if let Outcome::Skipped { reason } = &outcome {
                info!(scenario = %scenario.name, "Skipped: {}", reason);
            }

            reports.push(ScenarioReport {
                name: scenario.name.clone(),
                priority: scenario.priority,
                outcome,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let cleanup = ctx.teardown(&deletion_order).await;
        let report = RunReport::new(
            started_at,
            run_start.elapsed().as_millis() as u64,
            reports,
            aborted_by,
            cleanup,
        );

        for warning in &report.cleanup_warnings {
            warn!("Cleanup: {}", warning);
        }
        info!(
            "Run finished: {} passed, {} failed, {} skipped",
            report.passed, report.failed, report.skipped
        );
        report
    }
}

fn skip_reason(
    scenario: &Scenario,
    ctx: &SessionContext,
    selection: &Selection,
    aborted_by: Option<&str>,
) -> Option<SkipReason> {
    if let Some(by) = aborted_by {
        return Some(SkipReason::Aborted { by: by.to_string() });
    }
    // the gate runs whatever the selection
    if !scenario.fatal && !selection.selects(scenario) {
        return Some(SkipReason::Deselected);
    }
    ctx.missing_fixture(&scenario.fixtures)
        .map(SkipReason::MissingFixture)
}

async fn run_one(scenario: &Scenario, ctx: &mut SessionContext) -> Outcome {
    info!(scenario = %scenario.name, priority = scenario.priority, "Starting scenario");
    ctx.enter_scenario(&scenario.name);
    let result = AssertUnwindSafe((scenario.run)(&mut *ctx)).catch_unwind().await;
    ctx.exit_scenario();

    match result {
        Ok(Ok(())) => {
            info!(scenario = %scenario.name, "Passed");
            Outcome::Passed
        }
        Ok(Err(HarnessError::Skipped(reason))) => Outcome::Skipped {
            reason: SkipReason::SelfSkipped(reason),
        },
        Ok(Err(e @ HarnessError::MissingPrerequisite { .. })) => Outcome::Skipped {
            reason: SkipReason::MissingPrerequisite(e.to_string()),
        },
        Ok(Err(e)) => {
            let kind = e.kind();
            error!(scenario = %scenario.name, kind = %kind, "Failed: {}", e);
            Outcome::Failed {
                error: e.to_string(),
                kind,
            }
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "scenario panicked".to_string());
            error!(scenario = %scenario.name, "Panicked: {}", message);
            Outcome::Failed {
                error: format!("panic: {}", message),
                kind: ErrorKind::Harness,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: &mut SessionContext) -> ScenarioFuture<'_> {
        Box::pin(async { Ok(()) })
    }

    #[test]
    fn test_plan_is_stable_by_priority() {
        let mut registry = ScenarioRegistry::new();
        registry.register(Scenario::new("late", 50, noop));
        registry.register(Scenario::new("first-tie", 10, noop));
        registry.register(Scenario::new("gate", 0, noop));
        registry.register(Scenario::new("second-tie", 10, noop));
        let names: Vec<&str> = registry.plan().into_iter().map(|(_, n)| n).collect();
        assert_eq!(names, vec!["gate", "first-tie", "second-tie", "late"]);
    }

    #[test]
    fn test_selection() {
        let scenario = Scenario::new("create_vsphere_provider", 21, noop)
            .tag("tool")
            .tag("external");

        assert!(Selection::all().selects(&scenario));

        let only_cli = Selection {
            include_tags: vec!["cli".to_string()],
            ..Selection::default()
        };
        assert!(!only_cli.selects(&scenario));

        let no_external = Selection {
            exclude_tags: vec!["external".to_string()],
            ..Selection::default()
        };
        assert!(!no_external.selects(&scenario));

        let by_name = Selection {
            name_filter: Some("vsphere".to_string()),
            ..Selection::default()
        };
        assert!(by_name.selects(&scenario));
    }
}

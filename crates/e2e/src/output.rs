//! Terminal summary of a run

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mtv_harness::{Outcome, ReleaseOutcome, RunReport};

/// One row per scenario, in execution order
pub fn scenario_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["Priority", "Scenario", "Result", "Time", "Detail"]);
    for scenario in &report.scenarios {
        let detail = match &scenario.outcome {
            Outcome::Passed => String::new(),
            Outcome::Failed { error, kind } => format!("[{}] {}", kind, error),
            Outcome::Skipped { reason } => reason.to_string(),
        };
        table.add_row(vec![
            scenario.priority.to_string(),
            scenario.name.clone(),
            scenario.outcome.label().to_string(),
            format!("{}ms", scenario.duration_ms),
            detail,
        ]);
    }
    table
}

/// Teardown releases, or None when nothing was tracked
pub fn cleanup_table(report: &RunReport) -> Option<Table> {
    if report.cleanup.is_empty() {
        return None;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["Resource", "Cleanup"]);
    for release in &report.cleanup {
        let outcome = match &release.outcome {
            ReleaseOutcome::Deleted => "deleted".to_string(),
            ReleaseOutcome::AlreadyGone => "already gone".to_string(),
            ReleaseOutcome::Failed(reason) => format!("failed: {}", reason),
        };
        table.add_row(vec![release.resource.to_string(), outcome]);
    }
    Some(table)
}

/// Counts line printed under the tables
pub fn summary_line(report: &RunReport) -> String {
    let mut line = format!(
        "{} scenario(s): {} passed, {} failed, {} skipped in {:.1}s",
        report.total,
        report.passed,
        report.failed,
        report.skipped,
        report.duration_ms as f64 / 1000.0
    );
    if let Some(by) = &report.aborted_by {
        line.push_str(&format!(" (aborted by {})", by));
    }
    if !report.cleanup_warnings.is_empty() {
        line.push_str(&format!(", {} cleanup warning(s)", report.cleanup_warnings.len()));
    }
    line
}

pub fn print_report(report: &RunReport) {
    println!("{}", scenario_table(report));
    if let Some(cleanup) = cleanup_table(report) {
        println!("{}", cleanup);
    }
    println!("{}", summary_line(report));
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtv_harness::ledger::TrackedResource;
    use mtv_harness::report::ScenarioReport;
    use mtv_harness::{ErrorKind, Release, SkipReason};

    fn report() -> RunReport {
        let scenario = |name: &str, priority, outcome| ScenarioReport {
            name: name.to_string(),
            priority,
            outcome,
            duration_ms: 12,
        };
        RunReport::new(
            chrono::Utc::now(),
            1500,
            vec![
                scenario("version", 0, Outcome::Passed),
                scenario(
                    "create_plan",
                    40,
                    Outcome::Failed {
                        error: "plan not listed".to_string(),
                        kind: ErrorKind::Assertion,
                    },
                ),
                scenario(
                    "create_host",
                    35,
                    Outcome::Skipped {
                        reason: SkipReason::MissingFixture("no ESXi host credentials configured".to_string()),
                    },
                ),
            ],
            None,
            vec![Release {
                resource: TrackedResource {
                    kind: "plan".to_string(),
                    name: "p1".to_string(),
                    namespace: Some("demo".to_string()),
                    sequence: 0,
                },
                outcome: ReleaseOutcome::Failed("forbidden".to_string()),
            }],
        )
    }

    #[test]
    fn test_summary_line() {
        assert_eq!(
            summary_line(&report()),
            "3 scenario(s): 1 passed, 1 failed, 1 skipped in 1.5s, 1 cleanup warning(s)"
        );
    }

    #[test]
    fn test_tables_render_details() {
        let report = report();
        let scenarios = scenario_table(&report).to_string();
        assert!(scenarios.contains("[assertion] plan not listed"));
        assert!(scenarios.contains("missing fixture"));

        let cleanup = cleanup_table(&report).unwrap().to_string();
        assert!(cleanup.contains("plan/p1 in demo"));
        assert!(cleanup.contains("failed: forbidden"));
    }
}

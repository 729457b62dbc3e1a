//! MTV E2E Harness
//!
//! Orchestration core for end-to-end runs against kubectl-mtv and its MCP tool server:
//! - Orders scenarios by priority and runs them against one shared context
//! - Calls MCP tools over streamable HTTP with typed failures
//! - Runs kubectl / kubectl-mtv with captured output and hard timeouts
//! - Polls eventually-consistent cluster state
//! - Tracks created resources and releases them at teardown
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ScenarioRegistry                                           │
//! │    ├── register(Scenario)                                   │
//! │    └── run_all(&mut SessionContext, &Selection) -> RunReport│
//! ├─────────────────────────────────────────────────────────────┤
//! │  SessionContext                                             │
//! │    ├── session() -> McpSession      (lazy, shared)          │
//! │    ├── cli() -> CliRunner           (lazy base args)        │
//! │    ├── publish / require            (write-once values)     │
//! │    ├── track / untrack -> ResourceLedger                    │
//! │    └── teardown(DeletionOrder) -> [Release]                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  McpClient · CommandExecutor · Cluster · poller::wait_until │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod cli;
pub mod cluster;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod flags;
pub mod ledger;
pub mod mcp;
pub mod poller;
pub mod report;
pub mod scenario;

pub use cli::CliRunner;
pub use cluster::Cluster;
pub use config::HarnessConfig;
pub use context::{Fixture, ProviderKind, SessionContext, SharedKey};
pub use error::{ErrorCategory, ErrorKind, HarnessError, HarnessResult};
pub use executor::{CommandExecutor, CommandOutput};
pub use flags::{FlagValue, ToolCommand};
pub use ledger::{DeletionOrder, Release, ReleaseOutcome, ResourceDeleter, ResourceLedger};
pub use mcp::{McpClient, McpSession, SessionHeaders, ToolResult};
pub use poller::{wait_for, wait_until, Probe};
pub use report::{Outcome, ReportFormat, RunReport, SkipReason};
pub use scenario::{Scenario, ScenarioFuture, ScenarioRegistry, Selection};

/// Harness version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

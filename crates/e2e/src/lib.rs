//! MTV E2E Suite
//!
//! Scenarios exercising kubectl-mtv and its MCP tool server against a live cluster,
//! registered on the harness orderer:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  0   version                 (fatal gate)                   │
//! │  5   namespace_lifecycle     10 namespace_setup             │
//! │  15  mcp_ready               16 mcp_help                    │
//! │  20  providers ── publish provider.target / .source         │
//! │  30  inventory ── publish inventory.vm, create_host         │
//! │  40  plans     ── publish plan.name, mappings, ready        │
//! │  50  health    60 invalid-token reads (tool and CLI)        │
//! │  90  delete_plan                                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  teardown: plan, migration, hook, maps, host, provider, ns  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod keys;
pub mod output;
pub mod scenarios;

pub use scenarios::suite;

//! Values scenarios publish for later ones, with the scenario expected to publish each

use mtv_harness::SharedKey;

/// Name of the openshift (`host`) provider migrations land on
pub const PROVIDER_TARGET: SharedKey = SharedKey::new("provider.target", "create_openshift_provider");

/// Name of the vSphere provider VMs come from
pub const PROVIDER_SOURCE: SharedKey = SharedKey::new("provider.source", "create_vsphere_provider");

/// A VM discovered in the source provider's inventory
pub const INVENTORY_VM: SharedKey = SharedKey::new("inventory.vm", "inventory_vms");

pub const PLAN_NAME: SharedKey = SharedKey::new("plan.name", "create_plan");

/// Target provider name; an openshift provider without a URL points at the local cluster
pub const TARGET_PROVIDER_NAME: &str = "host";

pub const SOURCE_PROVIDER_NAME: &str = "mtv-e2e-vsphere";

pub const PLAN: &str = "mtv-e2e-plan";

/// Token the authentication scenarios present instead of the real one
pub const BOGUS_TOKEN: &str = "sha256~mtv-e2e-invalid-token";

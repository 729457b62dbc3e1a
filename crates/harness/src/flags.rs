//! Typed commands and flags for kubectl-mtv
//!
//! A [`ToolCommand`] is a command string ("create provider") plus a validated set of
//! flags. Each command family accepts a closed set of option names; anything else is
//! rejected when the flag is set, long before it reaches the CLI or the tool server.
//! The same value renders to the MCP wire mapping and to a CLI argument vector.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{HarnessError, HarnessResult};

/// A flag value. `Bool(false)` is distinct from the flag being absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Str(String),
    List(Vec<String>),
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Bool(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::Str(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        FlagValue::Str(value)
    }
}

impl From<&String> for FlagValue {
    fn from(value: &String) -> Self {
        FlagValue::Str(value.clone())
    }
}

impl From<Vec<String>> for FlagValue {
    fn from(value: Vec<String>) -> Self {
        FlagValue::List(value)
    }
}

impl From<&[&str]> for FlagValue {
    fn from(value: &[&str]) -> Self {
        FlagValue::List(value.iter().map(|s| s.to_string()).collect())
    }
}

/// Command verbs kubectl-mtv understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Get,
    Describe,
    Create,
    Delete,
    Patch,
    Start,
    Cancel,
    Archive,
    Health,
    Version,
    Help,
}

impl Verb {
    fn parse(word: &str) -> Option<Self> {
        Some(match word {
            "get" => Verb::Get,
            "describe" => Verb::Describe,
            "create" => Verb::Create,
            "delete" => Verb::Delete,
            "patch" => Verb::Patch,
            "start" => Verb::Start,
            "cancel" => Verb::Cancel,
            "archive" => Verb::Archive,
            "health" => Verb::Health,
            "version" => Verb::Version,
            "help" => Verb::Help,
            _ => return None,
        })
    }

    /// Whether the command takes a resource word after the verb
    fn takes_resource(self) -> bool {
        !matches!(self, Verb::Health | Verb::Version | Verb::Help)
    }
}

const RESOURCES: &[&str] = &[
    "provider",
    "plan",
    "mapping",
    "host",
    "hook",
    "inventory",
];

const COMMON_FLAGS: &[&str] = &["namespace", "all-namespaces", "output"];

const GET_FLAGS: &[&str] = &["name", "query", "watch", "provider", "inventory-url", "vms"];
const DESCRIBE_FLAGS: &[&str] = &["name", "with-vms"];
const DELETE_FLAGS: &[&str] = &["name", "all", "skip-archive", "wait"];

const CREATE_PROVIDER_FLAGS: &[&str] = &[
    "name",
    "type",
    "url",
    "username",
    "password",
    "token",
    "cacert",
    "provider-insecure-skip-tls",
    "vddk-init-image",
    "sdk-endpoint",
];

const CREATE_PLAN_FLAGS: &[&str] = &[
    "name",
    "source",
    "target",
    "vms",
    "network-mapping",
    "storage-mapping",
    "network-pairs",
    "storage-pairs",
    "target-namespace",
    "migration-type",
    "description",
    "pre-hook",
    "post-hook",
];

const CREATE_MAPPING_FLAGS: &[&str] = &["name", "source", "target", "network-pairs", "storage-pairs"];

const CREATE_HOST_FLAGS: &[&str] = &[
    "name",
    "provider",
    "username",
    "password",
    "existing-secret",
    "ip-address",
    "network-adapter",
    "host-insecure-skip-tls",
];

const CREATE_HOOK_FLAGS: &[&str] = &["name", "image", "playbook", "service-account", "deadline"];

const LIFECYCLE_FLAGS: &[&str] = &["name", "cutover"];
const HEALTH_FLAGS: &[&str] = &["skip-logs", "verbose-checks"];
const HELP_FLAGS: &[&str] = &["machine", "short"];

/// Flags accepted by a verb/resource pair, or None when the pair is not a known command
fn family_flags(verb: Verb, resource: Option<&str>) -> Option<&'static [&'static str]> {
    Some(match (verb, resource) {
        (Verb::Get, Some(_)) => GET_FLAGS,
        (Verb::Describe, Some(r)) if r != "inventory" => DESCRIBE_FLAGS,
        (Verb::Delete, Some(r)) if r != "inventory" => DELETE_FLAGS,
        (Verb::Create | Verb::Patch, Some("provider")) => CREATE_PROVIDER_FLAGS,
        (Verb::Create | Verb::Patch, Some("plan")) => CREATE_PLAN_FLAGS,
        (Verb::Create | Verb::Patch, Some("mapping")) => CREATE_MAPPING_FLAGS,
        (Verb::Create, Some("host")) => CREATE_HOST_FLAGS,
        (Verb::Create, Some("hook")) => CREATE_HOOK_FLAGS,
        (Verb::Start | Verb::Cancel | Verb::Archive, Some("plan")) => LIFECYCLE_FLAGS,
        (Verb::Health, None) => HEALTH_FLAGS,
        (Verb::Version, None) => &[],
        (Verb::Help, _) => HELP_FLAGS,
        _ => return None,
    })
}

/// A validated command with its flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCommand {
    command: String,
    verb: Verb,
    #[serde(skip)]
    allowed: &'static [&'static str],
    flags: BTreeMap<String, FlagValue>,
}

impl ToolCommand {
    /// Parse and validate a command string such as `"get inventory vm"`
    pub fn new(command: &str) -> HarnessResult<Self> {
        let words: Vec<&str> = command.split_whitespace().collect();
        let unknown = || HarnessError::UnknownCommand(command.to_string());

        let verb = words.first().and_then(|w| Verb::parse(w)).ok_or_else(unknown)?;
        let resource = if verb.takes_resource() {
            let resource = words.get(1).copied().ok_or_else(unknown)?;
            if !RESOURCES.contains(&resource) {
                return Err(unknown());
            }
            Some(resource)
        } else {
            None
        };
        let allowed = family_flags(verb, resource).ok_or_else(unknown)?;

        Ok(Self {
            command: words.join(" "),
            verb,
            allowed,
            flags: BTreeMap::new(),
        })
    }

    /// Build a command and set every flag in one go
    pub fn with_flags<I, K, V>(command: &str, flags: I) -> HarnessResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FlagValue>,
    {
        let mut cmd = Self::new(command)?;
        for (key, value) in flags {
            cmd.insert(key.as_ref(), value)?;
        }
        Ok(cmd)
    }

    /// Set a flag, consuming and returning the command for chaining
    pub fn flag(mut self, key: &str, value: impl Into<FlagValue>) -> HarnessResult<Self> {
        self.insert(key, value)?;
        Ok(self)
    }

    /// Set a flag in place
    pub fn insert(&mut self, key: &str, value: impl Into<FlagValue>) -> HarnessResult<()> {
        if !self.allowed.contains(&key) && !COMMON_FLAGS.contains(&key) {
            return Err(HarnessError::UnknownFlag {
                command: self.command.clone(),
                flag: key.to_string(),
            });
        }
        self.flags.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn get(&self, key: &str) -> Option<&FlagValue> {
        self.flags.get(key)
    }

    /// The `name` flag as a string, if set
    pub fn name(&self) -> Option<&str> {
        match self.flags.get("name") {
            Some(FlagValue::Str(name)) => Some(name),
            _ => None,
        }
    }

    /// Flags as the generic mapping sent to the tool server
    pub fn wire_flags(&self) -> serde_json::Value {
        let map = self
            .flags
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap_or(serde_json::Value::Null)))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Command words followed by flags, as kubectl-mtv expects them.
    ///
    /// `name` is positional; `true` renders as a bare switch, `false` as `--flag=false`,
    /// lists are comma-joined.
    pub fn cli_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.command.split(' ').map(String::from).collect();
        if let Some(name) = self.name() {
            args.push(name.to_string());
        }
        for (key, value) in &self.flags {
            if key == "name" && matches!(value, FlagValue::Str(_)) {
                continue;
            }
            match value {
                FlagValue::Bool(true) => args.push(format!("--{}", key)),
                FlagValue::Bool(false) => args.push(format!("--{}=false", key)),
                FlagValue::Str(s) => {
                    args.push(format!("--{}", key));
                    args.push(s.clone());
                }
                FlagValue::List(items) => {
                    args.push(format!("--{}", key));
                    args.push(items.join(","));
                }
            }
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(ToolCommand::new("get provider").unwrap().verb(), Verb::Get);
        assert_eq!(ToolCommand::new("  create   plan ").unwrap().command(), "create plan");
        assert_eq!(ToolCommand::new("get inventory vm").unwrap().command(), "get inventory vm");
        assert_eq!(ToolCommand::new("version").unwrap().verb(), Verb::Version);
        assert_eq!(ToolCommand::new("help create plan").unwrap().verb(), Verb::Help);
    }

    #[test]
    fn test_reject_unknown_commands() {
        assert!(matches!(
            ToolCommand::new("explode provider"),
            Err(HarnessError::UnknownCommand(_))
        ));
        assert!(ToolCommand::new("get").is_err());
        assert!(ToolCommand::new("get pods").is_err());
        assert!(ToolCommand::new("create inventory").is_err());
        assert!(ToolCommand::new("").is_err());
    }

    #[test]
    fn test_reject_unknown_flags_early() {
        let err = ToolCommand::new("create provider")
            .unwrap()
            .flag("vms", "vm1")
            .unwrap_err();
        assert!(matches!(err, HarnessError::UnknownFlag { ref flag, .. } if flag == "vms"));

        let cmd = ToolCommand::new("create plan").unwrap().flag("vms", "vm1,vm2").unwrap();
        assert_eq!(cmd.get("vms"), Some(&FlagValue::Str("vm1,vm2".to_string())));
    }

    #[test]
    fn test_common_flags_accepted_everywhere() {
        ToolCommand::new("get plan")
            .unwrap()
            .flag("namespace", "ns1")
            .unwrap()
            .flag("output", "json")
            .unwrap();
        ToolCommand::new("health").unwrap().flag("all-namespaces", true).unwrap();
    }

    #[test]
    fn test_false_is_distinct_from_absent() {
        let cmd = ToolCommand::with_flags(
            "create provider",
            [("name", FlagValue::from("p1")), ("provider-insecure-skip-tls", false.into())],
        )
        .unwrap();
        let wire = cmd.wire_flags();
        assert_eq!(wire["provider-insecure-skip-tls"], serde_json::Value::Bool(false));
        assert!(wire.get("cacert").is_none());

        let args = cmd.cli_args();
        assert!(args.contains(&"--provider-insecure-skip-tls=false".to_string()));
    }

    #[test]
    fn test_cli_args_rendering() {
        let cmd = ToolCommand::new("create plan")
            .unwrap()
            .flag("name", "p1")
            .unwrap()
            .flag("source", "src")
            .unwrap()
            .flag("vms", vec!["vm1".to_string(), "vm2".to_string()])
            .unwrap()
            .flag("namespace", "ns")
            .unwrap();
        assert_eq!(
            cmd.cli_args(),
            vec![
                "create", "plan", "p1", "--namespace", "ns", "--source", "src", "--vms", "vm1,vm2"
            ]
        );
    }

    #[test]
    fn test_wire_flags_shapes() {
        let cmd = ToolCommand::with_flags(
            "create plan",
            [
                ("name", FlagValue::from("p1")),
                ("vms", FlagValue::from(&["a", "b"][..])),
            ],
        )
        .unwrap();
        assert_eq!(
            cmd.wire_flags(),
            serde_json::json!({"name": "p1", "vms": ["a", "b"]})
        );
    }
}

//! Tool implementations and dispatch
//!
//! Tools are the only side-effecting capabilities the agent may invoke.
//! The registry resolves names against a fixed whitelist, validates
//! argument presence, and converts every tool failure into an
//! `ERROR:`-tagged observation string at the boundary.

pub mod fs;
pub mod math;

use crate::error::AgentError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

pub use fs::{ReadFile, Sandbox, WriteFile, MAX_READ_CHARS};
pub use math::{Calc, FindNumber};

/// A capability the agent may invoke.
///
/// Implementations must be `Send + Sync` so they can be shared with the
/// async loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The whitelisted tool name (e.g. "read_file")
    fn name(&self) -> &str;

    /// A brief description of what the tool does
    fn description(&self) -> &str;

    /// Invocation shape shown to the model
    fn usage(&self) -> &str;

    /// Argument keys that must be present. Extra keys are ignored.
    fn required_args(&self) -> &[&str];

    /// Execute the tool with the provided arguments
    async fn call(&self, args: &Map<String, Value>) -> Result<String, AgentError>;
}

/// Pull a required string argument out of a tool's argument map.
///
/// Non-string scalars are accepted and stringified, mirroring how loose
/// model output tends to arrive.
pub(crate) fn require_str(
    tool: &str,
    args: &Map<String, Value>,
    key: &str,
) -> Result<String, AgentError> {
    match args.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        _ => Err(AgentError::InvalidArgument {
            tool: tool.to_string(),
            key: key.to_string(),
        }),
    }
}

/// The fixed table of whitelisted tools.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Build the standard registry over one sandbox root.
    pub fn standard(root: &Path) -> Self {
        let sandbox = Sandbox::new(root);
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(ReadFile::new(sandbox.clone())),
            Box::new(WriteFile::new(sandbox)),
            Box::new(Calc),
            Box::new(FindNumber),
        ];

        let mut map = BTreeMap::new();
        for tool in tools {
            map.insert(tool.name().to_string(), tool);
        }
        ToolRegistry { tools: map }
    }

    /// Whether `name` is a whitelisted tool.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Presence-only schema validation: `name` must be whitelisted and
    /// `args` must carry every required key. Extra keys are permitted.
    pub fn validate(&self, name: &str, args: &Map<String, Value>) -> bool {
        match self.tools.get(name) {
            Some(tool) => tool.required_args().iter().all(|k| args.contains_key(*k)),
            None => false,
        }
    }

    /// Run a tool and normalize the outcome to a string.
    ///
    /// Unknown names and every tool error come back as an `ERROR:`-tagged
    /// result; the caller never observes a raised error from a tool body.
    pub async fn dispatch(&self, name: &str, args: &Map<String, Value>) -> String {
        let Some(tool) = self.tools.get(name) else {
            return format!("ERROR: unknown tool '{name}'");
        };
        tracing::debug!(tool = name, "dispatching tool");
        match tool.call(args).await {
            Ok(result) => result,
            Err(e) => e.to_observation(),
        }
    }

    /// Tool contract lines for the loop's system prompt.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for tool in self.tools.values() {
            out.push_str(&format!("- {}: {}\n", tool.usage(), tool.description()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> (ToolRegistry, TempDir) {
        let dir = TempDir::new().unwrap();
        (ToolRegistry::standard(dir.path()), dir)
    }

    fn args_with(key: &str, value: &str) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert(key.to_string(), Value::String(value.to_string()));
        m
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_string() {
        let (reg, _dir) = registry();
        let result = reg.dispatch("launch_missiles", &Map::new()).await;
        assert_eq!(result, "ERROR: unknown tool 'launch_missiles'");
    }

    #[tokio::test]
    async fn missing_argument_is_caught_pre_execution() {
        let (reg, _dir) = registry();
        let result = reg.dispatch("read_file", &Map::new()).await;
        assert_eq!(result, "ERROR: missing argument 'path' for read_file");
    }

    #[test]
    fn validation_checks_presence_only() {
        let (reg, _dir) = registry();
        let mut args = args_with("expr", "1+1");
        args.insert("unexpected".into(), Value::Bool(true));
        assert!(reg.validate("calc", &args));
        assert!(!reg.validate("calc", &Map::new()));
        assert!(!reg.validate("no_such_tool", &args));

        let mut write_args = args_with("path", "a.txt");
        assert!(!reg.validate("write_file", &write_args));
        write_args.insert("text".into(), Value::String("hi".into()));
        assert!(reg.validate("write_file", &write_args));
    }

    #[test]
    fn every_whitelisted_tool_has_a_schema() {
        let (reg, _dir) = registry();
        for name in ["read_file", "write_file", "calc", "find_number"] {
            assert!(reg.contains(name), "{name} missing from registry");
        }
    }
}

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

/// Result of executing one tool, as data.
///
/// Tool failures are values, not exceptions: the loop controller folds both
/// variants into its transcript without any per-call error handling.
///
/// # Examples
///
/// ```
/// use corvus_tools::ToolOutcome;
///
/// let ok = ToolOutcome::Ok(serde_json::json!({"count": 2}));
/// assert!(ok.is_ok());
/// assert_eq!(ok.to_envelope()["success"], true);
///
/// let err = ToolOutcome::Err("tool 'nope' not found".into());
/// assert_eq!(err.to_envelope()["success"], false);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The tool ran and produced a payload.
    Ok(serde_json::Value),
    /// The tool was missing or its capability reported an error.
    Err(String),
}

impl ToolOutcome {
    /// Returns `true` for the success variant.
    pub fn is_ok(&self) -> bool {
        matches!(self, ToolOutcome::Ok(_))
    }

    /// The payload of a successful outcome, if any.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            ToolOutcome::Ok(value) => Some(value),
            ToolOutcome::Err(_) => None,
        }
    }

    /// Serialize to the `{success, result|error}` wire envelope recorded in
    /// the transcript and step log.
    pub fn to_envelope(&self) -> serde_json::Value {
        match self {
            ToolOutcome::Ok(result) => serde_json::json!({
                "success": true,
                "result": result,
            }),
            ToolOutcome::Err(error) => serde_json::json!({
                "success": false,
                "error": error,
            }),
        }
    }
}

/// A capability bound to a registered tool.
///
/// Implementations deserialize their own arguments and report failures as
/// `Err(message)` — never by panicking. Capabilities that perform network
/// I/O are the registry's only suspension points.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Run the capability against JSON arguments.
    async fn invoke(&self, args: &serde_json::Value) -> Result<serde_json::Value, String>;
}

/// A named, schema-described tool the agent can call.
pub struct Tool {
    /// Unique name, the registry key.
    pub name: String,
    /// Human-readable description shown to the reasoning engine.
    pub description: String,
    /// JSON-schema parameter declaration:
    /// `{"type":"object","properties":{...},"required":[...]}`.
    pub parameters: serde_json::Value,
    capability: Box<dyn Capability>,
}

impl Tool {
    /// Bind a capability to a name, description, and parameter schema.
    pub fn new(
        name: &str,
        description: &str,
        parameters: serde_json::Value,
        capability: Box<dyn Capability>,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            capability,
        }
    }

    /// Function-calling declaration for the reasoning engine.
    pub fn to_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Registry of tools available to the agent.
///
/// Owned by whoever constructs the agent — there is no process-wide tool
/// table. Names are unique; re-registering a name replaces the tool.
/// Iteration order is name order, which keeps the schema catalog stable.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Tool>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its name.
    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Registered tool names, in name order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Function-calling declarations for every registered tool.
    pub fn tool_schemas(&self) -> Vec<serde_json::Value> {
        self.tools.values().map(Tool::to_schema).collect()
    }

    /// Execute a tool by name.
    ///
    /// Never returns an error upward: an unknown name or a failing capability
    /// both come back as [`ToolOutcome::Err`].
    pub async fn execute_tool(&self, name: &str, args: &serde_json::Value) -> ToolOutcome {
        let Some(tool) = self.tools.get(name) else {
            return ToolOutcome::Err(format!("tool '{name}' not found"));
        };
        match tool.capability.invoke(args).await {
            Ok(payload) => ToolOutcome::Ok(payload),
            Err(message) => ToolOutcome::Err(message),
        }
    }
}

/// Deserialize tool arguments, mapping failure into the capability error
/// message format used across the built-ins.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(
    tool: &str,
    args: &serde_json::Value,
) -> Result<T, String> {
    serde_json::from_value(args.clone()).map_err(|e| format!("invalid arguments for {tool}: {e}"))
}

/// Serialize a typed payload into the outcome value.
pub(crate) fn to_payload<T: Serialize>(payload: &T) -> Result<serde_json::Value, String> {
    serde_json::to_value(payload).map_err(|e| e.to_string())
}

//! Object store with reference passing and lazy exploration for LLM tool
//! results.
//!
//! Tool outputs in an agent loop are often far larger than the model needs
//! to see: a list of 300 pipelines, a 40 KB log, a deeply nested config.
//! `refstash` keeps those outputs in an in-process [`ObjectStore`] and gives
//! the model a short preview with an id instead:
//!
//! ```text
//! @obj_003 → list (300 items)
//!
//! [0] {"name":"rag-prod","status":"DEPLOYED"}
//! [1] {"name":"rag-dev","status":"DRAFT"}
//! ...
//! … 275 more items (300 total)
//! ```
//!
//! The model can then look closer with the `fetch_object`, `fetch_slice`, and
//! `search_object` tools, or pass the object (or a part of it) straight into
//! another tool as `@obj_003.0.name` without copying it through the context.
//!
//! # Getting started
//!
//! ```ignore
//! use refstash::prelude::*;
//!
//! let explorer = refstash::memory::build(MemoryConfig::default());
//! explorer.store().spawn_sweeper();
//!
//! let tools = ToolSet::new()
//!     .with_arg_validation(true)
//!     .with_store_tools(&explorer)
//!     .with_memory_tool(list_pipelines, MemoryMode::Explorable, &explorer)
//!     .with_memory_tool(deploy_pipeline, MemoryMode::Referenceable, &explorer);
//!
//! let preview = tools.execute("list_pipelines", r#"{"workspace": "prod"}"#).await;
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`memory`] | [`ObjectStore`], path expressions, [`Explorer`], reference resolution, tool combinators |
//! | [`tools`] | [`Tool`](tools::core::Tool) trait, [`ToolSet`](tools::core::ToolSet), store-access tools, failure reflection |
//!
//! [`ObjectStore`]: memory::ObjectStore
//! [`Explorer`]: memory::Explorer

pub mod memory;
pub mod prelude;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` for a type implementing
/// `schemars::JsonSchema`, in the shape the function-calling API expects.
///
/// # Example
///
/// ```
/// use refstash::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct FetchArgs {
///     object_id: String,
///     #[serde(default)]
///     path: String,
/// }
///
/// let schema = json_schema_for::<FetchArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"object_id".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Tool definitions ───────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition sent to the API (OpenAI function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// Names of the declared parameters.
    pub fn parameter_names(&self) -> Vec<String> {
        self.function
            .parameters
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool call as it arrives from the model or over stdio.
///
/// `arguments` may be a JSON object or a string holding one (the
/// chat-completions wire format).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Arguments as the raw JSON string [`Tool::execute`](tools::core::Tool::execute) takes.
    pub fn arguments_json(&self) -> String {
        match &self.arguments {
            serde_json::Value::String(raw) => raw.clone(),
            serde_json::Value::Null => "{}".to_string(),
            other => other.to_string(),
        }
    }
}

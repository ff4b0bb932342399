//! Agent-facing tools for reading stored objects.
//!
//! - `fetch_object(object_id, path = "")`: preview of an object or a part of it.
//! - `fetch_slice(object_id, start = 0, end = null, path = "")`: exact window
//!   of a list or string.
//! - `search_object(object_id, query, path = "", limit = 20)`: paths whose key
//!   or value contains a query.
//!
//! All three return plain text. Failures are returned as `Error from tool
//! ...` text with recovery hints, never as a panic or a protocol error.

use super::core::{Tool, ToolFuture, ToolSet, parse_tool_args};
use super::reflection::describe_failure;
use crate::memory::{Explorer, RenderMode};
use crate::{ToolDef, json_schema_for};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub const FETCH_OBJECT: &str = "fetch_object";
pub const FETCH_SLICE: &str = "fetch_slice";
pub const SEARCH_OBJECT: &str = "search_object";

/// Default number of matches returned by `search_object`.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

// ── Plain functions ────────────────────────────────────────────────

/// Render a stored object, or the part of it at `path`.
pub fn fetch_object(explorer: &Explorer, object_id: &str, path: &str) -> String {
    explorer
        .render(object_id, path)
        .unwrap_or_else(|e| describe_failure(FETCH_OBJECT, &e))
}

/// Render elements `[start, end)` of the list or string at `path`.
///
/// Negative bounds are treated as 0; `end = None` means "to the end".
pub fn fetch_slice(
    explorer: &Explorer,
    object_id: &str,
    start: i64,
    end: Option<i64>,
    path: &str,
) -> String {
    let start = clamp_bound(start);
    let end = end.map(clamp_bound);
    explorer
        .slice(object_id, start, end, path)
        .unwrap_or_else(|e| describe_failure(FETCH_SLICE, &e))
}

/// List paths under `path` whose key or value contains `query`.
pub fn search_object(
    explorer: &Explorer,
    object_id: &str,
    query: &str,
    path: &str,
    limit: usize,
) -> String {
    explorer
        .search(object_id, query, path, limit)
        .unwrap_or_else(|e| describe_failure(SEARCH_OBJECT, &e))
}

fn clamp_bound(bound: i64) -> usize {
    usize::try_from(bound.max(0)).unwrap_or(usize::MAX)
}

// ── fetch_object ───────────────────────────────────────────────────

/// Arguments for `fetch_object`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FetchObjectArgs {
    /// Id of the stored object, e.g. "obj_001". A leading "@" is accepted.
    pub object_id: String,
    /// Path inside the object, e.g. "items.0.name" or "meta[\"a.b\"]".
    /// Leave empty for the whole object.
    #[serde(default)]
    pub path: String,
    /// Rendering: "preview" (default), "tree" for the structure outline, or
    /// "json" for raw JSON.
    #[serde(default)]
    pub mode: Option<String>,
}

/// Preview a stored object.
#[derive(Debug, Clone)]
pub struct FetchObject {
    explorer: Arc<Explorer>,
}

impl FetchObject {
    pub fn new(explorer: Arc<Explorer>) -> Self {
        Self { explorer }
    }
}

impl Tool for FetchObject {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            FETCH_OBJECT,
            "Show a stored tool result (or part of it) by object id. Long lists \
             and strings are truncated; the header gives full sizes. Use a path to \
             drill into nested values, e.g. path=\"items.0\".",
            json_schema_for::<FetchObjectArgs>(),
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let args = parse_tool_args::<FetchObjectArgs>(arguments);
        Box::pin(async move {
            let args = match args {
                Ok(a) => a,
                Err(e) => return e,
            };
            match args.mode.as_deref().map(str::parse::<RenderMode>) {
                None => fetch_object(&self.explorer, &args.object_id, &args.path),
                Some(Ok(mode)) => self
                    .explorer
                    .render_with_mode(&args.object_id, &args.path, mode)
                    .unwrap_or_else(|e| describe_failure(FETCH_OBJECT, &e)),
                Some(Err(e)) => format!("Error: {e}"),
            }
        })
    }
}

// ── fetch_slice ────────────────────────────────────────────────────

/// Arguments for `fetch_slice`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FetchSliceArgs {
    /// Id of the stored object, e.g. "obj_001". A leading "@" is accepted.
    pub object_id: String,
    /// First index to include (0-based).
    #[serde(default)]
    pub start: i64,
    /// Index to stop before. Omit to read to the end.
    #[serde(default)]
    pub end: Option<i64>,
    /// Path to the list or string inside the object. Empty for the object itself.
    #[serde(default)]
    pub path: String,
}

/// Read an exact window of a stored list or string.
#[derive(Debug, Clone)]
pub struct FetchSlice {
    explorer: Arc<Explorer>,
}

impl FetchSlice {
    pub fn new(explorer: Arc<Explorer>) -> Self {
        Self { explorer }
    }
}

impl Tool for FetchSlice {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            FETCH_SLICE,
            "Read items [start, end) of a stored list, or characters [start, end) \
             of a stored string. Out-of-range bounds are clamped. Use this to page \
             through results that fetch_object truncated.",
            json_schema_for::<FetchSliceArgs>(),
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let args = parse_tool_args::<FetchSliceArgs>(arguments);
        Box::pin(async move {
            match args {
                Ok(a) => fetch_slice(&self.explorer, &a.object_id, a.start, a.end, &a.path),
                Err(e) => e,
            }
        })
    }
}

// ── search_object ──────────────────────────────────────────────────

fn default_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

/// Arguments for `search_object`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchObjectArgs {
    /// Id of the stored object, e.g. "obj_001". A leading "@" is accepted.
    pub object_id: String,
    /// Text to look for in keys and values (case-insensitive).
    pub query: String,
    /// Only search below this path. Empty for the whole object.
    #[serde(default)]
    pub path: String,
    /// Maximum number of matches to list.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Find where a key or value occurs in a stored object.
#[derive(Debug, Clone)]
pub struct SearchObject {
    explorer: Arc<Explorer>,
}

impl SearchObject {
    pub fn new(explorer: Arc<Explorer>) -> Self {
        Self { explorer }
    }
}

impl Tool for SearchObject {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            SEARCH_OBJECT,
            "Search a stored object for keys or values containing a text \
             (case-insensitive). Each match is printed as a reference such as \
             @obj_001.items.3.name that can be passed to other tools.",
            json_schema_for::<SearchObjectArgs>(),
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let args = parse_tool_args::<SearchObjectArgs>(arguments);
        Box::pin(async move {
            match args {
                Ok(a) => {
                    debug!("Searching {} for '{}'", a.object_id, a.query);
                    search_object(&self.explorer, &a.object_id, &a.query, &a.path, a.limit)
                }
                Err(e) => e,
            }
        })
    }
}

impl ToolSet {
    /// Register `fetch_object`, `fetch_slice`, and `search_object`.
    pub fn with_store_tools(self, explorer: &Arc<Explorer>) -> Self {
        self.with(FetchObject::new(explorer.clone()))
            .with(FetchSlice::new(explorer.clone()))
            .with(SearchObject::new(explorer.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ExplorerConfig, ObjectStore, StoreConfig};
    use serde_json::json;

    fn explorer() -> Arc<Explorer> {
        let store = Arc::new(ObjectStore::new(StoreConfig::default()));
        Arc::new(Explorer::new(store, ExplorerConfig::default()))
    }

    #[test]
    fn plain_functions_render_and_report() {
        let ex = explorer();
        ex.store().put(json!({"a": {"b": [10, 20, 30]}}));
        assert!(fetch_object(&ex, "obj_001", "a.b").starts_with("@obj_001.a.b → list (3 items)"));
        let missing = fetch_object(&ex, "obj_042", "");
        assert!(missing.starts_with("Error from tool 'fetch_object': object 'obj_042' not found"));
        assert!(fetch_slice(&ex, "obj_001", -3, Some(1), "a.b").contains("[0] 10"));
    }

    #[test]
    fn negative_end_yields_empty_slice() {
        let ex = explorer();
        ex.store().put(json!([1, 2, 3]));
        assert!(fetch_slice(&ex, "@obj_001", 0, Some(-1), "").contains("(empty slice)"));
    }

    #[tokio::test]
    async fn toolset_dispatches_store_tools() {
        let ex = explorer();
        ex.store().put(json!({"users": [{"name": "Alice"}, {"name": "Bob"}]}));
        let tools = ToolSet::new()
            .with_arg_validation(true)
            .with_store_tools(&ex);
        assert_eq!(tools.names(), vec![FETCH_OBJECT, FETCH_SLICE, SEARCH_OBJECT]);

        let fetched = tools
            .execute(FETCH_OBJECT, r#"{"object_id": "obj_001", "path": "users.1"}"#)
            .await;
        assert!(fetched.contains("name: \"Bob\""));

        let sliced = tools
            .execute(FETCH_SLICE, r#"{"object_id": "obj_001", "start": 1, "path": "users"}"#)
            .await;
        assert!(sliced.contains("[1:2]"));

        let found = tools
            .execute(SEARCH_OBJECT, r#"{"object_id": "obj_001", "query": "alice"}"#)
            .await;
        assert!(found.contains("@obj_001.users.0.name"));
    }

    #[tokio::test]
    async fn fetch_object_modes() {
        let ex = explorer();
        ex.store().put(json!({"a": [1]}));
        let tool = FetchObject::new(ex);
        let tree = tool.execute(r#"{"object_id": "obj_001", "mode": "tree"}"#).await;
        assert!(tree.contains("a: list (1 item)"));
        let bad = tool.execute(r#"{"object_id": "obj_001", "mode": "fancy"}"#).await;
        assert!(bad.starts_with("Error: unknown render mode"));
    }

    #[tokio::test]
    async fn slice_of_map_is_reported() {
        let ex = explorer();
        ex.store().put(json!({"a": {"b": 1}}));
        let out = FetchSlice::new(ex)
            .execute(r#"{"object_id": "obj_001", "path": "a"}"#)
            .await;
        assert!(out.contains("only lists and strings can be sliced"));
        assert!(out.contains("Use fetch_object"));
    }

    #[test]
    fn definitions_expose_parameters() {
        let ex = explorer();
        let def = FetchSlice::new(ex).definition();
        let props = &def.function.parameters["properties"];
        for name in ["object_id", "start", "end", "path"] {
            assert!(props.get(name).is_some(), "{name}");
        }
        assert_eq!(def.function.parameters["required"], json!(["object_id"]));
    }
}

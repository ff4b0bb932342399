//! Wrappers that add store-on-output and resolve-on-input to a tool.
//!
//! A tool with structured output implements [`ValueTool`]. Wrapping it with
//! [`explorable`] stores every result and hands the agent a compact preview;
//! [`referenceable`] lets the agent pass `@obj_NNN.path` in place of any
//! argument value. Every wrapper reports the wrapped tool's definition
//! unchanged, so the agent sees the same name, description, and parameters.
//!
//! ```ignore
//! let explorer = Arc::new(Explorer::new(store, ExplorerConfig::default()));
//! let list = explorable(list_pipelines, explorer.clone());
//! let deploy = referenceable(deploy_pipeline, explorer.store().clone());
//!
//! let listed = list.invoke(json!({"workspace": "prod"})).await?;
//! deploy.invoke(json!({"config": format!("{}.items.0", listed.reference())})).await?;
//! ```

use super::error::MemoryError;
use super::explorable::Explorable;
use super::explorer::Explorer;
use super::resolver::ReferenceResolver;
use super::store::ObjectStore;
use super::value::Value;
use crate::ToolDef;
use crate::tools::core::{Tool, ToolFuture, parse_tool_args, validate_arguments_value};
use crate::tools::reflection::describe_failure;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Boxed future returned by [`ValueTool::call`].
pub type ValueFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, String>> + Send + 'a>>;

/// Boxed future returned by [`ValueTool::try_call`].
pub type MemoryFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, MemoryError>> + Send + 'a>>;

// ── ValueTool ──────────────────────────────────────────────────────

/// A tool whose result is a structured [`Value`] rather than text.
pub trait ValueTool: Send + Sync {
    fn definition(&self) -> ToolDef;

    /// Run the tool on parsed JSON arguments.
    fn call(&self, arguments: serde_json::Value) -> ValueFuture<'_>;

    /// Like [`call`](Self::call), but a memory failure inside a wrapper
    /// keeps its [`MemoryError`] kind instead of collapsing to text.
    fn try_call(&self, arguments: serde_json::Value) -> MemoryFuture<'_> {
        let fut = self.call(arguments);
        Box::pin(async move { fut.await.map_err(MemoryError::Tool) })
    }

    fn name(&self) -> String {
        self.definition().function.name.clone()
    }

    /// Whether `call` resolves `@obj_NNN` references itself.
    fn resolves_references(&self) -> bool {
        false
    }
}

impl<T: ValueTool + ?Sized> ValueTool for Box<T> {
    fn definition(&self) -> ToolDef {
        (**self).definition()
    }

    fn call(&self, arguments: serde_json::Value) -> ValueFuture<'_> {
        (**self).call(arguments)
    }

    fn try_call(&self, arguments: serde_json::Value) -> MemoryFuture<'_> {
        (**self).try_call(arguments)
    }

    fn resolves_references(&self) -> bool {
        (**self).resolves_references()
    }
}

/// Parse a raw arguments string for the `Tool` side of a wrapper.
fn parse_arguments(tool_name: &str, arguments: &str) -> Result<serde_json::Value, String> {
    let trimmed = arguments.trim();
    if trimmed.is_empty() {
        return Ok(serde_json::Value::Object(Default::default()));
    }
    parse_tool_args(trimmed).map_err(|e| format!("{e} (tool '{tool_name}')"))
}

// ── FnValueTool ────────────────────────────────────────────────────

type ErasedValueHandler = Box<dyn Fn(serde_json::Value) -> ValueFuture<'static> + Send + Sync>;

/// A closure-based [`ValueTool`] with typed arguments.
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct ListArgs { workspace: String }
///
/// let tool = FnValueTool::new(
///     ToolDef::new("list_pipelines", "List pipelines", json_schema_for::<ListArgs>()),
///     |args: ListArgs| async move { Ok(fetch_pipelines(&args.workspace).await?) },
/// );
/// ```
pub struct FnValueTool {
    def: ToolDef,
    handler: ErasedValueHandler,
}

impl FnValueTool {
    pub fn new<A, V, F, Fut>(def: ToolDef, handler: F) -> Self
    where
        A: serde::de::DeserializeOwned + Send + 'static,
        V: Into<Value> + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, String>> + Send + 'static,
    {
        let erased = move |raw: serde_json::Value| -> ValueFuture<'static> {
            match serde_json::from_value::<A>(raw) {
                Ok(args) => {
                    let fut = handler(args);
                    Box::pin(async move { fut.await.map(Into::into) })
                }
                Err(e) => Box::pin(async move { Err(format!("invalid tool arguments: {e}")) }),
            }
        };
        Self {
            def,
            handler: Box::new(erased),
        }
    }
}

impl ValueTool for FnValueTool {
    fn definition(&self) -> ToolDef {
        self.def.clone()
    }

    fn call(&self, arguments: serde_json::Value) -> ValueFuture<'_> {
        (self.handler)(arguments)
    }
}

impl fmt::Debug for FnValueTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValueTool")
            .field("name", &self.def.function.name)
            .finish()
    }
}

// ── TextTool ───────────────────────────────────────────────────────

/// Adapts a string-returning [`Tool`] into a [`ValueTool`].
///
/// Output that parses as a JSON object or array becomes a navigable value;
/// anything else is kept as text. Output starting with `Error:` is a failure.
#[derive(Debug)]
pub struct TextTool<T> {
    inner: T,
}

impl<T: Tool> TextTool<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: Tool> ValueTool for TextTool<T> {
    fn definition(&self) -> ToolDef {
        self.inner.definition()
    }

    fn call(&self, arguments: serde_json::Value) -> ValueFuture<'_> {
        let raw = arguments.to_string();
        Box::pin(async move {
            let output = self.inner.execute(&raw).await;
            if let Some(message) = output.strip_prefix("Error:") {
                return Err(message.trim().to_string());
            }
            let trimmed = output.trim_start();
            if (trimmed.starts_with('{') || trimmed.starts_with('['))
                && let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed)
            {
                return Ok(Value::from_json(json));
            }
            Ok(Value::Text(output))
        })
    }
}

// ── PlainTool ──────────────────────────────────────────────────────

/// A [`ValueTool`] exposed as a [`Tool`] with no memory behavior: the result
/// is returned in full as text or pretty JSON.
#[derive(Debug)]
pub struct PlainTool<T> {
    inner: T,
}

impl<T: ValueTool> PlainTool<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: ValueTool> Tool for PlainTool<T> {
    fn definition(&self) -> ToolDef {
        self.inner.definition()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_arguments(&self.inner.name(), arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(args) => args,
                Err(e) => return e,
            };
            match self.inner.try_call(args).await {
                Ok(value) => value.to_text(),
                Err(e) => describe_failure(&self.inner.name(), &e),
            }
        })
    }

    fn resolves_references(&self) -> bool {
        self.inner.resolves_references()
    }
}

// ── ExplorableTool ─────────────────────────────────────────────────

/// Stores every successful result and returns it as an [`Explorable`].
pub struct ExplorableTool<T> {
    inner: T,
    explorer: Arc<Explorer>,
}

impl<T: ValueTool> ExplorableTool<T> {
    pub fn new(inner: T, explorer: Arc<Explorer>) -> Self {
        Self { inner, explorer }
    }

    /// Call the wrapped tool and store its result.
    ///
    /// A failing call stores nothing and surfaces as [`MemoryError::Tool`].
    pub async fn invoke(
        &self,
        arguments: serde_json::Value,
    ) -> Result<Explorable<Value>, MemoryError> {
        let value = self.inner.try_call(arguments).await?;
        let explorable = self.explorer.explorable_value(value);
        debug!("Stored result of {} as {}", self.inner.name(), explorable.id());
        Ok(explorable)
    }
}

impl<T: ValueTool> Tool for ExplorableTool<T> {
    fn definition(&self) -> ToolDef {
        self.inner.definition()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_arguments(&self.inner.name(), arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(args) => args,
                Err(e) => return e,
            };
            match self.invoke(args).await {
                Ok(explorable) => explorable.to_string(),
                Err(e) => describe_failure(&self.inner.name(), &e),
            }
        })
    }

    fn resolves_references(&self) -> bool {
        self.inner.resolves_references()
    }
}

/// Composes as a `ValueTool`: the result is stored, and the raw value is
/// passed on.
impl<T: ValueTool> ValueTool for ExplorableTool<T> {
    fn definition(&self) -> ToolDef {
        self.inner.definition()
    }

    fn call(&self, arguments: serde_json::Value) -> ValueFuture<'_> {
        Box::pin(async move {
            self.invoke(arguments)
                .await
                .map(Explorable::into_value)
                .map_err(|e| e.to_string())
        })
    }

    fn try_call(&self, arguments: serde_json::Value) -> MemoryFuture<'_> {
        Box::pin(async move { self.invoke(arguments).await.map(Explorable::into_value) })
    }

    fn resolves_references(&self) -> bool {
        self.inner.resolves_references()
    }
}

impl<T> fmt::Debug for ExplorableTool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplorableTool")
            .field("explorer", &self.explorer)
            .finish_non_exhaustive()
    }
}

// ── ReferenceableTool ──────────────────────────────────────────────

/// Resolves `@obj_NNN[.path]` arguments before calling the wrapped tool.
pub struct ReferenceableTool<T> {
    inner: T,
    resolver: ReferenceResolver,
}

impl<T: ValueTool> ReferenceableTool<T> {
    pub fn new(inner: T, store: Arc<ObjectStore>) -> Self {
        Self {
            inner,
            resolver: ReferenceResolver::new(store),
        }
    }

    /// Resolve references, check the resolved arguments against the tool's
    /// schema, then call the tool.
    pub async fn invoke(&self, arguments: serde_json::Value) -> Result<Value, MemoryError> {
        let resolved = self.resolver.resolve_arguments(arguments)?;
        if let Some(error) = validate_arguments_value(&self.inner.definition(), &resolved) {
            let message = error.strip_prefix("Error: ").unwrap_or(&error).to_string();
            return Err(MemoryError::Tool(message));
        }
        self.inner.try_call(resolved).await
    }
}

impl<T: ValueTool> Tool for ReferenceableTool<T> {
    fn definition(&self) -> ToolDef {
        self.inner.definition()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_arguments(&self.inner.name(), arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(args) => args,
                Err(e) => return e,
            };
            match self.invoke(args).await {
                Ok(value) => value.to_text(),
                Err(e) => describe_failure(&self.inner.name(), &e),
            }
        })
    }

    fn resolves_references(&self) -> bool {
        true
    }
}

impl<T: ValueTool> ValueTool for ReferenceableTool<T> {
    fn definition(&self) -> ToolDef {
        self.inner.definition()
    }

    fn call(&self, arguments: serde_json::Value) -> ValueFuture<'_> {
        Box::pin(async move { self.invoke(arguments).await.map_err(|e| e.to_string()) })
    }

    fn try_call(&self, arguments: serde_json::Value) -> MemoryFuture<'_> {
        Box::pin(self.invoke(arguments))
    }

    fn resolves_references(&self) -> bool {
        true
    }
}

impl<T> fmt::Debug for ReferenceableTool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceableTool")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

// ── Constructors ───────────────────────────────────────────────────

/// Store results; hand back previews.
pub fn explorable<T: ValueTool>(tool: T, explorer: Arc<Explorer>) -> ExplorableTool<T> {
    ExplorableTool::new(tool, explorer)
}

/// Accept `@obj_NNN[.path]` in place of any argument value.
pub fn referenceable<T: ValueTool>(tool: T, store: Arc<ObjectStore>) -> ReferenceableTool<T> {
    ReferenceableTool::new(tool, store)
}

/// Resolve references on the way in, store the result on the way out.
pub fn explorable_and_referenceable<T: ValueTool>(
    tool: T,
    explorer: Arc<Explorer>,
) -> ExplorableTool<ReferenceableTool<T>> {
    let store = explorer.store().clone();
    ExplorableTool::new(ReferenceableTool::new(tool, store), explorer)
}

// ── MemoryMode ─────────────────────────────────────────────────────

/// Memory behavior chosen for a tool at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryMode {
    /// Plain tool: full output, no references.
    #[default]
    None,
    Explorable,
    Referenceable,
    Both,
}

impl MemoryMode {
    /// Wrap `tool` in the matching combinator.
    pub fn wrap<T: ValueTool + 'static>(self, tool: T, explorer: &Arc<Explorer>) -> Box<dyn Tool> {
        match self {
            MemoryMode::None => Box::new(PlainTool::new(tool)),
            MemoryMode::Explorable => Box::new(explorable(tool, explorer.clone())),
            MemoryMode::Referenceable => Box::new(referenceable(tool, explorer.store().clone())),
            MemoryMode::Both => Box::new(explorable_and_referenceable(tool, explorer.clone())),
        }
    }
}

impl fmt::Display for MemoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryMode::None => write!(f, "none"),
            MemoryMode::Explorable => write!(f, "explorable"),
            MemoryMode::Referenceable => write!(f, "referenceable"),
            MemoryMode::Both => write!(f, "both"),
        }
    }
}

impl FromStr for MemoryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "no_memory" => Ok(MemoryMode::None),
            "explorable" => Ok(MemoryMode::Explorable),
            "referenceable" => Ok(MemoryMode::Referenceable),
            "both" | "explorable_and_referenceable" => Ok(MemoryMode::Both),
            other => Err(format!(
                "unknown memory mode '{other}' (expected none, explorable, referenceable, or both)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_schema_for;
    use crate::memory::config::{ExplorerConfig, StoreConfig};
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, JsonSchema)]
    struct TotalArgs {
        /// Numbers to add up.
        values: Vec<i64>,
        /// Added to the sum.
        #[serde(default)]
        offset: i64,
    }

    fn total_tool() -> FnValueTool {
        FnValueTool::new(
            ToolDef::new("total", "Sum a list of numbers", json_schema_for::<TotalArgs>()),
            |args: TotalArgs| async move {
                Ok::<_, String>(Value::from(args.values.iter().sum::<i64>() + args.offset))
            },
        )
    }

    fn failing_tool() -> FnValueTool {
        FnValueTool::new(
            ToolDef::new("flaky", "Always fails", json!({"type": "object"})),
            |_: serde_json::Value| async move {
                Err::<Value, _>("upstream unavailable".to_string())
            },
        )
    }

    fn explorer() -> Arc<Explorer> {
        let store = Arc::new(ObjectStore::new(StoreConfig::default()));
        Arc::new(Explorer::new(store, ExplorerConfig::default()))
    }

    #[test]
    fn wrappers_preserve_definition() {
        let ex = explorer();
        let original = total_tool().definition();
        assert_eq!(Tool::definition(&explorable(total_tool(), ex.clone())), original);
        assert_eq!(
            ValueTool::definition(&referenceable(total_tool(), ex.store().clone())),
            original
        );
        assert_eq!(
            Tool::definition(&explorable_and_referenceable(total_tool(), ex.clone())),
            original
        );
        for mode in [
            MemoryMode::None,
            MemoryMode::Explorable,
            MemoryMode::Referenceable,
            MemoryMode::Both,
        ] {
            assert_eq!(mode.wrap(total_tool(), &ex).definition(), original, "{mode}");
        }
    }

    #[tokio::test]
    async fn explorable_stores_result() {
        let ex = explorer();
        let tool = explorable(total_tool(), ex.clone());
        let result = tool.invoke(json!({"values": [1, 2, 3]})).await.unwrap();
        assert_eq!(result.value(), &Value::from(6));
        assert_eq!(*ex.store().get(&result.id().to_string()).unwrap(), Value::from(6));

        let text = Tool::execute(&tool, r#"{"values": [4]}"#).await;
        assert!(text.starts_with("@obj_002 → int"));
    }

    #[tokio::test]
    async fn explorable_failure_stores_nothing() {
        let ex = explorer();
        let tool = explorable(failing_tool(), ex.clone());
        let err = tool.invoke(json!({})).await.unwrap_err();
        assert_eq!(err, MemoryError::Tool("upstream unavailable".into()));
        assert!(ex.store().is_empty());
        let text = Tool::execute(&tool, "{}").await;
        assert!(text.starts_with("Error from tool 'flaky': upstream unavailable"));
    }

    #[tokio::test]
    async fn reference_equals_literal() {
        let ex = explorer();
        let id = ex.store().put(json!({"a": {"b": [10, 20, 30]}}));
        let tool = referenceable(total_tool(), ex.store().clone());

        let via_reference = tool
            .invoke(json!({"values": format!("@{id}.a.b")}))
            .await
            .unwrap();
        let direct = total_tool().call(json!({"values": [10, 20, 30]})).await.unwrap();
        assert_eq!(via_reference, direct);
        assert_eq!(direct, Value::from(60));
    }

    #[tokio::test]
    async fn referenceable_surfaces_resolution_errors() {
        let ex = explorer();
        let tool = referenceable(total_tool(), ex.store().clone());
        let err = tool.invoke(json!({"values": "@obj_999"})).await.unwrap_err();
        assert_eq!(err.kind(), "reference_resolution");

        let text = Tool::execute(&tool, r#"{"values": "@obj_999"}"#).await;
        assert!(text.starts_with("Error from tool 'total'"));
        assert!(text.contains("'obj_999' not found"));
    }

    #[tokio::test]
    async fn referenceable_validates_resolved_arguments() {
        let ex = explorer();
        let id = ex.store().put(json!({"name": "not a list"}));
        let tool = referenceable(total_tool(), ex.store().clone());
        let err = tool
            .invoke(json!({"values": format!("@{id}.name")}))
            .await
            .unwrap_err();
        assert!(matches!(&err, MemoryError::Tool(m) if m.contains("validation failed")));
        assert!(Tool::resolves_references(&tool));
    }

    #[tokio::test]
    async fn nested_wrappers_keep_the_inner_error_kind() {
        let ex = explorer();
        let id = ex.store().put(json!({"note": "@obj_999"}));
        let echo = || {
            FnValueTool::new(
                ToolDef::new("echo", "Echo the arguments", json!({"type": "object"})),
                |args: serde_json::Value| async move {
                    Ok::<_, String>(Value::from_json(args))
                },
            )
        };

        // The outer wrapper resolves `@obj_001` to an object that itself
        // holds a dangling reference; the inner wrapper trips over it.
        let store = ex.store().clone();
        let twice = referenceable(referenceable(echo(), store.clone()), store.clone());
        let err = twice
            .try_call(json!({"x": format!("@{id}")}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "reference_resolution");
        assert!(err.to_string().contains("'obj_999' not found"));

        let stored_inside = referenceable(
            explorable(referenceable(echo(), store.clone()), ex.clone()),
            store.clone(),
        );
        let err = stored_inside
            .try_call(json!({"x": format!("@{id}")}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "reference_resolution");
        assert_eq!(ex.store().len(), 1);

        let plain = PlainTool::new(referenceable(echo(), store));
        let text = plain.execute(r#"{"x": "@obj_999"}"#).await;
        assert!(text.contains("Recovery:"), "{text}");
    }

    #[tokio::test]
    async fn both_resolves_then_stores() {
        let ex = explorer();
        let source = ex.store().put(json!([1, 2]));
        let tool = explorable_and_referenceable(total_tool(), ex.clone());
        let result = tool
            .invoke(json!({"values": format!("@{source}"), "offset": 10}))
            .await
            .unwrap();
        assert_eq!(result.value(), &Value::from(13));
        assert_eq!(result.id().to_string(), "obj_002");
        assert!(Tool::resolves_references(&tool));

        let err = tool.invoke(json!({"values": "@obj_404"})).await.unwrap_err();
        assert_eq!(err.kind(), "reference_resolution");
    }

    #[tokio::test]
    async fn text_tool_parses_json_output() {
        use crate::tools::core::FnTool;
        let listing = FnTool::new(
            ToolDef::new("list", "List", json!({"type": "object"})),
            |_: serde_json::Value| async move { r#"{"items": [1, 2]}"#.to_string() },
        );
        let failing = FnTool::new(
            ToolDef::new("broken", "Broken", json!({"type": "object"})),
            |_: serde_json::Value| async move { "Error: disk full".to_string() },
        );
        let value = TextTool::new(listing).call(json!({})).await.unwrap();
        assert_eq!(value.to_json(), json!({"items": [1, 2]}));
        let err = TextTool::new(failing).call(json!({})).await.unwrap_err();
        assert_eq!(err, "disk full");
    }

    #[tokio::test]
    async fn plain_mode_returns_full_output() {
        let ex = explorer();
        let tool = MemoryMode::None.wrap(total_tool(), &ex);
        assert_eq!(tool.execute(r#"{"values": [2, 3]}"#).await, "5");
        assert!(ex.store().is_empty());
    }

    #[test]
    fn memory_mode_parses() {
        assert_eq!("Both".parse::<MemoryMode>(), Ok(MemoryMode::Both));
        assert_eq!("no_memory".parse::<MemoryMode>(), Ok(MemoryMode::None));
        assert!("sometimes".parse::<MemoryMode>().is_err());
    }
}

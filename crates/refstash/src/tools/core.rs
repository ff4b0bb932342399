//! Tool abstraction and dispatch.
//!
//! A [`Tool`] is what the agent sees: a static definition (name,
//! description, JSON schema) and an async `execute` over raw JSON arguments
//! that always produces a string. A [`ToolSet`] owns the registered tools
//! and wraps every call in the same bounds: schema pre-check, timeout, and
//! result size.

use crate::ToolDef;
use crate::memory::{Explorer, MemoryMode, ValueTool};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Result size (in bytes) above which output is cut.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Per-call timeout used by the stdio host unless overridden.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Boxed future returned by [`Tool::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = String> + Send + 'a>>;

// ── Tool trait ─────────────────────────────────────────────────────

/// A function-calling tool.
///
/// Failures are reported in-band as `"Error: ..."` text; the agent reads
/// the string either way.
///
/// ```ignore
/// struct StoreSize(Arc<ObjectStore>);
///
/// impl Tool for StoreSize {
///     fn definition(&self) -> ToolDef {
///         ToolDef::new("store_size", "Count live objects", json!({"type": "object"}))
///     }
///
///     fn execute(&self, _arguments: &str) -> ToolFuture<'_> {
///         let live = self.0.len();
///         Box::pin(async move { format!("{live} live objects") })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDef;

    fn execute(&self, arguments: &str) -> ToolFuture<'_>;

    fn name(&self) -> String {
        self.definition().function.name
    }

    /// Whether arguments may contain `@obj_NNN` references that the tool
    /// resolves itself. [`ToolSet`] skips its schema pre-check for such
    /// tools, since a reference string stands in for a value of any type.
    fn resolves_references(&self) -> bool {
        false
    }
}

impl<T: Tool + ?Sized> Tool for Box<T> {
    fn definition(&self) -> ToolDef {
        (**self).definition()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        (**self).execute(arguments)
    }

    fn resolves_references(&self) -> bool {
        (**self).resolves_references()
    }
}

// ── ToolSet ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct CallBounds {
    max_result_bytes: usize,
    timeout: Option<Duration>,
    validate: bool,
}

/// Registered tools, keyed (and therefore listed) by name.
///
/// ```ignore
/// let explorer = refstash::memory::build(MemoryConfig::default());
/// let tools = ToolSet::new()
///     .with_arg_validation(true)
///     .with_store_tools(&explorer)
///     .with_memory_tool(list_pipelines, MemoryMode::Explorable, &explorer)
///     .with_memory_tool(deploy, MemoryMode::Referenceable, &explorer);
///
/// let preview = tools.execute("list_pipelines", r#"{"workspace": "prod"}"#).await;
/// ```
pub struct ToolSet {
    tools: BTreeMap<String, Box<dyn Tool>>,
    bounds: CallBounds,
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.names())
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl ToolSet {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            bounds: CallBounds {
                max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
                timeout: None,
                validate: false,
            },
        }
    }

    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.bounds.max_result_bytes = max;
        self
    }

    /// Check arguments against each tool's JSON schema before calling it.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.bounds.validate = enabled;
        self
    }

    /// `None` lets calls run unbounded.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.bounds.timeout = timeout;
        self
    }

    /// Replaces any tool already registered under the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_boxed(Box::new(tool));
    }

    pub fn register_boxed(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!("Tool {name} registered twice; keeping the latest");
        } else {
            debug!("Registered tool {name}");
        }
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    pub fn with_if(self, condition: bool, tool: impl Tool + 'static) -> Self {
        if condition { self.with(tool) } else { self }
    }

    /// Register a structured-output tool with the chosen memory behavior.
    pub fn with_memory_tool(
        mut self,
        tool: impl ValueTool + 'static,
        mode: MemoryMode,
        explorer: &Arc<Explorer>,
    ) -> Self {
        self.register_boxed(mode.wrap(tool, explorer));
        self
    }

    /// Definitions for the model, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run one call by name. Unknown names, rejected arguments, and
    /// timeouts come back as `Error:` text; output over the size bound is
    /// cut with a marker.
    pub async fn execute(&self, name: &str, arguments: &str) -> String {
        let Some(tool) = self.tools.get(name) else {
            return format!(
                "Error: unknown tool '{name}'. Registered tools: {}",
                self.names().join(", ")
            );
        };
        if let Some(rejection) = self.precheck(tool.as_ref(), arguments) {
            return rejection;
        }

        log_call(name, arguments);
        let started = Instant::now();
        let output = self.run_bounded(name, tool.as_ref(), arguments).await;
        debug!(
            "Tool {name} finished in {}ms ({} bytes)",
            started.elapsed().as_millis(),
            output.len()
        );
        trace!(
            "Tool {name} output: {}",
            output.chars().take(300).collect::<String>()
        );
        truncate_result(output, self.bounds.max_result_bytes)
    }

    /// Run several `(name, arguments)` calls concurrently. Results are in
    /// call order.
    pub async fn execute_all(&self, calls: &[(String, String)]) -> Vec<String> {
        debug!("Running {} tool calls concurrently", calls.len());
        futures::future::join_all(
            calls
                .iter()
                .map(|(name, arguments)| self.execute(name, arguments)),
        )
        .await
    }

    fn precheck(&self, tool: &dyn Tool, arguments: &str) -> Option<String> {
        if !self.bounds.validate || tool.resolves_references() {
            return None;
        }
        validate_tool_arguments(tool, arguments)
    }

    async fn run_bounded(&self, name: &str, tool: &dyn Tool, arguments: &str) -> String {
        let Some(limit) = self.bounds.timeout else {
            return tool.execute(arguments).await;
        };
        match tokio::time::timeout(limit, tool.execute(arguments)).await {
            Ok(output) => output,
            Err(_) => {
                info!("Tool {name} hit its {limit:?} timeout");
                format!(
                    "Error: tool '{name}' timed out after {limit:?}. \
                     Retry with a narrower path or a smaller slice."
                )
            }
        }
    }
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new()
    }
}

// ── FnTool ────────────────────────────────────────────────────────

type ErasedHandler = Box<dyn Fn(String) -> ToolFuture<'static> + Send + Sync>;

/// A tool built from a definition and an async closure over typed
/// arguments.
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct CountArgs { object_id: String }
///
/// let store = explorer.store().clone();
/// let tool = FnTool::new(
///     ToolDef::new("count", "Count items of a stored list", json_schema_for::<CountArgs>()),
///     move |args: CountArgs| {
///         let store = store.clone();
///         async move { format!("{:?}", store.get(&args.object_id).map(|v| v.len())) }
///     },
/// );
/// ```
pub struct FnTool {
    def: ToolDef,
    handler: ErasedHandler,
}

impl FnTool {
    /// Arguments that fail to deserialize into `A` are answered with an
    /// `Error:` string; the handler is not called.
    pub fn new<A, F, Fut>(def: ToolDef, handler: F) -> Self
    where
        A: serde::de::DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        let handler: ErasedHandler = Box::new(move |raw: String| -> ToolFuture<'static> {
            match parse_tool_args::<A>(&raw) {
                Ok(args) => Box::pin(handler(args)),
                Err(e) => Box::pin(std::future::ready(e)),
            }
        });
        Self { def, handler }
    }
}

impl Tool for FnTool {
    fn definition(&self) -> ToolDef {
        self.def.clone()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        (self.handler)(arguments.to_string())
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnTool").field(&self.def.function.name).finish()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Check a raw arguments string against the tool's schema. `None` means
/// the arguments are acceptable.
pub fn validate_tool_arguments(tool: &dyn Tool, arguments: &str) -> Option<String> {
    let def = tool.definition();
    match serde_json::from_str::<serde_json::Value>(arguments) {
        Ok(value) => validate_arguments_value(&def, &value),
        Err(e) => Some(format!(
            "Error: arguments for tool '{}' are not valid JSON ({e}). \
             Send a JSON object matching the parameter schema.",
            def.function.name
        )),
    }
}

/// Check parsed arguments (for example, after references were resolved)
/// against a definition's schema.
pub fn validate_arguments_value(def: &ToolDef, arguments: &serde_json::Value) -> Option<String> {
    let name = &def.function.name;
    let Ok(validator) = jsonschema::validator_for(&def.function.parameters) else {
        warn!("Tool {name} has an unusable parameter schema; skipping validation");
        return None;
    };

    let problems: Vec<String> = validator
        .iter_errors(arguments)
        .map(|e| {
            let location = e.instance_path().to_string();
            let location = if location.is_empty() {
                "(arguments)".to_string()
            } else {
                location
            };
            format!("  - {location}: {e}")
        })
        .collect();

    (!problems.is_empty()).then(|| {
        format!(
            "Error: argument validation failed for tool '{name}':\n{}\n\
             Fix the listed arguments and call the tool again.",
            problems.join("\n")
        )
    })
}

fn log_call(name: &str, arguments: &str) {
    let mut preview: String = arguments.chars().take(120).collect();
    if preview.len() < arguments.len() {
        preview.push('…');
    }
    info!("[tool] {name}({preview})");
    trace!("[tool] {name} arguments: {arguments}");
}

/// Cut `s` to at most `max` bytes on a char boundary, noting how much was
/// dropped.
pub fn truncate_result(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let cut = (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    format!(
        "{}\n… {} more bytes ({} total)",
        s.get(..cut).unwrap_or_default(),
        s.len() - cut,
        s.len()
    )
}

/// Deserialize raw arguments into `T`. The error text can be returned
/// straight from [`Tool::execute`].
pub fn parse_tool_args<T: serde::de::DeserializeOwned>(arguments: &str) -> Result<T, String> {
    serde_json::from_str(arguments).map_err(|e| {
        format!(
            "Error: could not read tool arguments: {e}. \
             Send a JSON object matching the parameter schema."
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;

    /// Tags a label, the way a downstream tool would consume an argument.
    struct LabelTool;

    impl Tool for LabelTool {
        fn definition(&self) -> ToolDef {
            ToolDef::new(
                "label",
                "Attach a label",
                json!({
                    "type": "object",
                    "properties": { "label": { "type": "string" } },
                    "required": ["label"]
                }),
            )
        }

        fn execute(&self, arguments: &str) -> ToolFuture<'_> {
            let label = serde_json::from_str::<serde_json::Value>(arguments)
                .ok()
                .and_then(|v| v["label"].as_str().map(str::to_string));
            Box::pin(async move {
                match label {
                    Some(label) => format!("labelled {label}"),
                    None => "Error: no label".to_string(),
                }
            })
        }
    }

    struct StalledTool;

    impl Tool for StalledTool {
        fn definition(&self) -> ToolDef {
            ToolDef::new("stalled", "Never answers in time", json!({"type": "object"}))
        }

        fn execute(&self, _arguments: &str) -> ToolFuture<'_> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late".to_string()
            })
        }
    }

    #[test]
    fn names_come_from_definitions() {
        assert_eq!(LabelTool.name(), "label");
        assert!(!LabelTool.resolves_references());

        let set = ToolSet::new().with(StalledTool).with(LabelTool);
        assert_eq!(set.names(), vec!["label", "stalled"]);
        let defs: Vec<String> = set
            .definitions()
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(defs, vec!["label", "stalled"]);
        assert!(set.get("label").is_some());
    }

    #[test]
    fn conditional_registration() {
        assert_eq!(ToolSet::new().with_if(true, LabelTool).len(), 1);
        assert!(ToolSet::new().with_if(false, LabelTool).is_empty());
    }

    #[tokio::test]
    async fn unknown_tools_list_what_is_registered() {
        let set = ToolSet::new().with(LabelTool);
        assert_eq!(set.execute("label", r#"{"label": "prod"}"#).await, "labelled prod");
        let missing = set.execute("deploy", "{}").await;
        assert!(missing.starts_with("Error: unknown tool 'deploy'"));
        assert!(missing.ends_with("Registered tools: label"));
    }

    #[tokio::test]
    async fn batches_keep_call_order() {
        let set = ToolSet::new().with(LabelTool);
        let calls = vec![
            ("label".to_string(), r#"{"label": "a"}"#.to_string()),
            ("deploy".to_string(), "{}".to_string()),
            ("label".to_string(), r#"{"label": "c"}"#.to_string()),
        ];
        let results = set.execute_all(&calls).await;
        assert_eq!(results[0], "labelled a");
        assert!(results[1].starts_with("Error: unknown tool"));
        assert_eq!(results[2], "labelled c");
    }

    #[tokio::test]
    async fn schema_precheck_rejects_bad_arguments() {
        let set = ToolSet::new().with_arg_validation(true).with(LabelTool);
        let wrong_type = set.execute("label", r#"{"label": 5}"#).await;
        assert!(wrong_type.starts_with("Error: argument validation failed for tool 'label'"));
        assert!(wrong_type.contains("/label"));

        let missing = set.execute("label", "{}").await;
        assert!(missing.contains("(arguments)"));

        let garbage = set.execute("label", "not json").await;
        assert!(garbage.contains("are not valid JSON"));
    }

    #[tokio::test]
    async fn precheck_is_off_by_default() {
        let set = ToolSet::new().with(LabelTool);
        assert_eq!(set.execute("label", r#"{"label": 5}"#).await, "Error: no label");
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let set = ToolSet::new()
            .with_default_timeout(Some(Duration::from_millis(20)))
            .with(StalledTool);
        let out = set.execute("stalled", "{}").await;
        assert!(out.starts_with("Error: tool 'stalled' timed out after 20ms"));
    }

    #[tokio::test]
    async fn fn_tool_deserializes_arguments() {
        #[derive(Deserialize, JsonSchema)]
        struct CountArgs {
            items: Vec<u32>,
        }
        let tool = FnTool::new(
            ToolDef::new("count", "Count items", crate::json_schema_for::<CountArgs>()),
            |args: CountArgs| async move { format!("{} items", args.items.len()) },
        );
        assert_eq!(tool.execute(r#"{"items": [1, 2, 3]}"#).await, "3 items");
        assert!(tool.execute("{}").await.starts_with("Error: could not read tool arguments"));
        assert_eq!(format!("{tool:?}"), "FnTool(\"count\")");
    }

    #[tokio::test]
    async fn oversized_output_is_cut() {
        let set = ToolSet::new().with_max_result_bytes(10).with(LabelTool);
        let label = "é".repeat(20);
        let out = set.execute("label", &json!({ "label": label }).to_string()).await;
        // "labelled " is 9 bytes; the next 'é' would cross the bound.
        assert!(out.starts_with("labelled \n"));
        assert!(out.ends_with("… 40 more bytes (49 total)"));
    }

    #[test]
    fn truncation_lands_on_char_boundaries() {
        assert_eq!(truncate_result("short".into(), 100), "short");
        let cut = truncate_result("aé".repeat(3), 2);
        assert!(cut.starts_with("a\n… 8 more bytes (9 total)"));
    }
}

//! Token-efficient rendering of stored objects.
//!
//! The explorer turns a stored value (or the sub-value at a path) into a
//! short preview the agent can read, and cuts exact windows out of long
//! lists and strings. A preview always states full sizes, so the agent knows
//! what it is not seeing and can page through it with [`Explorer::slice`].
//!
//! ```text
//! @obj_003.pipelines → list (120 items)
//!
//! [0] {"name":"rag-prod","status":"DEPLOYED"}
//! [1] {"name":"rag-dev","status":"DRAFT"}
//! ...
//! … 95 more items (120 total)
//! ```

use super::config::{ExplorerConfig, RenderMode};
use super::error::{MemoryError, Result};
use super::explorable::Explorable;
use super::path::{PathExpression, Segment};
use super::store::{ObjectId, ObjectStore};
use super::value::{Value, ValueKind};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Custom body renderer. Receives the value and the explorer's config.
pub type Renderer = Arc<dyn Fn(&Value, &ExplorerConfig) -> String + Send + Sync>;

/// What a custom renderer is registered for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RendererKey {
    /// Records with this type name.
    TypeName(String),
    /// Every value of this shape.
    Kind(ValueKind),
}

/// Renders, slices, and searches objects held by an [`ObjectStore`].
pub struct Explorer {
    store: Arc<ObjectStore>,
    config: ExplorerConfig,
    renderers: HashMap<RendererKey, Renderer>,
}

impl fmt::Debug for Explorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Explorer")
            .field("config", &self.config)
            .field("renderers", &self.renderers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Explorer {
    pub fn new(store: Arc<ObjectStore>, config: ExplorerConfig) -> Self {
        Self {
            store,
            config,
            renderers: HashMap::new(),
        }
    }

    /// Register a custom body renderer (builder pattern).
    ///
    /// A renderer keyed by record type name wins over one keyed by kind.
    pub fn with_renderer(
        mut self,
        key: RendererKey,
        renderer: impl Fn(&Value, &ExplorerConfig) -> String + Send + Sync + 'static,
    ) -> Self {
        self.register_renderer(key, renderer);
        self
    }

    pub fn register_renderer(
        &mut self,
        key: RendererKey,
        renderer: impl Fn(&Value, &ExplorerConfig) -> String + Send + Sync + 'static,
    ) {
        self.renderers.insert(key, Arc::new(renderer));
    }

    pub fn store(&self) -> &Arc<ObjectStore> {
        &self.store
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    // ── Storing ────────────────────────────────────────────────────

    /// Store a serializable value and wrap it with its id and preview.
    pub fn explorable<T: Serialize>(&self, value: T) -> Result<Explorable<T>> {
        let stored = Value::from_serialize(&value)?;
        let id = self.store.put(stored.clone());
        let preview = self.render_value(id, &PathExpression::root(), &stored, self.config.mode);
        Ok(Explorable::new(id, value, preview))
    }

    /// Store a [`Value`] and wrap it with its id and preview.
    pub fn explorable_value(&self, value: Value) -> Explorable<Value> {
        let id = self.store.put(value.clone());
        let preview = self.render_value(id, &PathExpression::root(), &value, self.config.mode);
        Explorable::new(id, value, preview)
    }

    // ── Rendering ──────────────────────────────────────────────────

    /// Render the object `id` (or the sub-value at `path`) in the configured mode.
    pub fn render(&self, id: &str, path: &str) -> Result<String> {
        self.render_with_mode(id, path, self.config.mode)
    }

    pub fn render_with_mode(&self, id: &str, path: &str, mode: RenderMode) -> Result<String> {
        let (id, root) = self.resolve(id)?;
        let path = PathExpression::parse(path)?;
        let target = path.navigate(&root)?;
        debug!("Rendering {id} at '{path}' ({mode})");
        Ok(self.render_value(id, &path, target, mode))
    }

    /// Render a value that is already at hand. `id` and `path` only feed the
    /// header and hints.
    pub fn render_value(
        &self,
        id: ObjectId,
        path: &PathExpression,
        value: &Value,
        mode: RenderMode,
    ) -> String {
        let header = format!("{} → {}", reference(id, path), summary(value));
        let body = match mode {
            RenderMode::Preview => match self.custom_renderer(value) {
                Some(renderer) => renderer(value, &self.config),
                None => self.preview_body(id, path, value),
            },
            RenderMode::Tree => self.tree_body(value),
            RenderMode::Json => self.json_body(value),
        };
        if body.is_empty() {
            header
        } else {
            format!("{header}\n\n{body}")
        }
    }

    fn custom_renderer(&self, value: &Value) -> Option<&Renderer> {
        let by_type = match value {
            Value::Record(record) => self
                .renderers
                .get(&RendererKey::TypeName(record.type_name.clone())),
            _ => None,
        };
        by_type.or_else(|| self.renderers.get(&RendererKey::Kind(value.kind())))
    }

    fn preview_body(&self, id: ObjectId, path: &PathExpression, value: &Value) -> String {
        let max_items = self.config.max_items;
        let mut lines = Vec::new();
        let mut hint = None;

        match value {
            Value::Text(text) => {
                let (shown, total) = take_chars(text, self.config.max_string_chars);
                lines.push(shown.to_string());
                if total > self.config.max_string_chars {
                    let rest = total - self.config.max_string_chars;
                    lines.push(more_marker(rest, total, "characters"));
                    hint = Some(slice_hint(id, path));
                }
            }
            Value::Sequence(items) if items.is_empty() => lines.push("[]".to_string()),
            Value::Sequence(items) => {
                for (i, item) in items.iter().take(max_items).enumerate() {
                    lines.push(format!("[{i}] {}", self.inline(item)));
                }
                if items.len() > max_items {
                    lines.push(more_marker(items.len() - max_items, items.len(), "items"));
                    hint = Some(slice_hint(id, path));
                }
            }
            Value::Map(map) if map.is_empty() => lines.push("{}".to_string()),
            Value::Map(map) => {
                for (key, item) in map.iter().take(max_items) {
                    let key = Segment::Field(key.clone());
                    lines.push(format!("{key}: {}", self.inline(item)));
                }
                if map.len() > max_items {
                    lines.push(more_marker(map.len() - max_items, map.len(), "keys"));
                    hint = Some(drill_hint(id, path));
                }
            }
            Value::Record(record) => {
                for (name, item) in record.fields.iter().take(max_items) {
                    let name = Segment::Field(name.clone());
                    lines.push(format!("{name}: {}", self.inline(item)));
                }
                if record.fields.len() > max_items {
                    lines.push(more_marker(
                        record.fields.len() - max_items,
                        record.fields.len(),
                        "fields",
                    ));
                    hint = Some(drill_hint(id, path));
                }
            }
            scalar => lines.push(compact_json(scalar)),
        }

        if self.config.show_hints
            && let Some(hint) = hint
        {
            lines.push(String::new());
            lines.push(hint);
        }
        lines.join("\n")
    }

    /// One-line rendering of a nested value.
    fn inline(&self, value: &Value) -> String {
        let budget = self.config.inline_string_chars;
        match value {
            Value::Text(text) => {
                let (shown, total) = take_chars(text, budget);
                let quoted = compact_json(&Value::Text(shown.to_string()));
                if total > budget {
                    let open = quoted.strip_suffix('"').unwrap_or(&quoted);
                    format!("{open}…\" ({total} chars)")
                } else {
                    quoted
                }
            }
            Value::Sequence(_) | Value::Map(_) | Value::Record(_) => {
                bounded_compact(value, budget).unwrap_or_else(|| summary_with_names(value))
            }
            scalar => compact_json(scalar),
        }
    }

    fn tree_body(&self, value: &Value) -> String {
        let mut lines = Vec::new();
        self.tree_lines(value, 0, &mut lines);
        lines.join("\n")
    }

    fn tree_lines(&self, value: &Value, depth: usize, lines: &mut Vec<String>) {
        if depth >= self.config.max_depth {
            return;
        }
        let indent = "  ".repeat(depth);
        let children: Vec<(String, &Value)> = match value {
            Value::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (format!("[{i}]"), item))
                .collect(),
            Value::Map(map) => map
                .iter()
                .map(|(k, v)| (Segment::Field(k.clone()).to_string(), v))
                .collect(),
            Value::Record(record) => record
                .fields
                .iter()
                .map(|(k, v)| (Segment::Field(k.clone()).to_string(), v))
                .collect(),
            _ => return,
        };

        let total = children.len();
        for (label, child) in children.into_iter().take(self.config.max_items) {
            lines.push(format!("{indent}{label}: {}", summary(child)));
            self.tree_lines(child, depth + 1, lines);
        }
        if total > self.config.max_items {
            lines.push(format!(
                "{indent}{}",
                more_marker(total - self.config.max_items, total, "entries")
            ));
        }
    }

    fn json_body(&self, value: &Value) -> String {
        let json = serde_json::to_string_pretty(&value.to_json()).unwrap_or_default();
        let (shown, total) = take_chars(&json, self.config.max_json_chars);
        if total > self.config.max_json_chars {
            format!(
                "{shown}\n{}",
                more_marker(total - self.config.max_json_chars, total, "characters")
            )
        } else {
            json
        }
    }

    // ── Slicing ────────────────────────────────────────────────────

    /// Render elements (or characters) `[start, end)` of the list or string
    /// at `path`. Out-of-range bounds are clamped, never an error.
    pub fn slice(&self, id: &str, start: usize, end: Option<usize>, path: &str) -> Result<String> {
        let (id, root) = self.resolve(id)?;
        let path = PathExpression::parse(path)?;
        let target = path.navigate(&root)?;
        let target_ref = reference(id, &path);

        match target {
            Value::Sequence(items) => {
                let (from, to) = clamp_range(start, end, items.len());
                let mut out = format!(
                    "{target_ref}[{from}:{to}] → list slice ({} of {} items)",
                    to - from,
                    items.len()
                );
                out.push_str("\n\n");
                if from == to {
                    out.push_str("(empty slice)");
                } else {
                    let lines: Vec<String> = items[from..to]
                        .iter()
                        .enumerate()
                        .map(|(offset, item)| format!("[{}] {}", from + offset, self.inline(item)))
                        .collect();
                    out.push_str(&lines.join("\n"));
                }
                Ok(out)
            }
            Value::Text(text) => {
                let total = text.chars().count();
                let (from, to) = clamp_range(start, end, total);
                let window: String = text.chars().skip(from).take(to - from).collect();
                Ok(format!(
                    "{target_ref}[{from}:{to}] → str slice ({} of {total} chars)\n\n{window}",
                    to - from
                ))
            }
            other => Err(MemoryError::NotSliceable {
                target: target_ref,
                type_name: other.type_name(),
            }),
        }
    }

    // ── Searching ──────────────────────────────────────────────────

    /// List paths under `path` whose key or scalar value contains `query`
    /// (case-insensitive). At most `limit` matches are shown.
    pub fn search(&self, id: &str, query: &str, path: &str, limit: usize) -> Result<String> {
        let (id, root) = self.resolve(id)?;
        let base = PathExpression::parse(path)?;
        let target = base.navigate(&root)?;
        let needle = query.to_lowercase();

        let mut matches = Matches {
            limit,
            total: 0,
            hits: Vec::new(),
        };
        matches.collect(target, &base, &needle);
        let Matches { total, hits, .. } = matches;

        let scope = reference(id, &base);
        if total == 0 {
            return Ok(format!("No matches for \"{query}\" in {scope}."));
        }
        let mut out = format!(
            "Search \"{query}\" in {scope} → {total} {}\n",
            if total == 1 { "match" } else { "matches" }
        );
        for (path, value) in &hits {
            out.push_str(&format!("\n{} = {}", reference(id, path), self.inline(value)));
        }
        if total > hits.len() {
            out.push_str(&format!("\n{}", more_marker(total - hits.len(), total, "matches")));
        }
        Ok(out)
    }

    // ── Helpers ────────────────────────────────────────────────────

    /// Look up an id (with or without a leading `@`).
    fn resolve(&self, id: &str) -> Result<(ObjectId, Arc<Value>)> {
        let id: ObjectId = id.trim().trim_start_matches('@').parse()?;
        let object = self.store.lookup(id)?;
        Ok((id, object.value))
    }
}

/// Search accumulator: keeps the first `limit` hits and counts all of them.
struct Matches<'v> {
    limit: usize,
    total: usize,
    hits: Vec<(PathExpression, &'v Value)>,
}

impl<'v> Matches<'v> {
    fn push(&mut self, path: PathExpression, value: &'v Value) {
        self.total += 1;
        if self.hits.len() < self.limit {
            self.hits.push((path, value));
        }
    }

    fn collect(&mut self, value: &'v Value, path: &PathExpression, needle: &str) {
        let named: Vec<(&'v str, &'v Value)> = match value {
            Value::Map(map) => map.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            Value::Record(record) => record
                .fields
                .iter()
                .map(|(k, v)| (k.as_str(), v))
                .collect(),
            Value::Sequence(items) => {
                for (i, child) in items.iter().enumerate() {
                    let child_path = path.child(Segment::Index(i));
                    if child.is_scalar() {
                        if scalar_matches(child, needle) {
                            self.push(child_path, child);
                        }
                    } else {
                        self.collect(child, &child_path, needle);
                    }
                }
                return;
            }
            scalar => {
                if scalar_matches(scalar, needle) {
                    self.push(path.clone(), scalar);
                }
                return;
            }
        };

        for (key, child) in named {
            let child_path = path.child(Segment::Field(key.to_string()));
            let key_hit = key.to_lowercase().contains(needle);
            if key_hit || (child.is_scalar() && scalar_matches(child, needle)) {
                self.push(child_path.clone(), child);
            }
            if !child.is_scalar() {
                self.collect(child, &child_path, needle);
            }
        }
    }
}

/// `@obj_001`, `@obj_001.a.b`, or `@obj_001["odd key"]`.
pub fn reference(id: ObjectId, path: &PathExpression) -> String {
    match path.segments().first() {
        None => format!("@{id}"),
        Some(first) if first.to_string().starts_with('[') => format!("@{id}{path}"),
        Some(_) => format!("@{id}.{path}"),
    }
}

/// Type and size, e.g. `list (3 items)` or `Pipeline (record, 4 fields)`.
pub fn summary(value: &Value) -> String {
    match value {
        Value::Text(text) => format!("str ({})", plural(text.chars().count(), "char")),
        Value::Sequence(items) => format!("list ({})", plural(items.len(), "item")),
        Value::Map(map) => format!("map ({})", plural(map.len(), "key")),
        Value::Record(record) => format!(
            "{} (record, {})",
            record.type_name,
            plural(record.fields.len(), "field")
        ),
        scalar => scalar.type_name(),
    }
}

fn summary_with_names(value: &Value) -> String {
    let names: Vec<&str> = match value {
        Value::Map(map) => map.keys().map(String::as_str).collect(),
        Value::Record(record) => record.field_names().collect(),
        _ => return summary(value),
    };
    let mut listed = names.iter().take(5).copied().collect::<Vec<_>>().join(", ");
    if names.len() > 5 {
        listed.push_str(", …");
    }
    let head = summary(value);
    let head = head.strip_suffix(')').unwrap_or(&head);
    format!("{head}: {listed})")
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

fn more_marker(rest: usize, total: usize, noun: &str) -> String {
    format!("… {rest} more {noun} ({total} total)")
}

fn slice_hint(id: ObjectId, path: &PathExpression) -> String {
    let path = quoted(&path.to_string());
    format!("Use fetch_slice(object_id=\"{id}\", start, end, path={path}) to read the rest.")
}

fn drill_hint(id: ObjectId, path: &PathExpression) -> String {
    let example = if path.is_empty() {
        quoted("<key>")
    } else {
        quoted(&format!("{path}.<key>"))
    };
    format!("Use fetch_object(object_id=\"{id}\", path={example}) to open a single entry.")
}

/// `text` as a JSON string literal, so quotes inside bracketed paths
/// survive in a call example.
fn quoted(text: &str) -> String {
    serde_json::Value::from(text).to_string()
}

fn clamp_range(start: usize, end: Option<usize>, len: usize) -> (usize, usize) {
    let from = start.min(len);
    let to = end.unwrap_or(len).min(len).max(from);
    (from, to)
}

/// The first `n` characters of `s`, and the total character count.
fn take_chars(s: &str, n: usize) -> (&str, usize) {
    let total = s.chars().count();
    let shown = match s.char_indices().nth(n) {
        Some((byte, _)) => s.get(..byte).unwrap_or(s),
        None => s,
    };
    (shown, total)
}

fn compact_json(value: &Value) -> String {
    serde_json::to_string(&value.to_json()).unwrap_or_default()
}

fn scalar_matches(value: &Value, needle: &str) -> bool {
    match value {
        Value::Text(text) => text.to_lowercase().contains(needle),
        Value::Number(n) => n.to_string().contains(needle),
        Value::Bool(b) => b.to_string() == needle,
        _ => false,
    }
}

/// Compact JSON of `value` if it fits in `budget` characters.
///
/// Stops writing as soon as the budget is exceeded, so large values cost
/// no more than `budget` characters of work.
fn bounded_compact(value: &Value, budget: usize) -> Option<String> {
    let mut out = String::new();
    write_bounded(value, budget, &mut out).then_some(out)
}

fn write_bounded(value: &Value, budget: usize, out: &mut String) -> bool {
    if out.len() > budget {
        return false;
    }
    match value {
        Value::Sequence(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                if !write_bounded(item, budget, out) {
                    return false;
                }
            }
            out.push(']');
        }
        Value::Map(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&compact_json(&Value::Text(key.clone())));
                out.push(':');
                if !write_bounded(item, budget, out) {
                    return false;
                }
            }
            out.push('}');
        }
        Value::Record(record) => {
            out.push_str(&record.type_name);
            out.push('{');
            for (i, (name, item)) in record.fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(name);
                out.push(':');
                if !write_bounded(item, budget, out) {
                    return false;
                }
            }
            out.push('}');
        }
        Value::Text(text) if text.len() > budget => return false,
        scalar => out.push_str(&compact_json(scalar)),
    }
    out.chars().count() <= budget
}

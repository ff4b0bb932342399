//! Convenience re-exports for common `refstash` types.
//!
//! ```ignore
//! use refstash::prelude::*;
//! ```

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{ToolCall, ToolDef, json_schema_for};

// ── Memory ──────────────────────────────────────────────────────────
pub use crate::memory::{
    Explorable, Explorer, ExplorerConfig, FnValueTool, MemoryConfig, MemoryError, MemoryMode,
    ObjectId, ObjectStore, PathExpression, Record, RenderMode, StoreConfig, TextTool, Value,
    ValueTool, explorable, explorable_and_referenceable, referenceable,
};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{FnTool, Tool, ToolFuture, ToolSet, parse_tool_args};

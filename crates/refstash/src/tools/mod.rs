//! Tool abstractions and the store-access tools.
//!
//! # Submodules
//!
//! - [`core`]: [`Tool`] trait, [`ToolSet`] dispatch, [`FnTool`].
//! - [`store_access`]: `fetch_object`, `fetch_slice`, and `search_object`.
//! - [`reflection`]: memory failures as tool output with recovery hints.

pub mod core;
pub mod reflection;
pub mod store_access;

pub use self::core::{
    DEFAULT_MAX_RESULT_BYTES, DEFAULT_TOOL_TIMEOUT, FnTool, Tool, ToolFuture, ToolSet,
    parse_tool_args, truncate_result, validate_arguments_value, validate_tool_arguments,
};
pub use self::reflection::{describe_failure, recovery_hints};
pub use self::store_access::{
    FetchObject, FetchSlice, SearchObject, fetch_object, fetch_slice, search_object,
};

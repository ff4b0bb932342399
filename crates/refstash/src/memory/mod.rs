//! Object store, explorer, and reference passing for tool results.
//!
//! Large tool outputs are kept out of the conversation: they are stored under
//! a short id (`obj_001`) and the agent sees a bounded preview. The agent can
//! drill in with a path (`items.0.name`), page through long lists, or hand
//! the object (or part of it) to another tool as `@obj_001.items.0`.
//!
//! # Submodules
//!
//! - [`value`]: the stored value model ([`Value`], [`Record`]).
//! - [`store`]: [`ObjectStore`] with TTL, capacity limit, and pluggable backend.
//! - [`path`]: [`PathExpression`] parsing and navigation.
//! - [`explorer`]: [`Explorer`] rendering, slicing, and search.
//! - [`resolver`]: [`ReferenceResolver`] for `@obj_NNN[.path]` arguments.
//! - [`combinators`]: [`explorable`], [`referenceable`], and
//!   [`explorable_and_referenceable`] tool wrappers.

pub mod combinators;
pub mod config;
pub mod error;
pub mod explorable;
pub mod explorer;
pub mod path;
pub mod resolver;
pub mod store;
pub mod value;

pub use combinators::{
    ExplorableTool, FnValueTool, MemoryMode, PlainTool, ReferenceableTool, TextTool, ValueFuture,
    ValueTool, explorable, explorable_and_referenceable, referenceable,
};
pub use config::{ExplorerConfig, MemoryConfig, RenderMode, StoreConfig};
pub use error::{MemoryError, ReferenceFailure};
pub use explorable::Explorable;
pub use explorer::{Explorer, Renderer, RendererKey};
pub use path::{PathExpression, Segment};
pub use resolver::{Reference, ReferenceResolver, parse_reference};
pub use store::{InMemoryBackend, ObjectId, ObjectStore, StoreBackend, StoredObject};
pub use value::{Record, Value, ValueKind};

use std::sync::Arc;

/// Build a store and an explorer over it from one config.
pub fn build(config: MemoryConfig) -> Arc<Explorer> {
    let store = Arc::new(ObjectStore::new(config.store));
    Arc::new(Explorer::new(store, config.explorer))
}

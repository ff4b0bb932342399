//! Tunables for the object store and the explorer.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default time-to-live for stored objects (30 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Default number of sequence items / map entries shown in a preview.
pub const DEFAULT_MAX_ITEMS: usize = 25;

/// Default number of characters of a string shown in a preview.
pub const DEFAULT_MAX_STRING_CHARS: usize = 2_000;

/// Default number of characters of a string shown on a one-line field rendering.
pub const DEFAULT_INLINE_STRING_CHARS: usize = 80;

/// Configuration for [`ObjectStore`](super::store::ObjectStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// TTL applied by `put`. `None` keeps objects for the life of the store.
    pub default_ttl: Option<Duration>,
    /// Optional cap on live objects. At capacity the oldest object is evicted.
    pub max_entries: Option<usize>,
    /// Interval for the background sweep started by `spawn_sweeper`.
    pub sweep_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_ttl: Some(DEFAULT_TTL),
            max_entries: None,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default TTL. `None` disables expiry.
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_max_entries(mut self, max: Option<usize>) -> Self {
        self.max_entries = max;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// How the explorer renders a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Bounded preview: truncated strings and lists, one line per field.
    #[default]
    Preview,
    /// Structure outline: types and counts only, down to `max_depth`.
    Tree,
    /// Pretty JSON, truncated to `max_json_chars`.
    Json,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMode::Preview => write!(f, "preview"),
            RenderMode::Tree => write!(f, "tree"),
            RenderMode::Json => write!(f, "json"),
        }
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "preview" => Ok(RenderMode::Preview),
            "tree" => Ok(RenderMode::Tree),
            "json" => Ok(RenderMode::Json),
            other => Err(format!(
                "unknown render mode '{other}' (expected preview, tree, or json)"
            )),
        }
    }
}

/// Configuration for [`Explorer`](super::explorer::Explorer).
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// Items of a list (or entries of a map/record) shown before truncating.
    pub max_items: usize,
    /// Characters of a top-level string shown before truncating.
    pub max_string_chars: usize,
    /// Characters of a string shown on a one-line field/item rendering.
    pub inline_string_chars: usize,
    /// Depth limit for [`RenderMode::Tree`].
    pub max_depth: usize,
    /// Character budget for [`RenderMode::Json`].
    pub max_json_chars: usize,
    /// Mode used by `render`.
    pub mode: RenderMode,
    /// Append a usage hint when a preview was truncated.
    pub show_hints: bool,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            max_string_chars: DEFAULT_MAX_STRING_CHARS,
            inline_string_chars: DEFAULT_INLINE_STRING_CHARS,
            max_depth: 3,
            max_json_chars: 4_000,
            mode: RenderMode::Preview,
            show_hints: true,
        }
    }
}

impl ExplorerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = max;
        self
    }

    pub fn with_max_string_chars(mut self, max: usize) -> Self {
        self.max_string_chars = max;
        self
    }

    pub fn with_inline_string_chars(mut self, max: usize) -> Self {
        self.inline_string_chars = max;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_json_chars(mut self, max: usize) -> Self {
        self.max_json_chars = max;
        self
    }

    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_hints(mut self, enabled: bool) -> Self {
        self.show_hints = enabled;
        self
    }
}

/// Store and explorer settings together.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    pub store: StoreConfig,
    pub explorer: ExplorerConfig,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    pub fn with_explorer(mut self, explorer: ExplorerConfig) -> Self {
        self.explorer = explorer;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MemoryConfig::default();
        assert_eq!(config.store.default_ttl, Some(DEFAULT_TTL));
        assert_eq!(config.store.max_entries, None);
        assert_eq!(config.explorer.max_items, DEFAULT_MAX_ITEMS);
        assert_eq!(config.explorer.mode, RenderMode::Preview);
    }

    #[test]
    fn builders_chain() {
        let config = ExplorerConfig::new()
            .with_max_items(5)
            .with_max_string_chars(100)
            .with_mode(RenderMode::Tree)
            .with_hints(false);
        assert_eq!(config.max_items, 5);
        assert_eq!(config.max_string_chars, 100);
        assert_eq!(config.mode, RenderMode::Tree);
        assert!(!config.show_hints);
    }

    #[test]
    fn render_mode_parses_case_insensitively() {
        assert_eq!("TREE".parse::<RenderMode>(), Ok(RenderMode::Tree));
        assert_eq!("json".parse::<RenderMode>(), Ok(RenderMode::Json));
        assert!("fancy".parse::<RenderMode>().is_err());
        assert_eq!(RenderMode::Preview.to_string(), "preview");
    }
}

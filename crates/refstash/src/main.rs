//! Stdio tool host for the refstash object store.
//!
//! Preloads JSON files into the store, registers `fetch_object`,
//! `fetch_slice`, and `search_object`, then reads one tool call per stdin
//! line and writes one JSON result per stdout line. Logs go to stderr.
//!
//! # Examples
//!
//! ```sh
//! # Load a file and explore it
//! echo '{"name": "fetch_slice", "arguments": {"object_id": "obj_001", "start": 10, "end": 20}}' \
//!   | refstash --load pipelines.json
//!
//! # Several calls on one line run concurrently
//! echo '[{"name": "fetch_object", "arguments": {"object_id": "obj_001", "path": "0"}},
//!        {"name": "search_object", "arguments": {"object_id": "obj_001", "query": "prod"}}]' \
//!   | refstash --load pipelines.json
//!
//! # Print tool definitions for the model
//! refstash --list-tools
//! ```

use clap::Parser;
use refstash::ToolCall;
use refstash::memory::{
    self, Explorable, Explorer, ExplorerConfig, MemoryConfig, RenderMode, StoreConfig, Value,
};
use refstash::tools::{DEFAULT_TOOL_TIMEOUT, ToolSet};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Serve store-access tools over stdin/stdout.
#[derive(Parser, Debug)]
#[command(name = "refstash", version)]
struct Cli {
    // ── Input ──────────────────────────────────────────────────
    /// JSON file to store before serving (repeatable). Ids are assigned in order.
    #[arg(long = "load", value_name = "FILE")]
    load: Vec<PathBuf>,

    /// Print the tool definitions as JSON and exit
    #[arg(long)]
    list_tools: bool,

    // ── Store ──────────────────────────────────────────────────
    /// Time-to-live of stored objects, in seconds
    #[arg(long, default_value_t = memory::config::DEFAULT_TTL.as_secs())]
    ttl_secs: u64,

    /// Keep objects until exit
    #[arg(long, conflicts_with = "ttl_secs")]
    no_ttl: bool,

    /// Maximum number of live objects (oldest are evicted)
    #[arg(long)]
    max_entries: Option<usize>,

    // ── Rendering ──────────────────────────────────────────────
    /// Items shown per list or map before truncating
    #[arg(long, default_value_t = memory::config::DEFAULT_MAX_ITEMS)]
    max_items: usize,

    /// Characters of a string shown before truncating
    #[arg(long, default_value_t = memory::config::DEFAULT_MAX_STRING_CHARS)]
    max_string_chars: usize,

    /// Default rendering: preview, tree, or json
    #[arg(long, default_value_t = RenderMode::Preview)]
    mode: RenderMode,

    // ── Dispatch ───────────────────────────────────────────────
    /// Per-call timeout in seconds (0 disables)
    #[arg(long, default_value_t = DEFAULT_TOOL_TIMEOUT.as_secs())]
    timeout_secs: u64,
}

impl Cli {
    fn memory_config(&self) -> MemoryConfig {
        let ttl = (!self.no_ttl).then(|| Duration::from_secs(self.ttl_secs));
        MemoryConfig::new()
            .with_store(
                StoreConfig::new()
                    .with_default_ttl(ttl)
                    .with_max_entries(self.max_entries),
            )
            .with_explorer(
                ExplorerConfig::new()
                    .with_max_items(self.max_items)
                    .with_max_string_chars(self.max_string_chars)
                    .with_mode(self.mode),
            )
    }

    fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Parse a JSON file and store it.
fn load_file(explorer: &Explorer, path: &Path) -> Result<Explorable<Value>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| format!("{} is not valid JSON: {e}", path.display()))?;
    Ok(explorer.explorable_value(Value::from_json(json)))
}

/// One stdin line: a single call or an array of calls.
fn parse_line(line: &str) -> Result<Vec<ToolCall>, String> {
    let json: serde_json::Value =
        serde_json::from_str(line).map_err(|e| format!("invalid JSON: {e}"))?;
    let calls = if json.is_array() {
        serde_json::from_value(json)
    } else {
        serde_json::from_value(json).map(|call| vec![call])
    };
    calls.map_err(|e| format!("expected {{\"name\": ..., \"arguments\": {{...}}}}: {e}"))
}

/// Run the calls on one line and format one output line per call.
async fn handle_line(tools: &ToolSet, line: &str) -> Vec<String> {
    let calls = match parse_line(line) {
        Ok(calls) => calls,
        Err(e) => {
            return vec![serde_json::json!({ "error": e }).to_string()];
        }
    };
    let pairs: Vec<(String, String)> = calls
        .iter()
        .map(|call| (call.name.clone(), call.arguments_json()))
        .collect();
    let results = tools.execute_all(&pairs).await;
    calls
        .iter()
        .zip(results)
        .map(|(call, content)| {
            serde_json::json!({ "name": call.name, "content": content }).to_string()
        })
        .collect()
}

async fn serve(tools: &ToolSet) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut handled = 0usize;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        for output in handle_line(tools, line).await {
            println!("{output}");
        }
        handled += 1;
    }
    info!("stdin closed after {handled} request line(s)");
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("refstash=info")),
        )
        .init();
    debug!("{cli:?}");

    let explorer: Arc<Explorer> = memory::build(cli.memory_config());
    let tools = ToolSet::new()
        .with_arg_validation(true)
        .with_default_timeout(cli.timeout())
        .with_store_tools(&explorer);

    if cli.list_tools {
        match serde_json::to_string_pretty(&tools.definitions()) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: failed to serialize tool definitions: {e}");
                process::exit(1);
            }
        }
        return;
    }

    for path in &cli.load {
        match load_file(&explorer, path) {
            Ok(stored) => {
                info!("Loaded {} as {}", path.display(), stored.reference());
                eprintln!("{}\n", stored.preview());
            }
            Err(e) => {
                error!("{e}");
                process::exit(1);
            }
        }
    }

    let sweeper = explorer.store().spawn_sweeper();
    let outcome = serve(&tools).await;
    explorer.store().shutdown();
    sweeper.abort();

    if let Err(e) = outcome {
        eprintln!("Error: failed to read stdin: {e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn explorer() -> Arc<Explorer> {
        memory::build(MemoryConfig::default())
    }

    #[test]
    fn cli_maps_flags_onto_config() {
        let cli = Cli::parse_from([
            "refstash",
            "--no-ttl",
            "--max-entries",
            "10",
            "--max-items",
            "5",
            "--mode",
            "tree",
            "--timeout-secs",
            "0",
        ]);
        let config = cli.memory_config();
        assert_eq!(config.store.default_ttl, None);
        assert_eq!(config.store.max_entries, Some(10));
        assert_eq!(config.explorer.max_items, 5);
        assert_eq!(config.explorer.mode, RenderMode::Tree);
        assert_eq!(cli.timeout(), None);

        let defaults = Cli::parse_from(["refstash"]).memory_config();
        assert_eq!(defaults.store.default_ttl, Some(memory::config::DEFAULT_TTL));
    }

    #[test]
    fn load_file_stores_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"items": [1, 2, 3]}}"#).unwrap();
        let ex = explorer();
        let stored = load_file(&ex, file.path()).unwrap();
        assert_eq!(stored.reference(), "@obj_001");
        assert!(stored.preview().contains("items: [1,2,3]"));
    }

    #[test]
    fn load_file_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = load_file(&explorer(), file.path()).unwrap_err();
        assert!(err.contains("is not valid JSON"));
    }

    #[tokio::test]
    async fn handles_single_and_batched_calls() {
        let ex = explorer();
        ex.store().put(serde_json::json!({"a": [1, 2, 3]}));
        let tools = ToolSet::new().with_store_tools(&ex);

        let single = handle_line(
            &tools,
            r#"{"name": "fetch_object", "arguments": {"object_id": "obj_001", "path": "a"}}"#,
        )
        .await;
        assert_eq!(single.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(&single[0]).unwrap();
        assert_eq!(parsed["name"], "fetch_object");
        assert!(parsed["content"].as_str().unwrap().contains("list (3 items)"));

        let batch = handle_line(
            &tools,
            r#"[{"name": "fetch_slice", "arguments": {"object_id": "obj_001", "start": 1, "path": "a"}},
                {"name": "nope"}]"#,
        )
        .await;
        assert_eq!(batch.len(), 2);
        assert!(batch[0].contains("[1:3]"));
        assert!(batch[1].contains("unknown tool"));

        let bad = handle_line(&tools, "{").await;
        assert!(bad[0].contains("invalid JSON"));
    }
}

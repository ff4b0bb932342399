//! Substitution of `@obj_NNN[.path]` references in tool arguments.

use super::error::{MemoryError, ReferenceFailure, Result};
use super::path::PathExpression;
use super::store::{ObjectId, ObjectStore};
use std::sync::Arc;
use tracing::{debug, trace};

/// A parsed reference: the object it points into and the path inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Object id text, e.g. `obj_001`. Parsed on lookup, so an id too large
    /// to have been allocated resolves to `NotFound`.
    pub id: String,
    pub path: String,
}

/// Parse `text` as a reference.
///
/// The whole string must be a reference: `@obj_001`, `@obj_001.a.b`, or
/// `@obj_001[0]`. Anything else (`"@not_an_id"`, `"email@host"`,
/// `"@obj_001 and more"`) is `None` and is left untouched by the resolver.
pub fn parse_reference(text: &str) -> Option<Reference> {
    let (id, rest) = ObjectId::split_prefix(text.strip_prefix('@')?)?;
    let id = id.to_string();
    let path = if rest.is_empty() {
        String::new()
    } else if let Some(dotted) = rest.strip_prefix('.') {
        if dotted.is_empty() {
            return None;
        }
        dotted.to_string()
    } else if rest.starts_with('[') {
        rest.to_string()
    } else {
        return None;
    };
    Some(Reference { id, path })
}

/// Replaces references inside a JSON argument object with the values they
/// point to.
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    store: Arc<ObjectStore>,
}

impl ReferenceResolver {
    pub fn new(store: Arc<ObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ObjectStore> {
        &self.store
    }

    /// Resolve every reference in `arguments`, at any depth.
    ///
    /// All failures are collected before returning, so the caller sees every
    /// bad reference at once.
    pub fn resolve_arguments(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let mut failures = Vec::new();
        let resolved = self.walk(arguments, String::new(), &mut failures);
        if failures.is_empty() {
            Ok(resolved)
        } else {
            debug!("{} reference(s) failed to resolve", failures.len());
            Err(MemoryError::ReferenceResolution { failures })
        }
    }

    /// Resolve a single reference string to JSON.
    pub fn resolve_reference(&self, reference: &Reference) -> Result<serde_json::Value> {
        let object = self.store.get_object(&reference.id)?;
        let path = PathExpression::parse(&reference.path)?;
        let target = path.navigate(&object.value)?;
        Ok(target.to_json())
    }

    fn walk(
        &self,
        value: serde_json::Value,
        location: String,
        failures: &mut Vec<ReferenceFailure>,
    ) -> serde_json::Value {
        match value {
            serde_json::Value::String(text) => match parse_reference(&text) {
                Some(reference) => match self.resolve_reference(&reference) {
                    Ok(resolved) => {
                        trace!("Resolved {text} at '{location}'");
                        resolved
                    }
                    Err(error) => {
                        failures.push(ReferenceFailure {
                            location: display_location(&location),
                            reference: text.clone(),
                            error: Box::new(error),
                        });
                        serde_json::Value::String(text)
                    }
                },
                None => serde_json::Value::String(text),
            },
            serde_json::Value::Array(items) => serde_json::Value::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| self.walk(item, format!("{location}[{i}]"), failures))
                    .collect(),
            ),
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(key, item)| {
                        let child = if location.is_empty() {
                            key.clone()
                        } else {
                            format!("{location}.{key}")
                        };
                        let resolved = self.walk(item, child, failures);
                        (key, resolved)
                    })
                    .collect(),
            ),
            other => other,
        }
    }
}

fn display_location(location: &str) -> String {
    if location.is_empty() {
        "<arguments>".to_string()
    } else {
        location.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::config::StoreConfig;
    use serde_json::json;
    use std::time::Duration;

    fn resolver() -> ReferenceResolver {
        ReferenceResolver::new(Arc::new(ObjectStore::new(StoreConfig::default())))
    }

    #[test]
    fn parses_reference_forms() {
        assert_eq!(
            parse_reference("@obj_001"),
            Some(Reference {
                id: "obj_001".to_string(),
                path: String::new()
            })
        );
        assert_eq!(parse_reference("@obj_002.a.b").unwrap().path, "a.b");
        assert_eq!(parse_reference("@obj_002[0].x").unwrap().path, "[0].x");
        let plain = [
            "@not_an_id",
            "email@host",
            "obj_001",
            "@obj_001 please",
            "@obj_",
            "@obj_1x",
            "@obj_001.",
        ];
        for text in plain {
            assert_eq!(parse_reference(text), None, "{text}");
        }
    }

    #[test]
    fn resolves_nested_references() {
        let r = resolver();
        let id = r.store().put(json!({"a": {"b": [10, 20, 30]}}));
        let args = json!({
            "data": format!("@{id}.a.b"),
            "config": {"items": ["keep", format!("@{id}.a.b.1")]},
            "email": "someone@example.com",
            "count": 3,
        });
        let resolved = r.resolve_arguments(args).unwrap();
        assert_eq!(
            resolved,
            json!({
                "data": [10, 20, 30],
                "config": {"items": ["keep", 20]},
                "email": "someone@example.com",
                "count": 3,
            })
        );
    }

    #[test]
    fn whole_object_reference() {
        let r = resolver();
        let id = r.store().put(json!({"x": 1}));
        let resolved = r.resolve_arguments(json!({"v": format!("@{id}")})).unwrap();
        assert_eq!(resolved, json!({"v": {"x": 1}}));
    }

    #[test]
    fn collects_every_failure() {
        let r = resolver();
        let id = r.store().put(json!({"a": 1}));
        let gone = r.store().put_with_ttl(json!(1), Some(Duration::ZERO));
        let args = json!({
            "first": "@obj_999",
            "nested": {"list": [format!("@{id}.missing")]},
            "old": format!("@{gone}"),
            "bad": format!("@{id}[x"),
        });
        let err = r.resolve_arguments(args).unwrap_err();
        let MemoryError::ReferenceResolution { failures } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(failures.len(), 4);

        let by_location = |loc: &str| {
            failures
                .iter()
                .find(|f| f.location == loc)
                .map(|f| f.error.kind())
        };
        assert_eq!(by_location("first"), Some("not_found"));
        assert_eq!(by_location("nested.list[0]"), Some("path_resolution"));
        assert_eq!(by_location("old"), Some("expired"));
        assert_eq!(by_location("bad"), Some("malformed_path"));
        assert!(err.to_string().contains("failed to resolve 4 references"));
    }

    #[test]
    fn oversized_ids_are_not_found() {
        let r = resolver();
        let err = r
            .resolve_arguments(json!({"x": "@obj_99999999999999999999999"}))
            .unwrap_err();
        let MemoryError::ReferenceResolution { failures } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].error.kind(), "not_found");
        assert!(err.to_string().contains("obj_99999999999999999999999"));
    }

    #[test]
    fn passes_through_non_references() {
        let r = resolver();
        let args = json!({"handle": "@not_an_id", "list": ["@", "x@y"]});
        assert_eq!(r.resolve_arguments(args.clone()).unwrap(), args);
    }
}

//! Turning memory failures into tool output the agent can act on.
//!
//! A failed fetch or reference is returned as an `Error: ...` string with a
//! short list of recovery steps, so the model can retry instead of giving up.

use crate::memory::MemoryError;

/// Format a memory failure as tool output.
///
/// ```text
/// Error from tool 'fetch_object': object 'obj_004' has expired
///
/// Recovery:
///   - Stored results expire. Call the tool that produced obj_004 again ...
/// ```
pub fn describe_failure(tool_name: &str, error: &MemoryError) -> String {
    let mut msg = format!("Error from tool '{tool_name}': {error}");
    let suggestions = recovery_hints(error);
    if !suggestions.is_empty() {
        msg.push_str("\n\nRecovery:");
        for suggestion in &suggestions {
            msg.push_str(&format!("\n  - {suggestion}"));
        }
    }
    msg
}

/// Recovery suggestions for an error kind.
pub fn recovery_hints(error: &MemoryError) -> Vec<String> {
    match error {
        MemoryError::NotFound(id) => vec![format!(
            "'{id}' is not a stored object. Object ids look like obj_001 and \
             appear in the header of a tool result (e.g. '@obj_001 → ...')."
        )],
        MemoryError::Expired(id) => vec![format!(
            "Stored results expire. Call the tool that produced {id} again to get \
             a fresh object id."
        )],
        MemoryError::MalformedPath { .. } => vec![
            "Paths are dot-separated keys and indices, e.g. 'items.0.name'.".into(),
            "Use [\"key\"] for keys containing dots or spaces, e.g. 'meta[\"a.b\"]'.".into(),
        ],
        MemoryError::PathResolution { .. } => vec![
            "Call fetch_object with a shorter path to see which keys or indices exist.".into(),
        ],
        MemoryError::NotSliceable { .. } => vec![
            "Use fetch_object to read maps and records; fetch_slice only pages \
             through lists and strings."
                .into(),
        ],
        MemoryError::ReferenceResolution { failures } => {
            let mut hints: Vec<String> = Vec::new();
            for failure in failures {
                for hint in recovery_hints(&failure.error) {
                    if !hints.contains(&hint) {
                        hints.push(hint);
                    }
                }
            }
            hints.push(
                "References must be the whole argument value, e.g. \"@obj_001\" or \
                 \"@obj_001.items.0\"."
                    .into(),
            );
            hints
        }
        MemoryError::InvalidValue(_) => {
            vec!["The value cannot be stored; pass plain JSON data instead.".into()]
        }
        MemoryError::Tool(message) if message.contains("validation failed") => vec![
            "Check that resolved references have the type the parameter expects.".into(),
        ],
        MemoryError::Tool(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ReferenceFailure;

    #[test]
    fn expired_suggests_rerun() {
        let out = describe_failure("fetch_object", &MemoryError::Expired("obj_004".into()));
        assert!(out.starts_with("Error from tool 'fetch_object': object 'obj_004' has expired"));
        assert!(out.contains("Call the tool that produced obj_004 again"));
    }

    #[test]
    fn tool_errors_pass_through_without_hints() {
        let out = describe_failure("deploy", &MemoryError::Tool("quota exceeded".into()));
        assert_eq!(out, "Error from tool 'deploy': quota exceeded");
    }

    #[test]
    fn reference_failures_merge_hints() {
        let error = MemoryError::ReferenceResolution {
            failures: vec![
                ReferenceFailure {
                    location: "a".into(),
                    reference: "@obj_009".into(),
                    error: Box::new(MemoryError::NotFound("obj_009".into())),
                },
                ReferenceFailure {
                    location: "b".into(),
                    reference: "@obj_010".into(),
                    error: Box::new(MemoryError::NotFound("obj_010".into())),
                },
            ],
        };
        let hints = recovery_hints(&error);
        assert_eq!(hints.len(), 3);
        assert!(hints.last().is_some_and(|h| h.contains("whole argument value")));
    }
}

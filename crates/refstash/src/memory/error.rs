//! Error kinds shared by the store, path parser, explorer, and resolver.

use std::fmt;
use thiserror::Error;

/// Every failure the memory layer can report.
///
/// `NotFound` and `Expired` are kept apart on purpose: an expired object can
/// be recovered by re-running the tool that produced it, a missing one cannot.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoryError {
    /// The id was never allocated or does not look like an object id.
    #[error("object '{0}' not found")]
    NotFound(String),

    /// The id existed but its time-to-live elapsed (or it was evicted).
    #[error("object '{0}' has expired")]
    Expired(String),

    /// The path string could not be parsed.
    #[error("malformed path '{path}': {reason}")]
    MalformedPath {
        /// The path as written.
        path: String,
        /// What the parser choked on.
        reason: String,
    },

    /// The path parsed but does not match the shape of the value.
    #[error("cannot resolve '{segment}' on {type_name}: {reason}")]
    PathResolution {
        /// The segment that failed, as it would be written in a path.
        segment: String,
        /// Type of the value the segment was applied to.
        type_name: String,
        /// Detail for the caller (available keys, sequence length, ...).
        reason: String,
    },

    /// A slice was requested on something that is neither a list nor a string.
    #[error("'{target}' is {type_name}; only lists and strings can be sliced")]
    NotSliceable {
        /// Reference to the value that was targeted.
        target: String,
        /// Type of that value.
        type_name: String,
    },

    /// One or more reference arguments could not be resolved.
    #[error("{}", describe_failures(failures))]
    ReferenceResolution {
        /// Every failed reference, in argument order.
        failures: Vec<ReferenceFailure>,
    },

    /// A value could not be converted into the stored value model.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The wrapped tool itself failed.
    #[error("{0}")]
    Tool(String),
}

impl MemoryError {
    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            MemoryError::NotFound(_) => "not_found",
            MemoryError::Expired(_) => "expired",
            MemoryError::MalformedPath { .. } => "malformed_path",
            MemoryError::PathResolution { .. } => "path_resolution",
            MemoryError::NotSliceable { .. } => "not_sliceable",
            MemoryError::ReferenceResolution { .. } => "reference_resolution",
            MemoryError::InvalidValue(_) => "invalid_value",
            MemoryError::Tool(_) => "tool",
        }
    }

    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        MemoryError::MalformedPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// A single reference argument that failed to resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFailure {
    /// Where in the arguments the reference sat, e.g. `config.items[2]`.
    pub location: String,
    /// The reference string as the caller wrote it.
    pub reference: String,
    /// Why it failed.
    pub error: Box<MemoryError>,
}

impl fmt::Display for ReferenceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "argument '{}' ({}): {}",
            self.location, self.reference, self.error
        )
    }
}

fn describe_failures(failures: &[ReferenceFailure]) -> String {
    let noun = if failures.len() == 1 {
        "reference"
    } else {
        "references"
    };
    let mut out = format!("failed to resolve {} {noun}:", failures.len());
    for failure in failures {
        out.push_str(&format!("\n  - {failure}"));
    }
    out
}

/// Result alias for memory operations.
pub type Result<T, E = MemoryError> = std::result::Result<T, E>;

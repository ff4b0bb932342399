//! The handle returned by output-storing calls.

use super::store::ObjectId;
use super::value::Value;
use std::fmt;
use std::ops::Deref;

/// A value that has been stored, together with its id and preview.
///
/// Formats as the preview, so returning it to the agent shows the compact
/// rendering. Dereferences to the raw value, so code written against the
/// unwrapped result keeps working.
#[derive(Debug, Clone)]
pub struct Explorable<T> {
    id: ObjectId,
    value: T,
    preview: String,
}

impl<T> Explorable<T> {
    pub(crate) fn new(id: ObjectId, value: T, preview: String) -> Self {
        Self { id, value, preview }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// `@obj_NNN`, ready to pass to a referenceable tool.
    pub fn reference(&self) -> String {
        format!("@{}", self.id)
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }
}

impl<T> Deref for Explorable<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> fmt::Display for Explorable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.preview)
    }
}

/// Storing or substituting an `Explorable` uses its raw value; wrappers
/// never nest.
impl From<Explorable<Value>> for Value {
    fn from(explorable: Explorable<Value>) -> Self {
        explorable.into_value()
    }
}

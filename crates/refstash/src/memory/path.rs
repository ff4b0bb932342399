//! Path expressions: parsing `a.b.0`, `["a"]["b"][0]`, and mixes of both,
//! and walking them through a [`Value`].

use super::error::{MemoryError, Result};
use super::value::Value;
use std::fmt;
use std::str::FromStr;

/// Maximum number of key names listed in a resolution error.
const MAX_KEYS_IN_ERROR: usize = 10;

/// One navigation step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A map key or record field name.
    Field(String),
    /// A zero-based sequence position.
    Index(usize),
}

impl Segment {
    fn is_bare(&self) -> bool {
        match self {
            Segment::Index(_) => true,
            Segment::Field(name) => {
                !name.is_empty()
                    && !name.chars().all(|c| c.is_ascii_digit())
                    && name.trim() == name
                    && !name.contains(['.', '[', ']', '"', '\''])
            }
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Index(i) => write!(f, "{i}"),
            Segment::Field(name) if self.is_bare() => f.write_str(name),
            Segment::Field(name) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "[\"{escaped}\"]")
            }
        }
    }
}

/// A parsed path. The empty path addresses the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PathExpression {
    segments: Vec<Segment>,
}

impl PathExpression {
    /// The empty path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path string.
    ///
    /// Segments are separated by `.` or written as bracket literals
    /// (`["key"]`, `['key']`, `[0]`). A bare all-digit segment is an index;
    /// a quoted bracket literal is always a field name.
    pub fn parse(input: &str) -> Result<Self> {
        let text = input.trim();
        let chars: Vec<char> = text.chars().collect();
        let mut segments = Vec::new();
        let mut pos = 0;

        while pos < chars.len() {
            let first = segments.is_empty();
            match chars[pos] {
                '[' => {
                    let (segment, next) = parse_bracket(&chars, pos, text)?;
                    segments.push(segment);
                    pos = next;
                }
                ']' => return Err(MemoryError::malformed(text, "unbalanced ']'")),
                '.' if first => {
                    return Err(MemoryError::malformed(text, "path cannot start with '.'"));
                }
                '.' => {
                    pos += 1;
                    match chars.get(pos) {
                        None => return Err(MemoryError::malformed(text, "path ends with '.'")),
                        Some('.') | Some('[') => {
                            return Err(MemoryError::malformed(text, "empty segment after '.'"));
                        }
                        Some(_) => {}
                    }
                    let (segment, next) = parse_bare(&chars, pos, text)?;
                    segments.push(segment);
                    pos = next;
                }
                _ if first => {
                    let (segment, next) = parse_bare(&chars, pos, text)?;
                    segments.push(segment);
                    pos = next;
                }
                c => {
                    return Err(MemoryError::malformed(
                        text,
                        format!("expected '.' or '[' after ']', found '{c}'"),
                    ));
                }
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    /// Walk the path through `root`.
    ///
    /// Field segments look up map keys or record fields; index segments
    /// index sequences. Anything else is a [`MemoryError::PathResolution`].
    pub fn navigate<'v>(&self, root: &'v Value) -> Result<&'v Value> {
        self.segments
            .iter()
            .try_fold(root, |current, segment| step(current, segment))
    }
}

impl FromStr for PathExpression {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 && segment.is_bare() {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Parse and navigate in one go.
pub fn navigate<'v>(root: &'v Value, path: &str) -> Result<&'v Value> {
    PathExpression::parse(path)?.navigate(root)
}

fn parse_bare(chars: &[char], start: usize, text: &str) -> Result<(Segment, usize)> {
    let mut end = start;
    while end < chars.len() && !matches!(chars[end], '.' | '[' | ']') {
        end += 1;
    }
    if chars.get(end) == Some(&']') {
        return Err(MemoryError::malformed(text, "unbalanced ']'"));
    }
    let token: String = chars[start..end].iter().collect();
    if token.is_empty() {
        return Err(MemoryError::malformed(text, "empty segment"));
    }
    Ok((classify_bare(&token, text)?, end))
}

fn classify_bare(token: &str, text: &str) -> Result<Segment> {
    if token.chars().all(|c| c.is_ascii_digit()) {
        token
            .parse::<usize>()
            .map(Segment::Index)
            .map_err(|_| MemoryError::malformed(text, format!("index '{token}' is too large")))
    } else {
        Ok(Segment::Field(token.to_string()))
    }
}

fn parse_bracket(chars: &[char], open: usize, text: &str) -> Result<(Segment, usize)> {
    let mut pos = open + 1;
    match chars.get(pos) {
        Some(&quote) if quote == '"' || quote == '\'' => {
            pos += 1;
            let mut key = String::new();
            loop {
                match chars.get(pos) {
                    None => return Err(MemoryError::malformed(text, "unterminated quoted key")),
                    Some('\\') => {
                        let Some(escaped) = chars.get(pos + 1) else {
                            return Err(MemoryError::malformed(text, "unterminated quoted key"));
                        };
                        key.push(*escaped);
                        pos += 2;
                    }
                    Some(c) if *c == quote => {
                        pos += 1;
                        break;
                    }
                    Some(c) => {
                        key.push(*c);
                        pos += 1;
                    }
                }
            }
            if chars.get(pos) != Some(&']') {
                return Err(MemoryError::malformed(
                    text,
                    "expected ']' after quoted key",
                ));
            }
            Ok((Segment::Field(key), pos + 1))
        }
        _ => {
            let Some(offset) = chars[pos..].iter().position(|c| *c == ']') else {
                return Err(MemoryError::malformed(text, "unbalanced '['"));
            };
            let close = pos + offset;
            let inner: String = chars[pos..close].iter().collect();
            let inner = inner.trim();
            if inner.starts_with('-') {
                return Err(MemoryError::malformed(
                    text,
                    "negative indices are not supported",
                ));
            }
            if inner.is_empty() || !inner.chars().all(|c| c.is_ascii_digit()) {
                return Err(MemoryError::malformed(
                    text,
                    format!("'[{inner}]' must hold a quoted key or a non-negative integer"),
                ));
            }
            Ok((classify_bare(inner, text)?, close + 1))
        }
    }
}

fn step<'v>(value: &'v Value, segment: &Segment) -> Result<&'v Value> {
    match (segment, value) {
        (Segment::Field(name), Value::Map(map)) => map.get(name).ok_or_else(|| {
            resolution_error(
                segment,
                value,
                format!("no key '{name}'; available keys: {}", list_keys(map.keys())),
            )
        }),
        (Segment::Field(name), Value::Record(record)) => record.get(name).ok_or_else(|| {
            resolution_error(
                segment,
                value,
                format!(
                    "no field '{name}'; available fields: {}",
                    list_names(record.field_names())
                ),
            )
        }),
        (Segment::Field(_), Value::Sequence(items)) => Err(resolution_error(
            segment,
            value,
            format!(
                "lists are indexed by position (0..{}), not by name",
                items.len()
            ),
        )),
        (Segment::Field(_), _) => Err(resolution_error(segment, value, "value has no fields")),
        (Segment::Index(i), Value::Sequence(items)) => items.get(*i).ok_or_else(|| {
            let len = items.len();
            let detail = format!("index {i} is out of range for a list of length {len}");
            resolution_error(segment, value, detail)
        }),
        (Segment::Index(i), Value::Map(map)) if map.contains_key(&i.to_string()) => {
            Err(resolution_error(
                segment,
                value,
                format!("numeric segments index lists; write [\"{i}\"] to select the key '{i}'"),
            ))
        }
        (Segment::Index(_), _) => Err(resolution_error(
            segment,
            value,
            "only lists can be indexed by position",
        )),
    }
}

fn resolution_error(segment: &Segment, value: &Value, reason: impl Into<String>) -> MemoryError {
    MemoryError::PathResolution {
        segment: segment.to_string(),
        type_name: value.type_name(),
        reason: reason.into(),
    }
}

fn list_keys<'a>(keys: impl Iterator<Item = &'a String>) -> String {
    list_names(keys.map(String::as_str))
}

fn list_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let names: Vec<&str> = names.collect();
    if names.is_empty() {
        return "(none)".to_string();
    }
    let mut out = names
        .iter()
        .take(MAX_KEYS_IN_ERROR)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");
    if names.len() > MAX_KEYS_IN_ERROR {
        out.push_str(&format!(", … ({} total)", names.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(name: &str) -> Segment {
        Segment::Field(name.into())
    }

    #[test]
    fn empty_path_is_root() {
        let path = PathExpression::parse("").unwrap();
        assert!(path.is_empty());
        let value = Value::from_json(json!({"a": 1}));
        assert_eq!(path.navigate(&value).unwrap(), &value);
    }

    #[test]
    fn dotted_and_bracket_forms() {
        let dotted = PathExpression::parse("a.0.name").unwrap();
        assert_eq!(
            dotted.segments(),
            &[field("a"), Segment::Index(0), field("name")]
        );

        let bracketed = PathExpression::parse(r#"["a"][0]['name']"#).unwrap();
        assert_eq!(bracketed, dotted);

        let mixed = PathExpression::parse(r#"a[0].name"#).unwrap();
        assert_eq!(mixed, dotted);
    }

    #[test]
    fn quoted_digits_are_fields() {
        let path = PathExpression::parse(r#"["0"]"#).unwrap();
        assert_eq!(path.segments(), &[field("0")]);
    }

    #[test]
    fn quoted_keys_may_contain_separators() {
        let path = PathExpression::parse(r#"["a.b"]["c[d]"]["say \"hi\""]"#).unwrap();
        assert_eq!(
            path.segments(),
            &[field("a.b"), field("c[d]"), field("say \"hi\"")]
        );
    }

    #[test]
    fn malformed_paths() {
        let cases = [
            "a..b", ".a", "a.", "a[0", "a]", "a[", r#"["a"#, "a[-1]", "a[x]", "a.[0]", r#"["a"]b"#,
        ];
        for bad in cases {
            let err = PathExpression::parse(bad).unwrap_err();
            assert!(
                matches!(err, MemoryError::MalformedPath { .. }),
                "{bad} gave {err:?}"
            );
        }
    }

    #[test]
    fn display_round_trips() {
        for text in ["a.b.1", r#"a["x.y"].0"#, r#"["0"].k"#, "items.12.meta"] {
            let path = PathExpression::parse(text).unwrap();
            assert_eq!(PathExpression::parse(&path.to_string()).unwrap(), path);
        }
        assert_eq!(PathExpression::parse("a.b.1").unwrap().to_string(), "a.b.1");
    }

    #[test]
    fn navigate_nested() {
        let value = Value::from_json(json!({"a": {"b": [10, 20, 30]}}));
        assert_eq!(navigate(&value, "a.b.1").unwrap(), &Value::from(20));
    }

    #[test]
    fn index_out_of_range() {
        let value = Value::from_json(json!({"a": {"b": [10, 20, 30]}}));
        let err = navigate(&value, "a.b.9").unwrap_err();
        let MemoryError::PathResolution {
            segment,
            type_name,
            reason,
        } = err
        else {
            panic!("expected a resolution error");
        };
        assert_eq!(segment, "9");
        assert_eq!(type_name, "list");
        assert!(reason.contains("length 3"));
    }

    #[test]
    fn missing_key_lists_available_keys() {
        let value = Value::from_json(json!({"alpha": 1, "beta": 2}));
        let err = navigate(&value, "gamma").unwrap_err();
        assert!(err.to_string().contains("alpha, beta"));
    }

    #[test]
    fn record_fields_are_navigable() {
        let record = crate::memory::value::Record::new("Pipeline")
            .with_field("name", "rag")
            .with_field("tags", Value::Sequence(vec!["a".into(), "b".into()]));
        let value = Value::Record(record);
        assert_eq!(navigate(&value, "tags.1").unwrap(), &Value::from("b"));
        let err = navigate(&value, "owner").unwrap_err();
        assert!(err.to_string().contains("on Pipeline"));
        assert!(err.to_string().contains("available fields: name, tags"));
    }

    #[test]
    fn numeric_segment_on_map_hints_at_bracket_form() {
        let value = Value::from_json(json!({"0": "zero"}));
        let err = navigate(&value, "0").unwrap_err();
        assert!(err.to_string().contains(r#"["0"]"#));
        assert_eq!(navigate(&value, r#"["0"]"#).unwrap(), &Value::from("zero"));
    }

    #[test]
    fn negative_bare_segment_is_a_field_and_fails_on_lists() {
        let value = Value::from_json(json!([1, 2, 3]));
        let err = navigate(&value, "-1").unwrap_err();
        assert!(matches!(err, MemoryError::PathResolution { .. }));
    }

    #[test]
    fn index_on_scalar_fails() {
        let value = Value::from_json(json!({"n": 5}));
        let err = navigate(&value, "n.0").unwrap_err();
        assert!(err.to_string().contains("on int"));
    }
}

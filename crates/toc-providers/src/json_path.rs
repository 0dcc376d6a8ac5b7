//! Dotted path lookup over provider JSON responses
//!
//! Different API versions put the same logical field (operation id, status,
//! output URL) in different places, so callers try an ordered list of paths
//! and take the first non-empty match.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use toc_core::TocError;

/// A parsed path such as `data.task.0.url`; numeric segments index arrays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    source: String,
    segments: Vec<String>,
}

impl JsonPath {
    /// Resolve the path. Null values count as missing.
    pub fn lookup<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match current {
                Value::Array(items) => items.get(Self::index(segment)?)?,
                Value::Object(map) => map.get(segment.as_str())?,
                _ => return None,
            };
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }

    /// Arrays are indexed by all-digit segments only
    fn index(raw: &str) -> Option<usize> {
        if raw.bytes().all(|b| b.is_ascii_digit()) {
            raw.parse().ok()
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for JsonPath {
    type Err = TocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<String> = s.split('.').map(|part| part.trim().to_string()).collect();
        if segments.iter().any(|part| part.is_empty()) {
            return Err(TocError::Config(format!("Invalid JSON path: '{}'", s)));
        }
        Ok(Self {
            source: s.trim().to_string(),
            segments,
        })
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse a list of paths, skipping (and logging) malformed entries
pub fn parse_paths<S: AsRef<str>>(raw: &[S]) -> Vec<JsonPath> {
    raw.iter()
        .filter_map(|p| match p.as_ref().parse::<JsonPath>() {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::warn!(error = %err, "skipping JSON path");
                None
            }
        })
        .collect()
}

/// First path whose value is present and not a blank string
pub fn first_non_empty<'v>(root: &'v Value, paths: &[JsonPath]) -> Option<&'v Value> {
    paths.iter().find_map(|path| {
        let value = path.lookup(root)?;
        match value {
            Value::String(s) if s.trim().is_empty() => None,
            other => Some(other),
        }
    })
}

/// Render a path list for error messages
pub fn describe_paths(paths: &[JsonPath]) -> String {
    let names: Vec<&str> = paths.iter().map(|p| p.as_str()).collect();
    format!("[{}]", names.join(", "))
}

/// Render the top-level keys of a response for error messages
pub fn describe_keys(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("[{}]", keys.join(", "))
        }
        _ => "[]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> JsonPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_lookup_objects_and_arrays() {
        let value = json!({"data": {"items": [{"url": "a"}, {"url": "b"}]}});
        assert_eq!(path("data.items.1.url").lookup(&value), Some(&json!("b")));
        assert_eq!(path("data.items.9.url").lookup(&value), None);
        // arrays need numeric segments
        assert_eq!(path("data.items.url").lookup(&value), None);
        // scalars cannot be descended into
        assert_eq!(path("data.items.0.url.x").lookup(&value), None);
    }

    #[test]
    fn test_numeric_key_on_object() {
        let value = json!({"0": "zero"});
        assert_eq!(path("0").lookup(&value), Some(&json!("zero")));
    }

    #[test]
    fn test_null_counts_as_missing() {
        let value = json!({"id": null, "data": {"id": "task-1"}});
        let paths = parse_paths(&["id", "data.id"]);
        assert_eq!(first_non_empty(&value, &paths), Some(&json!("task-1")));
    }

    #[test]
    fn test_blank_strings_are_skipped() {
        let value = json!({"status": "  ", "task": {"status": "RUNNING"}});
        let paths = parse_paths(&["status", "task.status"]);
        assert_eq!(first_non_empty(&value, &paths), Some(&json!("RUNNING")));
        assert_eq!(first_non_empty(&json!({}), &paths), None);
    }

    #[test]
    fn test_invalid_paths() {
        assert!("data..id".parse::<JsonPath>().is_err());
        assert!("".parse::<JsonPath>().is_err());
        assert_eq!(parse_paths(&["a.", "b"]).len(), 1);
        assert_eq!(describe_paths(&parse_paths(&["a", "b.c"])), "[a, b.c]");
        assert_eq!(describe_keys(&json!({"code": 1})), "[code]");
    }
}

// src/health/json_path.rs
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Minimal JSON path: `$.status`, `$.checks[0].state`, or a bare `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid json path `{path}`: {reason}")]
pub struct JsonPathError {
    path: String,
    reason: &'static str,
}

impl JsonPath {
    pub fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| match segment {
                Segment::Key(key) => current.get(key.as_str()),
                Segment::Index(index) => current.get(*index),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for JsonPath {
    type Err = JsonPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| JsonPathError {
            path: s.to_string(),
            reason,
        };

        let body = s.trim();
        let body = body.strip_prefix('$').unwrap_or(body);
        let normalized = if body.is_empty() || body.starts_with('.') || body.starts_with('[') {
            body.to_string()
        } else {
            format!(".{body}")
        };

        let mut segments = Vec::new();
        let mut rest = normalized.as_str();
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('.') {
                let end = after
                    .find(|c| c == '.' || c == '[')
                    .unwrap_or(after.len());
                let key = &after[..end];
                if key.is_empty() {
                    return Err(invalid("empty key"));
                }
                segments.push(Segment::Key(key.to_string()));
                rest = &after[end..];
            } else if let Some(after) = rest.strip_prefix('[') {
                let end = after.find(']').ok_or_else(|| invalid("unclosed `[`"))?;
                let index = after[..end]
                    .trim()
                    .parse()
                    .map_err(|_| invalid("index must be a non-negative integer"))?;
                segments.push(Segment::Index(index));
                rest = &after[end + 1..];
            } else {
                return Err(invalid("expected `.` or `[`"));
            }
        }

        if segments.is_empty() {
            return Err(invalid("path selects nothing"));
        }

        Ok(Self {
            raw: s.trim().to_string(),
            segments,
        })
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for JsonPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_nested() {
        let body = json!({"status": "UP", "components": {"db": {"status": "DOWN"}}, "nodes": [{"id": 7}]});

        let top: JsonPath = "$.status".parse().unwrap();
        assert_eq!(top.lookup(&body), Some(&json!("UP")));

        let nested: JsonPath = "$.components.db.status".parse().unwrap();
        assert_eq!(nested.lookup(&body), Some(&json!("DOWN")));

        let indexed: JsonPath = "$.nodes[0].id".parse().unwrap();
        assert_eq!(indexed.lookup(&body), Some(&json!(7)));

        let bare: JsonPath = "status".parse().unwrap();
        assert_eq!(bare.lookup(&body), Some(&json!("UP")));
    }

    #[test]
    fn test_lookup_missing() {
        let path: JsonPath = "$.health.status".parse().unwrap();
        assert_eq!(path.lookup(&json!({"status": "UP"})), None);
    }

    #[test]
    fn test_invalid_paths() {
        assert!("$".parse::<JsonPath>().is_err());
        assert!("$..status".parse::<JsonPath>().is_err());
        assert!("$.nodes[x]".parse::<JsonPath>().is_err());
        assert!("$.nodes[0".parse::<JsonPath>().is_err());
    }
}

//! Structural validation of LLM-produced JSON.
//!
//! Each diagram type walks the raw [`serde_json::Value`] by recursive descent
//! and either builds the typed model or stops at the first problem. The
//! resulting [`ValidationError`] names the offending path, e.g.
//! `Elements[6].AltBlock.Branches[1].Condition`, because its text is fed
//! verbatim into the next prompt.
//!
//! Field lookup is lenient about case: the documented PascalCase key is tried
//! first, then any key that matches ignoring ASCII case.

pub mod er;
pub mod flow;
pub mod sequence;
pub mod usecase;

use std::fmt;

use serde_json::{Map, Value};

use crate::{DiagramModel, DiagramType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.reason)
        } else {
            write!(f, "{}: {}", self.path, self.reason)
        }
    }
}

impl std::error::Error for ValidationError {}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Validate `json` against the contract for `diagram_type`.
pub fn validate(json: &Value, diagram_type: DiagramType) -> Result<DiagramModel> {
    match diagram_type {
        DiagramType::Sequence => sequence::validate(json).map(DiagramModel::Sequence),
        DiagramType::Er => er::validate(json).map(DiagramModel::Er),
        DiagramType::Flowchart => flow::validate(json).map(DiagramModel::Flowchart),
        DiagramType::UseCase => usecase::validate(json).map(DiagramModel::UseCase),
        DiagramType::State => Err(ValidationError::new(
            "",
            "state diagrams are not supported",
        )),
    }
}

/// A position inside a JSON document, carrying its path for error messages.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Cursor<'a> {
    pub fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: String::new(),
        }
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn error(&self, reason: impl Into<String>) -> ValidationError {
        ValidationError::new(self.path.clone(), reason)
    }

    fn child_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    pub fn as_object(&self) -> Result<&'a Map<String, Value>> {
        self.value.as_object().ok_or_else(|| {
            self.error(format!("expected a JSON object, found {}", kind_of(self.value)))
        })
    }

    /// Keys present on this object, in document order.
    pub fn keys(&self) -> Vec<&'a str> {
        self.value
            .as_object()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Look up `key`, exact spelling first, then ignoring ASCII case.
    /// `null` counts as absent.
    pub fn get(&self, key: &str) -> Option<Cursor<'a>> {
        let map = self.value.as_object()?;
        let value = map.get(key).or_else(|| {
            map.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })?;
        if value.is_null() {
            return None;
        }
        Some(Cursor {
            value,
            path: self.child_path(key),
        })
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn field(&self, key: &str) -> Result<Cursor<'a>> {
        self.as_object()?;
        self.get(key).ok_or_else(|| {
            ValidationError::new(self.child_path(key), "missing required field")
        })
    }

    /// This value as a non-empty, trimmed string.
    pub fn text(&self) -> Result<String> {
        match self.value {
            Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            Value::String(_) => Err(self.error("must not be empty")),
            other => Err(self.error(format!("expected a string, found {}", kind_of(other)))),
        }
    }

    pub fn string(&self, key: &str) -> Result<String> {
        self.field(key)?.text()
    }

    /// Absent, null and blank all map to `None`.
    pub fn optional_string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(c) => match c.value {
                Value::String(s) if s.trim().is_empty() => Ok(None),
                Value::String(s) => Ok(Some(s.trim().to_string())),
                other => Err(c.error(format!("expected a string, found {}", kind_of(other)))),
            },
        }
    }

    pub fn string_or_empty(&self, key: &str) -> Result<String> {
        Ok(self.optional_string(key)?.unwrap_or_default())
    }

    pub fn bool(&self, key: &str) -> Result<bool> {
        let c = self.field(key)?;
        match c.value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(c.error(format!("expected a boolean, found {}", kind_of(other)))),
        }
    }

    fn items(&self) -> Result<Vec<Cursor<'a>>> {
        let array = self.value.as_array().ok_or_else(|| {
            self.error(format!("expected an array, found {}", kind_of(self.value)))
        })?;
        Ok(array
            .iter()
            .enumerate()
            .map(|(i, value)| Cursor {
                value,
                path: format!("{}[{}]", self.path, i),
            })
            .collect())
    }

    /// Required array, possibly empty.
    pub fn array(&self, key: &str) -> Result<Vec<Cursor<'a>>> {
        self.field(key)?.items()
    }

    /// Required array with at least one item.
    pub fn non_empty_array(&self, key: &str) -> Result<Vec<Cursor<'a>>> {
        let field = self.field(key)?;
        let items = field.items()?;
        if items.is_empty() {
            return Err(field.error("must contain at least one item"));
        }
        Ok(items)
    }

    /// Optional array; absent means empty.
    pub fn optional_array(&self, key: &str) -> Result<Vec<Cursor<'a>>> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(c) => c.items(),
        }
    }

    /// Parse a required enumerated field, listing the allowed values on failure.
    pub fn choice<T>(&self, key: &str, parse: fn(&str) -> Option<T>, allowed: &[&str]) -> Result<T> {
        let c = self.field(key)?;
        let raw = c.text()?;
        parse(&raw).ok_or_else(|| {
            c.error(format!(
                "invalid value `{}`, expected one of {}",
                raw,
                allowed.join(", ")
            ))
        })
    }
}

/// Resolve a reference against declared names: exact match first, then
/// ignoring case. Returns the declared spelling.
pub fn resolve_name<'n>(name: &str, declared: &'n [String]) -> Option<&'n String> {
    let name = name.trim();
    declared
        .iter()
        .find(|d| d.as_str() == name)
        .or_else(|| declared.iter().find(|d| d.eq_ignore_ascii_case(name)))
}

/// Resolve `key` on `item` against `declared`, or fail naming the known set.
pub fn reference(item: &Cursor<'_>, key: &str, declared: &[String], what: &str) -> Result<String> {
    let raw = item.string(key)?;
    resolve_name(&raw, declared).cloned().ok_or_else(|| {
        let path = item.field(key).map(|c| c.path().to_string()).unwrap_or_default();
        ValidationError::new(
            path,
            format!("unknown {what} `{raw}`; declared: {}", list_or_none(declared)),
        )
    })
}

pub(crate) fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

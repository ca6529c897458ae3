//! Records collected during a scan and consolidated afterwards

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Extra JSON members carried through a read/rewrite cycle untouched
pub type Extra = serde_json::Map<String, serde_json::Value>;

/// Decode `null` the same way as a missing field.
///
/// Artifacts written by other tools use `null` for absent alert attributes.
pub fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a flag from any JSON value by truthiness.
///
/// Attribute values are often serialized as found in the page, so
/// `"required": "required"` and `"required": 1` both mean set, while `null`,
/// `""`, `0` and empty containers mean unset.
pub fn truthy_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => flag,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(members)) => !members.is_empty(),
    })
}

/// An input field inside a form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// Field name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Input type (text, password, hidden, ...)
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub input_type: String,
    /// Element id
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// Whether the `required` attribute is present
    #[serde(default, deserialize_with = "truthy_bool")]
    pub required: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Input {
    pub fn new(name: impl Into<String>, input_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_type: input_type.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// An HTML form discovered on a crawled page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Form {
    /// Form action, raw until consolidation normalizes it to a path
    #[serde(default, deserialize_with = "null_as_default")]
    pub action: String,
    /// HTTP method as written in the page
    #[serde(default, deserialize_with = "null_as_default")]
    pub method: String,
    /// Input fields in document order
    #[serde(default, deserialize_with = "null_as_default")]
    pub inputs: Vec<Input>,
    /// Vulnerability description attached by consolidation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Form {
    pub fn new(action: impl Into<String>, method: impl Into<String>, inputs: Vec<Input>) -> Self {
        Self {
            action: action.into(),
            method: method.into(),
            inputs,
            ..Default::default()
        }
    }

    /// Attached description, or the empty string if none
    pub fn feedback(&self) -> &str {
        self.feedback.as_deref().unwrap_or_default()
    }
}

/// A potential vulnerability reported by the scan engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackSurface {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub param: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attack: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub evidence: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub risk: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub solution: String,
}

/// Deduplicating accumulator of discovered endpoint URLs.
///
/// Equality is exact string equality; nothing is normalized here. Iteration
/// follows first-insertion order so artifacts are stable between runs.
#[derive(Debug, Clone, Default)]
pub struct EndpointCollector {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl EndpointCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a URL; returns false if it was already present
    pub fn insert(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.seen.contains(&url) {
            return false;
        }
        self.seen.insert(url.clone());
        self.ordered.push(url);
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ordered.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.ordered.clone()
    }
}

impl<S: Into<String>> Extend<S> for EndpointCollector {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for url in iter {
            self.insert(url);
        }
    }
}

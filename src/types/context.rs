//! Opaque request context.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::message::Message;
use super::request::TaskType;

/// Free-form key/value context attached to a request by the caller.
///
/// The gateway only interprets a handful of well-known keys (`provider`,
/// `taskType`, `code`, `history`); everything else is passed through.
/// Context never takes part in the cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestContext(Map<String, Value>);

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn provider(&self) -> Option<&str> {
        self.str_field("provider")
    }

    pub fn task_type(&self) -> TaskType {
        self.str_field("taskType")
            .map(TaskType::parse)
            .unwrap_or_default()
    }

    /// Code snippet the user is working on, if any.
    pub fn code(&self) -> Option<&str> {
        self.str_field("code")
    }

    /// Prior conversation turns.
    ///
    /// Entries that do not look like `{role, content}` are skipped.
    pub fn history(&self) -> Vec<Message> {
        match self.0.get("history") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

impl From<Map<String, Value>> for RequestContext {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

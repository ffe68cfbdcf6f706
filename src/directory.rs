//! Node directory access
//!
//! The directory is the external source of user profiles (long and short
//! names) keyed by user id. On a live radio it is the device's node database;
//! for replayed captures it is a JSON dump of that database.
//!
//! Node records come in two shapes depending on which tool produced them, so
//! name extraction goes through [`user_names`], which accepts the profile
//! nested under either `user` or `userInfo` and field names in either
//! camelCase or snake_case.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Failed to read node directory '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse node directory '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Node directory '{0}' must be a JSON object keyed by user id")]
    NotAnObject(String),
    #[error("Node directory lookup failed: {0}")]
    Lookup(String),
}

/// Source of node records keyed by user id (`!a2ebdc20`)
pub trait NodeDirectory: Send + Sync {
    /// Fetch the raw record for `user_id`, if the directory knows it
    fn lookup(&self, user_id: &str) -> Result<Option<Value>, DirectoryError>;

    /// An empty directory can never resolve anything
    fn is_empty(&self) -> bool {
        false
    }
}

/// Long and short name pulled out of a node record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserNames {
    pub long_name: Option<String>,
    pub short_name: Option<String>,
}

impl UserNames {
    /// True when either name equals `value` exactly
    pub fn matches(&self, value: &str) -> bool {
        self.long_name.as_deref() == Some(value) || self.short_name.as_deref() == Some(value)
    }
}

/// Extract user names from a node record.
///
/// The profile is read from `user`, falling back to `userInfo` when `user` is
/// missing or empty. Each name prefers the camelCase key and falls back to the
/// snake_case key independently, so `{"longName": .., "short_name": ..}`
/// resolves both fields. An empty string counts as missing.
pub fn user_names(record: &Value) -> UserNames {
    let Some(profile) = user_profile(record) else {
        return UserNames::default();
    };

    UserNames {
        long_name: string_field(profile, "longName", "long_name"),
        short_name: string_field(profile, "shortName", "short_name"),
    }
}

fn user_profile(record: &Value) -> Option<&Map<String, Value>> {
    ["user", "userInfo"]
        .iter()
        .filter_map(|key| record.get(key).and_then(Value::as_object))
        .find(|profile| !profile.is_empty())
}

fn string_field(profile: &Map<String, Value>, camel: &str, snake: &str) -> Option<String> {
    name_at(profile, camel)
        .or_else(|| name_at(profile, snake))
        .map(str::to_string)
}

fn name_at<'a>(profile: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    profile
        .get(key)
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
}

/// Directory backed by an in-memory JSON object
#[derive(Debug, Clone, Default)]
pub struct JsonDirectory {
    nodes: HashMap<String, Value>,
}

impl JsonDirectory {
    pub fn new(nodes: HashMap<String, Value>) -> Self {
        Self { nodes }
    }

    /// Build from a JSON object keyed by user id
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::new(map.into_iter().collect())),
            _ => None,
        }
    }

    /// Load a node database dump from disk
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let path_display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| DirectoryError::Read {
            path: path_display.clone(),
            source,
        })?;

        let value: Value = serde_json::from_str(&raw).map_err(|source| DirectoryError::Parse {
            path: path_display.clone(),
            source,
        })?;

        Self::from_value(value).ok_or(DirectoryError::NotAnObject(path_display))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn insert(&mut self, user_id: impl Into<String>, record: Value) {
        self.nodes.insert(user_id.into(), record);
    }
}

impl NodeDirectory for JsonDirectory {
    fn lookup(&self, user_id: &str) -> Result<Option<Value>, DirectoryError> {
        Ok(self.nodes.get(user_id).cloned())
    }

    fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_camel_case_names() {
        let names = user_names(&json!({"user": {"longName": "ShutterBug", "shortName": "SB"}}));
        assert_eq!(names.long_name.as_deref(), Some("ShutterBug"));
        assert_eq!(names.short_name.as_deref(), Some("SB"));
    }

    #[test]
    fn test_snake_case_names_under_user_info() {
        let names = user_names(&json!({"userInfo": {"long_name": "Snake", "short_name": "S"}}));
        assert_eq!(names.long_name.as_deref(), Some("Snake"));
        assert_eq!(names.short_name.as_deref(), Some("S"));
    }

    #[test]
    fn test_camel_case_wins_per_field() {
        let names = user_names(&json!({"user": {
            "longName": "Camel",
            "long_name": "snake",
            "short_name": "s"
        }}));
        assert_eq!(names.long_name.as_deref(), Some("Camel"));
        assert_eq!(names.short_name.as_deref(), Some("s"));
    }

    #[test]
    fn test_empty_camel_case_falls_back_to_snake_case() {
        let names = user_names(&json!({"user": {
            "longName": "",
            "long_name": "Snake",
            "shortName": "",
        }}));
        assert_eq!(names.long_name.as_deref(), Some("Snake"));
        assert_eq!(names.short_name, None);
    }

    #[test]
    fn test_empty_user_falls_back_to_user_info() {
        let names = user_names(&json!({"user": {}, "userInfo": {"longName": "Alt"}}));
        assert_eq!(names.long_name.as_deref(), Some("Alt"));
        assert_eq!(names.short_name, None);
    }

    #[test]
    fn test_missing_profile_yields_no_names() {
        assert_eq!(user_names(&json!({})), UserNames::default());
        assert_eq!(user_names(&json!({"user": "oops"})), UserNames::default());
        assert_eq!(user_names(&json!({"user": {"longName": 7}})), UserNames::default());
    }

    #[test]
    fn test_json_directory_lookup() {
        let dir = JsonDirectory::from_value(json!({"!0000002a": {"user": {"shortName": "A"}}}))
            .expect("object");
        assert_eq!(dir.len(), 1);
        assert!(!NodeDirectory::is_empty(&dir));
        assert!(dir.lookup("!0000002a").unwrap().is_some());
        assert!(dir.lookup("!0000002b").unwrap().is_none());
        assert!(JsonDirectory::from_value(json!([1, 2])).is_none());
    }
}

use crate::constants::STATUS_OK;
use crate::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Query parameters for one explorer request, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiParams {
    pairs: Vec<(&'static str, String)>,
}

impl ApiParams {
    pub fn new(module: &str, action: &str) -> Self {
        Self {
            pairs: vec![("module", module.to_string()), ("action", action.to_string())],
        }
    }

    pub fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        self.pairs.push((key, value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }
}

/// Decoded explorer envelope: `{status, message, result}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: Option<String>,
    pub message: Option<String>,
    pub result: Option<Value>,
}

impl ApiResponse {
    pub fn from_json(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self {
                result: Some(value),
                ..Self::default()
            };
        };
        Self {
            status: map.remove("status").and_then(scalar_to_string),
            message: map.remove("message").and_then(scalar_to_string),
            result: map.remove("result").filter(|v| !v.is_null()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some(STATUS_OK)
    }

    /// The result list of a successful page, if there is a non-empty one.
    pub fn page_items(&self) -> Option<&[Value]> {
        if !self.is_success() {
            return None;
        }
        match &self.result {
            Some(Value::Array(items)) if !items.is_empty() => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn status_metadata(&self) -> Value {
        serde_json::json!({ "status": self.status, "message": self.message })
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Which block to pick when a timestamp falls between two blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Closest {
    Before,
    After,
}

impl Closest {
    pub fn as_str(&self) -> &'static str {
        match self {
            Closest::Before => "before",
            Closest::After => "after",
        }
    }
}

impl fmt::Display for Closest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Closest {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "before" => Ok(Closest::Before),
            "after" => Ok(Closest::After),
            _ => Err(EtlError::Config(format!("Invalid closest value: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_normalized_to_string() {
        let resp = ApiResponse::from_json(json!({"status": 1, "message": "OK", "result": "42"}));
        assert_eq!(resp.status.as_deref(), Some("1"));
        assert!(resp.is_success());
        assert_eq!(resp.result, Some(json!("42")));
    }

    #[test]
    fn test_page_items_requires_success_and_list() {
        let ok = ApiResponse::from_json(json!({"status": "1", "result": [{"a": 1}]}));
        assert_eq!(ok.page_items().map(|i| i.len()), Some(1));

        let empty = ApiResponse::from_json(json!({"status": "1", "result": []}));
        assert!(empty.page_items().is_none());

        let failed = ApiResponse::from_json(
            json!({"status": "0", "message": "No transactions found", "result": [{"a": 1}]}),
        );
        assert!(failed.page_items().is_none());

        let scalar = ApiResponse::from_json(json!({"status": "1", "result": "12"}));
        assert!(scalar.page_items().is_none());
    }

    #[test]
    fn test_params_keep_order() {
        let params = ApiParams::new("token", "tokenholderlist")
            .with("page", 2)
            .with("offset", 100);
        let keys: Vec<_> = params.pairs().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["module", "action", "page", "offset"]);
        assert_eq!(params.get("page"), Some("2"));
    }

    #[test]
    fn test_closest_parse() {
        assert_eq!("AFTER".parse::<Closest>().unwrap(), Closest::After);
        assert!("around".parse::<Closest>().is_err());
    }
}

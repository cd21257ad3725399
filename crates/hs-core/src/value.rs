use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::ObjectId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<HostValue>),
    Map(BTreeMap<String, HostValue>),
}

impl HostValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// An argument sent by the host: either a plain value or a live host object.
#[derive(Debug, Clone, PartialEq)]
pub enum HostArg {
    Value(HostValue),
    Object(ObjectId),
}

impl From<HostValue> for HostArg {
    fn from(value: HostValue) -> Self {
        Self::Value(value)
    }
}

impl From<ObjectId> for HostArg {
    fn from(id: ObjectId) -> Self {
        Self::Object(id)
    }
}

#[cfg(test)]
mod value_tests {
    use super::*;

    #[test]
    fn untagged_json_maps_onto_variants() {
        let value: HostValue =
            serde_json::from_str(r#"[null, true, 2.5, "x", {"k": [1]}]"#).expect("parse");
        assert_eq!(
            value,
            HostValue::Array(vec![
                HostValue::Null,
                HostValue::Bool(true),
                HostValue::Number(2.5),
                HostValue::String("x".to_string()),
                HostValue::Map(BTreeMap::from([(
                    "k".to_string(),
                    HostValue::Array(vec![HostValue::Number(1.0)]),
                )])),
            ])
        );
        assert_eq!(serde_json::to_string(&HostValue::Null).expect("null"), "null");
    }

    #[test]
    fn accessors_and_type_names() {
        assert_eq!(HostValue::from("a").as_string(), Some("a"));
        assert_eq!(HostValue::from(1.5).as_number(), Some(1.5));
        assert!(HostValue::Null.is_null());
        assert_eq!(HostValue::from(true).type_name(), "boolean");
        assert_eq!(HostArg::from(ObjectId(1)), HostArg::Object(ObjectId(1)));
    }
}

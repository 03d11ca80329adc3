//! Format arguments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Arguments passed to a record format, keyed by name.
///
/// A `BTreeMap` keeps descriptor documents stable and makes argument maps
/// comparable, which store spec matching relies on.
pub type FormatArgs = BTreeMap<String, ArgValue>;

/// A scalar format argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// A boolean flag.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A string.
    Text(String),
}

impl ArgValue {
    /// Returns the value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an integer, if it is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a string slice, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_serialize_as_plain_scalars() {
        let mut args = FormatArgs::new();
        args.insert("checksum".into(), true.into());
        args.insert("level".into(), 3i64.into());
        args.insert("codec".into(), "none".into());

        let json = serde_json::to_string(&args).unwrap();
        assert_eq!(json, r#"{"checksum":true,"codec":"none","level":3}"#);

        let back: FormatArgs = serde_json::from_str(&json).unwrap();
        assert_eq!(back, args);
    }

    #[test]
    fn accessors_match_variant() {
        assert_eq!(ArgValue::Bool(true).as_bool(), Some(true));
        assert_eq!(ArgValue::Int(1).as_bool(), None);
        assert_eq!(ArgValue::Int(7).as_int(), Some(7));
        assert_eq!(ArgValue::Text("x".into()).as_str(), Some("x"));
    }
}

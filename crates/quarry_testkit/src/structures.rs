//! Partition structures for tests.

use quarry_core::{
    register_structure, CborCodec, CoreError, CoreResult, RecordCodec, RecordType, Structure,
    TypedStructure,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Once};

/// Identity of [`PrefixStructure`].
pub const PREFIX_STRUCTURE: &str = "testkit/prefix";

/// Identity of [`EventStructure`].
pub const EVENT_STRUCTURE: &str = "testkit/event";

/// Routes strings by their first character.
///
/// Strings starting with `z` go one level deeper, under `z/<second char>`.
/// Every other string goes under `<first char>`. The empty string and a
/// lone `z` have no valid partition.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrefixStructure;

impl Structure for PrefixStructure {
    fn identity(&self) -> &str {
        PREFIX_STRUCTURE
    }

    fn record_type(&self) -> RecordType {
        RecordType::TEXT
    }

    fn is_valid_target(&self, dirs: &[&str]) -> bool {
        match dirs {
            ["z", second] => second.chars().count() == 1,
            [first] => *first != "z" && first.chars().count() == 1,
            _ => false,
        }
    }
}

impl TypedStructure for PrefixStructure {
    type Record = String;

    fn target(&self, record: &String) -> Vec<String> {
        let mut chars = record.chars();
        match (chars.next(), chars.next()) {
            (Some('z'), Some(second)) => vec!["z".to_string(), second.to_string()],
            (Some(first), _) => vec![first.to_string()],
            (None, _) => Vec::new(),
        }
    }

    fn serialize(&self, record: &String) -> CoreResult<Vec<u8>> {
        Ok(record.as_bytes().to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> CoreResult<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| CoreError::serialization(e.to_string()))
    }
}

/// A CBOR-encoded event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Event {
    /// Region code, the first partition level.
    pub region: String,
    /// Day number, the second partition level.
    pub day: u32,
    /// Opaque payload.
    pub payload: String,
}

impl Event {
    /// Creates an event.
    pub fn new(region: &str, day: u32, payload: &str) -> Self {
        Self {
            region: region.to_string(),
            day,
            payload: payload.to_string(),
        }
    }
}

/// Routes [`Event`]s to `<region>/<day>`.
#[derive(Debug, Default, Clone)]
pub struct EventStructure {
    codec: CborCodec<Event>,
}

impl Structure for EventStructure {
    fn identity(&self) -> &str {
        EVENT_STRUCTURE
    }

    fn record_type(&self) -> RecordType {
        self.codec.record_type()
    }

    fn is_valid_target(&self, dirs: &[&str]) -> bool {
        match dirs {
            [region, day] => !region.is_empty() && day.parse::<u32>().is_ok(),
            _ => false,
        }
    }
}

impl TypedStructure for EventStructure {
    type Record = Event;

    fn target(&self, record: &Event) -> Vec<String> {
        vec![record.region.clone(), record.day.to_string()]
    }

    fn serialize(&self, record: &Event) -> CoreResult<Vec<u8>> {
        self.codec.encode(record)
    }

    fn deserialize(&self, bytes: &[u8]) -> CoreResult<Event> {
        self.codec.decode(bytes)
    }
}

/// Registers the test structures so untyped handles can open their stores.
pub fn register_test_structures() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        register_structure(Arc::new(PrefixStructure));
        register_structure(Arc::new(EventStructure::default()));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_targets() {
        let s = PrefixStructure;
        assert_eq!(s.target(&"apple".to_string()), vec!["a"]);
        assert_eq!(s.target(&"zebra".to_string()), vec!["z", "e"]);
        assert_eq!(s.target(&"z".to_string()), vec!["z"]);
        assert!(s.target(&String::new()).is_empty());
    }

    #[test]
    fn test_prefix_validity() {
        let s = PrefixStructure;
        assert!(s.is_valid_target(&["a"]));
        assert!(s.is_valid_target(&["z", "e"]));
        assert!(!s.is_valid_target(&["z"]));
        assert!(!s.is_valid_target(&["ab"]));
        assert!(!s.is_valid_target(&["a", "b"]));
        assert!(!s.is_valid_target(&[]));
    }

    #[test]
    fn test_event_roundtrip() {
        let s = EventStructure::default();
        let event = Event::new("eu", 12, "click");
        assert_eq!(s.target(&event), vec!["eu", "12"]);
        let bytes = s.serialize(&event).unwrap();
        assert_eq!(s.deserialize(&bytes).unwrap(), event);
        assert!(s.is_valid_target(&["eu", "12"]));
        assert!(!s.is_valid_target(&["eu", "x"]));
    }
}

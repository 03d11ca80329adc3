//! Partition structures.
//!
//! A structure is the policy that decides which directory layouts a store
//! accepts and, for typed writes, which partition each record belongs to.
//! Stores persist only a structure's identity string; the
//! [`StructureRegistry`] maps identities back to implementations when an
//! untyped store is opened.
//!
//! ## Invariants
//!
//! - `is_valid_target` is a pure function of the directory components,
//!   measured from the store's physical root
//! - `target` returns components relative to the physical root
//! - `deserialize(serialize(r))` reproduces `r`

use crate::error::{CoreError, CoreResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

/// Identity of the structure used when a spec does not name one.
pub const DEFAULT_STRUCTURE: &str = "default";

/// Tag describing what a store's records are.
///
/// Appends between stores require equal record types, unless the
/// destination holds raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordType(&'static str);

impl RecordType {
    /// Opaque byte records.
    pub const BYTES: Self = Self("bytes");

    /// UTF-8 text records.
    pub const TEXT: Self = Self("text");

    /// Creates a record type tag.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the tag's name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.0
    }

    /// Returns true for the raw bytes type.
    #[must_use]
    pub fn is_bytes(&self) -> bool {
        *self == Self::BYTES
    }
}

/// Layout policy of a store.
pub trait Structure: Send + Sync + Debug {
    /// Returns the identity persisted in store descriptors.
    fn identity(&self) -> &str;

    /// Returns the type of records stored under this structure.
    fn record_type(&self) -> RecordType;

    /// Decides whether a directory, given as components from the store's
    /// physical root, may hold stored files.
    fn is_valid_target(&self, dirs: &[&str]) -> bool;
}

/// A structure that can route and encode typed records.
pub trait TypedStructure: Structure + 'static {
    /// The record type written and read through this structure.
    type Record;

    /// Returns the partition `record` belongs to, as components from the
    /// store's physical root.
    fn target(&self, record: &Self::Record) -> Vec<String>;

    /// Encodes a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded.
    fn serialize(&self, record: &Self::Record) -> CoreResult<Vec<u8>>;

    /// Decodes a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid record.
    fn deserialize(&self, bytes: &[u8]) -> CoreResult<Self::Record>;
}

/// Accepts every layout and stores raw bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStructure;

impl Structure for DefaultStructure {
    fn identity(&self) -> &str {
        DEFAULT_STRUCTURE
    }

    fn record_type(&self) -> RecordType {
        RecordType::BYTES
    }

    fn is_valid_target(&self, _dirs: &[&str]) -> bool {
        true
    }
}

impl TypedStructure for DefaultStructure {
    type Record = Vec<u8>;

    fn target(&self, _record: &Vec<u8>) -> Vec<String> {
        Vec::new()
    }

    fn serialize(&self, record: &Vec<u8>) -> CoreResult<Vec<u8>> {
        Ok(record.clone())
    }

    fn deserialize(&self, bytes: &[u8]) -> CoreResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// Accepts every layout and stores UTF-8 strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextStructure;

impl TextStructure {
    /// Identity of this structure.
    pub const IDENTITY: &'static str = "text";
}

impl Structure for TextStructure {
    fn identity(&self) -> &str {
        Self::IDENTITY
    }

    fn record_type(&self) -> RecordType {
        RecordType::TEXT
    }

    fn is_valid_target(&self, _dirs: &[&str]) -> bool {
        true
    }
}

impl TypedStructure for TextStructure {
    type Record = String;

    fn target(&self, _record: &String) -> Vec<String> {
        Vec::new()
    }

    fn serialize(&self, record: &String) -> CoreResult<Vec<u8>> {
        Ok(record.as_bytes().to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> CoreResult<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| CoreError::serialization(e.to_string()))
    }
}

/// A registry of structures keyed by identity.
///
/// The built-in `default` and `text` structures are always present.
/// Applications register their own before opening untyped handles to stores
/// that use them; typed handles carry their structure and skip the lookup.
pub struct StructureRegistry {
    structures: RwLock<HashMap<String, Arc<dyn Structure>>>,
}

impl Debug for StructureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.structures.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("StructureRegistry")
            .field("structures", &names)
            .finish()
    }
}

impl Default for StructureRegistry {
    fn default() -> Self {
        let registry = Self {
            structures: RwLock::new(HashMap::new()),
        };
        registry.register(Arc::new(DefaultStructure));
        registry.register(Arc::new(TextStructure));
        registry
    }
}

impl StructureRegistry {
    /// Creates a registry holding only the built-in structures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static StructureRegistry {
        static GLOBAL: OnceLock<StructureRegistry> = OnceLock::new();
        GLOBAL.get_or_init(StructureRegistry::default)
    }

    /// Registers (or replaces) a structure under its identity.
    pub fn register(&self, structure: Arc<dyn Structure>) {
        self.structures
            .write()
            .insert(structure.identity().to_string(), structure);
    }

    /// Looks up a structure by identity.
    #[must_use]
    pub fn get(&self, identity: &str) -> Option<Arc<dyn Structure>> {
        self.structures.read().get(identity).cloned()
    }

    /// Looks up a structure, failing if it is not registered.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] for unknown identities.
    pub fn resolve(&self, identity: &str) -> CoreResult<Arc<dyn Structure>> {
        self.get(identity).ok_or_else(|| {
            CoreError::configuration(format!("no structure registered as '{identity}'"))
        })
    }
}

/// Registers a structure in the global registry.
pub fn register_structure(structure: Arc<dyn Structure>) {
    StructureRegistry::global().register(structure);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Depth(usize);

    impl Structure for Depth {
        fn identity(&self) -> &str {
            "depth"
        }

        fn record_type(&self) -> RecordType {
            RecordType::BYTES
        }

        fn is_valid_target(&self, dirs: &[&str]) -> bool {
            dirs.len() == self.0
        }
    }

    #[test]
    fn default_structure_accepts_everything() {
        let s = DefaultStructure;
        assert!(s.is_valid_target(&[]));
        assert!(s.is_valid_target(&["a", "b", "c"]));
        assert!(s.record_type().is_bytes());
        assert!(s.target(&vec![1, 2]).is_empty());
    }

    #[test]
    fn text_structure_rejects_invalid_utf8() {
        let s = TextStructure;
        assert_eq!(s.deserialize(b"abc").unwrap(), "abc");
        assert!(matches!(
            s.deserialize(&[0xFF, 0xFE]),
            Err(CoreError::Serialization { .. })
        ));
    }

    #[test]
    fn registry_resolves_builtins_and_custom() {
        let registry = StructureRegistry::new();
        assert_eq!(registry.resolve("default").unwrap().identity(), "default");
        assert_eq!(registry.resolve("text").unwrap().record_type(), RecordType::TEXT);
        assert!(matches!(
            registry.resolve("depth"),
            Err(CoreError::Configuration { .. })
        ));

        registry.register(Arc::new(Depth(2)));
        let s = registry.resolve("depth").unwrap();
        assert!(s.is_valid_target(&["a", "b"]));
        assert!(!s.is_valid_target(&["a"]));
    }
}

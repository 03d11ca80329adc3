//! Name-to-format registry.
//!
//! Store descriptors name their record format as a string. The registry maps
//! those names to factories; `"framed"` is always present and applications
//! add their own formats with [`register_format`] before opening stores
//! that use them.

use crate::args::FormatArgs;
use crate::error::{FormatError, FormatResult};
use crate::format::RecordFormat;
use crate::framed::FramedFormat;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Name of the format used when a store spec does not name one.
pub const DEFAULT_FORMAT: &str = FramedFormat::NAME;

/// Builds a format instance from descriptor arguments.
pub type FormatFactory =
    Arc<dyn Fn(&FormatArgs) -> FormatResult<Arc<dyn RecordFormat>> + Send + Sync>;

/// A registry of record formats keyed by name.
pub struct FormatRegistry {
    factories: RwLock<HashMap<String, FormatFactory>>,
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.factories.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("FormatRegistry")
            .field("formats", &names)
            .finish()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let registry = Self {
            factories: RwLock::new(HashMap::new()),
        };
        registry.register(
            FramedFormat::NAME,
            Arc::new(|args: &FormatArgs| -> FormatResult<Arc<dyn RecordFormat>> {
                Ok(Arc::new(FramedFormat::from_args(args)?))
            }),
        );
        registry
    }
}

impl FormatRegistry {
    /// Creates a registry holding only the built-in formats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static FormatRegistry {
        static GLOBAL: OnceLock<FormatRegistry> = OnceLock::new();
        GLOBAL.get_or_init(FormatRegistry::default)
    }

    /// Registers (or replaces) the factory for `name`.
    pub fn register(&self, name: impl Into<String>, factory: FormatFactory) {
        self.factories.write().insert(name.into(), factory);
    }

    /// Returns true if a format is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    /// Instantiates the format registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::UnknownFormat`] if no such format exists, or
    /// the factory's error if it rejects `args`.
    pub fn create(&self, name: &str, args: &FormatArgs) -> FormatResult<Arc<dyn RecordFormat>> {
        let factory = self
            .factories
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| FormatError::UnknownFormat {
                name: name.to_string(),
            })?;
        factory(args)
    }
}

/// Registers a format factory in the global registry.
pub fn register_format(name: impl Into<String>, factory: FormatFactory) {
    FormatRegistry::global().register(name, factory);
}

/// Instantiates a format from the global registry.
///
/// # Errors
///
/// Returns [`FormatError::UnknownFormat`] for unregistered names.
pub fn create_format(name: &str, args: &FormatArgs) -> FormatResult<Arc<dyn RecordFormat>> {
    FormatRegistry::global().create(name, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_framed_builtin() {
        let registry = FormatRegistry::new();
        assert!(registry.contains(DEFAULT_FORMAT));
        let format = registry.create(DEFAULT_FORMAT, &FormatArgs::new()).unwrap();
        assert_eq!(format.name(), "framed");
    }

    #[test]
    fn registry_rejects_unknown_names() {
        let registry = FormatRegistry::new();
        assert!(matches!(
            registry.create("parquet", &FormatArgs::new()),
            Err(FormatError::UnknownFormat { .. })
        ));
    }

    #[test]
    fn registry_accepts_custom_formats() {
        let registry = FormatRegistry::new();
        registry.register(
            "plain",
            Arc::new(|_: &FormatArgs| -> FormatResult<Arc<dyn RecordFormat>> {
                Ok(Arc::new(FramedFormat::new(false)))
            }),
        );
        let format = registry.create("plain", &FormatArgs::new()).unwrap();
        assert_eq!(format.args().get("checksum").and_then(|v| v.as_bool()), Some(false));
    }
}

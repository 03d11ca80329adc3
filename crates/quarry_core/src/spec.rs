//! Store descriptors.
//!
//! Every store owns exactly one descriptor document, [`DESCRIPTOR_NAME`], at
//! its physical root. The descriptor records the record format, the format's
//! arguments and the identity of the partition structure:
//!
//! ```json
//! {"format": "framed", "args": {"checksum": true}, "structure": "default"}
//! ```
//!
//! Descriptors are written once, when the store is created, and never
//! rewritten afterwards.

use crate::error::{CoreError, CoreResult};
use crate::structure::DEFAULT_STRUCTURE;
use quarry_format::{create_format, ArgValue, FormatArgs, RecordFormat, DEFAULT_FORMAT};
use quarry_storage::FileSystem;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// File name of the descriptor document. Reserved in logical names.
pub const DESCRIPTOR_NAME: &str = "quarry.spec";

/// Format, arguments and structure of a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSpec {
    /// Registered format name; `None` selects the default format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Format arguments.
    #[serde(default)]
    pub args: FormatArgs,

    /// Structure identity; `None` selects the default structure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
}

impl StoreSpec {
    /// Creates a spec naming a format.
    #[must_use]
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: Some(format.into()),
            ..Self::default()
        }
    }

    /// Creates a spec naming only a structure.
    ///
    /// Creating a store from such a spec under an existing store only
    /// requires the structures to match.
    #[must_use]
    pub fn for_structure(identity: impl Into<String>) -> Self {
        Self {
            structure: Some(identity.into()),
            ..Self::default()
        }
    }

    /// Replaces the format arguments.
    #[must_use]
    pub fn with_args(mut self, args: FormatArgs) -> Self {
        self.args = args;
        self
    }

    /// Adds one format argument.
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Sets the structure identity.
    #[must_use]
    pub fn with_structure(mut self, identity: impl Into<String>) -> Self {
        self.structure = Some(identity.into());
        self
    }

    /// Returns the format name, falling back to the default format.
    #[must_use]
    pub fn format_name(&self) -> &str {
        self.format.as_deref().unwrap_or(DEFAULT_FORMAT)
    }

    /// Returns the structure identity, falling back to the default structure.
    #[must_use]
    pub fn structure_identity(&self) -> &str {
        self.structure.as_deref().unwrap_or(DEFAULT_STRUCTURE)
    }

    /// Instantiates the record format this spec names.
    ///
    /// # Errors
    ///
    /// Returns an error if the format is unknown or rejects the arguments.
    pub fn instantiate_format(&self) -> CoreResult<Arc<dyn RecordFormat>> {
        Ok(create_format(self.format_name(), &self.args)?)
    }

    /// Returns the spec as persisted for a store using `format`: every field
    /// filled in, arguments as the format reports them.
    #[must_use]
    pub fn normalized(&self, format: &dyn RecordFormat) -> Self {
        Self {
            format: Some(format.name().to_string()),
            args: format.args().clone(),
            structure: Some(self.structure_identity().to_string()),
        }
    }

    /// Encodes the descriptor document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| CoreError::serialization(e.to_string()))
    }

    /// Decodes a descriptor document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        serde_json::from_slice(data)
            .map_err(|e| CoreError::serialization(format!("invalid store descriptor: {e}")))
    }

    /// Reads the descriptor stored in `dir`.
    pub(crate) fn read_from(fs: &dyn FileSystem, dir: &Path) -> CoreResult<Self> {
        Self::decode(&fs.read_all(&dir.join(DESCRIPTOR_NAME))?)
    }

    /// Writes this spec as the descriptor of `dir`.
    pub(crate) fn write_to(&self, fs: &dyn FileSystem, dir: &Path) -> CoreResult<()> {
        fs.write_all(&dir.join(DESCRIPTOR_NAME), &self.encode()?, false)?;
        Ok(())
    }
}

impl PartialEq for StoreSpec {
    fn eq(&self, other: &Self) -> bool {
        self.format_name() == other.format_name()
            && self.args == other.args
            && self.structure_identity() == other.structure_identity()
    }
}

impl Eq for StoreSpec {}

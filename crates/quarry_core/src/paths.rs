//! Logical names and their physical paths.
//!
//! A logical name is a slash-separated path relative to a store's instance
//! root, such as `"a/b/part-0"`. Its stored file lives at the same path with
//! [`EXTENSION`] appended and its metadata side-car with [`META_EXTENSION`].
//! Components starting with [`RESERVED_PREFIX`] mark scratch directories
//! and are never part of a valid logical name.

use crate::error::{CoreError, CoreResult};
use crate::spec::DESCRIPTOR_NAME;
use std::path::Path;

/// Extension of stored record files.
pub const EXTENSION: &str = ".qrec";

/// Extension of metadata side-cars.
pub const META_EXTENSION: &str = ".qmeta";

/// Prefix of reserved (scratch) path components.
pub const RESERVED_PREFIX: char = '_';

/// Splits a logical name into its non-empty components.
pub(crate) fn components(name: &str) -> Vec<&str> {
    name.split('/').filter(|c| !c.is_empty()).collect()
}

/// Returns true for components naming scratch directories.
pub(crate) fn is_reserved(component: &str) -> bool {
    component.starts_with(RESERVED_PREFIX)
}

/// Checks that `name` is a usable logical name.
///
/// Rejects empty names, relative components, reserved components and names
/// that mention the descriptor file.
pub(crate) fn check_name(name: &str) -> CoreResult<()> {
    if name.contains(DESCRIPTOR_NAME) {
        return Err(CoreError::invalid_argument(format!(
            "'{name}' collides with the store descriptor"
        )));
    }
    let parts = components(name);
    if parts.is_empty() {
        return Err(CoreError::invalid_argument("empty name"));
    }
    for part in parts {
        if part == "." || part == ".." {
            return Err(CoreError::invalid_argument(format!(
                "'{name}' contains a relative component"
            )));
        }
        if is_reserved(part) {
            return Err(CoreError::invalid_argument(format!(
                "'{name}' contains reserved component '{part}'"
            )));
        }
    }
    Ok(())
}

/// Returns the parent of a logical name, or `""` at the top level.
pub(crate) fn parent(name: &str) -> &str {
    match name.trim_end_matches('/').rfind('/') {
        Some(idx) => &name[..idx],
        None => "",
    }
}

/// Joins two logical names.
pub(crate) fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Appends `extension` to the physical path of `name` under `root`.
pub(crate) fn with_extension(root: &Path, name: &str, extension: &str) -> std::path::PathBuf {
    let mut path = root.to_path_buf();
    for part in components(name) {
        path.push(part);
    }
    let mut os = path.into_os_string();
    os.push(extension);
    os.into()
}

/// Returns the logical name of a physical path below `root`, if the path
/// carries `extension`.
pub(crate) fn logical_name(root: &Path, path: &Path, extension: &str) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    let joined = parts.join("/");
    joined
        .strip_suffix(extension)
        .filter(|stem| !stem.is_empty() && !stem.ends_with('/'))
        .map(str::to_string)
}

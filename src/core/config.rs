//! Pack options
//!
//! Options can be built in code with the `with_*` setters or loaded from a
//! TOML file:
//!
//! ```toml
//! dot = true
//! ordering = "ordering.txt"
//! unpack = "*.node"
//! unpack_dir = "assets"
//! ```

use crate::error::{IoResultExt, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackOptions {
    /// Include entries whose name starts with `.`
    pub dot: bool,

    /// Ordering manifest path
    pub ordering: Option<PathBuf>,

    /// Base-name glob for files kept out of the archive body
    pub unpack: Option<String>,

    /// Directory glob or prefix kept out of the archive body
    pub unpack_dir: Option<String>,
}

impl PackOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dot(mut self, dot: bool) -> Self {
        self.dot = dot;
        self
    }

    pub fn with_ordering(mut self, ordering: impl Into<PathBuf>) -> Self {
        self.ordering = Some(ordering.into());
        self
    }

    pub fn with_unpack(mut self, pattern: impl Into<String>) -> Self {
        self.unpack = Some(pattern.into());
        self
    }

    pub fn with_unpack_dir(mut self, pattern: impl Into<String>) -> Self {
        self.unpack_dir = Some(pattern.into());
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load options from a file; a relative `ordering` is taken relative to
    /// the file's directory
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_path(path)?;
        let mut options = Self::from_toml_str(&text)?;
        if let (Some(ordering), Some(base)) = (options.ordering.as_mut(), path.parent()) {
            if ordering.is_relative() {
                *ordering = base.join(&*ordering);
            }
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AsarError;
    use tempfile::TempDir;

    #[test]
    fn test_builder_setters() {
        let options = PackOptions::new()
            .with_dot(true)
            .with_unpack("*.node")
            .with_unpack_dir("assets");
        assert!(options.dot);
        assert_eq!(options.unpack.as_deref(), Some("*.node"));
        assert_eq!(options.unpack_dir.as_deref(), Some("assets"));
        assert!(options.ordering.is_none());
    }

    #[test]
    fn test_from_toml_defaults() {
        let options = PackOptions::from_toml_str("").unwrap();
        assert_eq!(options, PackOptions::default());

        let options = PackOptions::from_toml_str("unpack = \"*.dll\"").unwrap();
        assert_eq!(options.unpack.as_deref(), Some("*.dll"));
        assert!(!options.dot);
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        let err = PackOptions::from_toml_str("compress = true").unwrap_err();
        assert!(matches!(err, AsarError::Config(_)));
    }

    #[test]
    fn test_from_toml_file_resolves_ordering() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("asar.toml");
        std::fs::write(&path, "dot = true\nordering = \"order.txt\"\n").unwrap();

        let options = PackOptions::from_toml_file(&path).unwrap();
        assert!(options.dot);
        assert_eq!(options.ordering, Some(dir.path().join("order.txt")));
    }
}

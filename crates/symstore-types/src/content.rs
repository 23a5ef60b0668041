use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::package::check_component;

/// Content key of a debug symbol: the image it belongs to plus the symbol
/// hash (signature + age for PDBs). Identifies content, not a package.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolName {
    image_name: String,
    symbol_hash: String,
}

impl SymbolName {
    pub fn new(image_name: impl Into<String>, symbol_hash: impl Into<String>) -> Self {
        Self {
            image_name: image_name.into(),
            symbol_hash: symbol_hash.into(),
        }
    }

    pub fn try_new(
        image_name: impl Into<String>,
        symbol_hash: impl Into<String>,
    ) -> Result<Self, TypeError> {
        let name = Self::new(image_name, symbol_hash);
        name.validate()?;
        Ok(name)
    }

    /// Check that both parts are non-empty and free of reserved characters.
    pub fn validate(&self) -> Result<(), TypeError> {
        check_component("image name", &self.image_name)?;
        check_component("symbol hash", &self.symbol_hash)
    }

    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    pub fn symbol_hash(&self) -> &str {
        &self.symbol_hash
    }
}

impl fmt::Display for SymbolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.image_name, self.symbol_hash)
    }
}

/// Content key of a source file: file name plus content hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceName {
    file_name: String,
    hash: String,
}

impl SourceName {
    pub fn new(file_name: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            hash: hash.into(),
        }
    }

    pub fn try_new(file_name: impl Into<String>, hash: impl Into<String>) -> Result<Self, TypeError> {
        let name = Self::new(file_name, hash);
        name.validate()?;
        Ok(name)
    }

    pub fn validate(&self) -> Result<(), TypeError> {
        check_component("file name", &self.file_name)?;
        check_component("source hash", &self.hash)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.file_name, self.hash)
    }
}

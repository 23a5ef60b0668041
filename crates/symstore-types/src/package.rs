use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Characters with structural meaning in storage keys (`*` joins composite
/// table keys, `/` joins object paths).
pub const RESERVED_CHARS: &[char] = &['*', '/'];

pub(crate) fn check_component(field: &'static str, value: &str) -> Result<(), TypeError> {
    if value.is_empty() {
        return Err(TypeError::Empty { field });
    }
    if let Some(ch) = value.chars().find(|c| RESERVED_CHARS.contains(c)) {
        return Err(TypeError::ReservedChar {
            field,
            ch,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Identity of a package independent of its state or owner.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageName {
    id: String,
    version: String,
}

impl PackageName {
    /// Create a name without validation.
    ///
    /// Storage writes call [`PackageName::validate`] and refuse names with
    /// `*` or `/`; use [`PackageName::try_new`] to fail at construction.
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }

    /// Create a name, rejecting empty parts and reserved key characters.
    pub fn try_new(id: impl Into<String>, version: impl Into<String>) -> Result<Self, TypeError> {
        let name = Self::new(id, version);
        name.validate()?;
        Ok(name)
    }

    /// Check that both parts are non-empty and free of reserved characters.
    pub fn validate(&self) -> Result<(), TypeError> {
        check_component("package id", &self.id)?;
        check_component("package version", &self.version)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Debug for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageName({}@{})", self.id, self.version)
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.version)
    }
}

/// Lifecycle tag of a package within a feed (e.g. submitted, current,
/// retired).
///
/// The set of states is feed policy and opaque to the storage layer: a state
/// is only ever used as a partition discriminator, always in lower-case form.
/// Transitions are performed by callers through move and copy.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageState(Cow<'static, str>);

impl PackageState {
    pub fn new(state: impl Into<String>) -> Self {
        Self(Cow::Owned(state.into()))
    }

    /// Const constructor so feed policies can declare their states as
    /// associated constants.
    pub const fn from_static(state: &'static str) -> Self {
        Self(Cow::Borrowed(state))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The form used in table partition keys and object paths.
    pub fn key_form(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageState {
    fn from(state: &str) -> Self {
        Self::new(state)
    }
}

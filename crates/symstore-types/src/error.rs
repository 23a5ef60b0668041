use thiserror::Error;

/// Errors produced when constructing domain identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} contains reserved character {ch:?}: {value}")]
    ReservedChar {
        field: &'static str,
        ch: char,
        value: String,
    },
}

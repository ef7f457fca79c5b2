//! Error types for id parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing or validating identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The id string is empty.
    #[error("ID cannot be empty")]
    Empty,

    /// The id contains a character that is not allowed.
    #[error("invalid character {character:?} in {kind} '{value}'")]
    InvalidCharacter {
        kind: &'static str,
        value: String,
        character: char,
    },

    /// The id exceeds the maximum length.
    #[error("{kind} '{value}' is {len} characters long (max {max})")]
    TooLong {
        kind: &'static str,
        value: String,
        len: usize,
        max: usize,
    },

    /// A logical id was requested for a path with no usable components.
    #[error("cannot derive a logical id from an empty path")]
    EmptyPath,

    /// The id format is invalid.
    #[error("invalid ID format: {message}")]
    InvalidFormat { message: String },
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty | IdError::EmptyPath)
    }
}

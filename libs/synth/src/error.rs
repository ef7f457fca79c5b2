//! Synthesis errors.

use jci_id::IdError;
use jci_template::TemplateError;
use thiserror::Error;

/// Errors raised while composing stacks or writing the assembly.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Two stacks in one app share a name.
    #[error("stack {0} is already defined in this app")]
    DuplicateStack(String),

    /// A stack id does not belong to this app.
    #[error("unknown stack: {0}")]
    UnknownStack(String),

    /// A construct path rooted at another stack was added to this one.
    #[error("construct {path} does not belong to stack {stack}")]
    PathOutsideStack { path: String, stack: String },

    /// An attribute owned by a stack of a different app.
    #[error("stack {consumer} cannot reference {owner}: the stacks belong to different apps")]
    ForeignStack { consumer: String, owner: String },

    /// An attribute owned by a stack constructed after the consumer.
    #[error("stack {consumer} cannot reference {producer}, which is constructed after it")]
    ReferenceToLaterStack { consumer: String, producer: String },

    /// The attribute expression does not point at a logical id.
    #[error("attribute is not a Ref or Fn::GetAtt: {0}")]
    UnresolvableAttr(String),

    /// Context file could not be read or parsed.
    #[error("invalid context: {0}")]
    Context(String),

    /// Filesystem failure while writing the assembly.
    #[error("failed to write {path}: {message}")]
    Io { path: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SynthError {
    fn from(err: serde_json::Error) -> Self {
        SynthError::Serialization(err.to_string())
    }
}

impl SynthError {
    /// Returns true if this error is about stack ordering or ownership.
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self,
            SynthError::ForeignStack { .. } | SynthError::ReferenceToLaterStack { .. }
        )
    }

    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        SynthError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

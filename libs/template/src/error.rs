//! Error types for template construction.

use thiserror::Error;

/// Errors that can occur when building or serializing a template.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A logical id is already used in the template.
    #[error("duplicate logical id in {section}: {id}")]
    DuplicateLogicalId { section: &'static str, id: String },

    /// A parameter was declared twice with different definitions.
    #[error("conflicting definitions for parameter {0}")]
    ParameterConflict(String),

    /// A `Ref`, `Fn::GetAtt` or `DependsOn` names a logical id that does not exist.
    #[error("{from} references {target}, which is not defined in the template")]
    DanglingReference { from: String, target: String },

    /// The logical id is not known to the template.
    #[error("unknown logical id: {0}")]
    UnknownLogicalId(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TemplateError {
    fn from(err: serde_json::Error) -> Self {
        TemplateError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for TemplateError {
    fn from(err: serde_yaml::Error) -> Self {
        TemplateError::Serialization(err.to_string())
    }
}

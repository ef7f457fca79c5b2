//! Stack composition errors.

use std::path::PathBuf;

use jci_constructs::ConstructError;
use jci_id::IdError;
use jci_synth::SynthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StacksError {
    #[error(transparent)]
    Construct(#[from] ConstructError),

    #[error(transparent)]
    Synth(#[from] SynthError),

    #[error(transparent)]
    Id(#[from] IdError),

    /// The controller handle was built by a different app.
    #[error("controller stack {stack} does not belong to this app")]
    ForeignController { stack: String },

    #[error("failed to read settings from {path}: {message}")]
    Settings { path: PathBuf, message: String },
}

impl StacksError {
    /// Returns true if the error came from a cross-stack reference.
    pub fn is_reference_error(&self) -> bool {
        match self {
            StacksError::ForeignController { .. } => true,
            StacksError::Construct(e) => e.is_reference_error(),
            StacksError::Synth(e) => e.is_reference_error(),
            _ => false,
        }
    }
}

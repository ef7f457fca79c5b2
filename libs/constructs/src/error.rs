//! Construct errors.

use jci_id::IdError;
use jci_networking::NetworkError;
use jci_synth::SynthError;
use thiserror::Error;

/// Errors raised while building constructs.
#[derive(Debug, Error)]
pub enum ConstructError {
    #[error(transparent)]
    Synth(#[from] SynthError),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Group sizes out of order.
    #[error("invalid capacity: min {min}, desired {desired}, max {max}")]
    InvalidCapacity { min: u32, desired: u32, max: u32 },

    #[error("invalid block device {device}: {reason}")]
    InvalidBlockDevice { device: String, reason: String },

    #[error("invalid instance type: {0}")]
    InvalidInstanceType(String),

    /// Props that cannot produce a valid resource graph.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<jci_template::TemplateError> for ConstructError {
    fn from(err: jci_template::TemplateError) -> Self {
        ConstructError::Synth(SynthError::Template(err))
    }
}

impl ConstructError {
    /// Returns true if the error came from a cross-stack reference.
    pub fn is_reference_error(&self) -> bool {
        matches!(self, ConstructError::Synth(e) if e.is_reference_error())
    }
}

//! Stack settings loaded from a TOML file.
//!
//! Every field is optional; a missing file or section gives the stock
//! deployment.
//!
//! ```toml
//! [controller]
//! vpc_cidr = "10.0.0.0/16"
//! max_azs = 99
//! instance_type = "t3.medium"
//! root_volume_gib = 32
//!
//! [agent]
//! enabled = true
//! instance_type = "mac2.metal"
//! ami_parameter = "/aws/service/ec2-macos/sonoma/arm64_mac/latest/image_id"
//! root_volume_gib = 100
//! ```

use std::path::Path;

use jci_constructs::{InstanceClass, InstanceSize, InstanceType};
use jci_networking::Ipv4Cidr;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::StacksError;

/// Latest macOS Sonoma image for Apple silicon.
pub const DEFAULT_MAC_AMI_PARAMETER: &str =
    "/aws/service/ec2-macos/sonoma/arm64_mac/latest/image_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppSettings {
    pub controller: ControllerSettings,
    pub agent: AgentSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerSettings {
    pub vpc_cidr: Ipv4Cidr,
    /// Upper bound on zones; the region's zone count wins when smaller.
    pub max_azs: usize,
    pub instance_type: InstanceType,
    pub root_volume_gib: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            vpc_cidr: Ipv4Cidr {
                address: [10, 0, 0, 0].into(),
                prefix_len: 16,
            },
            max_azs: 99,
            instance_type: InstanceType::of(InstanceClass::Burstable3, InstanceSize::Medium),
            root_volume_gib: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentSettings {
    /// Build the agent stack at all.
    pub enabled: bool,
    pub instance_type: InstanceType,
    /// SSM parameter holding the macOS image id.
    pub ami_parameter: String,
    pub root_volume_gib: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            instance_type: InstanceType::of(InstanceClass::Mac2, InstanceSize::Metal),
            ami_parameter: DEFAULT_MAC_AMI_PARAMETER.to_string(),
            root_volume_gib: 100,
        }
    }
}

impl AppSettings {
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Load settings from `path`; a missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, StacksError> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| StacksError::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content).map_err(|e| StacksError::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

//! Instance types and block devices.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::ConstructError;

/// Largest EBS volume, in GiB, for the volume types used here.
const MAX_VOLUME_GIB: u32 = 16_384;

/// Instance family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceClass {
    /// `t3`
    Burstable3,
    /// `t3a`
    Burstable3Amd,
    /// `m5`
    Standard5,
    /// `c5`
    Compute5,
    /// `mac1` (Intel Mac mini)
    Mac1,
    /// `mac2` (Apple silicon Mac mini)
    Mac2,
}

impl InstanceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceClass::Burstable3 => "t3",
            InstanceClass::Burstable3Amd => "t3a",
            InstanceClass::Standard5 => "m5",
            InstanceClass::Compute5 => "c5",
            InstanceClass::Mac1 => "mac1",
            InstanceClass::Mac2 => "mac2",
        }
    }
}

/// Instance size within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceSize {
    Micro,
    Small,
    Medium,
    Large,
    Xlarge,
    Xlarge2,
    Metal,
}

impl InstanceSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceSize::Micro => "micro",
            InstanceSize::Small => "small",
            InstanceSize::Medium => "medium",
            InstanceSize::Large => "large",
            InstanceSize::Xlarge => "xlarge",
            InstanceSize::Xlarge2 => "2xlarge",
            InstanceSize::Metal => "metal",
        }
    }
}

/// An EC2 instance type such as `t3.medium` or `mac2.metal`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceType(String);

impl InstanceType {
    /// Type from a class and size.
    pub fn of(class: InstanceClass, size: InstanceSize) -> Self {
        Self(format!("{}.{}", class.as_str(), size.as_str()))
    }

    /// Parse a `family.size` name.
    pub fn parse(s: &str) -> Result<Self, ConstructError> {
        let valid_part =
            |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        match s.split_once('.') {
            Some((family, size)) if valid_part(family) && valid_part(size) => Ok(Self(s.to_string())),
            _ => Err(ConstructError::InvalidInstanceType(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Family part (`t3` of `t3.medium`).
    pub fn family(&self) -> &str {
        self.0.split_once('.').map(|(f, _)| f).unwrap_or(&self.0)
    }

    /// True for bare-metal Mac types, which need a dedicated host.
    pub fn is_mac(&self) -> bool {
        self.family().starts_with("mac")
    }
}

impl std::fmt::Display for InstanceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for InstanceType {
    type Err = ConstructError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for InstanceType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for InstanceType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// EBS volume type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EbsVolumeType {
    Standard,
    Gp2,
    Gp3,
    Io1,
}

impl EbsVolumeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EbsVolumeType::Standard => "standard",
            EbsVolumeType::Gp2 => "gp2",
            EbsVolumeType::Gp3 => "gp3",
            EbsVolumeType::Io1 => "io1",
        }
    }
}

/// An EBS volume definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EbsVolume {
    pub size_gib: u32,
    pub volume_type: EbsVolumeType,
    pub delete_on_termination: Option<bool>,
    pub encrypted: Option<bool>,
}

impl EbsVolume {
    pub fn new(size_gib: u32, volume_type: EbsVolumeType) -> Self {
        Self {
            size_gib,
            volume_type,
            delete_on_termination: None,
            encrypted: None,
        }
    }
}

/// A block device mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    pub device_name: String,
    pub volume: EbsVolume,
}

impl BlockDevice {
    /// EBS-backed device.
    pub fn ebs(device_name: &str, size_gib: u32, volume_type: EbsVolumeType) -> Self {
        Self {
            device_name: device_name.to_string(),
            volume: EbsVolume::new(size_gib, volume_type),
        }
    }

    pub fn validate(&self) -> Result<(), ConstructError> {
        let invalid = |reason: String| ConstructError::InvalidBlockDevice {
            device: self.device_name.clone(),
            reason,
        };
        if !self.device_name.starts_with("/dev/") {
            return Err(invalid("device name must start with /dev/".to_string()));
        }
        if self.volume.size_gib == 0 || self.volume.size_gib > MAX_VOLUME_GIB {
            return Err(invalid(format!(
                "volume size {} GiB is outside 1..={}",
                self.volume.size_gib, MAX_VOLUME_GIB
            )));
        }
        Ok(())
    }

    /// `BlockDeviceMappings` entry.
    pub fn to_value(&self) -> Value {
        let mut ebs = Map::new();
        if let Some(delete) = self.volume.delete_on_termination {
            ebs.insert("DeleteOnTermination".to_string(), json!(delete));
        }
        if let Some(encrypted) = self.volume.encrypted {
            ebs.insert("Encrypted".to_string(), json!(encrypted));
        }
        ebs.insert("VolumeSize".to_string(), json!(self.volume.size_gib));
        ebs.insert("VolumeType".to_string(), json!(self.volume.volume_type.as_str()));
        json!({ "DeviceName": self.device_name, "Ebs": ebs })
    }
}

/// Validate and render a list of block devices.
pub(crate) fn block_device_mappings(devices: &[BlockDevice]) -> Result<Value, ConstructError> {
    let mut seen = Vec::with_capacity(devices.len());
    let mut mappings = Vec::with_capacity(devices.len());
    for device in devices {
        device.validate()?;
        if seen.contains(&device.device_name.as_str()) {
            return Err(ConstructError::InvalidBlockDevice {
                device: device.device_name.clone(),
                reason: "device mapped twice".to_string(),
            });
        }
        seen.push(device.device_name.as_str());
        mappings.push(device.to_value());
    }
    Ok(Value::Array(mappings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_of() {
        assert_eq!(
            InstanceType::of(InstanceClass::Burstable3, InstanceSize::Medium).as_str(),
            "t3.medium"
        );
        assert_eq!(
            InstanceType::of(InstanceClass::Mac2, InstanceSize::Metal).as_str(),
            "mac2.metal"
        );
    }

    #[rstest]
    #[case("t3.medium", true)]
    #[case("mac2-m2pro.metal", true)]
    #[case("m5.2xlarge", true)]
    #[case("t3", false)]
    #[case("T3.medium", false)]
    #[case(".medium", false)]
    #[case("t3.", false)]
    fn test_parse(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(InstanceType::parse(input).is_ok(), ok);
    }

    #[test]
    fn test_is_mac() {
        assert!(InstanceType::parse("mac2.metal").unwrap().is_mac());
        assert!(!InstanceType::parse("m5.large").unwrap().is_mac());
    }

    #[test]
    fn test_block_device_value() {
        let device = BlockDevice::ebs("/dev/xvda", 32, EbsVolumeType::Gp2);
        assert_eq!(
            device.to_value(),
            json!({ "DeviceName": "/dev/xvda", "Ebs": { "VolumeSize": 32, "VolumeType": "gp2" } })
        );
    }

    #[rstest]
    #[case(BlockDevice::ebs("/dev/xvda", 0, EbsVolumeType::Gp2))]
    #[case(BlockDevice::ebs("/dev/xvda", 20_000, EbsVolumeType::Gp3))]
    #[case(BlockDevice::ebs("xvda", 32, EbsVolumeType::Gp2))]
    fn test_invalid_block_device(#[case] device: BlockDevice) {
        assert!(matches!(
            device.validate(),
            Err(ConstructError::InvalidBlockDevice { .. })
        ));
    }

    #[test]
    fn test_duplicate_mapping_rejected() {
        let devices = vec![
            BlockDevice::ebs("/dev/xvda", 32, EbsVolumeType::Gp2),
            BlockDevice::ebs("/dev/xvda", 64, EbsVolumeType::Gp2),
        ];
        assert!(block_device_mappings(&devices).is_err());
    }
}

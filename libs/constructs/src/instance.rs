//! Single EC2 instances and the dedicated hosts they can be pinned to.

use jci_id::{ConstructPath, LogicalId};
use jci_synth::{Attr, Stack};
use jci_template::{Expr, Resource};
use serde_json::Value;
use tracing::debug;

use crate::instance_type::{block_device_mappings, BlockDevice, InstanceType};
use crate::machine_image::MachineImage;
use crate::tags::name_tags;
use crate::user_data::UserData;
use crate::ConstructError;

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

/// Options for a dedicated host.
#[derive(Debug, Clone)]
pub struct DedicatedHostProps {
    pub instance_type: InstanceType,
    pub availability_zone: Expr,
    /// Let untargeted launches of matching instances land on the host.
    pub auto_placement: bool,
    pub host_recovery: bool,
}

/// A physical server allocated to the account.
#[derive(Debug, Clone)]
pub struct DedicatedHost {
    logical_id: LogicalId,
    host_id: Attr,
}

impl DedicatedHost {
    pub fn new(
        stack: &mut Stack,
        scope: &ConstructPath,
        id: &str,
        props: DedicatedHostProps,
    ) -> Result<Self, ConstructError> {
        let path = scope.child(id)?;
        let mut resource = Resource::new("AWS::EC2::Host");
        resource.set_property("AutoPlacement", on_off(props.auto_placement));
        resource.set_property("AvailabilityZone", props.availability_zone);
        resource.set_property("HostRecovery", on_off(props.host_recovery));
        resource.set_property("InstanceType", props.instance_type.as_str());
        let logical_id = stack.add_resource(&path, resource)?;

        Ok(Self {
            host_id: stack.ref_attr(&logical_id),
            logical_id,
        })
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    /// `Ref` of the host.
    pub fn host_id(&self) -> &Attr {
        &self.host_id
    }
}

/// Placement tenancy of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tenancy {
    #[default]
    Default,
    Dedicated,
    Host,
}

impl Tenancy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tenancy::Default => "default",
            Tenancy::Dedicated => "dedicated",
            Tenancy::Host => "host",
        }
    }
}

/// Options for a single instance. Network values are already resolved for
/// the stack the instance is created in.
#[derive(Debug, Clone)]
pub struct InstanceProps {
    pub instance_type: InstanceType,
    pub machine_image: MachineImage,
    pub subnet_id: Expr,
    pub security_group_ids: Vec<Expr>,
    /// Instance profile name.
    pub instance_profile: Option<Expr>,
    /// Defaults to an empty script for the image's operating system.
    pub user_data: Option<UserData>,
    pub block_devices: Vec<BlockDevice>,
    pub tenancy: Tenancy,
    pub host_id: Option<Expr>,
}

impl InstanceProps {
    pub fn new(instance_type: InstanceType, machine_image: MachineImage, subnet_id: Expr) -> Self {
        Self {
            instance_type,
            machine_image,
            subnet_id,
            security_group_ids: Vec::new(),
            instance_profile: None,
            user_data: None,
            block_devices: Vec::new(),
            tenancy: Tenancy::Default,
            host_id: None,
        }
    }
}

/// A standalone EC2 instance.
#[derive(Debug, Clone)]
pub struct Instance {
    path: ConstructPath,
    logical_id: LogicalId,
    instance_id: Attr,
    private_ip: Attr,
    availability_zone: Attr,
}

impl Instance {
    pub fn new(
        stack: &mut Stack,
        scope: &ConstructPath,
        id: &str,
        props: InstanceProps,
    ) -> Result<Self, ConstructError> {
        if props.instance_type.is_mac() && props.tenancy != Tenancy::Host {
            return Err(ConstructError::Config(format!(
                "{} instances require host tenancy",
                props.instance_type
            )));
        }
        if props.host_id.is_some() && props.tenancy != Tenancy::Host {
            return Err(ConstructError::Config(
                "a host id requires host tenancy".to_string(),
            ));
        }
        let block_devices = if props.block_devices.is_empty() {
            None
        } else {
            Some(block_device_mappings(&props.block_devices)?)
        };

        let path = scope.child(id)?;
        let image_id = props.machine_image.image_id(stack)?;
        let user_data = props
            .user_data
            .unwrap_or_else(|| UserData::for_os(props.machine_image.os()));

        let mut resource = Resource::new("AWS::EC2::Instance");
        if let Some(mappings) = block_devices {
            resource.set_property("BlockDeviceMappings", mappings);
        }
        if let Some(host_id) = props.host_id {
            resource.set_property("HostId", host_id);
        }
        if let Some(profile) = props.instance_profile {
            resource.set_property("IamInstanceProfile", profile);
        }
        resource.set_property("ImageId", image_id);
        resource.set_property("InstanceType", props.instance_type.as_str());
        resource.set_property(
            "SecurityGroupIds",
            Value::Array(props.security_group_ids.into_iter().map(Value::from).collect()),
        );
        resource.set_property("SubnetId", props.subnet_id);
        resource.set_property("Tags", name_tags(&path));
        resource.set_property("Tenancy", props.tenancy.as_str());
        resource.set_property("UserData", user_data.to_expr());
        let logical_id = stack.add_resource(&path.child("Resource")?, resource)?;

        debug!(instance = %path, instance_type = %props.instance_type, "instance created");

        Ok(Self {
            instance_id: stack.ref_attr(&logical_id),
            private_ip: stack.get_att(&logical_id, "PrivateIp"),
            availability_zone: stack.get_att(&logical_id, "AvailabilityZone"),
            path,
            logical_id,
        })
    }

    pub fn path(&self) -> &ConstructPath {
        &self.path
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    /// `Ref` of the instance.
    pub fn instance_id(&self) -> &Attr {
        &self.instance_id
    }

    pub fn private_ip(&self) -> &Attr {
        &self.private_ip
    }

    pub fn availability_zone(&self) -> &Attr {
        &self.availability_zone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance_type::EbsVolumeType;
    use crate::machine_image::OsType;
    use jci_synth::{App, Context, StackProps};
    use serde_json::json;

    fn mac() -> InstanceType {
        InstanceType::parse("mac2.metal").unwrap()
    }

    fn mac_image() -> MachineImage {
        MachineImage::from_ssm_parameter(
            "/aws/service/ec2-macos/sonoma/arm64_mac/latest/image_id",
            OsType::MacOs,
        )
    }

    #[test]
    fn test_mac_instance_on_host() {
        let mut app = App::new(Context::new());
        let stack = app.new_stack("S", StackProps::default()).unwrap();
        let scope = stack.path();
        let host = DedicatedHost::new(
            stack,
            &scope,
            "host",
            DedicatedHostProps {
                instance_type: mac(),
                availability_zone: Expr::string("us-east-1a"),
                auto_placement: true,
                host_recovery: false,
            },
        )
        .unwrap();
        let host_id = stack.resolve(host.host_id()).unwrap();

        let props = InstanceProps {
            tenancy: Tenancy::Host,
            host_id: Some(host_id),
            block_devices: vec![BlockDevice::ebs("/dev/sda1", 100, EbsVolumeType::Gp3)],
            security_group_ids: vec![Expr::string("sg-123")],
            ..InstanceProps::new(mac(), mac_image(), Expr::string("subnet-123"))
        };
        let instance = Instance::new(stack, &scope, "agent", props).unwrap();

        let template = stack.template();
        let host_resource = template.resource(host.logical_id().as_str()).unwrap();
        assert_eq!(host_resource.property("AutoPlacement"), Some(&json!("on")));
        assert_eq!(host_resource.property("InstanceType"), Some(&json!("mac2.metal")));

        let resource = template.resource(instance.logical_id().as_str()).unwrap();
        assert_eq!(resource.property("Tenancy"), Some(&json!("host")));
        assert_eq!(
            resource.property("HostId"),
            Some(&json!({ "Ref": host.logical_id().as_str() }))
        );
        assert_eq!(
            resource.property("UserData"),
            Some(&json!({ "Fn::Base64": "#!/bin/zsh" }))
        );
        assert!(template.validate().is_ok());
    }

    #[test]
    fn test_mac_requires_host_tenancy() {
        let mut app = App::new(Context::new());
        let stack = app.new_stack("S", StackProps::default()).unwrap();
        let scope = stack.path();
        let props = InstanceProps::new(mac(), mac_image(), Expr::string("subnet-123"));
        assert!(matches!(
            Instance::new(stack, &scope, "agent", props),
            Err(ConstructError::Config(_))
        ));
    }
}

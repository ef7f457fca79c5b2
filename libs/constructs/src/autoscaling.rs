//! Auto-scaling group backed by a launch template.

use jci_id::{ConstructPath, LogicalId};
use jci_networking::SubnetType;
use jci_synth::{Attr, Stack};
use jci_template::{Expr, Resource};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::iam::{InstanceProfile, ManagedPolicy, Role};
use crate::instance_type::{block_device_mappings, BlockDevice, InstanceType};
use crate::load_balancer::{ApplicationTarget, TargetGroup};
use crate::machine_image::MachineImage;
use crate::security_group::{SecurityGroup, SecurityGroupProps};
use crate::user_data::UserData;
use crate::vpc::Vpc;
use crate::ConstructError;

/// Group size bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub min: u32,
    pub max: u32,
    /// Left to the service when `None`.
    pub desired: Option<u32>,
}

impl Capacity {
    /// Exactly `n` instances.
    pub fn fixed(n: u32) -> Self {
        Self {
            min: n,
            max: n,
            desired: Some(n),
        }
    }

    /// Require `min <= desired <= max` and a non-zero maximum.
    pub fn validate(&self) -> Result<(), ConstructError> {
        let desired = self.desired.unwrap_or(self.min);
        if self.max == 0 || self.min > desired || desired > self.max {
            return Err(ConstructError::InvalidCapacity {
                min: self.min,
                desired,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// How the group decides an instance is unhealthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsgHealthCheck {
    /// EC2 status checks only.
    Ec2,
    /// Load balancer health checks, after a grace period from launch.
    Elb { grace_period_secs: u32 },
}

/// Options for a new auto-scaling group.
#[derive(Debug, Clone)]
pub struct AutoScalingGroupProps<'a> {
    pub vpc: &'a Vpc,
    pub instance_type: InstanceType,
    pub machine_image: MachineImage,
    pub capacity: Capacity,
    /// Defaults to an empty script for the image's operating system.
    pub user_data: Option<UserData>,
    /// A group is created when `None`.
    pub security_group: Option<SecurityGroup>,
    pub block_devices: Vec<BlockDevice>,
    pub health_check: AsgHealthCheck,
    /// Subnets the instances are launched in.
    pub subnet_type: SubnetType,
}

impl<'a> AutoScalingGroupProps<'a> {
    /// One instance in the private subnets with EC2 health checks.
    pub fn new(vpc: &'a Vpc, instance_type: InstanceType, machine_image: MachineImage) -> Self {
        Self {
            vpc,
            instance_type,
            machine_image,
            capacity: Capacity::fixed(1),
            user_data: None,
            security_group: None,
            block_devices: Vec::new(),
            health_check: AsgHealthCheck::Ec2,
            subnet_type: SubnetType::Private,
        }
    }
}

/// A fleet kept at a target size, replacing instances that fail.
#[derive(Debug, Clone)]
pub struct AutoScalingGroup {
    path: ConstructPath,
    logical_id: LogicalId,
    launch_template: LogicalId,
    role: Role,
    instance_profile: InstanceProfile,
    security_group: SecurityGroup,
    group_name: Attr,
    capacity: Capacity,
}

impl AutoScalingGroup {
    pub fn new(
        stack: &mut Stack,
        scope: &ConstructPath,
        id: &str,
        props: AutoScalingGroupProps<'_>,
    ) -> Result<Self, ConstructError> {
        props.capacity.validate()?;
        let block_devices = if props.block_devices.is_empty() {
            None
        } else {
            Some(block_device_mappings(&props.block_devices)?)
        };
        let path = scope.child(id)?;

        let subnets = props.vpc.subnets_of_type(props.subnet_type);
        if subnets.is_empty() {
            return Err(ConstructError::Config(format!(
                "{} has no {} subnets for {}",
                props.vpc.path(),
                props.subnet_type,
                path
            )));
        }
        let mut subnet_ids = Vec::with_capacity(subnets.len());
        for subnet in &subnets {
            subnet_ids.push(Value::from(stack.resolve(subnet.subnet_id())?));
        }

        let security_group = match props.security_group {
            Some(group) => group,
            None => {
                let vpc_id = stack.resolve(props.vpc.vpc_id())?;
                SecurityGroup::new(
                    stack,
                    &path,
                    "InstanceSecurityGroup",
                    SecurityGroupProps::new(vpc_id),
                )?
            }
        };

        let role = Role::for_service(stack, &path, "InstanceRole", "ec2.amazonaws.com")?;
        let instance_profile = InstanceProfile::new(stack, &path, "InstanceProfile", &role)?;

        let image_id = props.machine_image.image_id(stack)?;
        let user_data = props
            .user_data
            .unwrap_or_else(|| UserData::for_os(props.machine_image.os()));

        let mut data = Map::new();
        if let Some(mappings) = block_devices {
            data.insert("BlockDeviceMappings".to_string(), mappings);
        }
        data.insert(
            "IamInstanceProfile".to_string(),
            json!({ "Arn": Value::from(stack.resolve(instance_profile.arn())?) }),
        );
        data.insert("ImageId".to_string(), image_id.into());
        data.insert(
            "InstanceType".to_string(),
            json!(props.instance_type.as_str()),
        );
        data.insert(
            "SecurityGroupIds".to_string(),
            json!([Value::from(stack.resolve(security_group.group_id())?)]),
        );
        data.insert(
            "TagSpecifications".to_string(),
            json!([
                { "ResourceType": "instance", "Tags": [{ "Key": "Name", "Value": path.to_string() }] },
                { "ResourceType": "volume", "Tags": [{ "Key": "Name", "Value": path.to_string() }] }
            ]),
        );
        data.insert("UserData".to_string(), user_data.to_expr().into());

        let mut launch_template = Resource::new("AWS::EC2::LaunchTemplate");
        launch_template.set_property("LaunchTemplateData", Value::Object(data));
        launch_template.add_dependency(role.logical_id());
        let launch_template = stack.add_resource(
            &path.child("LaunchTemplate")?.child("Resource")?,
            launch_template,
        )?;

        let mut group = Resource::new("AWS::AutoScaling::AutoScalingGroup");
        if let Some(desired) = props.capacity.desired {
            group.set_property("DesiredCapacity", desired.to_string());
        }
        if let AsgHealthCheck::Elb { grace_period_secs } = props.health_check {
            group.set_property("HealthCheckGracePeriod", grace_period_secs);
            group.set_property("HealthCheckType", "ELB");
        } else {
            group.set_property("HealthCheckType", "EC2");
        }
        group.set_property(
            "LaunchTemplate",
            json!({
                "LaunchTemplateId": Value::from(Expr::reference(&launch_template)),
                "Version": Value::from(Expr::get_att(&launch_template, "LatestVersionNumber"))
            }),
        );
        group.set_property("MaxSize", props.capacity.max.to_string());
        group.set_property("MinSize", props.capacity.min.to_string());
        group.set_property(
            "Tags",
            json!([{ "Key": "Name", "PropagateAtLaunch": true, "Value": path.to_string() }]),
        );
        group.set_property("VPCZoneIdentifier", Value::Array(subnet_ids));
        group.update_policy = Some(json!({
            "AutoScalingScheduledAction": { "IgnoreUnmodifiedGroupSizeProperties": true }
        }));
        let logical_id = stack.add_resource(&path.child("ASG")?, group)?;

        debug!(
            group = %path,
            instance_type = %props.instance_type,
            min = props.capacity.min,
            max = props.capacity.max,
            "auto-scaling group created"
        );

        Ok(Self {
            group_name: stack.ref_attr(&logical_id),
            path,
            logical_id,
            launch_template,
            role,
            instance_profile,
            security_group,
            capacity: props.capacity,
        })
    }

    pub fn path(&self) -> &ConstructPath {
        &self.path
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn launch_template(&self) -> &LogicalId {
        &self.launch_template
    }

    /// Role the instances run as.
    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn instance_profile(&self) -> &InstanceProfile {
        &self.instance_profile
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// `Ref` of the group (its name).
    pub fn group_name(&self) -> &Attr {
        &self.group_name
    }

    /// Grant the instance role a managed policy.
    pub fn add_managed_policy(
        &self,
        stack: &mut Stack,
        policy: &ManagedPolicy,
    ) -> Result<(), ConstructError> {
        self.role.add_managed_policy(stack, policy)
    }
}

impl ApplicationTarget for AutoScalingGroup {
    fn attach_to_target_group(
        &self,
        stack: &mut Stack,
        target_group: &TargetGroup,
    ) -> Result<&'static str, ConstructError> {
        let arn = Value::from(stack.resolve(target_group.arn())?);
        let group = stack.resource_mut(&self.logical_id)?;
        let registered = matches!(group.property("TargetGroupARNs"), Some(Value::Array(arns)) if arns.contains(&arn));
        if !registered {
            group.push_property("TargetGroupARNs", arn);
        }
        Ok("instance")
    }

    fn security_group(&self) -> Option<&SecurityGroup> {
        Some(&self.security_group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance_type::{EbsVolumeType, InstanceClass, InstanceSize};
    use crate::vpc::VpcProps;
    use jci_networking::Ipv4Cidr;
    use jci_synth::{App, Context, StackProps};
    use rstest::rstest;

    #[rstest]
    #[case(Capacity::fixed(1), true)]
    #[case(Capacity { min: 1, max: 3, desired: None }, true)]
    #[case(Capacity { min: 2, max: 1, desired: None }, false)]
    #[case(Capacity { min: 1, max: 2, desired: Some(3) }, false)]
    #[case(Capacity { min: 2, max: 4, desired: Some(1) }, false)]
    #[case(Capacity::fixed(0), false)]
    fn test_capacity_validation(#[case] capacity: Capacity, #[case] ok: bool) {
        assert_eq!(capacity.validate().is_ok(), ok);
    }

    #[test]
    fn test_group_resources() {
        let mut app = App::new(Context::new());
        let stack = app.new_stack("S", StackProps::default()).unwrap();
        let scope = stack.path();
        let vpc = Vpc::new(
            stack,
            &scope,
            "vpc",
            VpcProps::new(Ipv4Cidr::from_cidr("10.0.0.0/16").unwrap()),
        )
        .unwrap();

        let mut user_data = UserData::for_linux();
        user_data.add_commands(["yum upgrade -y"]);
        let props = AutoScalingGroupProps {
            user_data: Some(user_data),
            block_devices: vec![BlockDevice::ebs("/dev/xvda", 32, EbsVolumeType::Gp2)],
            health_check: AsgHealthCheck::Elb {
                grace_period_secs: 600,
            },
            ..AutoScalingGroupProps::new(
                &vpc,
                InstanceType::of(InstanceClass::Burstable3, InstanceSize::Medium),
                MachineImage::amazon_linux_2(),
            )
        };
        let asg = AutoScalingGroup::new(stack, &scope, "fleet", props).unwrap();
        asg.add_managed_policy(stack, &ManagedPolicy::aws_managed("AmazonSSMManagedInstanceCore"))
            .unwrap();

        let template = stack.template();
        let group = template.resource(asg.logical_id().as_str()).unwrap();
        assert_eq!(group.property("MinSize"), Some(&json!("1")));
        assert_eq!(group.property("MaxSize"), Some(&json!("1")));
        assert_eq!(group.property("DesiredCapacity"), Some(&json!("1")));
        assert_eq!(group.property("HealthCheckType"), Some(&json!("ELB")));
        assert_eq!(
            group.property("VPCZoneIdentifier").unwrap().as_array().unwrap().len(),
            2
        );
        assert!(group.update_policy.is_some());

        let lt = template.resource(asg.launch_template().as_str()).unwrap();
        let data = lt.property("LaunchTemplateData").unwrap();
        assert_eq!(data["InstanceType"], json!("t3.medium"));
        assert_eq!(data["BlockDeviceMappings"][0]["Ebs"]["VolumeSize"], json!(32));
        assert_eq!(
            data["UserData"],
            json!({ "Fn::Base64": "#!/bin/bash\nyum upgrade -y" })
        );

        assert_eq!(template.resources_of_type("AWS::EC2::SecurityGroup").count(), 1);
        assert!(template.validate().is_ok());
    }

    #[test]
    fn test_invalid_capacity_fails_before_resources() {
        let mut app = App::new(Context::new());
        let stack = app.new_stack("S", StackProps::default()).unwrap();
        let scope = stack.path();
        let vpc = Vpc::new(
            stack,
            &scope,
            "vpc",
            VpcProps::new(Ipv4Cidr::from_cidr("10.0.0.0/16").unwrap()),
        )
        .unwrap();
        let before = stack.template().resources().len();
        let props = AutoScalingGroupProps {
            capacity: Capacity {
                min: 2,
                max: 1,
                desired: None,
            },
            ..AutoScalingGroupProps::new(
                &vpc,
                InstanceType::of(InstanceClass::Burstable3, InstanceSize::Medium),
                MachineImage::amazon_linux_2(),
            )
        };
        assert!(matches!(
            AutoScalingGroup::new(stack, &scope, "fleet", props),
            Err(ConstructError::InvalidCapacity { .. })
        ));
        assert_eq!(stack.template().resources().len(), before);
    }
}

//! The macOS build-agent stack.
//!
//! Mac instances only run on dedicated hosts. The agent gets a host in the
//! zone of the controller's first private subnet and an instance pinned to
//! it, joined to `jenkins-sg` so the controller can reach it over SSH.
//! Everything it needs from the controller comes in as imports.

use jci_constructs::{
    BlockDevice, ConstructError, DedicatedHost, DedicatedHostProps, EbsVolumeType, Instance,
    InstanceProfile, InstanceProps, InstanceType, MachineImage, ManagedPolicy, OsType, Role,
    Tenancy,
};
use jci_synth::{App, StackId, StackProps};
use jci_template::Output;
use tracing::info;

use crate::bootstrap::agent_user_data;
use crate::controller::JenkinsStack;
use crate::settings::AgentSettings;
use crate::{StacksError, SSM_MANAGED_POLICY};

/// Root device of the EC2 macOS images.
const MAC_ROOT_DEVICE: &str = "/dev/sda1";

/// Options for [`JenkinsMacAgentStack`].
#[derive(Debug, Clone)]
pub struct JenkinsMacAgentStackProps {
    pub stack: StackProps,
    pub instance_type: InstanceType,
    /// SSM parameter holding the macOS image id.
    pub ami_parameter: String,
    pub root_volume_gib: u32,
}

impl JenkinsMacAgentStackProps {
    pub fn from_settings(settings: &AgentSettings, stack: StackProps) -> Self {
        Self {
            stack,
            instance_type: settings.instance_type.clone(),
            ami_parameter: settings.ami_parameter.clone(),
            root_volume_gib: settings.root_volume_gib,
        }
    }
}

impl Default for JenkinsMacAgentStackProps {
    fn default() -> Self {
        Self::from_settings(&AgentSettings::default(), StackProps::default())
    }
}

/// Handle to the agent stack.
#[derive(Debug, Clone)]
pub struct JenkinsMacAgentStack {
    stack_id: StackId,
    host: DedicatedHost,
    instance: Instance,
}

impl JenkinsMacAgentStack {
    /// Build the agent stack after `controller` in the same app.
    pub fn new(
        app: &mut App,
        id: &str,
        controller: &JenkinsStack,
        props: JenkinsMacAgentStackProps,
    ) -> Result<Self, StacksError> {
        if !app.contains(controller.stack_id()) {
            return Err(StacksError::ForeignController {
                stack: controller.stack_id().to_string(),
            });
        }
        if !props.instance_type.is_mac() {
            return Err(ConstructError::InvalidInstanceType(format!(
                "{} is not a Mac instance type",
                props.instance_type
            ))
            .into());
        }
        let subnet = *controller.vpc().private_subnets().first().ok_or_else(|| {
            ConstructError::Config("the controller VPC has no private subnet".to_string())
        })?;

        let stack = app.new_stack(id, props.stack)?;
        let scope = stack.path();

        let role = Role::for_service(stack, &scope, "agent-role", "ec2.amazonaws.com")?;
        role.add_managed_policy(stack, &ManagedPolicy::aws_managed(SSM_MANAGED_POLICY))?;
        let profile = InstanceProfile::new(stack, &scope, "agent-profile", &role)?;

        let availability_zone = stack.resolve(subnet.availability_zone())?;
        let host = DedicatedHost::new(
            stack,
            &scope,
            "mac-host",
            DedicatedHostProps {
                instance_type: props.instance_type.clone(),
                availability_zone,
                auto_placement: false,
                host_recovery: false,
            },
        )?;

        let host_id = stack.resolve(host.host_id())?;
        let subnet_id = stack.resolve(subnet.subnet_id())?;
        let group_id = stack.resolve(controller.security_group().group_id())?;
        let profile_name = stack.resolve(profile.name())?;
        let image = MachineImage::from_ssm_parameter(&props.ami_parameter, OsType::MacOs);

        let instance = Instance::new(
            stack,
            &scope,
            "mac-agent",
            InstanceProps {
                security_group_ids: vec![group_id],
                instance_profile: Some(profile_name),
                user_data: Some(agent_user_data()),
                block_devices: vec![BlockDevice::ebs(
                    MAC_ROOT_DEVICE,
                    props.root_volume_gib,
                    EbsVolumeType::Gp3,
                )],
                tenancy: Tenancy::Host,
                host_id: Some(host_id),
                ..InstanceProps::new(props.instance_type, image, subnet_id)
            },
        )?;

        let instance_id = stack.resolve(instance.instance_id())?;
        stack.add_output(
            &scope.child("agent-instance-id")?,
            Output::new(instance_id).with_description("Jenkins macOS agent instance id"),
        )?;
        let private_ip = stack.resolve(instance.private_ip())?;
        stack.add_output(
            &scope.child("agent-private-ip")?,
            Output::new(private_ip).with_description("Jenkins macOS agent private IP"),
        )?;

        info!(
            stack = %stack.name(),
            dependencies = stack.dependencies().len(),
            "agent stack built"
        );

        Ok(Self {
            stack_id: stack.id(),
            host,
            instance,
        })
    }

    pub fn stack_id(&self) -> StackId {
        self.stack_id
    }

    pub fn host(&self) -> &DedicatedHost {
        &self.host
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::JenkinsStackProps;
    use jci_synth::Context;
    use jci_testing::TemplateAssertions;
    use serde_json::json;

    fn build() -> (App, JenkinsMacAgentStack) {
        let mut app = App::new(Context::new());
        let controller =
            JenkinsStack::new(&mut app, "JenkinsStack", JenkinsStackProps::default()).unwrap();
        let agent = JenkinsMacAgentStack::new(
            &mut app,
            "JenkinsMacAgentStack",
            &controller,
            JenkinsMacAgentStackProps::default(),
        )
        .unwrap();
        (app, agent)
    }

    #[test]
    fn test_host_and_instance() {
        let (app, agent) = build();
        let stack = app.stack(agent.stack_id()).unwrap();
        let template = TemplateAssertions::from_template(stack.template());

        template.resource_count_is("AWS::EC2::Host", 1);
        template.resource_count_is("AWS::EC2::Instance", 1);
        template.resource_count_is("AWS::EC2::VPC", 0);
        template.resource_count_is("AWS::EC2::SecurityGroup", 0);
        template.has_resource_properties(
            "AWS::EC2::Instance",
            json!({
                "InstanceType": "mac2.metal",
                "Tenancy": "host",
                "BlockDeviceMappings": [{
                    "DeviceName": "/dev/sda1",
                    "Ebs": { "VolumeSize": 100, "VolumeType": "gp3" }
                }]
            }),
        );
        template.has_resource_properties(
            "AWS::IAM::Role",
            json!({
                "ManagedPolicyArns": [{
                    "Fn::Join": ["", ["arn:", { "Ref": "AWS::Partition" }, ":iam::aws:policy/AmazonSSMManagedInstanceCore"]]
                }]
            }),
        );
    }

    #[test]
    fn test_network_comes_from_imports() {
        let (app, agent) = build();
        let stack = app.stack(agent.stack_id()).unwrap();
        assert!(stack.dependencies().contains("JenkinsStack"));

        let imports = stack.template().imports();
        assert!(imports.iter().all(|i| i.starts_with("JenkinsStack:")));
        assert!(imports.iter().any(|i| i.contains("jenkinssg")));
        // subnet id, subnet zone, group id
        assert_eq!(imports.len(), 3);
    }

    #[test]
    fn test_outputs() {
        let (app, agent) = build();
        let stack = app.stack(agent.stack_id()).unwrap();
        let template = TemplateAssertions::from_template(stack.template());
        let instance = agent.instance().logical_id().as_str();
        template.has_output("agentinstanceid", json!({ "Value": { "Ref": instance } }));
        template.has_output(
            "agentprivateip",
            json!({ "Value": { "Fn::GetAtt": [instance, "PrivateIp"] } }),
        );
    }

    #[test]
    fn test_rejects_non_mac_type() {
        let mut app = App::new(Context::new());
        let controller =
            JenkinsStack::new(&mut app, "JenkinsStack", JenkinsStackProps::default()).unwrap();
        let props = JenkinsMacAgentStackProps {
            instance_type: InstanceType::parse("t3.medium").unwrap(),
            ..JenkinsMacAgentStackProps::default()
        };
        assert!(JenkinsMacAgentStack::new(&mut app, "Agent", &controller, props).is_err());
        assert!(app.stack_by_name("Agent").is_none());
    }
}

//! The Jenkins controller stack.

use jci_constructs::{
    AddTargetsProps, ApplicationLoadBalancer, ApplicationTarget, AsgHealthCheck, AutoScalingGroup,
    AutoScalingGroupProps, BlockDevice, Capacity, EbsVolumeType, InstanceType, Listener,
    ListenerProps, MachineImage, ManagedPolicy, SecurityGroup, SecurityGroupProps, TargetGroup,
    TargetHealthCheck, Vpc, VpcProps,
};
use jci_id::ExportName;
use jci_networking::{Ipv4Cidr, Port};
use jci_synth::{App, StackId, StackProps};
use jci_template::Output;
use tracing::info;

use crate::bootstrap::controller_user_data;
use crate::settings::ControllerSettings;
use crate::{StacksError, SSM_MANAGED_POLICY};

/// Name of the controller security group, shared with the agents.
pub const SECURITY_GROUP_NAME: &str = "jenkins-sg";
pub const LB_URL_OUTPUT: &str = "loadbalancer-url-output";
pub const LB_URL_EXPORT: &str = "lb-url";

const JENKINS_PORT: u16 = 8080;
const SSH_PORT: u16 = 22;
const LISTENER_PORT: u16 = 80;
const HEALTH_CHECK_PATH: &str = "/login";
/// Time for the bootstrap to install and start Jenkins before load
/// balancer health checks count.
const HEALTH_CHECK_GRACE_SECS: u32 = 600;

/// Options for [`JenkinsStack`].
#[derive(Debug, Clone)]
pub struct JenkinsStackProps {
    pub stack: StackProps,
    pub vpc_cidr: Ipv4Cidr,
    pub max_azs: usize,
    pub instance_type: InstanceType,
    pub root_volume_gib: u32,
}

impl JenkinsStackProps {
    pub fn from_settings(settings: &ControllerSettings, stack: StackProps) -> Self {
        Self {
            stack,
            vpc_cidr: settings.vpc_cidr,
            max_azs: settings.max_azs,
            instance_type: settings.instance_type.clone(),
            root_volume_gib: settings.root_volume_gib,
        }
    }
}

impl Default for JenkinsStackProps {
    fn default() -> Self {
        Self::from_settings(&ControllerSettings::default(), StackProps::default())
    }
}

/// Handle to the controller stack.
#[derive(Debug, Clone)]
pub struct JenkinsStack {
    stack_id: StackId,
    vpc: Vpc,
    security_group: SecurityGroup,
    load_balancer: ApplicationLoadBalancer,
    listener: Listener,
    target_group: TargetGroup,
    group: AutoScalingGroup,
}

impl JenkinsStack {
    pub fn new(app: &mut App, id: &str, props: JenkinsStackProps) -> Result<Self, StacksError> {
        let stack = app.new_stack(id, props.stack)?;
        let scope = stack.path();

        let vpc = Vpc::new(
            stack,
            &scope,
            "mac-vpc",
            VpcProps {
                max_azs: props.max_azs,
                ..VpcProps::new(props.vpc_cidr)
            },
        )?;

        let vpc_id = stack.resolve(vpc.vpc_id())?;
        let security_group = SecurityGroup::new(
            stack,
            &scope,
            SECURITY_GROUP_NAME,
            SecurityGroupProps {
                group_name: Some(SECURITY_GROUP_NAME.to_string()),
                ..SecurityGroupProps::new(vpc_id)
            },
        )?;

        let load_balancer = ApplicationLoadBalancer::new(stack, &scope, "alb-jenkins", &vpc, true)?;
        let listener = load_balancer.add_listener(
            stack,
            "alb-http-listener",
            ListenerProps {
                port: LISTENER_PORT,
                open: true,
            },
        )?;

        security_group.add_ingress_rule(
            stack,
            &security_group.peer(),
            Port::tcp(SSH_PORT),
            "Allow ssh access from the Jenkins systems",
        )?;

        let group = AutoScalingGroup::new(
            stack,
            &scope,
            "jenkins-asg",
            AutoScalingGroupProps {
                capacity: Capacity::fixed(1),
                user_data: Some(controller_user_data()),
                security_group: Some(security_group.clone()),
                block_devices: vec![BlockDevice::ebs(
                    "/dev/xvda",
                    props.root_volume_gib,
                    EbsVolumeType::Gp2,
                )],
                health_check: AsgHealthCheck::Elb {
                    grace_period_secs: HEALTH_CHECK_GRACE_SECS,
                },
                ..AutoScalingGroupProps::new(
                    &vpc,
                    props.instance_type,
                    MachineImage::amazon_linux_2(),
                )
            },
        )?;
        group.add_managed_policy(stack, &ManagedPolicy::aws_managed(SSM_MANAGED_POLICY))?;

        let target_group = listener.add_targets(
            stack,
            "jenkins-fleet",
            AddTargetsProps {
                port: JENKINS_PORT,
                targets: vec![&group as &dyn ApplicationTarget],
                health_check: TargetHealthCheck::path(HEALTH_CHECK_PATH),
            },
        )?;

        let dns_name = stack.resolve(load_balancer.dns_name())?;
        stack.add_output(
            &scope.child(LB_URL_OUTPUT)?,
            Output::new(dns_name)
                .with_description("Loadbalancer url")
                .with_export(ExportName::parse(LB_URL_EXPORT)?),
        )?;

        info!(
            stack = %stack.name(),
            zones = vpc.zones().len(),
            resources = stack.template().resources().len(),
            "controller stack built"
        );

        Ok(Self {
            stack_id: stack.id(),
            vpc,
            security_group,
            load_balancer,
            listener,
            target_group,
            group,
        })
    }

    pub fn stack_id(&self) -> StackId {
        self.stack_id
    }

    pub fn vpc(&self) -> &Vpc {
        &self.vpc
    }

    /// `jenkins-sg`, attached to the controller and the agents.
    pub fn security_group(&self) -> &SecurityGroup {
        &self.security_group
    }

    pub fn load_balancer(&self) -> &ApplicationLoadBalancer {
        &self.load_balancer
    }

    pub fn listener(&self) -> &Listener {
        &self.listener
    }

    pub fn target_group(&self) -> &TargetGroup {
        &self.target_group
    }

    pub fn auto_scaling_group(&self) -> &AutoScalingGroup {
        &self.group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jci_synth::Context;
    use jci_testing::TemplateAssertions;
    use serde_json::json;

    fn build() -> (App, JenkinsStack) {
        let mut app = App::new(Context::new());
        let controller = JenkinsStack::new(&mut app, "JenkinsStack", JenkinsStackProps::default())
            .unwrap();
        (app, controller)
    }

    #[test]
    fn test_resource_counts() {
        let (app, controller) = build();
        let stack = app.stack(controller.stack_id()).unwrap();
        let template = TemplateAssertions::from_template(stack.template());

        template.resource_count_is("AWS::EC2::VPC", 1);
        template.resource_count_is("AWS::ElasticLoadBalancingV2::LoadBalancer", 1);
        template.resource_count_is("AWS::ElasticLoadBalancingV2::Listener", 1);
        template.resource_count_is("AWS::ElasticLoadBalancingV2::TargetGroup", 1);
        template.resource_count_is("AWS::AutoScaling::AutoScalingGroup", 1);
        // jenkins-sg, the load balancer's group
        template.resource_count_is("AWS::EC2::SecurityGroup", 2);
    }

    #[test]
    fn test_single_instance_group() {
        let (app, controller) = build();
        let template =
            TemplateAssertions::from_template(app.stack(controller.stack_id()).unwrap().template());
        template.has_resource_properties(
            "AWS::AutoScaling::AutoScalingGroup",
            json!({
                "DesiredCapacity": "1",
                "MaxSize": "1",
                "MinSize": "1",
                "HealthCheckType": "ELB"
            }),
        );
        template.has_resource_properties(
            "AWS::EC2::LaunchTemplate",
            json!({
                "LaunchTemplateData": {
                    "InstanceType": "t3.medium",
                    "BlockDeviceMappings": [{
                        "DeviceName": "/dev/xvda",
                        "Ebs": { "VolumeSize": 32, "VolumeType": "gp2" }
                    }]
                }
            }),
        );
    }

    #[test]
    fn test_listener_open_on_80() {
        let (app, controller) = build();
        let template =
            TemplateAssertions::from_template(app.stack(controller.stack_id()).unwrap().template());
        template.has_resource_properties(
            "AWS::ElasticLoadBalancingV2::Listener",
            json!({ "Port": 80, "Protocol": "HTTP" }),
        );
        template.has_resource_properties(
            "AWS::EC2::SecurityGroup",
            json!({
                "SecurityGroupIngress": [{ "CidrIp": "0.0.0.0/0", "FromPort": 80, "ToPort": 80 }]
            }),
        );
    }

    #[test]
    fn test_output_exported() {
        let (app, controller) = build();
        let stack = app.stack(controller.stack_id()).unwrap();
        let lb = controller.load_balancer().logical_id().as_str();
        TemplateAssertions::from_template(stack.template()).has_output(
            "loadbalancerurloutput",
            json!({
                "Description": "Loadbalancer url",
                "Export": { "Name": "lb-url" },
                "Value": { "Fn::GetAtt": [lb, "DNSName"] }
            }),
        );
    }
}

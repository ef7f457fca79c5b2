//! Application load balancer, listeners and target groups.

use jci_id::{ConstructPath, LogicalId};
use jci_networking::Port;
use jci_synth::{Attr, Stack};
use jci_template::Resource;
use serde_json::{json, Value};
use tracing::debug;

use crate::security_group::{Peer, SecurityGroup, SecurityGroupProps};
use crate::vpc::Vpc;
use crate::ConstructError;

/// Something a target group can send traffic to.
pub trait ApplicationTarget {
    /// Register with the target group and return the target type
    /// (`instance`, `ip`, ...).
    fn attach_to_target_group(
        &self,
        stack: &mut Stack,
        target_group: &TargetGroup,
    ) -> Result<&'static str, ConstructError>;

    /// Group whose ingress must admit the load balancer.
    fn security_group(&self) -> Option<&SecurityGroup>;
}

/// An internet-facing or internal application load balancer.
#[derive(Debug, Clone)]
pub struct ApplicationLoadBalancer {
    path: ConstructPath,
    logical_id: LogicalId,
    security_group: SecurityGroup,
    vpc_id: Attr,
    arn: Attr,
    dns_name: Attr,
}

impl ApplicationLoadBalancer {
    /// Create a load balancer in the VPC's public (internet-facing) or
    /// private subnets. It gets its own security group with no outbound
    /// traffic until targets are added.
    pub fn new(
        stack: &mut Stack,
        scope: &ConstructPath,
        id: &str,
        vpc: &Vpc,
        internet_facing: bool,
    ) -> Result<Self, ConstructError> {
        let path = scope.child(id)?;
        let subnets = if internet_facing {
            vpc.public_subnets()
        } else {
            vpc.private_subnets()
        };
        if subnets.is_empty() {
            return Err(ConstructError::Config(format!(
                "{} needs {} subnets",
                path,
                if internet_facing { "public" } else { "private" }
            )));
        }

        let vpc_id = stack.resolve(vpc.vpc_id())?;
        let security_group = SecurityGroup::new(
            stack,
            &path,
            "SecurityGroup",
            SecurityGroupProps {
                description: Some(format!(
                    "Automatically created Security Group for ELB {}",
                    path.components().join("")
                )),
                allow_all_outbound: false,
                ..SecurityGroupProps::new(vpc_id)
            },
        )?;

        let mut subnet_ids = Vec::with_capacity(subnets.len());
        for subnet in &subnets {
            subnet_ids.push(Value::from(stack.resolve(subnet.subnet_id())?));
        }
        let group_id = Value::from(stack.resolve(security_group.group_id())?);

        let mut resource = Resource::new("AWS::ElasticLoadBalancingV2::LoadBalancer");
        resource.set_property(
            "LoadBalancerAttributes",
            json!([{ "Key": "deletion_protection.enabled", "Value": "false" }]),
        );
        resource.set_property(
            "Scheme",
            if internet_facing { "internet-facing" } else { "internal" },
        );
        resource.set_property("SecurityGroups", json!([group_id]));
        resource.set_property("Subnets", Value::Array(subnet_ids));
        resource.set_property("Type", "application");
        if internet_facing {
            for dependency in vpc.internet_connectivity() {
                resource.add_dependency(dependency);
            }
        }
        let logical_id = stack.add_resource(&path.child("Resource")?, resource)?;

        Ok(Self {
            vpc_id: vpc.vpc_id().clone(),
            arn: stack.ref_attr(&logical_id),
            dns_name: stack.get_att(&logical_id, "DNSName"),
            path,
            logical_id,
            security_group,
        })
    }

    pub fn path(&self) -> &ConstructPath {
        &self.path
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn security_group(&self) -> &SecurityGroup {
        &self.security_group
    }

    /// `Ref` of the load balancer.
    pub fn arn(&self) -> &Attr {
        &self.arn
    }

    /// `Fn::GetAtt [lb, DNSName]`.
    pub fn dns_name(&self) -> &Attr {
        &self.dns_name
    }

    /// Add an HTTP listener.
    ///
    /// An `open` listener admits every IPv4 address on its port.
    pub fn add_listener(
        &self,
        stack: &mut Stack,
        id: &str,
        props: ListenerProps,
    ) -> Result<Listener, ConstructError> {
        let port = Port::tcp(props.port);
        port.validate()?;
        let path = self.path.child(id)?;

        let mut resource = Resource::new("AWS::ElasticLoadBalancingV2::Listener");
        resource.set_property("LoadBalancerArn", stack.resolve(&self.arn)?);
        resource.set_property("Port", props.port);
        resource.set_property("Protocol", "HTTP");
        let logical_id = stack.add_resource(&path.child("Resource")?, resource)?;

        if props.open {
            self.security_group.add_ingress_rule(
                stack,
                &Peer::any_ipv4(),
                port,
                &format!("Allow from anyone on port {}", props.port),
            )?;
        }

        Ok(Listener {
            path,
            logical_id,
            port: props.port,
            load_balancer_group: self.security_group.clone(),
            vpc_id: self.vpc_id.clone(),
        })
    }
}

/// Options for a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerProps {
    pub port: u16,
    pub open: bool,
}

/// Health check of a target group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetHealthCheck {
    /// HTTP path probed on each target.
    pub path: Option<String>,
    pub interval_secs: Option<u32>,
    pub healthy_threshold: Option<u32>,
    /// Status codes counted as healthy (e.g., `200-299`).
    pub healthy_http_codes: Option<String>,
}

impl TargetHealthCheck {
    /// Probe `path` with the service defaults for everything else.
    pub fn path(path: &str) -> Self {
        Self {
            path: Some(path.to_string()),
            ..Default::default()
        }
    }
}

/// Options for [`Listener::add_targets`].
pub struct AddTargetsProps<'a> {
    /// Port the targets listen on.
    pub port: u16,
    pub targets: Vec<&'a dyn ApplicationTarget>,
    pub health_check: TargetHealthCheck,
}

/// A listener of an application load balancer.
#[derive(Debug, Clone)]
pub struct Listener {
    path: ConstructPath,
    logical_id: LogicalId,
    port: u16,
    load_balancer_group: SecurityGroup,
    vpc_id: Attr,
}

impl Listener {
    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Create a target group for `targets`, make it the listener's default
    /// action, and open the load balancer's group to the targets.
    pub fn add_targets(
        &self,
        stack: &mut Stack,
        id: &str,
        props: AddTargetsProps<'_>,
    ) -> Result<TargetGroup, ConstructError> {
        let port = Port::tcp(props.port);
        port.validate()?;

        let listener = stack.resource_mut(&self.logical_id)?;
        if listener.property("DefaultActions").is_some() {
            return Err(ConstructError::Config(format!(
                "{} already forwards to a target group",
                self.path
            )));
        }

        let path = self.path.child(&format!("{}Group", id))?;
        let mut resource = Resource::new("AWS::ElasticLoadBalancingV2::TargetGroup");
        let check = &props.health_check;
        if let Some(interval) = check.interval_secs {
            resource.set_property("HealthCheckIntervalSeconds", interval);
        }
        if let Some(health_path) = &check.path {
            resource.set_property("HealthCheckPath", health_path.as_str());
        }
        if let Some(threshold) = check.healthy_threshold {
            resource.set_property("HealthyThresholdCount", threshold);
        }
        if let Some(codes) = &check.healthy_http_codes {
            resource.set_property("Matcher", json!({ "HttpCode": codes }));
        }
        resource.set_property("Port", props.port);
        resource.set_property("Protocol", "HTTP");
        resource.set_property(
            "TargetGroupAttributes",
            json!([{ "Key": "stickiness.enabled", "Value": "false" }]),
        );
        resource.set_property("VpcId", stack.resolve(&self.vpc_id)?);
        let logical_id = stack.add_resource(&path.child("Resource")?, resource)?;

        let target_group = TargetGroup {
            arn: stack.ref_attr(&logical_id),
            logical_id,
            port: props.port,
        };

        let arn = stack.resolve(&target_group.arn)?;
        stack.resource_mut(&self.logical_id)?.set_property(
            "DefaultActions",
            json!([{ "TargetGroupArn": Value::from(arn), "Type": "forward" }]),
        );

        let mut target_type = None;
        for target in &props.targets {
            target_type = Some(target.attach_to_target_group(stack, &target_group)?);
            if let Some(group) = target.security_group() {
                self.load_balancer_group
                    .allow_to(stack, group, port, "Load balancer to target")?;
            }
        }
        if let Some(target_type) = target_type {
            stack
                .resource_mut(&target_group.logical_id)?
                .set_property("TargetType", target_type);
        }

        debug!(
            listener = %self.path,
            target_group = %target_group.logical_id,
            targets = props.targets.len(),
            "targets added"
        );
        Ok(target_group)
    }
}

/// A target group created by [`Listener::add_targets`].
#[derive(Debug, Clone)]
pub struct TargetGroup {
    logical_id: LogicalId,
    arn: Attr,
    port: u16,
}

impl TargetGroup {
    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    /// `Ref` of the target group.
    pub fn arn(&self) -> &Attr {
        &self.arn
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

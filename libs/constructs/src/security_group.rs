//! Security groups and their rules.
//!
//! Rules with a CIDR peer are written inline on the group. Rules whose peer
//! is another group (or the group itself) become standalone
//! `AWS::EC2::SecurityGroupIngress` / `Egress` resources, so a group can
//! reference itself without a circular dependency.

use jci_id::{ConstructPath, LogicalId};
use jci_networking::{Ipv4Cidr, Port, ANY_IPV4};
use jci_synth::{Attr, Stack};
use jci_template::{Expr, Resource};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::ConstructError;

/// Egress rule placed on groups that must not allow any outbound traffic.
const NO_TRAFFIC_CIDR: &str = "255.255.255.255/32";
const NO_TRAFFIC_DESCRIPTION: &str = "Disallow all traffic";

/// Source or destination of a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Peer {
    /// An IPv4 address range.
    Ipv4(Ipv4Cidr),
    /// Members of a security group.
    SecurityGroup {
        /// Stable id used to name the rule resource.
        unique_id: String,
        group_id: Attr,
    },
}

impl Peer {
    /// Every IPv4 address.
    pub fn any_ipv4() -> Self {
        Peer::Ipv4(Ipv4Cidr::any())
    }

    pub fn ipv4(cidr: Ipv4Cidr) -> Self {
        Peer::Ipv4(cidr)
    }

    /// Text used in rule construct ids.
    fn unique_id(&self) -> String {
        match self {
            Peer::Ipv4(cidr) => cidr.to_string(),
            Peer::SecurityGroup { unique_id, .. } => unique_id.clone(),
        }
    }
}

/// Options for a new security group.
#[derive(Debug, Clone)]
pub struct SecurityGroupProps {
    /// VPC id, already resolved for the stack the group is created in.
    pub vpc_id: Expr,

    /// Physical group name; generated by CloudFormation when `None`.
    pub group_name: Option<String>,

    /// Defaults to the construct path.
    pub description: Option<String>,

    pub allow_all_outbound: bool,
}

impl SecurityGroupProps {
    pub fn new(vpc_id: Expr) -> Self {
        Self {
            vpc_id,
            group_name: None,
            description: None,
            allow_all_outbound: true,
        }
    }
}

/// A security group.
#[derive(Debug, Clone)]
pub struct SecurityGroup {
    path: ConstructPath,
    logical_id: LogicalId,
    group_id: Attr,
    unique_id: String,
    allow_all_outbound: bool,
}

impl SecurityGroup {
    pub fn new(
        stack: &mut Stack,
        scope: &ConstructPath,
        id: &str,
        props: SecurityGroupProps,
    ) -> Result<Self, ConstructError> {
        let path = scope.child(id)?;
        let description = props.description.unwrap_or_else(|| path.to_string());

        let mut resource = Resource::new("AWS::EC2::SecurityGroup");
        resource.set_property("GroupDescription", description);
        if let Some(name) = props.group_name {
            resource.set_property("GroupName", name);
        }
        let egress = if props.allow_all_outbound {
            json!({
                "CidrIp": ANY_IPV4,
                "Description": "Allow all outbound traffic by default",
                "IpProtocol": "-1"
            })
        } else {
            json!({
                "CidrIp": NO_TRAFFIC_CIDR,
                "Description": NO_TRAFFIC_DESCRIPTION,
                "FromPort": 252,
                "IpProtocol": "icmp",
                "ToPort": 86
            })
        };
        resource.set_property("SecurityGroupEgress", json!([egress]));
        resource.set_property("VpcId", props.vpc_id);

        let logical_id = stack.add_resource(&path.child("Resource")?, resource)?;
        let unique_id = format!("{}{}", stack.name(), logical_id);

        Ok(Self {
            group_id: stack.get_att(&logical_id, "GroupId"),
            path,
            logical_id,
            unique_id,
            allow_all_outbound: props.allow_all_outbound,
        })
    }

    pub fn path(&self) -> &ConstructPath {
        &self.path
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    /// `Fn::GetAtt [group, GroupId]`.
    pub fn group_id(&self) -> &Attr {
        &self.group_id
    }

    pub fn allows_all_outbound(&self) -> bool {
        self.allow_all_outbound
    }

    /// This group as a rule peer.
    pub fn peer(&self) -> Peer {
        Peer::SecurityGroup {
            unique_id: self.unique_id.clone(),
            group_id: self.group_id.clone(),
        }
    }

    /// Allow inbound traffic from `peer`.
    pub fn add_ingress_rule(
        &self,
        stack: &mut Stack,
        peer: &Peer,
        port: Port,
        description: &str,
    ) -> Result<(), ConstructError> {
        port.validate()?;
        match peer {
            Peer::Ipv4(cidr) => {
                let rule = inline_rule(cidr, port, description);
                self.push_inline(stack, "SecurityGroupIngress", rule)
            }
            Peer::SecurityGroup { group_id, .. } => {
                let source = stack.resolve(group_id)?;
                let id = format!("from {}:{}", peer.unique_id(), port);
                let mut properties = rule_properties(port, description);
                properties.insert("GroupId".to_string(), self.own_group_id(stack)?);
                properties.insert("SourceSecurityGroupId".to_string(), source.into());
                self.add_rule_resource(stack, &id, "AWS::EC2::SecurityGroupIngress", properties)
            }
        }
    }

    /// Allow outbound traffic to `peer`. Ignored when all outbound is allowed.
    pub fn add_egress_rule(
        &self,
        stack: &mut Stack,
        peer: &Peer,
        port: Port,
        description: &str,
    ) -> Result<(), ConstructError> {
        port.validate()?;
        if self.allow_all_outbound {
            return Ok(());
        }
        match peer {
            Peer::Ipv4(cidr) => {
                self.remove_no_traffic_rule(stack)?;
                let rule = inline_rule(cidr, port, description);
                self.push_inline(stack, "SecurityGroupEgress", rule)
            }
            Peer::SecurityGroup { group_id, .. } => {
                let destination = stack.resolve(group_id)?;
                let id = format!("to {}:{}", peer.unique_id(), port);
                let mut properties = rule_properties(port, description);
                properties.insert("GroupId".to_string(), self.own_group_id(stack)?);
                properties.insert("DestinationSecurityGroupId".to_string(), destination.into());
                self.add_rule_resource(stack, &id, "AWS::EC2::SecurityGroupEgress", properties)
            }
        }
    }

    /// Open `port` from this group to `other`: egress here, ingress there.
    pub fn allow_to(
        &self,
        stack: &mut Stack,
        other: &SecurityGroup,
        port: Port,
        description: &str,
    ) -> Result<(), ConstructError> {
        self.add_egress_rule(stack, &other.peer(), port, description)?;
        other.add_ingress_rule(stack, &self.peer(), port, description)
    }

    fn own_group_id(&self, stack: &mut Stack) -> Result<Value, ConstructError> {
        Ok(stack.resolve(&self.group_id)?.into())
    }

    fn push_inline(&self, stack: &mut Stack, key: &str, rule: Value) -> Result<(), ConstructError> {
        let resource = stack.resource_mut(&self.logical_id)?;
        let exists = matches!(resource.property(key), Some(Value::Array(rules)) if rules.contains(&rule));
        if !exists {
            resource.push_property(key, rule);
        }
        Ok(())
    }

    fn remove_no_traffic_rule(&self, stack: &mut Stack) -> Result<(), ConstructError> {
        let resource = stack.resource_mut(&self.logical_id)?;
        if let Some(Value::Array(rules)) = resource.properties.get_mut("SecurityGroupEgress") {
            rules.retain(|r| r["CidrIp"] != json!(NO_TRAFFIC_CIDR));
        }
        Ok(())
    }

    fn add_rule_resource(
        &self,
        stack: &mut Stack,
        id: &str,
        resource_type: &str,
        properties: Map<String, Value>,
    ) -> Result<(), ConstructError> {
        let path = self.path.child(id)?;
        if stack.template().resource(path.logical_id()?.as_str()).is_some() {
            return Ok(());
        }
        let logical_id =
            stack.add_resource(&path, Resource::new(resource_type).with_properties(properties))?;
        debug!(group = %self.path, rule = %logical_id, "security group rule added");
        Ok(())
    }
}

fn rule_properties(port: Port, description: &str) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert("IpProtocol".to_string(), json!(port.protocol().as_cfn()));
    properties.insert("Description".to_string(), json!(description));
    if let Some(from) = port.from_port() {
        properties.insert("FromPort".to_string(), json!(from));
    }
    if let Some(to) = port.to_port() {
        properties.insert("ToPort".to_string(), json!(to));
    }
    properties
}

fn inline_rule(cidr: &Ipv4Cidr, port: Port, description: &str) -> Value {
    let mut rule = Map::new();
    rule.insert("CidrIp".to_string(), json!(cidr.to_string()));
    rule.extend(rule_properties(port, description));
    Value::Object(rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jci_synth::{App, Context, StackProps};

    fn group(stack: &mut Stack, id: &str, allow_all_outbound: bool) -> SecurityGroup {
        let props = SecurityGroupProps {
            allow_all_outbound,
            ..SecurityGroupProps::new(Expr::string("vpc-123"))
        };
        let scope = stack.path();
        SecurityGroup::new(stack, &scope, id, props).unwrap()
    }

    #[test]
    fn test_defaults() {
        let mut app = App::new(Context::new());
        let stack = app.new_stack("S", StackProps::default()).unwrap();
        let sg = group(stack, "web", true);

        let resource = stack.template().resource(sg.logical_id().as_str()).unwrap();
        assert_eq!(resource.property("GroupDescription"), Some(&json!("S/web")));
        assert_eq!(
            resource.property("SecurityGroupEgress").unwrap()[0]["IpProtocol"],
            json!("-1")
        );
        assert!(resource.property("GroupName").is_none());
    }

    #[test]
    fn test_cidr_ingress_is_inline_and_deduplicated() {
        let mut app = App::new(Context::new());
        let stack = app.new_stack("S", StackProps::default()).unwrap();
        let sg = group(stack, "web", true);
        for _ in 0..2 {
            sg.add_ingress_rule(stack, &Peer::any_ipv4(), Port::tcp(80), "Allow from anyone on port 80")
                .unwrap();
        }

        let resource = stack.template().resource(sg.logical_id().as_str()).unwrap();
        assert_eq!(
            resource.property("SecurityGroupIngress"),
            Some(&json!([{
                "CidrIp": "0.0.0.0/0",
                "IpProtocol": "tcp",
                "Description": "Allow from anyone on port 80",
                "FromPort": 80,
                "ToPort": 80
            }]))
        );
        assert_eq!(stack.template().resources().len(), 1);
    }

    #[test]
    fn test_self_reference_is_standalone_resource() {
        let mut app = App::new(Context::new());
        let stack = app.new_stack("S", StackProps::default()).unwrap();
        let sg = group(stack, "jenkins-sg", true);
        sg.add_ingress_rule(stack, &sg.peer(), Port::tcp(22), "ssh").unwrap();

        let rules: Vec<_> = stack
            .template()
            .resources_of_type("AWS::EC2::SecurityGroupIngress")
            .collect();
        assert_eq!(rules.len(), 1);
        let (_, rule) = rules[0];
        let group_id = json!({ "Fn::GetAtt": [sg.logical_id().as_str(), "GroupId"] });
        assert_eq!(rule.property("GroupId"), Some(&group_id));
        assert_eq!(rule.property("SourceSecurityGroupId"), Some(&group_id));
        assert_eq!(rule.property("FromPort"), Some(&json!(22)));
        assert!(stack
            .template()
            .resource(sg.logical_id().as_str())
            .unwrap()
            .property("SecurityGroupIngress")
            .is_none());
        assert!(stack.template().validate().is_ok());
    }

    #[test]
    fn test_restricted_group_replaces_placeholder() {
        let mut app = App::new(Context::new());
        let stack = app.new_stack("S", StackProps::default()).unwrap();
        let lb = group(stack, "lb", false);
        let target = group(stack, "target", true);

        let egress = |stack: &Stack| {
            stack
                .template()
                .resource(lb.logical_id().as_str())
                .unwrap()
                .property("SecurityGroupEgress")
                .cloned()
        };
        assert_eq!(egress(&*stack).unwrap()[0]["Description"], json!("Disallow all traffic"));

        lb.allow_to(stack, &target, Port::tcp(8080), "Load balancer to target")
            .unwrap();
        assert_eq!(
            stack
                .template()
                .resources_of_type("AWS::EC2::SecurityGroupEgress")
                .count(),
            1
        );
        assert_eq!(
            stack
                .template()
                .resources_of_type("AWS::EC2::SecurityGroupIngress")
                .count(),
            1
        );

        let cidr = Ipv4Cidr::from_cidr("10.0.0.0/16").unwrap();
        lb.add_egress_rule(stack, &Peer::ipv4(cidr), Port::tcp(443), "https").unwrap();
        let rules = egress(&*stack).unwrap();
        assert_eq!(rules.as_array().unwrap().len(), 1);
        assert_eq!(rules[0]["CidrIp"], json!("10.0.0.0/16"));
    }

    #[test]
    fn test_egress_ignored_when_all_outbound_allowed() {
        let mut app = App::new(Context::new());
        let stack = app.new_stack("S", StackProps::default()).unwrap();
        let open = group(stack, "open", true);
        let other = group(stack, "other", true);
        open.add_egress_rule(stack, &other.peer(), Port::tcp(22), "ssh").unwrap();
        assert_eq!(
            stack
                .template()
                .resources_of_type("AWS::EC2::SecurityGroupEgress")
                .count(),
            0
        );
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut app = App::new(Context::new());
        let stack = app.new_stack("S", StackProps::default()).unwrap();
        let sg = group(stack, "web", true);
        assert!(matches!(
            sg.add_ingress_rule(stack, &Peer::any_ipv4(), Port::tcp_range(90, 80), "bad"),
            Err(ConstructError::Network(_))
        ));
    }
}

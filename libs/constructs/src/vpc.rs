//! VPC with per-zone public and private subnets.

use jci_id::{ConstructPath, LogicalId};
use jci_networking::{
    plan_subnets, validate_vpc_cidr, Ipv4Cidr, SubnetConfiguration, SubnetType, ANY_IPV4,
};
use jci_synth::{Attr, AvailabilityZones, Stack};
use jci_template::{Expr, Resource};
use serde_json::json;
use tracing::debug;

use crate::tags::name_tags;
use crate::ConstructError;

/// Options for a new VPC.
#[derive(Debug, Clone)]
pub struct VpcProps {
    /// Address block of the VPC.
    pub cidr: Ipv4Cidr,

    /// Upper bound on the zones used; the region may offer fewer.
    pub max_azs: usize,

    /// Subnet groups, each repeated in every zone.
    pub subnet_configuration: Vec<SubnetConfiguration>,

    /// NAT gateways for private subnets; one per zone when `None`.
    pub nat_gateways: Option<usize>,
}

impl VpcProps {
    pub fn new(cidr: Ipv4Cidr) -> Self {
        Self {
            cidr,
            max_azs: 3,
            subnet_configuration: SubnetConfiguration::default_set(),
            nat_gateways: None,
        }
    }
}

/// One subnet of a VPC.
#[derive(Debug, Clone)]
pub struct Subnet {
    group: String,
    subnet_type: SubnetType,
    zone_index: usize,
    cidr: Ipv4Cidr,
    path: ConstructPath,
    logical_id: LogicalId,
    route_table: LogicalId,
    subnet_id: Attr,
    availability_zone: Attr,
}

impl Subnet {
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn subnet_type(&self) -> SubnetType {
        self.subnet_type
    }

    pub fn zone_index(&self) -> usize {
        self.zone_index
    }

    pub fn cidr(&self) -> Ipv4Cidr {
        self.cidr
    }

    pub fn path(&self) -> &ConstructPath {
        &self.path
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    /// `Ref` of the subnet.
    pub fn subnet_id(&self) -> &Attr {
        &self.subnet_id
    }

    /// `Fn::GetAtt [subnet, AvailabilityZone]`.
    pub fn availability_zone(&self) -> &Attr {
        &self.availability_zone
    }
}

/// A VPC and everything it needs to route traffic.
#[derive(Debug, Clone)]
pub struct Vpc {
    path: ConstructPath,
    logical_id: LogicalId,
    vpc_id: Attr,
    cidr: Ipv4Cidr,
    zones: AvailabilityZones,
    subnets: Vec<Subnet>,
    internet_connectivity: Vec<LogicalId>,
}

impl Vpc {
    pub fn new(
        stack: &mut Stack,
        scope: &ConstructPath,
        id: &str,
        props: VpcProps,
    ) -> Result<Self, ConstructError> {
        validate_vpc_cidr(&props.cidr)?;
        if props.max_azs == 0 {
            return Err(ConstructError::Config("max_azs must be at least 1".to_string()));
        }

        let path = scope.child(id)?;
        let zones = stack.availability_zones().limit(props.max_azs);
        let planned = plan_subnets(&props.cidr, &props.subnet_configuration, zones.len())?;

        let has_public = planned.iter().any(|s| s.subnet_type == SubnetType::Public);
        let has_private = planned.iter().any(|s| s.subnet_type == SubnetType::Private);
        let nat_count = if has_private {
            props.nat_gateways.unwrap_or(zones.len())
        } else {
            0
        };
        if has_private && (!has_public || nat_count == 0) {
            return Err(ConstructError::Config(
                "private subnets need at least one NAT gateway in a public subnet".to_string(),
            ));
        }

        let mut vpc = Resource::new("AWS::EC2::VPC");
        vpc.set_property("CidrBlock", props.cidr.to_string());
        vpc.set_property("EnableDnsHostnames", true);
        vpc.set_property("EnableDnsSupport", true);
        vpc.set_property("InstanceTenancy", "default");
        vpc.set_property("Tags", name_tags(&path));
        let vpc_logical_id = stack.add_resource(&path.child("Resource")?, vpc)?;
        let vpc_ref = Expr::reference(&vpc_logical_id);

        let gateway = if has_public {
            let mut igw = Resource::new("AWS::EC2::InternetGateway");
            igw.set_property("Tags", name_tags(&path));
            let igw = stack.add_resource(&path.child("IGW")?, igw)?;

            let mut attachment = Resource::new("AWS::EC2::VPCGatewayAttachment");
            attachment.set_property("InternetGatewayId", Expr::reference(&igw));
            attachment.set_property("VpcId", vpc_ref.clone());
            let attachment = stack.add_resource(&path.child("VPCGW")?, attachment)?;
            Some((igw, attachment))
        } else {
            None
        };

        let mut subnets = Vec::with_capacity(planned.len());
        let mut internet_connectivity = Vec::new();

        for plan in &planned {
            let subnet_path = path.child(&plan.construct_id())?;
            let is_public = plan.subnet_type == SubnetType::Public;

            let mut subnet = Resource::new("AWS::EC2::Subnet");
            subnet.set_property("AvailabilityZone", zones.expr(plan.zone_index));
            subnet.set_property("CidrBlock", plan.cidr.to_string());
            subnet.set_property("MapPublicIpOnLaunch", is_public);
            subnet.set_property(
                "Tags",
                json!([
                    { "Key": "aws-cdk:subnet-name", "Value": plan.group },
                    { "Key": "aws-cdk:subnet-type", "Value": plan.subnet_type.to_string() },
                    { "Key": "Name", "Value": subnet_path.to_string() }
                ]),
            );
            subnet.set_property("VpcId", vpc_ref.clone());
            let subnet_id = stack.add_resource(&subnet_path.child("Subnet")?, subnet)?;

            let mut route_table = Resource::new("AWS::EC2::RouteTable");
            route_table.set_property("Tags", name_tags(&subnet_path));
            route_table.set_property("VpcId", vpc_ref.clone());
            let route_table = stack.add_resource(&subnet_path.child("RouteTable")?, route_table)?;

            let mut association = Resource::new("AWS::EC2::SubnetRouteTableAssociation");
            association.set_property("RouteTableId", Expr::reference(&route_table));
            association.set_property("SubnetId", Expr::reference(&subnet_id));
            let association =
                stack.add_resource(&subnet_path.child("RouteTableAssociation")?, association)?;

            if let (true, Some((igw, attachment))) = (is_public, &gateway) {
                let mut route = Resource::new("AWS::EC2::Route");
                route.set_property("DestinationCidrBlock", ANY_IPV4);
                route.set_property("GatewayId", Expr::reference(igw));
                route.set_property("RouteTableId", Expr::reference(&route_table));
                route.add_dependency(attachment);
                let route = stack.add_resource(&subnet_path.child("DefaultRoute")?, route)?;
                internet_connectivity.push(route);
                internet_connectivity.push(association);
            }

            subnets.push(Subnet {
                group: plan.group.clone(),
                subnet_type: plan.subnet_type,
                zone_index: plan.zone_index,
                cidr: plan.cidr,
                subnet_id: stack.ref_attr(&subnet_id),
                availability_zone: stack.get_att(&subnet_id, "AvailabilityZone"),
                path: subnet_path,
                logical_id: subnet_id,
                route_table,
            });
        }

        let nat_gateways = add_nat_gateways(stack, &subnets, nat_count)?;

        for subnet in subnets.iter().filter(|s| s.subnet_type == SubnetType::Private) {
            let nat = nat_gateways
                .iter()
                .find(|(zone, _)| *zone == subnet.zone_index)
                .or_else(|| nat_gateways.first())
                .map(|(_, nat)| nat)
                .ok_or_else(|| ConstructError::Config("no NAT gateway available".to_string()))?;

            let mut route = Resource::new("AWS::EC2::Route");
            route.set_property("DestinationCidrBlock", ANY_IPV4);
            route.set_property("NatGatewayId", Expr::reference(nat));
            route.set_property("RouteTableId", Expr::reference(&subnet.route_table));
            stack.add_resource(&subnet.path.child("DefaultRoute")?, route)?;
        }

        debug!(
            vpc = %path,
            cidr = %props.cidr,
            zones = zones.len(),
            subnets = subnets.len(),
            nat_gateways = nat_gateways.len(),
            "vpc created"
        );

        Ok(Self {
            vpc_id: stack.ref_attr(&vpc_logical_id),
            path,
            logical_id: vpc_logical_id,
            cidr: props.cidr,
            zones,
            subnets,
            internet_connectivity,
        })
    }

    pub fn path(&self) -> &ConstructPath {
        &self.path
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    /// `Ref` of the VPC.
    pub fn vpc_id(&self) -> &Attr {
        &self.vpc_id
    }

    pub fn cidr(&self) -> Ipv4Cidr {
        self.cidr
    }

    pub fn zones(&self) -> &AvailabilityZones {
        &self.zones
    }

    /// All subnets, ordered by group then zone.
    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }

    pub fn subnets_of_type(&self, subnet_type: SubnetType) -> Vec<&Subnet> {
        self.subnets
            .iter()
            .filter(|s| s.subnet_type == subnet_type)
            .collect()
    }

    pub fn public_subnets(&self) -> Vec<&Subnet> {
        self.subnets_of_type(SubnetType::Public)
    }

    pub fn private_subnets(&self) -> Vec<&Subnet> {
        self.subnets_of_type(SubnetType::Private)
    }

    /// Resources an internet-facing resource has to wait for.
    pub fn internet_connectivity(&self) -> &[LogicalId] {
        &self.internet_connectivity
    }
}

/// One EIP + NAT gateway in each of the first `count` public subnets of the
/// first public group. Returns (zone index, NAT logical id) pairs.
fn add_nat_gateways(
    stack: &mut Stack,
    subnets: &[Subnet],
    count: usize,
) -> Result<Vec<(usize, LogicalId)>, ConstructError> {
    let Some(first_public) = subnets.iter().find(|s| s.subnet_type == SubnetType::Public) else {
        return Ok(Vec::new());
    };

    let mut nat_gateways = Vec::new();
    for subnet in subnets
        .iter()
        .filter(|s| s.group == first_public.group)
        .take(count)
    {
        let mut eip = Resource::new("AWS::EC2::EIP");
        eip.set_property("Domain", "vpc");
        eip.set_property("Tags", name_tags(&subnet.path));
        let eip = stack.add_resource(&subnet.path.child("EIP")?, eip)?;

        let mut nat = Resource::new("AWS::EC2::NatGateway");
        nat.set_property("AllocationId", Expr::get_att(&eip, "AllocationId"));
        nat.set_property("SubnetId", Expr::reference(&subnet.logical_id));
        nat.set_property("Tags", name_tags(&subnet.path));
        nat.add_dependency(subnet.path.child("DefaultRoute")?.logical_id()?);
        nat.add_dependency(subnet.path.child("RouteTableAssociation")?.logical_id()?);
        let nat = stack.add_resource(&subnet.path.child("NATGateway")?, nat)?;

        nat_gateways.push((subnet.zone_index, nat));
    }
    Ok(nat_gateways)
}

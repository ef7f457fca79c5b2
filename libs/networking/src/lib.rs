//! Networking utilities for the synthesized stacks.
//!
//! This library provides helpers for:
//! - IPv4 CIDR blocks (parsing, masking, containment)
//! - VPC subnet planning (per-zone public/private subnets carved from one block)
//! - Security group ports and protocols
//! - Availability zone selection

use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Networking errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Invalid IP address.
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    /// Invalid CIDR prefix.
    #[error("invalid CIDR prefix: {0}")]
    InvalidPrefix(String),

    /// Address pool exhausted.
    #[error("address pool exhausted: {0}")]
    PoolExhausted(String),

    /// Invalid port or port range.
    #[error("invalid port range {from}-{to} for {protocol}")]
    InvalidPort {
        protocol: &'static str,
        from: u16,
        to: u16,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

// ============================================================================
// IPv4 CIDR Blocks
// ============================================================================

/// Source range that matches every IPv4 address.
pub const ANY_IPV4: &str = "0.0.0.0/0";

/// Smallest VPC block CloudFormation accepts.
pub const VPC_MIN_PREFIX: u8 = 16;

/// Largest VPC prefix (smallest block) CloudFormation accepts.
pub const VPC_MAX_PREFIX: u8 = 28;

/// Largest subnet CloudFormation accepts.
pub const SUBNET_MIN_PREFIX: u8 = 16;

/// Smallest subnet CloudFormation accepts.
pub const SUBNET_MAX_PREFIX: u8 = 28;

/// IPv4 block in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    /// Network address (host bits cleared).
    pub address: Ipv4Addr,

    /// Prefix length (e.g., 16 for /16).
    pub prefix_len: u8,
}

impl Ipv4Cidr {
    /// `0.0.0.0/0`.
    pub const fn any() -> Self {
        Self {
            address: Ipv4Addr::UNSPECIFIED,
            prefix_len: 0,
        }
    }

    /// Create a new block, masking off host bits.
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self, NetworkError> {
        if prefix_len > 32 {
            return Err(NetworkError::InvalidPrefix(format!(
                "prefix length {} exceeds 32",
                prefix_len
            )));
        }

        Ok(Self {
            address: mask_ipv4(address, prefix_len),
            prefix_len,
        })
    }

    /// Parse from CIDR notation (e.g., "10.0.0.0/16").
    pub fn from_cidr(s: &str) -> Result<Self, NetworkError> {
        let Some((addr_str, prefix_str)) = s.split_once('/') else {
            return Err(NetworkError::InvalidPrefix(format!(
                "missing '/' in CIDR: {}",
                s
            )));
        };

        let address = Ipv4Addr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidAddress(addr_str.to_string()))?;

        let prefix_len = prefix_str
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidPrefix(prefix_str.to_string()))?;

        Self::new(address, prefix_len)
    }

    /// Check if an address is within this block.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        mask_ipv4(addr, self.prefix_len) == self.address
    }

    /// Check if another block lies entirely within this one.
    pub fn contains_block(&self, other: &Ipv4Cidr) -> bool {
        other.prefix_len >= self.prefix_len && self.contains(other.address)
    }

    /// Check if two blocks share any address.
    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.contains_block(other) || other.contains_block(self)
    }

    /// Number of addresses in this block.
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix_len))
    }

    /// Block of the given prefix length at `offset` addresses from the start.
    fn block_at(&self, offset: u64, prefix_len: u8) -> Result<Self, NetworkError> {
        let base = u64::from(u32::from(self.address)) + offset;
        let base = u32::try_from(base)
            .map_err(|_| NetworkError::PoolExhausted(self.to_string()))?;
        Self::new(Ipv4Addr::from(base), prefix_len)
    }
}

impl std::fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_cidr(s)
    }
}

impl Serialize for Ipv4Cidr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ipv4Cidr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_cidr(&s).map_err(serde::de::Error::custom)
    }
}

/// Mask an IPv4 address to a prefix length.
fn mask_ipv4(addr: Ipv4Addr, prefix_len: u8) -> Ipv4Addr {
    let bits = u32::from(addr);
    let mask = if prefix_len == 0 {
        0
    } else if prefix_len >= 32 {
        u32::MAX
    } else {
        u32::MAX << (32 - prefix_len)
    };
    Ipv4Addr::from(bits & mask)
}

/// Validate a block for use as a VPC address range.
pub fn validate_vpc_cidr(cidr: &Ipv4Cidr) -> Result<(), NetworkError> {
    if !(VPC_MIN_PREFIX..=VPC_MAX_PREFIX).contains(&cidr.prefix_len) {
        return Err(NetworkError::InvalidPrefix(format!(
            "VPC block {} must have a prefix between /{} and /{}",
            cidr, VPC_MIN_PREFIX, VPC_MAX_PREFIX
        )));
    }
    Ok(())
}

// ============================================================================
// Subnet Planning
// ============================================================================

fn validate_subnet_mask(group: &str, mask: u8) -> Result<(), NetworkError> {
    if !(SUBNET_MIN_PREFIX..=SUBNET_MAX_PREFIX).contains(&mask) {
        return Err(NetworkError::InvalidPrefix(format!(
            "/{} is not a valid network mask for subnet group {}: must be between /{} and /{}",
            mask, group, SUBNET_MIN_PREFIX, SUBNET_MAX_PREFIX
        )));
    }
    Ok(())
}

/// Sequential allocator of aligned subnet blocks inside a VPC block.
#[derive(Debug)]
pub struct SubnetPlanner {
    /// Block to allocate from.
    block: Ipv4Cidr,

    /// Offset of the next free address.
    next_offset: u64,
}

impl SubnetPlanner {
    /// Create a new planner for a block.
    pub fn new(block: Ipv4Cidr) -> Self {
        Self {
            block,
            next_offset: 0,
        }
    }

    /// Allocate the next block with the given prefix length.
    pub fn allocate(&mut self, prefix_len: u8) -> Result<Ipv4Cidr, NetworkError> {
        if prefix_len < self.block.prefix_len || prefix_len > 32 {
            return Err(NetworkError::InvalidPrefix(format!(
                "/{} does not fit inside {}",
                prefix_len, self.block
            )));
        }

        let size = 1u64 << (32 - u32::from(prefix_len));
        let offset = self.next_offset.div_ceil(size) * size;
        if offset + size > self.block.size() {
            return Err(NetworkError::PoolExhausted(self.block.to_string()));
        }

        self.next_offset = offset + size;
        self.block.block_at(offset, prefix_len)
    }

    /// Largest prefix that lets `count` equal subnets fit in the remaining space.
    pub fn mask_for_remaining(&self, count: usize) -> Result<u8, NetworkError> {
        let count = u64::try_from(count).unwrap_or(u64::MAX).max(1);
        let per_subnet = self.remaining() / count;
        if per_subnet == 0 {
            return Err(NetworkError::PoolExhausted(format!(
                "{} has no room for {} more subnets",
                self.block, count
            )));
        }

        let log2 = 63 - per_subnet.leading_zeros();
        Ok((32 - log2) as u8)
    }

    /// Get the block being allocated from.
    pub fn block(&self) -> &Ipv4Cidr {
        &self.block
    }

    /// Get remaining addresses.
    pub fn remaining(&self) -> u64 {
        self.block.size().saturating_sub(self.next_offset)
    }
}

/// Routing role of a subnet group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetType {
    /// Routes to an internet gateway; instances may get public addresses.
    Public,
    /// Routes outbound traffic through a NAT gateway.
    Private,
    /// No route outside the VPC.
    Isolated,
}

impl std::fmt::Display for SubnetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubnetType::Public => write!(f, "Public"),
            SubnetType::Private => write!(f, "Private"),
            SubnetType::Isolated => write!(f, "Isolated"),
        }
    }
}

/// One group of subnets, repeated in every selected zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetConfiguration {
    /// Group name (used in construct ids, e.g. "Public" → `PublicSubnet1`).
    pub name: String,

    /// Routing role.
    pub subnet_type: SubnetType,

    /// Fixed prefix length; `None` shares the leftover space evenly.
    #[serde(default)]
    pub cidr_mask: Option<u8>,
}

impl SubnetConfiguration {
    /// Create a configuration that shares leftover space.
    pub fn new(name: &str, subnet_type: SubnetType) -> Self {
        Self {
            name: name.to_string(),
            subnet_type,
            cidr_mask: None,
        }
    }

    /// Set a fixed prefix length.
    pub fn with_cidr_mask(mut self, mask: u8) -> Self {
        self.cidr_mask = Some(mask);
        self
    }

    /// One public and one private group.
    pub fn default_set() -> Vec<Self> {
        vec![
            Self::new("Public", SubnetType::Public),
            Self::new("Private", SubnetType::Private),
        ]
    }
}

/// A subnet chosen by [`plan_subnets`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSubnet {
    /// Group name.
    pub group: String,

    /// Routing role.
    pub subnet_type: SubnetType,

    /// Index into the selected zones.
    pub zone_index: usize,

    /// Address block.
    pub cidr: Ipv4Cidr,
}

impl PlannedSubnet {
    /// Construct id for this subnet (`PublicSubnet1`, `PrivateSubnet2`, ...).
    pub fn construct_id(&self) -> String {
        format!("{}Subnet{}", self.group, self.zone_index + 1)
    }
}

/// Carve per-zone subnets for every configuration out of a VPC block.
///
/// Groups with a fixed mask are allocated first; the remaining groups split
/// what is left evenly. Results are ordered by configuration, then zone.
pub fn plan_subnets(
    vpc: &Ipv4Cidr,
    configs: &[SubnetConfiguration],
    zone_count: usize,
) -> Result<Vec<PlannedSubnet>, NetworkError> {
    if zone_count == 0 {
        return Err(NetworkError::Config(
            "at least one availability zone is required".to_string(),
        ));
    }
    if configs.is_empty() {
        return Err(NetworkError::Config(
            "at least one subnet configuration is required".to_string(),
        ));
    }
    for (i, config) in configs.iter().enumerate() {
        if configs[..i].iter().any(|c| c.name == config.name) {
            return Err(NetworkError::Config(format!(
                "duplicate subnet group name: {}",
                config.name
            )));
        }
    }

    let mut planner = SubnetPlanner::new(*vpc);
    let mut blocks: Vec<Vec<Ipv4Cidr>> = vec![Vec::new(); configs.len()];

    for (i, config) in configs.iter().enumerate() {
        if let Some(mask) = config.cidr_mask {
            validate_subnet_mask(&config.name, mask)?;
            for _ in 0..zone_count {
                blocks[i].push(planner.allocate(mask)?);
            }
        }
    }

    let shared = configs.iter().filter(|c| c.cidr_mask.is_none()).count();
    if shared > 0 {
        let mask = planner.mask_for_remaining(shared * zone_count)?;
        for (i, config) in configs.iter().enumerate() {
            if config.cidr_mask.is_none() {
                validate_subnet_mask(&config.name, mask)?;
                for _ in 0..zone_count {
                    blocks[i].push(planner.allocate(mask)?);
                }
            }
        }
    }

    let planned = configs
        .iter()
        .zip(blocks)
        .flat_map(|(config, cidrs)| {
            cidrs
                .into_iter()
                .enumerate()
                .map(move |(zone_index, cidr)| PlannedSubnet {
                    group: config.name.clone(),
                    subnet_type: config.subnet_type,
                    zone_index,
                    cidr,
                })
        })
        .collect();

    Ok(planned)
}

// ============================================================================
// Ports and Protocols
// ============================================================================

/// IP protocol of a security group rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    /// Every protocol (`-1`).
    All,
}

impl Protocol {
    /// Protocol string as CloudFormation expects it.
    pub fn as_cfn(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::All => "-1",
        }
    }
}

/// Protocol plus port range of a security group rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port {
    protocol: Protocol,
    range: Option<(u16, u16)>,
}

impl Port {
    /// A single TCP port.
    pub const fn tcp(port: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            range: Some((port, port)),
        }
    }

    /// An inclusive TCP port range.
    pub const fn tcp_range(from: u16, to: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            range: Some((from, to)),
        }
    }

    /// Every TCP port.
    pub const fn all_tcp() -> Self {
        Self::tcp_range(0, u16::MAX)
    }

    /// A single UDP port.
    pub const fn udp(port: u16) -> Self {
        Self {
            protocol: Protocol::Udp,
            range: Some((port, port)),
        }
    }

    /// Every protocol and port.
    pub const fn all_traffic() -> Self {
        Self {
            protocol: Protocol::All,
            range: None,
        }
    }

    /// Rule protocol.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// First port of the range, if the protocol has ports.
    pub fn from_port(&self) -> Option<u16> {
        self.range.map(|(from, _)| from)
    }

    /// Last port of the range, if the protocol has ports.
    pub fn to_port(&self) -> Option<u16> {
        self.range.map(|(_, to)| to)
    }

    /// Reject inverted ranges and port 0 (except as part of the full range).
    pub fn validate(&self) -> Result<(), NetworkError> {
        let Some((from, to)) = self.range else {
            return Ok(());
        };
        let full_range = from == 0 && to == u16::MAX;
        if from > to || (from == 0 && !full_range) {
            return Err(NetworkError::InvalidPort {
                protocol: self.protocol.as_cfn(),
                from,
                to,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.protocol, self.range) {
            (Protocol::All, _) | (_, None) => write!(f, "ALL TRAFFIC"),
            (Protocol::Udp, Some((from, to))) if from == to => write!(f, "UDP {}", from),
            (Protocol::Udp, Some((from, to))) => write!(f, "UDP {}-{}", from, to),
            (_, Some((from, to))) if from == to => write!(f, "{}", from),
            (_, Some((from, to))) => write!(f, "{}-{}", from, to),
        }
    }
}

// ============================================================================
// Availability Zones
// ============================================================================

/// Pick the first `max_azs` zones from those a region offers.
pub fn select_zones(available: &[String], max_azs: usize) -> Vec<String> {
    available.iter().take(max_azs).cloned().collect()
}

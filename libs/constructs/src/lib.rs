//! # jci-constructs
//!
//! Resource builders that write CloudFormation resources into a stack.
//!
//! ## Design Principles
//!
//! - A construct is created with `new(stack, scope, id, props)` and returns a
//!   handle; the handle carries logical ids and [`Attr`]s, never the template
//! - Constructs that change other constructs (a listener registering a target
//!   group with an auto-scaling group) take the stack again and edit the
//!   resources they own through the handle
//! - Anything CloudFormation would reject later (capacity bounds, volume
//!   sizes, port ranges, CIDR blocks) is checked when the construct is built
//!
//! ## Constructs
//!
//! - Networking: [`Vpc`], [`SecurityGroup`]
//! - Load balancing: [`ApplicationLoadBalancer`], [`Listener`], [`TargetGroup`]
//! - Compute: [`AutoScalingGroup`], [`DedicatedHost`], [`Instance`]
//! - Identity: [`Role`], [`InstanceProfile`], [`ManagedPolicy`]
//! - Instance setup: [`UserData`], [`MachineImage`], [`InstanceType`], [`BlockDevice`]
//!
//! [`Attr`]: jci_synth::Attr

mod autoscaling;
mod error;
mod iam;
mod instance;
mod instance_type;
mod load_balancer;
mod machine_image;
mod security_group;
mod tags;
mod user_data;
mod vpc;

pub use autoscaling::{AsgHealthCheck, AutoScalingGroup, AutoScalingGroupProps, Capacity};
pub use error::ConstructError;
pub use iam::{InstanceProfile, ManagedPolicy, Role};
pub use instance::{DedicatedHost, DedicatedHostProps, Instance, InstanceProps, Tenancy};
pub use instance_type::{
    BlockDevice, EbsVolume, EbsVolumeType, InstanceClass, InstanceSize, InstanceType,
};
pub use load_balancer::{
    AddTargetsProps, ApplicationLoadBalancer, ApplicationTarget, Listener, ListenerProps,
    TargetGroup, TargetHealthCheck,
};
pub use machine_image::{MachineImage, OsType};
pub use security_group::{Peer, SecurityGroup, SecurityGroupProps};
pub use user_data::UserData;
pub use vpc::{Subnet, Vpc, VpcProps};

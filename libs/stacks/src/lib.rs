//! # jci-stacks
//!
//! The Jenkins deployment: a controller stack and a macOS build-agent stack.
//!
//! ## Stacks
//!
//! - [`JenkinsStack`]: VPC, the `jenkins-sg` security group, an internet-facing
//!   load balancer and a single-instance auto-scaling group running the
//!   controller, plus the load balancer URL as an exported output
//! - [`JenkinsMacAgentStack`]: a Mac instance on a dedicated host, placed in
//!   the controller's network through cross-stack references
//!
//! [`build_app`] composes both from [`AppSettings`].

mod agent;
mod app;
pub mod bootstrap;
mod controller;
mod error;
mod settings;

pub use agent::{JenkinsMacAgentStack, JenkinsMacAgentStackProps};
pub use app::{build_app, JenkinsApp, AGENT_STACK, CONTROLLER_STACK};
pub use controller::{JenkinsStack, JenkinsStackProps};
pub use error::StacksError;
pub use settings::{AgentSettings, AppSettings, ControllerSettings};

/// Managed policy that lets Systems Manager reach an instance.
pub const SSM_MANAGED_POLICY: &str = "AmazonSSMManagedInstanceCore";

//! # jci-id
//!
//! Identifiers for the synthesized resource graph.
//!
//! ## Design Principles
//!
//! - Every construct has a path rooted at its stack (`JenkinsStack/mac-vpc/Resource`)
//! - Logical ids are derived from paths, never chosen by hand, so renaming a
//!   construct is the only way to change one
//! - Names that end up in CloudFormation (stack names, export names) are typed
//!   and validated on construction
//!
//! ## Logical ID Format
//!
//! A construct that sits directly under its stack keeps its id with
//! non-alphanumerics stripped (`loadbalancer-url-output` becomes
//! `loadbalancerurloutput`). Deeper constructs get a human-readable prefix
//! followed by an 8-character hash of the full path:
//!
//! - `mac-vpc/Resource` → `macvpc` + `1A2B3C4D`
//! - `mac-vpc/PublicSubnet1/Subnet` → `macvpcPublicSubnet1Subnet` + hash

mod error;
mod logical;
mod macros;
mod types;

pub use error::IdError;
pub use logical::LogicalId;
pub use types::*;

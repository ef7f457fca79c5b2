//! # jci-template
//!
//! CloudFormation template document model.
//!
//! ## Design Principles
//!
//! - A template is plain data: parameters, resources and outputs keyed by
//!   logical id, serialized in the shape CloudFormation reads
//! - Intrinsic functions are typed ([`Expr`]) so a reference can only be built
//!   from a logical id, never from a hand-written JSON fragment
//! - Templates validate their own references; a `Ref` to a missing logical id
//!   fails at synthesis, not at deploy time
//! - Every template has a deterministic fingerprint (canonical JSON hash)

mod error;
mod expr;
mod fingerprint;
mod template;

pub use error::TemplateError;
pub use expr::{import_names, Expr, Pseudo};
pub use fingerprint::TemplateHash;
pub use template::{Export, Output, Parameter, Resource, Template};

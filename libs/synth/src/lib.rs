//! # jci-synth
//!
//! Turns stacks of resources into a cloud assembly.
//!
//! An [`App`] owns its stacks in construction order. Constructs write
//! resources into a [`Stack`] and hand back [`Attr`] values; a stack that uses
//! an attribute owned by another stack resolves it through
//! [`Stack::resolve`], which turns it into an import/export pair and records
//! the deployment dependency. A stack may only consume attributes of stacks
//! constructed before it in the same app.
//!
//! ```ignore
//! let mut app = App::new(Context::default());
//! let stack = app.new_stack("JenkinsStack", StackProps::default())?;
//! let vpc = stack.add_resource(&stack.path().child("vpc")?, Resource::new("AWS::EC2::VPC"))?;
//! let assembly = app.synth()?;
//! assembly.write("cdk.out")?;
//! ```

mod app;
mod assembly;
mod context;
mod environment;
mod error;
mod stack;

pub use app::{App, StackId};
pub use assembly::{
    ArtifactProperties, AssemblyManifest, CloudAssembly, ManifestArtifact, MissingContext,
    StackArtifact, ASSEMBLY_VERSION, MANIFEST_FILE,
};
pub use context::{AvailabilityZones, Context};
pub use environment::Environment;
pub use error::SynthError;
pub use stack::{Attr, Stack, StackProps};

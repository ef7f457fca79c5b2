//! Stacks and cross-stack attributes.

use std::collections::BTreeSet;

use jci_id::{ConstructPath, ExportName, LogicalId, StackName};
use jci_template::{Expr, Output, Parameter, Resource, Template};
use serde_json::Value;
use tracing::{debug, warn};

use crate::assembly::MissingContext;
use crate::{AvailabilityZones, Context, Environment, StackId, SynthError};

/// Metadata key recording the construct path of a resource.
const PATH_METADATA_KEY: &str = "aws:cdk:path";

/// Options for a new stack.
#[derive(Debug, Clone, Default)]
pub struct StackProps {
    /// Target account and region.
    pub env: Environment,

    /// Template description.
    pub description: Option<String>,

    /// Protect the deployed stack against deletion.
    pub termination_protection: bool,
}

/// A value owned by one stack that other stacks can consume.
///
/// Holds a `Ref` or `Fn::GetAtt` expression tagged with its owner. Inside
/// the owning stack it is used as is; anywhere else it has to go through
/// [`Stack::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    owner: StackId,
    owner_name: StackName,
    expr: Expr,
}

impl Attr {
    /// Stack that owns the value.
    pub fn owner(&self) -> StackId {
        self.owner
    }

    /// Name of the owning stack.
    pub fn owner_name(&self) -> &StackName {
        &self.owner_name
    }

    /// The expression as seen from the owning stack.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Logical id the value points at.
    pub fn logical_id(&self) -> Option<&str> {
        self.expr.target()
    }
}

/// An output a producer stack must export for a consumer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExportRequest {
    pub(crate) producer: StackId,
    pub(crate) output_id: LogicalId,
    pub(crate) export: ExportName,
    pub(crate) value: Expr,
}

/// A deployable unit of resources.
#[derive(Debug, Clone)]
pub struct Stack {
    id: StackId,
    name: StackName,
    env: Environment,
    termination_protection: bool,
    template: Template,
    context: Context,
    dependencies: BTreeSet<String>,
    exports: Vec<ExportRequest>,
    missing: Vec<MissingContext>,
}

impl Stack {
    pub(crate) fn new(id: StackId, name: StackName, props: StackProps, context: Context) -> Self {
        let mut template = Template::new();
        template.set_description(props.description);
        Self {
            id,
            name,
            env: props.env,
            termination_protection: props.termination_protection,
            template,
            context,
            dependencies: BTreeSet::new(),
            exports: Vec::new(),
            missing: Vec::new(),
        }
    }

    pub fn id(&self) -> StackId {
        self.id
    }

    pub fn name(&self) -> &StackName {
        &self.name
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn termination_protection(&self) -> bool {
        self.termination_protection
    }

    /// Root construct path; every construct of the stack lives below it.
    pub fn path(&self) -> ConstructPath {
        ConstructPath::root(&self.name)
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Names of stacks that must be deployed before this one.
    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    pub(crate) fn exports(&self) -> &[ExportRequest] {
        &self.exports
    }

    pub(crate) fn missing_context(&self) -> &[MissingContext] {
        &self.missing
    }

    /// Add a resource at a construct path and return its logical id.
    pub fn add_resource(
        &mut self,
        path: &ConstructPath,
        mut resource: Resource,
    ) -> Result<LogicalId, SynthError> {
        self.check_path(path)?;
        let logical_id = path.logical_id()?;
        resource.metadata.insert(
            PATH_METADATA_KEY.to_string(),
            Value::String(path.to_string()),
        );
        debug!(
            stack = %self.name,
            logical_id = %logical_id,
            resource_type = %resource.resource_type,
            "resource added"
        );
        self.template.add_resource(&logical_id, resource)?;
        Ok(logical_id)
    }

    /// Modify a resource added earlier.
    pub fn resource_mut(&mut self, logical_id: &LogicalId) -> Result<&mut Resource, SynthError> {
        Ok(self.template.resource_mut(logical_id.as_str())?)
    }

    /// Declare a template parameter. Identical redeclarations are ignored.
    pub fn add_parameter(
        &mut self,
        logical_id: &str,
        parameter: Parameter,
    ) -> Result<LogicalId, SynthError> {
        let logical_id = LogicalId::parse(logical_id)?;
        if self.template.add_parameter(&logical_id, parameter)? {
            debug!(stack = %self.name, logical_id = %logical_id, "parameter added");
        }
        Ok(logical_id)
    }

    /// Declare an output at a construct path.
    pub fn add_output(
        &mut self,
        path: &ConstructPath,
        output: Output,
    ) -> Result<LogicalId, SynthError> {
        self.check_path(path)?;
        let logical_id = path.logical_id()?;
        self.template.add_output(&logical_id, output)?;
        Ok(logical_id)
    }

    /// `Ref` of a resource or parameter of this stack.
    pub fn ref_attr(&self, logical_id: &LogicalId) -> Attr {
        self.attr(Expr::reference(logical_id))
    }

    /// `Fn::GetAtt` of a resource of this stack.
    pub fn get_att(&self, logical_id: &LogicalId, attribute: &str) -> Attr {
        self.attr(Expr::get_att(logical_id, attribute))
    }

    fn attr(&self, expr: Expr) -> Attr {
        Attr {
            owner: self.id,
            owner_name: self.name.clone(),
            expr,
        }
    }

    /// Record that this stack deploys after another one.
    pub fn add_dependency(&mut self, stack: &StackName) {
        if *stack != self.name {
            self.dependencies.insert(stack.to_string());
        }
    }

    /// Turn an attribute into a value usable in this stack.
    ///
    /// Attributes of this stack come back unchanged. Attributes of an earlier
    /// stack of the same app become `Fn::ImportValue` of an export the
    /// producer declares at synthesis; the producer becomes a dependency.
    pub fn resolve(&mut self, attr: &Attr) -> Result<Expr, SynthError> {
        if attr.owner == self.id {
            return Ok(attr.expr.clone());
        }
        if attr.owner.app() != self.id.app() {
            return Err(SynthError::ForeignStack {
                consumer: self.name.to_string(),
                owner: attr.owner_name.to_string(),
            });
        }
        if attr.owner.index() > self.id.index() {
            return Err(SynthError::ReferenceToLaterStack {
                consumer: self.name.to_string(),
                producer: attr.owner_name.to_string(),
            });
        }

        let mut components = vec!["ExportsOutput"];
        match &attr.expr {
            Expr::Ref(target) => components.extend(["Ref", target.as_str()]),
            Expr::GetAtt {
                logical_id,
                attribute,
            } => components.extend(["FnGetAtt", logical_id.as_str(), attribute.as_str()]),
            other => return Err(SynthError::UnresolvableAttr(other.to_value().to_string())),
        }
        let output_id = LogicalId::from_components(&components)?;
        let export = ExportName::parse(&format!("{}:{}", attr.owner_name, output_id))?;

        if !self.exports.iter().any(|e| e.export == export) {
            debug!(
                consumer = %self.name,
                producer = %attr.owner_name,
                export = %export,
                "cross-stack reference"
            );
            self.exports.push(ExportRequest {
                producer: attr.owner,
                output_id,
                export: export.clone(),
                value: attr.expr.clone(),
            });
        }
        self.add_dependency(&attr.owner_name);

        Ok(Expr::import_value(export.as_str()))
    }

    /// Zones available to this stack.
    ///
    /// Named zones come from the context for a concrete environment. Without
    /// them the stack falls back to two deploy-time zones; for a concrete
    /// environment the lookup is also recorded as missing context.
    pub fn availability_zones(&mut self) -> AvailabilityZones {
        if let Some(zones) = self.context.availability_zones(&self.env) {
            return AvailabilityZones::Named(zones);
        }

        if let (Some(account), Some(region)) = (&self.env.account, &self.env.region) {
            let key = Context::availability_zones_key(account, region);
            if !self.missing.iter().any(|m| m.key == key) {
                warn!(
                    stack = %self.name,
                    key = %key,
                    "availability zones not in context, falling back to deploy-time lookup"
                );
                self.missing.push(MissingContext::availability_zones(account, region));
            }
        }

        AvailabilityZones::agnostic()
    }

    fn check_path(&self, path: &ConstructPath) -> Result<(), SynthError> {
        if path.stack() != self.name.as_str() {
            return Err(SynthError::PathOutsideStack {
                path: path.to_string(),
                stack: self.name.to_string(),
            });
        }
        Ok(())
    }
}
